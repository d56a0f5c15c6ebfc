use std::path::Path;
use std::process::exit;

use anyhow::{bail, Error};

use datamover::config::MoverConfig;
use datamover::engine::{Engine, GetParams, Task, TaskKind, TransferParams};
use datamover::store::PrefixIndexData;

fn usage() -> ! {
    eprintln!("usage: datamover <config.json> put <source-dir>");
    eprintln!("       datamover <config.json> get <prefix>");
    eprintln!("       datamover <config.json> del <prefix>");
    exit(1);
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        log::error!("{}", err);
        exit(1);
    }
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 {
        usage();
    }
    let (config_path, operation, target) = (&args[0], args[1].as_str(), &args[2]);

    let config = MoverConfig::load(config_path)?;

    // Only listing and download need the prefix index; an indexing run
    // can proceed without it.
    let prefix_index = match PrefixIndexData::load(&config.prefix_index_path) {
        Ok(data) => {
            log::info!("loaded {} prefixes from {:?}", data.len(), config.prefix_index_path);
            Some(data)
        }
        Err(err) => {
            log::warn!("prefix index unavailable: {}", err);
            None
        }
    };

    let engine = Engine::start(config.workers, &config.s3, prefix_index)?;

    match operation {
        "put" => {
            engine.index_tree(Path::new(target), &config.nfs_cluster, config.max_index_size);
            engine.wait_idle();
            for batch in engine.drain_batches() {
                engine.submit(Task::new(TaskKind::Put(TransferParams {
                    batch,
                    s3: config.s3.clone(),
                    dryrun: config.dryrun,
                })));
            }
            engine.wait_idle();
        }
        "get" => {
            if config.dest_path.as_os_str().is_empty() {
                bail!("'get' needs dest_path in the config");
            }
            engine.list_tree(target, &config.s3, config.max_index_size);
            engine.wait_idle();
            for batch in engine.drain_batches() {
                engine.submit(Task::new(TaskKind::Get(GetParams {
                    batch,
                    s3: config.s3.clone(),
                    dest_path: config.dest_path.clone(),
                    dryrun: config.dryrun,
                })));
            }
            engine.wait_idle();
        }
        "del" => {
            engine.list_tree(target, &config.s3, config.max_index_size);
            engine.wait_idle();
            for batch in engine.drain_batches() {
                engine.submit(Task::new(TaskKind::Del(TransferParams {
                    batch,
                    s3: config.s3.clone(),
                    dryrun: config.dryrun,
                })));
            }
            engine.wait_idle();
        }
        _ => usage(),
    }

    let summary = engine.summary();
    log::info!(
        "{} {}: {} batches, {} succeeded, {} failed ({} bytes failed)",
        operation,
        target,
        summary.batches,
        summary.success,
        summary.failure,
        summary.failed_bytes
    );

    if let Some(report_path) = &config.report_path {
        summary.write_report(report_path)?;
    }

    engine.shutdown();
    Ok(())
}
