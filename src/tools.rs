//! Hash key arithmetic shared by the progress tracker and executors.

/// Number of `/` separated segments in a hash key.
///
/// Empty segments count, so `"/A/B"` has depth 3 and the prefix form
/// `"A/B/"` has depth 3 as well. Keys at depth 2 or below are roots of
/// the progress map and are never removed.
pub fn key_depth(key: &str) -> usize {
    key.split('/').count()
}

/// Parent hash key.
///
/// Prefix form keys (trailing `/`) drop their last two segments and keep
/// the trailing slash: `"A/B/" -> "A/"`. Path form keys drop one
/// segment: `"/A/B" -> "/A"`.
pub fn parent_key(key: &str) -> String {
    let segments: Vec<&str> = key.split('/').collect();
    if key.ends_with('/') {
        let keep = segments.len().saturating_sub(2);
        let mut parent = segments[..keep].join("/");
        parent.push('/');
        parent
    } else {
        segments[..segments.len() - 1].join("/")
    }
}

/// Last path segment of an object key (`"a/b/c" -> "c"`).
pub fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_empty_segments() {
        assert_eq!(key_depth("/A"), 2);
        assert_eq!(key_depth("/A/B"), 3);
        assert_eq!(key_depth("A/B/"), 3);
        assert_eq!(key_depth("/root/"), 3);
    }

    #[test]
    fn parent_of_path_form_keys() {
        assert_eq!(parent_key("/A/B"), "/A");
        assert_eq!(parent_key("/A/B/C"), "/A/B");
    }

    #[test]
    fn parent_of_prefix_form_keys() {
        assert_eq!(parent_key("A/B/"), "A/");
        assert_eq!(parent_key("A/B/C/"), "A/B/");
        assert_eq!(parent_key("A/"), "/");
    }

    #[test]
    fn last_segment_of_keys() {
        assert_eq!(last_segment("a/b/c"), "c");
        assert_eq!(last_segment("c"), "c");
        assert_eq!(last_segment("a/b/"), "");
    }
}
