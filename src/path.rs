// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Path splitting.
//!
//! Paths are `/`-separated. Empty and whitespace-only segments are skipped, so
//! `""`, `"/"` and `"//"` all resolve to the root and `"/a//b/"` is `["a", "b"]`.

pub const SEPARATOR: char = '/';

/// Split a path into its non-empty components.
pub fn components(path: &str) -> Vec<&str> {
    path.split(SEPARATOR)
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

/// Split a path into (parent components, final name).
///
/// Returns `None` when the path has no components at all.
pub fn split_parent(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts = components(path);
    let name = parts.pop()?;
    Some((parts, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_skip_empty_segments() {
        assert_eq!(components("/usr/warehouse/hive"), vec!["usr", "warehouse", "hive"]);
        assert_eq!(components("usr//hive/"), vec!["usr", "hive"]);
        assert_eq!(components("/ /a"), vec!["a"]);
        assert!(components("").is_empty());
        assert!(components("///").is_empty());
    }

    #[test]
    fn test_split_parent() {
        let (parent, name) = split_parent("/image/product/img001.jpg").unwrap();
        assert_eq!(parent, vec!["image", "product"]);
        assert_eq!(name, "img001.jpg");

        let (parent, name) = split_parent("f").unwrap();
        assert!(parent.is_empty());
        assert_eq!(name, "f");

        assert!(split_parent("/").is_none());
    }
}
