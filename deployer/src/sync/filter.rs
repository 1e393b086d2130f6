use crate::Result;
use regex::RegexSet;

/// Predicate deciding which tree-relative paths take part in a sync.
pub trait Filter: Send + Sync {
    /// Whether `path` itself matches.
    fn matches(&self, path: &str) -> bool;

    /// Whether `path` or any directory above it matches.
    fn is_excluded(&self, path: &str) -> bool {
        if self.matches(path) {
            return true;
        }
        path.match_indices('/')
            .map(|(idx, _)| &path[..idx])
            .filter(|ancestor| !ancestor.is_empty())
            .any(|ancestor| self.matches(ancestor))
    }
}

/// Ignore list of unanchored regular expressions.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: RegexSet,
}

impl IgnoreFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Filter for IgnoreFilter {
    fn matches(&self, path: &str) -> bool {
        self.patterns.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> IgnoreFilter {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        IgnoreFilter::new(&patterns).unwrap()
    }

    #[test]
    fn test_pattern_table() {
        let cases = [
            (".DS_Store", "/.DS_Store", true),
            (".DS_Store", "/app/.DS_Store", true),
            (".DS_Store", "/app/bootstrap.php", false),
            ("/vendor", "/vendor", true),
            ("/vendor", "vendor", false),
            ("/package.*", "/package.json", true),
            ("/package.*", "/package-lock.json", true),
            ("^/src", "/src", true),
            ("^/src", "/vendor/src", false),
        ];

        for (pattern, path, expected) in cases {
            assert_eq!(
                filter(&[pattern]).matches(path),
                expected,
                "pattern {} against {}",
                pattern,
                path
            );
        }
    }

    #[test]
    fn test_escaped_dot_only_matches_literal() {
        let f = filter(&["\\.DS_Store"]);
        assert!(f.is_excluded("/app/.DS_Store"));
        assert!(!f.is_excluded("/app/bootstrap.php"));
        assert!(!f.is_excluded("/app/xDS_Store"));
    }

    #[test]
    fn test_descendants_of_excluded_directory() {
        let f = filter(&["^/node_modules$"]);
        assert!(f.is_excluded("/node_modules"));
        assert!(f.is_excluded("/node_modules/left-pad/index.js"));
        assert!(!f.is_excluded("/src/node_modules.txt"));
    }

    #[test]
    fn test_empty_filter_excludes_nothing() {
        let f = filter(&[]);
        assert!(f.is_empty());
        assert!(!f.is_excluded("/anything"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = IgnoreFilter::new(&["(unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, crate::DeployError::Filter(_)));
    }
}
