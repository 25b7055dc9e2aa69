//! Worksheet name filter

/// Substring filter on worksheet names.
///
/// An empty filter matches every worksheet. Matching is plain, case-sensitive
/// substring containment; no wildcard or pattern syntax is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    needle: String,
}

impl NameFilter {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }

    /// A filter that matches every worksheet.
    pub fn any() -> Self {
        Self::default()
    }

    /// True when no filtering is applied.
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, sheet_name: &str) -> bool {
        sheet_name.contains(self.needle.as_str())
    }
}

impl From<&str> for NameFilter {
    fn from(s: &str) -> Self {
        NameFilter::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matches_everything() {
        let f = NameFilter::any();
        assert!(f.is_empty());
        assert!(f.matches("Summary"));
        assert!(f.matches(""));
    }

    #[test]
    fn test_substring_containment() {
        let f = NameFilter::new("Detail");
        assert!(f.matches("Detail1"));
        assert!(f.matches("Q3 Detail"));
        assert!(!f.matches("Summary"));
    }

    #[test]
    fn test_case_sensitive() {
        let f = NameFilter::new("Detail");
        assert!(!f.matches("detail1"));
        assert!(!f.matches("DETAIL"));
    }

    #[test]
    fn test_no_pattern_syntax() {
        let f = NameFilter::new("Sheet*");
        assert!(!f.matches("Sheet1"));
        assert!(f.matches("Sheet*copy"));
    }
}
