//! Policy tables consulted by the fetcher and the installer.
//!
//! Both are plain data so the fallback order and the marker list can grow
//! without touching fetch or write logic.

use crate::source::DEFAULT_REF;

/// Markers that identify an untouched `CONTEXT.md` template.
pub const DEFAULT_TEMPLATE_MARKERS: &[&str] = &[
    "<!-- REPLACE",
    "<!-- CUSTOMIZE",
    "<!-- TODO",
    "REPLACE ME",
    "REPLACE_ME",
    "your-value-here",
    "YOUR_VALUE",
    "[your ",
    "<your-",
];

/// Order in which refs are tried for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPolicy {
    pub default_ref: String,
    /// Tried in order, only when the requested ref is `default_ref`.
    pub fallbacks: Vec<String>,
}

impl Default for RefPolicy {
    fn default() -> Self {
        Self {
            default_ref: DEFAULT_REF.to_string(),
            fallbacks: vec!["master".to_string()],
        }
    }
}

impl RefPolicy {
    pub fn new(default_ref: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            default_ref: default_ref.into(),
            fallbacks,
        }
    }

    /// Refs to try for `requested`, in priority order, without duplicates.
    pub fn candidates<'a>(&'a self, requested: &'a str) -> Vec<&'a str> {
        let mut refs = vec![requested];
        if requested == self.default_ref {
            for fallback in &self.fallbacks {
                if !refs.contains(&fallback.as_str()) {
                    refs.push(fallback);
                }
            }
        }
        refs
    }
}

/// Literal, case-sensitive substrings whose presence marks a template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMarkerSet {
    markers: Vec<String>,
}

impl Default for TemplateMarkerSet {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_MARKERS.iter().map(|m| (*m).to_string()))
    }
}

impl TemplateMarkerSet {
    /// Build a set from `markers`; empty strings are dropped since they would
    /// match everything.
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// The first marker found in `content`, if any.
    pub fn find_marker<'a>(&'a self, content: &str) -> Option<&'a str> {
        self.markers
            .iter()
            .find(|marker| content.contains(marker.as_str()))
            .map(String::as_str)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ref_falls_back_to_master() {
        let policy = RefPolicy::default();
        assert_eq!(policy.candidates("main"), vec!["main", "master"]);
    }

    #[test]
    fn non_default_ref_has_no_fallback() {
        let policy = RefPolicy::default();
        assert_eq!(policy.candidates("v1.2.0"), vec!["v1.2.0"]);
        assert_eq!(policy.candidates("master"), vec!["master"]);
    }

    #[test]
    fn fallback_list_is_extensible_and_deduplicated() {
        let policy = RefPolicy::new(
            "main",
            vec!["master".into(), "main".into(), "trunk".into()],
        );
        assert_eq!(policy.candidates("main"), vec!["main", "master", "trunk"]);
    }

    #[test]
    fn markers_match_case_sensitively() {
        let markers = TemplateMarkerSet::default();
        assert_eq!(
            markers.find_marker("Name: <!-- REPLACE with your name -->"),
            Some("<!-- REPLACE")
        );
        assert_eq!(markers.find_marker("replace me later"), None);
        assert_eq!(markers.find_marker("Team: platform"), None);
    }

    #[test]
    fn empty_markers_are_ignored() {
        let markers = TemplateMarkerSet::new(vec![String::new(), "TBD".into()]);
        assert_eq!(markers.markers(), ["TBD".to_string()]);
        assert_eq!(markers.find_marker("anything"), None);
    }
}
