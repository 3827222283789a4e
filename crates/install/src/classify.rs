use {serde::Serialize, tracing::debug};

use crate::policy::TemplateMarkerSet;

/// File name that may hold user customizations.
pub const DEFAULT_PRESERVE_FILE: &str = "CONTEXT.md";

/// Verdict for an existing preservable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Still the shipped template; safe to overwrite.
    Template,
    /// Edited by the user; must be preserved.
    Personalized,
}

/// Decides whether an existing file at the destination can be replaced.
#[derive(Debug, Clone)]
pub struct UpdateClassifier {
    preserve_file: String,
    markers: TemplateMarkerSet,
}

impl Default for UpdateClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PRESERVE_FILE, TemplateMarkerSet::default())
    }
}

impl UpdateClassifier {
    pub fn new(preserve_file: impl Into<String>, markers: TemplateMarkerSet) -> Self {
        Self {
            preserve_file: preserve_file.into(),
            markers,
        }
    }

    pub fn preserve_file(&self) -> &str {
        &self.preserve_file
    }

    /// Whether `relative_path` names the preservable file, at any depth.
    pub fn is_preservable(&self, relative_path: &str) -> bool {
        relative_path.rsplit('/').next() == Some(self.preserve_file.as_str())
    }

    /// True when `content` contains any template marker.
    pub fn is_template(&self, content: &str) -> bool {
        self.markers.find_marker(content).is_some()
    }

    pub fn classify(&self, existing: &[u8]) -> Classification {
        let content = String::from_utf8_lossy(existing);
        match self.markers.find_marker(&content) {
            Some(marker) => {
                debug!(marker, "preservable file still contains a template marker");
                Classification::Template
            },
            None => Classification::Personalized,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_content_is_template() {
        let classifier = UpdateClassifier::default();
        let content = "# Context\n\nTeam: <your-team>\nRepo: REPLACE_ME\n";
        assert!(classifier.is_template(content));
        assert_eq!(
            classifier.classify(content.as_bytes()),
            Classification::Template
        );
    }

    #[test]
    fn edited_content_is_personalized() {
        let classifier = UpdateClassifier::default();
        let content = b"# Context\n\nTeam: payments\nRepo: acme/ledger\n";
        assert_eq!(classifier.classify(content), Classification::Personalized);
    }

    #[test]
    fn lowercase_marker_text_is_not_a_marker() {
        let classifier = UpdateClassifier::default();
        assert!(!classifier.is_template("please replace me with something"));
    }

    #[test]
    fn preservable_matches_file_name_only() {
        let classifier = UpdateClassifier::default();
        assert!(classifier.is_preservable("CONTEXT.md"));
        assert!(classifier.is_preservable("nested/CONTEXT.md"));
        assert!(!classifier.is_preservable("SKILL.md"));
        assert!(!classifier.is_preservable("CONTEXT.md.new"));
        assert!(!classifier.is_preservable("MY-CONTEXT.md"));
    }

    #[test]
    fn custom_preserve_file_and_markers() {
        let classifier =
            UpdateClassifier::new("NOTES.md", TemplateMarkerSet::new(vec!["TBD".to_string()]));
        assert!(classifier.is_preservable("NOTES.md"));
        assert!(!classifier.is_preservable("CONTEXT.md"));
        assert_eq!(classifier.classify(b"owner: TBD"), Classification::Template);
        assert_eq!(
            classifier.classify(b"<!-- REPLACE -->"),
            Classification::Personalized
        );
    }
}
