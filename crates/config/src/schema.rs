//! Config schema. Every field is optional in the file; unset overrides fall
//! back to the installer's built-in defaults.
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsyncConfig {
    pub github: GitHubConfig,
    pub install: InstallConfig,
}

/// Content platform endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base (e.g. a GitHub Enterprise `https://ghe.example.com/api/v3`).
    pub api_url: Option<String>,
    /// Raw content base.
    pub raw_url: Option<String>,
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// API token (overrides `GITHUB_TOKEN` env var).
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            raw_url: None,
            user_agent: None,
            timeout_secs: 30,
            token: None,
        }
    }
}

/// Install and update behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// File name kept when personalized (default `CONTEXT.md`).
    pub preserve_file: Option<String>,
    /// Suffix for the incoming copy of a preserved file.
    pub sidecar_suffix: String,
    /// Replaces the built-in template marker list when set.
    pub template_markers: Option<Vec<String>>,
    /// Ref assumed when a URL names none (default `main`).
    pub default_ref: Option<String>,
    /// Refs tried after the default one, in order (default `["master"]`).
    pub fallback_refs: Option<Vec<String>>,
    /// Download the ref tarball when the listing API is rate limited.
    pub archive_fallback: bool,
    /// Install what could be downloaded instead of failing the whole skill.
    pub best_effort: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            preserve_file: None,
            sidecar_suffix: ".new".into(),
            template_markers: None,
            default_ref: None,
            fallback_refs: None,
            archive_fallback: true,
            best_effort: false,
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: SkillsyncConfig = toml::from_str("").unwrap();
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.install.sidecar_suffix, ".new");
        assert!(config.install.archive_fallback);
        assert!(!config.install.best_effort);
        assert!(config.install.template_markers.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: SkillsyncConfig = toml::from_str(
            r#"
            [install]
            preserve_file = "NOTES.md"
            fallback_refs = ["master", "trunk"]

            [github]
            token = "ghp_example"
            "#,
        )
        .unwrap();
        assert_eq!(config.install.preserve_file.as_deref(), Some("NOTES.md"));
        assert_eq!(
            config.install.fallback_refs,
            Some(vec!["master".to_string(), "trunk".to_string()])
        );
        assert_eq!(config.install.sidecar_suffix, ".new");
        assert_eq!(
            config.github.token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("ghp_example")
        );
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let config: SkillsyncConfig =
            toml::from_str("[github]\ntoken = \"ghp_secret\"\n").unwrap();
        assert!(!format!("{config:?}").contains("ghp_secret"));
    }
}
