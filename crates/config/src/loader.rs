use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    schema::SkillsyncConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillsync.toml",
    "skillsync.yaml",
    "skillsync.yml",
    "skillsync.json",
];

const TOKEN_ENV_VARS: &[&str] = &["SKILLSYNC_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SkillsyncConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw, path)
}

/// Load `explicit` when given (errors are fatal), otherwise discover a config
/// file, then apply environment overrides.
pub fn load_or_discover(explicit: Option<&Path>) -> Result<SkillsyncConfig> {
    let mut config = match explicit {
        Some(path) => {
            debug!(path = %path.display(), "loading explicit config");
            load_config(path)?
        },
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillsync.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/skillsync/skillsync.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkillsyncConfig::default()` if no config file is found or the
/// discovered one fails to load.
pub fn discover_and_load() -> SkillsyncConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SkillsyncConfig::default()
}

/// Fill the GitHub token from the environment when the file sets none.
pub fn apply_env_overrides(config: &mut SkillsyncConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut SkillsyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    if config.github.token.is_some() {
        return;
    }
    config.github.token = TOKEN_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
        .map(Secret::new);
}

/// Returns the user-global config directory (`~/.config/skillsync/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skillsync").map(|d| d.config_dir().to_path_buf())
}

/// Returns the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<SkillsyncConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
