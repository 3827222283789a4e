//! Configuration loading for skillsync.
//!
//! Config files: `skillsync.toml`, `skillsync.yaml`, or `skillsync.json`
//! Searched in `./` then `~/.config/skillsync/`.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, home_dir, load_config,
        load_or_discover,
    },
    schema::{GitHubConfig, InstallConfig, SkillsyncConfig},
};
