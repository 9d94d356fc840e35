// src/config/mod.rs

//! Profile configuration for promptdrive.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate profiles (`validate.rs`).
//! - Resolve a profile into a `DriverConfig`, pulling secrets from the
//!   environment (`resolve.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{config_base_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DefaultsSection, MilestoneConfig, ProfileConfig, RawConfigFile, RuleConfig,
};
