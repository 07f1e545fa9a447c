// src/config/mod.rs

//! Manifest loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`): the ordered module list
//!   plus the `[config]` orchestration settings.
//! - Load a manifest from disk (`loader.rs`).
//! - Validate module references, names and graph acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, RawConfigFile};
