// src/config/mod.rs

//! Configuration loading and validation for gitlab-ci-sched.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate node names, DAG acyclicity and policy settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ManualSection, RawConfigFile, SchedulerSection, ServerSection, TOKEN_ENV,
};
pub use validate::validate_config;
