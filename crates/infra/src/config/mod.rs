//! Configuration loading
//!
//! Builds a [`datebook_domain::Config`] from environment variables or a
//! config file and validates it.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
