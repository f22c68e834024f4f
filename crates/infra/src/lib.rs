//! # Datebook Infrastructure
//!
//! Implementations around the core engine.
//!
//! This crate contains:
//! - Configuration loading (environment and TOML/JSON files)
//! - Tracing subscriber setup
//! - An in-memory calendar backend implementing every core calendar port
//!
//! ## Architecture
//! - Implements traits defined in `datebook-core`
//! - Contains the code that touches the process environment and files

pub mod config;
pub mod memory;
pub mod observability;

pub use memory::{CalendarStore, MemoryBackend, MemoryClient, MemoryRegistry, MemoryView};
pub use observability::init_tracing;
