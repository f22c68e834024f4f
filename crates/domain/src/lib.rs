//! # Datebook Domain
//!
//! Value types and models for the datebook appointment engine.
//!
//! This crate contains:
//! - Point-in-time and timezone value types (`DateTime`, `Timezone`)
//! - Appointment and alarm records handed to callers
//! - The raw calendar component model exchanged with calendar backends
//! - Domain error types and Result definitions
//! - Configuration structures and domain constants
//!
//! ## Architecture
//! - No dependencies on other datebook crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
