//! # Datebook Core
//!
//! Appointment aggregation logic - no backend dependencies.
//!
//! This crate contains:
//! - Port interfaces for calendar backends and for the engine itself
//! - The interest filter and the TZID resolution chain
//! - Occurrence and alarm merging into appointments
//! - The debounced rebuild scheduler
//! - The engine (source watching, per-source caches, queries, alarm
//!   disabling) and the planner built on top of it
//!
//! ## Architecture Principles
//! - Only depends on `datebook-domain`
//! - All calendar access via traits
//! - Backend failures degrade results, they never fail a query

pub mod calendar_ports;
pub mod engine;
pub mod engine_ports;
pub mod expansion;
pub mod filter;
pub mod planner;
pub mod scheduler;
pub mod timezone;

mod logging;

pub(crate) use logging::log_failure;

pub use calendar_ports::{
    AlarmInstance, CalendarBackend, CalendarClient, ClientView, Instance, RegistryEvent,
    SourceRegistry, ViewEvent,
};
pub use engine::Engine;
pub use engine_ports::{AppointmentCallback, AppointmentEngine};
pub use expansion::SourceInfo;
pub use filter::is_interesting;
pub use planner::Planner;
pub use scheduler::RebuildScheduler;
pub use timezone::ZoneResolver;
