//! Domain constants
//!
//! Centralized location for the constants shared by the engine and the
//! backend adapters.

// Rebuild batching
pub const MIN_BATCH_SECONDS: u64 = 1;
pub const MAX_BATCH_SECONDS: u64 = 60;

// Category tags understood by the engine
pub const TAG_ALARM: &str = "x-canonical-alarm";
pub const TAG_DISABLED: &str = "x-canonical-disabled";

/// View filter matching every object in a calendar.
pub const ALL_OBJECTS_FILTER: &str = "#t";

/// TZID prefixes written by older calendar software in front of an Olson
/// location name.
pub const LEGACY_TZID_PREFIXES: &[&str] = &[
    "/freeassociation.sourceforge.net/Tzfile/",
    "/freeassociation.sourceforge.net/",
    "/citadel.org/",
    "/softwarestudio.org/Olson_20011030_5/",
    "/softwarestudio.org/Tzfile/",
];

// Planner defaults
pub const DEFAULT_UPCOMING_DAYS: u32 = 7;
pub const DEFAULT_MAX_UPCOMING: usize = 5;
