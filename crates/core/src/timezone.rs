//! Resolve the zone of a component's date-time values
//!
//! Lookup order for a TZID: the built-in database by identifier, the
//! built-in database by location, the connection's own VTIMEZONE data, and
//! finally the identifier with any legacy vendor prefix removed. Values
//! that resolve nowhere are read in the query's default zone.

use std::collections::HashMap;

use chrono_tz::Tz;
use datebook_domain::constants::LEGACY_TZID_PREFIXES;
use datebook_domain::{CalDateTime, DateTime, Timezone};
use tracing::{debug, warn};

use crate::calendar_ports::CalendarClient;
use crate::log_failure;

/// Per-query TZID cache bound to one client's VTIMEZONE data.
pub struct ZoneResolver {
    default_zone: Timezone,
    cache: HashMap<String, Timezone>,
}

impl ZoneResolver {
    /// Resolver with an empty cache.
    pub fn new(default_zone: Timezone) -> Self {
        Self { default_zone, cache: HashMap::new() }
    }

    /// Zone for floating values and unresolvable TZIDs.
    pub fn default_zone(&self) -> Timezone {
        self.default_zone
    }

    /// Absolute time of `value`, viewed in the default zone.
    pub async fn to_datetime(&mut self, value: &CalDateTime, client: &dyn CalendarClient) -> DateTime {
        let zone = match value.tzid() {
            Some(tzid) => self.zone_for_tzid(tzid, client).await,
            None => self.default_zone,
        };
        value.to_datetime(zone).to_timezone(self.default_zone)
    }

    pub async fn zone_for_tzid(&mut self, tzid: &str, client: &dyn CalendarClient) -> Timezone {
        if let Some(zone) = self.cache.get(tzid) {
            return *zone;
        }

        let zone = match lookup(tzid, client).await {
            Some(zone) => zone,
            None => {
                warn!(tzid, fallback = %self.default_zone, "Unresolvable TZID, using default zone");
                self.default_zone
            }
        };
        self.cache.insert(tzid.to_string(), zone);
        zone
    }
}

async fn lookup(tzid: &str, client: &dyn CalendarClient) -> Option<Timezone> {
    if let Ok(tz) = tzid.parse::<Tz>() {
        return Some(Timezone::Named(tz));
    }

    if let Some(zone) = Timezone::named(tzid) {
        return Some(zone);
    }

    match client.resolve_tzid(tzid).await {
        Ok(Some(location)) => {
            if let Some(zone) = Timezone::named(strip_legacy_prefix(&location)) {
                debug!(tzid, location = %location, "Resolved TZID from calendar VTIMEZONE");
                return Some(zone);
            }
        }
        Ok(None) => {}
        Err(err) => log_failure(client.source_uid(), "resolve tzid", &err),
    }

    Timezone::named(strip_legacy_prefix(tzid))
}

/// `"/freeassociation.sourceforge.net/Tzfile/Europe/London"` becomes
/// `"Europe/London"`.
pub fn strip_legacy_prefix(tzid: &str) -> &str {
    LEGACY_TZID_PREFIXES
        .iter()
        .find_map(|prefix| tzid.strip_prefix(prefix))
        .unwrap_or(tzid)
}
