//! Point-in-time and timezone value types
//!
//! `DateTime` pairs an absolute instant with the zone it should be viewed
//! in. Ordering, equality and hashing only look at the instant, so values
//! created in different zones compare correctly.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{
    Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::errors::{DatebookError, Result};

/// Name used when serializing the process-local zone.
pub const LOCAL_ZONE_NAME: &str = "localtime";

static SYSTEM_ZONE: OnceCell<Timezone> = OnceCell::new();

/// A timezone: either a named IANA zone or whatever the process-local
/// offset rules are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timezone {
    Named(Tz),
    Local,
}

impl Timezone {
    pub fn utc() -> Self {
        Self::Named(Tz::UTC)
    }

    /// Look up a zone by IANA identifier.
    ///
    /// Accepts exact identifiers, identifiers differing only in case, and
    /// location strings using spaces instead of underscores
    /// (`"America/New York"`).
    pub fn named(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Ok(tz) = name.parse::<Tz>() {
            return Some(Self::Named(tz));
        }
        let location = name.replace(' ', "_");
        chrono_tz::TZ_VARIANTS
            .iter()
            .find(|tz| tz.name().eq_ignore_ascii_case(&location))
            .map(|tz| Self::Named(*tz))
    }

    /// The zone the host is configured for, detected once per process.
    pub fn system() -> Self {
        *SYSTEM_ZONE.get_or_init(detect_system_zone)
    }

    /// Resolve a caller-supplied name, falling back to the system zone when
    /// the name is absent, empty or unknown.
    pub fn resolve_or_system(name: Option<&str>) -> Self {
        name.and_then(Self::named).unwrap_or_else(Self::system)
    }

    pub fn name(&self) -> String {
        match self {
            Self::Named(tz) => tz.name().to_string(),
            Self::Local => LOCAL_ZONE_NAME.to_string(),
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant;
    /// nonexistent times (DST gap) are moved forward past the gap.
    pub fn localize(&self, naive: NaiveDateTime) -> chrono::DateTime<Utc> {
        match self {
            Self::Named(tz) => localize_in(tz, naive),
            Self::Local => localize_in(&chrono::Local, naive),
        }
    }

    /// Wall-clock time of an instant in this zone.
    pub fn to_local(&self, instant: &chrono::DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
            Self::Local => instant.with_timezone(&chrono::Local).naive_local(),
        }
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn localize_in<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> chrono::DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Gaps are at most an hour in every zone chrono-tz ships.
            let shifted = naive + Duration::hours(1);
            zone.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

fn detect_system_zone() -> Timezone {
    if let Ok(tz) = std::env::var("TZ") {
        if let Some(zone) = Timezone::named(tz.trim_start_matches(':')) {
            return zone;
        }
    }
    if let Ok(contents) = std::fs::read_to_string("/etc/timezone") {
        if let Some(zone) = Timezone::named(contents.trim()) {
            return zone;
        }
    }
    if let Ok(target) = std::fs::read_link("/etc/localtime") {
        let target = target.to_string_lossy();
        if let Some((_, name)) = target.split_once("zoneinfo/") {
            if let Some(zone) = Timezone::named(name) {
                return zone;
            }
        }
    }
    Timezone::Local
}

/// An absolute instant viewed in a particular zone.
///
/// Arithmetic that would leave chrono's representable range returns the
/// value unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "DateTimeRepr", try_from = "DateTimeRepr")]
pub struct DateTime {
    instant: chrono::DateTime<Utc>,
    zone: Timezone,
}

impl DateTime {
    pub fn new(instant: chrono::DateTime<Utc>, zone: Timezone) -> Self {
        Self { instant, zone }
    }

    /// Build a value from wall-clock fields in `zone`.
    ///
    /// # Errors
    /// Returns `DatebookError::InvalidInput` for impossible calendar fields.
    pub fn in_zone(
        zone: Timezone,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                DatebookError::InvalidInput(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                ))
            })?;
        Ok(Self::from_naive(zone, naive))
    }

    /// Wall-clock fields in the system zone.
    pub fn local(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        Self::in_zone(Timezone::system(), year, month, day, hour, minute, second)
    }

    pub fn from_naive(zone: Timezone, naive: NaiveDateTime) -> Self {
        Self { instant: zone.localize(naive), zone }
    }

    /// # Errors
    /// Returns `DatebookError::InvalidInput` if the timestamp is out of range.
    pub fn from_unix(seconds: i64, zone: Timezone) -> Result<Self> {
        let instant = chrono::DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| DatebookError::InvalidInput(format!("unix time {seconds}")))?;
        Ok(Self { instant, zone })
    }

    pub fn now(zone: Timezone) -> Self {
        Self { instant: Utc::now(), zone }
    }

    pub fn instant(&self) -> chrono::DateTime<Utc> {
        self.instant
    }

    pub fn zone(&self) -> Timezone {
        self.zone
    }

    pub fn naive_local(&self) -> NaiveDateTime {
        self.zone.to_local(&self.instant)
    }

    pub fn to_unix(&self) -> i64 {
        self.instant.timestamp()
    }

    /// Same instant, viewed in another zone.
    pub fn to_timezone(&self, zone: Timezone) -> Self {
        Self { instant: self.instant, zone }
    }

    /// Add calendar days, keeping the wall-clock time of day.
    pub fn add_days(&self, days: i64) -> Self {
        self.add_full(0, 0, days, 0, 0, 0)
    }

    /// Add an absolute number of seconds.
    pub fn add_seconds(&self, seconds: i64) -> Self {
        Duration::try_seconds(seconds)
            .and_then(|delta| self.instant.checked_add_signed(delta))
            .map(|instant| Self { instant, zone: self.zone })
            .unwrap_or(*self)
    }

    /// Calendar arithmetic: years, months and days move the wall clock,
    /// hours, minutes and seconds move the instant.
    pub fn add_full(
        &self,
        years: i32,
        months: i32,
        days: i64,
        hours: i64,
        minutes: i64,
        seconds: i64,
    ) -> Self {
        let local = self.naive_local();
        let total_months = i64::from(years) * 12 + i64::from(months);
        let shifted = shift_months(local, total_months)
            .and_then(|naive| naive.checked_add_signed(Duration::try_days(days)?));
        let clock = hours
            .checked_mul(3600)
            .zip(minutes.checked_mul(60))
            .and_then(|(hours, minutes)| hours.checked_add(minutes)?.checked_add(seconds));
        let (Some(shifted), Some(clock)) = (shifted, clock) else {
            return *self;
        };
        Self::from_naive(self.zone, shifted).add_seconds(clock)
    }

    pub fn start_of_day(&self) -> Self {
        let midnight = self.naive_local().date().and_time(chrono::NaiveTime::MIN);
        Self::from_naive(self.zone, midnight)
    }

    pub fn start_of_month(&self) -> Self {
        let local = self.naive_local();
        match NaiveDate::from_ymd_opt(local.year(), local.month(), 1) {
            Some(first) => Self::from_naive(self.zone, first.and_time(chrono::NaiveTime::MIN)),
            None => *self,
        }
    }

    /// Last second of the month containing this value.
    pub fn end_of_month(&self) -> Self {
        self.start_of_month().add_full(0, 1, 0, 0, 0, -1)
    }

    /// Whether both values fall on the same calendar day, each viewed in
    /// its own zone.
    pub fn is_same_day(&self, other: &Self) -> bool {
        self.naive_local().date() == other.naive_local().date()
    }

    /// Whether both values fall in the same minute of wall-clock time.
    pub fn is_same_minute(&self, other: &Self) -> bool {
        let (a, b) = (self.naive_local(), other.naive_local());
        a.date() == b.date() && a.hour() == b.hour() && a.minute() == b.minute()
    }

    /// `strftime`-style formatting in this value's zone.
    pub fn format(&self, fmt: &str) -> String {
        match self.zone {
            Timezone::Named(tz) => self.instant.with_timezone(&tz).format(fmt).to_string(),
            Timezone::Local => self.instant.with_timezone(&chrono::Local).format(fmt).to_string(),
        }
    }
}

fn shift_months(naive: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        naive.checked_add_months(Months::new(magnitude))
    } else {
        naive.checked_sub_months(Months::new(magnitude))
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for DateTime {}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl Hash for DateTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instant.hash(state);
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("%Y-%m-%dT%H:%M:%S%:z"))
    }
}

#[derive(Serialize, Deserialize)]
struct DateTimeRepr {
    unix: i64,
    timezone: String,
}

impl From<DateTime> for DateTimeRepr {
    fn from(value: DateTime) -> Self {
        Self { unix: value.to_unix(), timezone: value.zone.name() }
    }
}

impl TryFrom<DateTimeRepr> for DateTime {
    type Error = DatebookError;

    fn try_from(repr: DateTimeRepr) -> Result<Self> {
        let zone = if repr.timezone == LOCAL_ZONE_NAME {
            Timezone::Local
        } else {
            Timezone::named(&repr.timezone)
                .ok_or_else(|| DatebookError::Timezone(repr.timezone.clone()))?
        };
        Self::from_unix(repr.unix, zone)
    }
}
