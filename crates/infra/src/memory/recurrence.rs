//! Recurrence expansion for stored components
//!
//! Rules are evaluated in the wall-clock time of the series' DTSTART, so a
//! daily 09:00 event stays at 09:00 across DST changes. Each occurrence
//! keeps the series' duration in absolute time. Supported: DAILY,
//! WEEKLY (with BYDAY), MONTHLY and YEARLY with INTERVAL, COUNT and UNTIL,
//! plus RDATE, EXDATE and detached overrides keyed by RECURRENCE-ID.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use datebook_core::timezone::strip_legacy_prefix;
use datebook_domain::{CalComponent, CalDateTime, Frequency, RecurrenceRule, Timezone};

/// Upper bound on rule periods walked for one series.
const MAX_PERIODS: u32 = 100_000;

type Instant = chrono::DateTime<Utc>;

/// How a calendar's date-time values map to absolute time.
#[derive(Debug, Clone)]
pub(crate) struct ZoneContext {
    vtimezones: HashMap<String, String>,
    default_zone: Timezone,
}

impl ZoneContext {
    pub(crate) fn new(vtimezones: HashMap<String, String>, default_zone: Timezone) -> Self {
        Self { vtimezones, default_zone }
    }

    /// Built-in zone by identifier or location, then the calendar's own
    /// VTIMEZONE table, then the identifier without a legacy prefix.
    /// Floating, all-day and unresolvable values use the default zone.
    pub(crate) fn zone(&self, value: &CalDateTime) -> Timezone {
        let Some(tzid) = value.tzid() else {
            return self.default_zone;
        };
        Timezone::named(tzid)
            .or_else(|| {
                self.vtimezones
                    .get(tzid)
                    .and_then(|location| Timezone::named(strip_legacy_prefix(location)))
            })
            .or_else(|| Timezone::named(strip_legacy_prefix(tzid)))
            .unwrap_or(self.default_zone)
    }

    pub(crate) fn instant(&self, value: &CalDateTime) -> Instant {
        value.to_datetime(self.zone(value)).instant()
    }
}

/// One occurrence of a series within a window
#[derive(Debug, Clone)]
pub(crate) struct Occurrence {
    /// The master, or the override replacing this occurrence.
    pub(crate) component: CalComponent,
    pub(crate) start: CalDateTime,
    pub(crate) end: Option<CalDateTime>,
    pub(crate) start_at: Instant,
    /// Equals `start_at` when the occurrence has no end.
    pub(crate) end_at: Instant,
}

/// A series master with its detached overrides.
pub(crate) struct Series<'a> {
    pub(crate) master: &'a CalComponent,
    pub(crate) overrides: Vec<&'a CalComponent>,
}

/// Group components by uid. Overrides whose master is absent stand alone.
pub(crate) fn group_series(components: &[CalComponent]) -> Vec<Series<'_>> {
    let mut masters: BTreeMap<&str, Series<'_>> = BTreeMap::new();
    let mut orphans: Vec<&CalComponent> = Vec::new();

    for component in components.iter().filter(|c| c.recurrence_id.is_none()) {
        masters.insert(&component.uid, Series { master: component, overrides: Vec::new() });
    }
    for component in components.iter().filter(|c| c.recurrence_id.is_some()) {
        match masters.get_mut(component.uid.as_str()) {
            Some(series) => series.overrides.push(component),
            None => orphans.push(component),
        }
    }

    masters
        .into_values()
        .chain(orphans.into_iter().map(|master| Series { master, overrides: Vec::new() }))
        .collect()
}

/// Occurrences of `series` overlapping `[begin, end]`, ordered by start.
/// A master without DTSTART yields nothing.
pub(crate) fn expand_series(
    series: &Series<'_>,
    begin: Instant,
    end: Instant,
    zones: &ZoneContext,
) -> Vec<Occurrence> {
    let master = series.master;
    let Some(dtstart) = master.dtstart.as_ref() else {
        return Vec::new();
    };
    let span = master.end().map(|end| zones.instant(end) - zones.instant(dtstart));
    let start_zone = zones.zone(dtstart);
    let to_instant = |naive: NaiveDateTime| dtstart.with_naive(naive).to_datetime(start_zone).instant();

    let mut starts: BTreeSet<NaiveDateTime> = BTreeSet::new();
    if master.rrules.is_empty() {
        starts.insert(dtstart.naive());
    }
    for rule in &master.rrules {
        let until = rule.until.as_ref().map(|until| match until {
            CalDateTime::Date { date } => to_instant(end_of_day(*date)),
            other => zones.instant(other),
        });
        starts.extend(rule_starts(rule, dtstart.naive(), until, end, &to_instant));
    }
    starts.extend(master.rdates.iter().map(CalDateTime::naive));
    starts.retain(|start| !is_excluded(master, *start));

    let overrides: HashMap<NaiveDateTime, &CalComponent> = series
        .overrides
        .iter()
        .filter_map(|c| c.recurrence_id.as_ref().map(|rid| (rid.naive(), *c)))
        .collect();

    let mut occurrences = Vec::new();
    for naive in starts {
        let occurrence = match overrides.get(&naive) {
            Some(detached) => {
                let start = detached.dtstart.clone().unwrap_or_else(|| dtstart.with_naive(naive));
                match detached.end() {
                    Some(end) => build(detached, start, end.clone(), zones),
                    None => spanned(detached, master.end(), start, span, zones),
                }
            }
            None => spanned(master, master.end(), dtstart.with_naive(naive), span, zones),
        };
        if overlaps(&occurrence, begin, end) {
            occurrences.push(occurrence);
        }
    }
    occurrences.sort_by_key(|occurrence| occurrence.start_at);
    occurrences
}

fn build(component: &CalComponent, start: CalDateTime, end: CalDateTime, zones: &ZoneContext) -> Occurrence {
    let start_at = zones.instant(&start);
    let end_at = zones.instant(&end);
    Occurrence { component: component.clone(), start, end: Some(end), start_at, end_at }
}

/// Occurrence lasting `span` from `start`, its end written in the form of
/// `template`. Without a span the occurrence ends when it starts.
fn spanned(
    component: &CalComponent,
    template: Option<&CalDateTime>,
    start: CalDateTime,
    span: Option<Duration>,
    zones: &ZoneContext,
) -> Occurrence {
    let start_at = zones.instant(&start);
    let (end, end_at) = match template.zip(span) {
        Some((template, span)) => {
            let end = end_at_in_form(template, start_at + span, zones);
            // All-day ends snap to a date; read the instant back from it.
            let end_at = zones.instant(&end);
            (Some(end), end_at)
        }
        None => (None, start_at),
    };
    Occurrence { component: component.clone(), start, end, start_at, end_at }
}

/// `at` written like `template`. Wall-clock forms that would not read back
/// as `at` (inside a DST overlap) fall back to UTC.
fn end_at_in_form(template: &CalDateTime, at: Instant, zones: &ZoneContext) -> CalDateTime {
    match template {
        CalDateTime::Utc { .. } => CalDateTime::utc(at),
        CalDateTime::Date { .. } => template.with_naive(zones.zone(template).to_local(&at)),
        other => {
            let local = other.with_naive(zones.zone(other).to_local(&at));
            if zones.instant(&local) == at {
                local
            } else {
                CalDateTime::utc(at)
            }
        }
    }
}

fn overlaps(occurrence: &Occurrence, begin: Instant, end: Instant) -> bool {
    if occurrence.end_at > occurrence.start_at {
        occurrence.start_at < end && occurrence.end_at > begin
    } else {
        occurrence.start_at >= begin && occurrence.start_at <= end
    }
}

fn is_excluded(master: &CalComponent, start: NaiveDateTime) -> bool {
    master.exdates.iter().any(|exdate| match exdate {
        CalDateTime::Date { date } => *date == start.date(),
        other => other.naive() == start,
    })
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1)
}

/// Wall-clock starts produced by `rule`, from `dtstart` up to the first
/// start after `horizon`, UNTIL or COUNT.
fn rule_starts(
    rule: &RecurrenceRule,
    dtstart: NaiveDateTime,
    until: Option<Instant>,
    horizon: Instant,
    to_instant: &impl Fn(NaiveDateTime) -> Instant,
) -> Vec<NaiveDateTime> {
    let interval = rule.interval.max(1);
    let mut starts = Vec::new();
    let mut emitted = 0u32;

    for period in 0..MAX_PERIODS {
        for candidate in period_candidates(rule, dtstart, period.saturating_mul(interval)) {
            if candidate < dtstart {
                continue;
            }
            let at = to_instant(candidate);
            if until.is_some_and(|until| at > until) || at > horizon {
                return starts;
            }
            starts.push(candidate);
            emitted += 1;
            if rule.count.is_some_and(|count| emitted >= count) {
                return starts;
            }
        }
    }
    starts
}

/// Candidate starts of the period `steps` frequency units after DTSTART's.
fn period_candidates(rule: &RecurrenceRule, dtstart: NaiveDateTime, steps: u32) -> Vec<NaiveDateTime> {
    let time = dtstart.time();
    let date = dtstart.date();
    match rule.frequency {
        Frequency::Daily => vec![dtstart + Duration::days(i64::from(steps))],
        Frequency::Weekly => {
            let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
                + Duration::weeks(i64::from(steps));
            let mut days: Vec<Weekday> =
                if rule.by_day.is_empty() { vec![date.weekday()] } else { rule.by_day.clone() };
            days.sort_by_key(Weekday::num_days_from_monday);
            days.dedup();
            days.into_iter()
                .map(|day| (monday + Duration::days(i64::from(day.num_days_from_monday()))).and_time(time))
                .collect()
        }
        Frequency::Monthly => add_months(date, i64::from(steps))
            .map(|date| date.and_time(time))
            .into_iter()
            .collect(),
        Frequency::Yearly => add_months(date, i64::from(steps) * 12)
            .map(|date| date.and_time(time))
            .into_iter()
            .collect(),
    }
}

/// Same day-of-month `months` later; `None` when that day does not exist
/// (the 31st in a 30-day month, February 29th outside leap years).
fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = i64::from(date.year()) * 12 + i64::from(date.month0()) + months;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    NaiveDate::from_ymd_opt(year, month, date.day())
}
