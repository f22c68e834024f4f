//! Alarm firings for stored components
//!
//! Each VALARM of an occurrence fires at its trigger and then `repeat` more
//! times, `repeat_interval_secs` apart. Relative triggers are offsets from
//! the occurrence's start or end. An absolute trigger fires once per
//! series and belongs to the series' first occurrence (or to the override
//! that carries it).

use chrono::{Duration, Utc};
use datebook_core::AlarmInstance;
use datebook_domain::{AlarmDefinition, AlarmTrigger, CalComponent};

use super::recurrence::{expand_series, group_series, Occurrence, Series, ZoneContext};

type Instant = chrono::DateTime<Utc>;

/// Firings with triggers inside `[begin, end]`, ordered by trigger.
pub(crate) fn generate_alarms(
    components: &[CalComponent],
    begin: Instant,
    end: Instant,
    zones: &ZoneContext,
) -> Vec<AlarmInstance> {
    let mut firings = Vec::new();

    for series in group_series(components) {
        let reach = Duration::try_seconds(reach_secs(&series)).unwrap_or(Duration::MAX);
        let first_start = series.master.dtstart.as_ref().map(|start| zones.instant(start));
        let from = begin.checked_sub_signed(reach).unwrap_or(Instant::MIN_UTC);
        let to = end.checked_add_signed(reach).unwrap_or(Instant::MAX_UTC);

        for occurrence in expand_series(&series, from, to, zones) {
            for alarm in &occurrence.component.alarms {
                let Some(base) = base_trigger(alarm, &occurrence, first_start) else {
                    continue;
                };
                firings.extend(
                    repeats(alarm, base, end)
                        .filter(|trigger| *trigger >= begin && *trigger <= end)
                        .map(|trigger| AlarmInstance {
                            component: occurrence.component.id(),
                            trigger,
                            occur_start: occurrence.start_at,
                            occur_end: occurrence.end_at,
                            alarm: alarm.clone(),
                        }),
                );
            }
        }
    }

    firings.sort_by_key(|firing| firing.trigger);
    firings
}

fn base_trigger(
    alarm: &AlarmDefinition,
    occurrence: &Occurrence,
    first_start: Option<Instant>,
) -> Option<Instant> {
    match alarm.trigger {
        AlarmTrigger::RelativeStart(offset) => {
            occurrence.start_at.checked_add_signed(Duration::try_seconds(offset)?)
        }
        AlarmTrigger::RelativeEnd(offset) => {
            occurrence.end_at.checked_add_signed(Duration::try_seconds(offset)?)
        }
        AlarmTrigger::Absolute(at) => {
            let owns = occurrence.component.recurrence_id.is_some()
                || first_start == Some(occurrence.start_at);
            owns.then_some(at)
        }
    }
}

/// The base firing and its repeats, stopping at the last one before `until`.
fn repeats(alarm: &AlarmDefinition, base: Instant, until: Instant) -> impl Iterator<Item = Instant> {
    let interval = Duration::try_seconds(alarm.repeat_interval_secs.max(0)).unwrap_or_default();
    let fits = if interval.is_zero() || until < base {
        0
    } else {
        (until - base).num_seconds() / interval.num_seconds()
    };
    let count = i64::from(alarm.repeat).min(fits);
    (0..=count).filter_map(move |n| {
        let step = interval.checked_mul(i32::try_from(n).ok()?)?;
        base.checked_add_signed(step)
    })
}

/// How far from an occurrence any of the series' alarms can fire.
fn reach_secs(series: &Series<'_>) -> i64 {
    std::iter::once(series.master)
        .chain(series.overrides.iter().copied())
        .flat_map(|component| &component.alarms)
        .map(|alarm| {
            let offset = match alarm.trigger {
                AlarmTrigger::RelativeStart(offset) | AlarmTrigger::RelativeEnd(offset) => {
                    offset.saturating_abs()
                }
                AlarmTrigger::Absolute(_) => 0,
            };
            offset.saturating_add(
                i64::from(alarm.repeat).saturating_mul(alarm.repeat_interval_secs.max(0)),
            )
        })
        .max()
        .unwrap_or(0)
}
