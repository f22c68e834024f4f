//! Turn generated occurrences and alarm firings into appointments
//!
//! Occurrences are identified by their `(start, end)` instants. Every
//! generated instance yields one appointment; alarm firings attach to the
//! occurrence they belong to, and firings whose occurrence was not among
//! the generated instances still produce an appointment for it. Alarm
//! definitions firing at the same instant collapse into one [`Alarm`].

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use datebook_domain::{
    Alarm, Appointment, AppointmentType, CalComponent, ComponentTag, DateTime, Timezone,
};

use crate::calendar_ports::AlarmInstance;
use crate::filter::is_interesting;

type OccurrenceKey = (chrono::DateTime<Utc>, chrono::DateTime<Utc>);

/// Owning source details attached to every appointment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub uid: String,
    pub color: String,
}

/// A generated occurrence with its bounds resolved to absolute time
#[derive(Debug, Clone)]
pub struct ResolvedInstance {
    pub component: CalComponent,
    pub begin: DateTime,
    pub end: DateTime,
}

/// Build the appointments of one uid's recurrence set.
///
/// `components` is the full recurrence set (master plus overrides) and is
/// used to find the component behind alarm-only occurrences.
pub fn build_appointments(
    instances: &[ResolvedInstance],
    components: &[CalComponent],
    alarms: &[AlarmInstance],
    source: &SourceInfo,
    zone: Timezone,
    user_email: Option<&str>,
) -> Vec<Appointment> {
    let mut by_occurrence: BTreeMap<OccurrenceKey, Vec<&AlarmInstance>> = BTreeMap::new();
    for alarm in alarms {
        by_occurrence.entry((alarm.occur_start, alarm.occur_end)).or_default().push(alarm);
    }

    let mut seen: HashSet<OccurrenceKey> = HashSet::new();
    let mut appointments = Vec::with_capacity(instances.len());

    for instance in instances {
        let key = (instance.begin.instant(), instance.end.instant());
        if !seen.insert(key) || !is_interesting(&instance.component, user_email) {
            continue;
        }
        let merged = by_occurrence.get(&key).map(|records| merge_alarms(records, zone));
        appointments.push(appointment_for(
            &instance.component,
            source,
            instance.begin,
            instance.end,
            merged.unwrap_or_default(),
        ));
    }

    for (key, records) in &by_occurrence {
        if seen.contains(key) {
            continue;
        }
        let Some(component) = owning_component(components, records) else {
            continue;
        };
        if !is_interesting(component, user_email) {
            continue;
        }
        appointments.push(appointment_for(
            component,
            source,
            DateTime::new(key.0, zone),
            DateTime::new(key.1, zone),
            merge_alarms(records, zone),
        ));
    }

    appointments
}

fn owning_component<'a>(
    components: &'a [CalComponent],
    records: &[&AlarmInstance],
) -> Option<&'a CalComponent> {
    let id = &records.first()?.component;
    components
        .iter()
        .find(|component| component.id() == *id)
        .or_else(|| components.iter().find(|component| component.uid == id.uid))
}

/// Collapse alarm records by trigger instant, ordered by trigger.
///
/// Text, sound and duration take the first non-empty value among the
/// records sharing a trigger.
pub fn merge_alarms(records: &[&AlarmInstance], zone: Timezone) -> Vec<Alarm> {
    let mut merged: BTreeMap<chrono::DateTime<Utc>, Alarm> = BTreeMap::new();

    for record in records {
        let alarm = merged
            .entry(record.trigger)
            .or_insert_with(|| Alarm::new(DateTime::new(record.trigger, zone)));
        let definition = &record.alarm;

        if alarm.text.is_empty() {
            if let Some(text) = definition.description.as_deref().filter(|t| !t.is_empty()) {
                alarm.text = text.to_string();
            }
        }
        if alarm.audio_url.is_empty() {
            if let Some(url) = definition.attachment.as_deref().filter(|u| !u.is_empty()) {
                alarm.audio_url = url.to_string();
            }
        }
        if alarm.duration.is_zero() {
            if let Some(seconds) = definition.duration_secs.filter(|s| *s > 0) {
                alarm.duration = Duration::from_secs(seconds);
            }
        }
    }

    merged.into_values().collect()
}

fn appointment_for(
    component: &CalComponent,
    source: &SourceInfo,
    begin: DateTime,
    end: DateTime,
    alarms: Vec<Alarm>,
) -> Appointment {
    let kind = if component.has_tag(ComponentTag::Alarm) {
        AppointmentType::UbuntuAlarm
    } else {
        AppointmentType::Event
    };

    Appointment {
        uid: component.uid.clone(),
        source_uid: source.uid.clone(),
        summary: component.summary.clone(),
        color: source.color.clone(),
        kind,
        begin,
        end,
        activation_url: component.url.clone().unwrap_or_default(),
        alarms,
    }
}
