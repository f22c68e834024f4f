//! Raw calendar component model exchanged with calendar backends
//!
//! These mirror the iCalendar objects a backend stores (VEVENT, VTODO and
//! their VALARM children). The engine reads them; it only writes back the
//! category list when retiring a one-shot alarm.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::{DateTime, Timezone};
use crate::constants::{TAG_ALARM, TAG_DISABLED};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    #[default]
    Event,
    Todo,
    Journal,
    FreeBusy,
    Timezone,
}

impl_domain_status_conversions!(ComponentKind {
    Event => "vevent",
    Todo => "vtodo",
    Journal => "vjournal",
    FreeBusy => "vfreebusy",
    Timezone => "vtimezone",
});

/// STATUS property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    None,
    Tentative,
    Confirmed,
    NeedsAction,
    InProcess,
    Completed,
    Cancelled,
    Draft,
    Final,
}

impl_domain_status_conversions!(ComponentStatus {
    None => "none",
    Tentative => "tentative",
    Confirmed => "confirmed",
    NeedsAction => "needs-action",
    InProcess => "in-process",
    Completed => "completed",
    Cancelled => "cancelled",
    Draft => "draft",
    Final => "final",
});

/// PARTSTAT parameter of an attendee
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
    Completed,
    InProcess,
}

impl_domain_status_conversions!(ParticipationStatus {
    NeedsAction => "needs-action",
    Accepted => "accepted",
    Declined => "declined",
    Tentative => "tentative",
    Delegated => "delegated",
    Completed => "completed",
    InProcess => "in-process",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Calendar address, usually `mailto:someone@example.com`.
    pub email: String,
    pub status: ParticipationStatus,
}

/// A date or date-time property value as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum CalDateTime {
    Utc { at: chrono::DateTime<Utc> },
    /// Wall-clock time in the zone named by `tzid`.
    Zoned { local: NaiveDateTime, tzid: String },
    /// Wall-clock time with no zone; interpreted in the viewer's zone.
    Floating { local: NaiveDateTime },
    /// All-day value.
    Date { date: NaiveDate },
}

impl CalDateTime {
    pub fn utc(at: chrono::DateTime<Utc>) -> Self {
        Self::Utc { at }
    }

    pub fn zoned(local: NaiveDateTime, tzid: impl Into<String>) -> Self {
        Self::Zoned { local, tzid: tzid.into() }
    }

    pub fn floating(local: NaiveDateTime) -> Self {
        Self::Floating { local }
    }

    pub fn date(date: NaiveDate) -> Self {
        Self::Date { date }
    }

    /// TZID of a zoned value.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date { .. })
    }

    /// Wall-clock value; UTC values report their UTC wall clock and dates
    /// report midnight.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            Self::Utc { at } => at.naive_utc(),
            Self::Zoned { local, .. } | Self::Floating { local } => *local,
            Self::Date { date } => date.and_time(chrono::NaiveTime::MIN),
        }
    }

    /// Same representation with a different wall-clock value.
    pub fn with_naive(&self, naive: NaiveDateTime) -> Self {
        match self {
            Self::Utc { .. } => Self::Utc { at: naive.and_utc() },
            Self::Zoned { tzid, .. } => Self::Zoned { local: naive, tzid: tzid.clone() },
            Self::Floating { .. } => Self::Floating { local: naive },
            Self::Date { .. } => Self::Date { date: naive.date() },
        }
    }

    /// Absolute value given the zone the caller resolved for this value.
    ///
    /// `zone` is used for zoned, floating and date forms; UTC values keep
    /// their instant and are merely viewed in `zone`.
    pub fn to_datetime(&self, zone: Timezone) -> DateTime {
        match self {
            Self::Utc { at } => DateTime::new(*at, zone),
            other => DateTime::from_naive(zone, other.naive()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl_domain_status_conversions!(Frequency {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    Yearly => "yearly",
});

/// RRULE value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<CalDateTime>,
    /// BYDAY for weekly rules.
    #[serde(default)]
    pub by_day: Vec<Weekday>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self { frequency, interval: 1, count: None, until: None, by_day: Vec::new() }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_until(mut self, until: CalDateTime) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_by_day(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_day = days.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAction {
    Audio,
    Display,
    Email,
    Procedure,
}

impl_domain_status_conversions!(AlarmAction {
    Audio => "audio",
    Display => "display",
    Email => "email",
    Procedure => "procedure",
});

/// TRIGGER value, offsets in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmTrigger {
    /// Seconds relative to the occurrence start.
    RelativeStart(i64),
    /// Seconds relative to the occurrence end.
    RelativeEnd(i64),
    /// Fixed point in time.
    Absolute(chrono::DateTime<Utc>),
}

/// VALARM sub-component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub uid: String,
    pub action: AlarmAction,
    pub trigger: AlarmTrigger,
    pub description: Option<String>,
    /// ATTACH of an audio alarm.
    pub attachment: Option<String>,
    /// Additional firings after the first.
    #[serde(default)]
    pub repeat: u32,
    #[serde(default)]
    pub repeat_interval_secs: i64,
    /// How long the sound should play.
    pub duration_secs: Option<u64>,
}

impl AlarmDefinition {
    pub fn new(uid: impl Into<String>, action: AlarmAction, trigger: AlarmTrigger) -> Self {
        Self {
            uid: uid.into(),
            action,
            trigger,
            description: None,
            attachment: None,
            repeat: 0,
            repeat_interval_secs: 0,
            duration_secs: None,
        }
    }
}

/// Category markers the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    Alarm,
    Disabled,
}

impl ComponentTag {
    pub fn as_category(&self) -> &'static str {
        match self {
            Self::Alarm => TAG_ALARM,
            Self::Disabled => TAG_DISABLED,
        }
    }

    pub fn from_category(category: &str) -> Option<Self> {
        if category.eq_ignore_ascii_case(TAG_ALARM) {
            Some(Self::Alarm)
        } else if category.eq_ignore_ascii_case(TAG_DISABLED) {
            Some(Self::Disabled)
        } else {
            None
        }
    }
}

/// CATEGORIES of a component, split into known tags and everything else
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    tags: BTreeSet<ComponentTag>,
    other: Vec<String>,
}

impl Categories {
    pub fn from_strings<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        for category in categories {
            let category = category.as_ref();
            match ComponentTag::from_category(category) {
                Some(tag) => {
                    out.tags.insert(tag);
                }
                None => out.other.push(category.to_string()),
            }
        }
        out
    }

    /// Backend representation: foreign categories first, in their original
    /// order, followed by the known tags.
    pub fn to_strings(&self) -> Vec<String> {
        self.other
            .iter()
            .cloned()
            .chain(self.tags.iter().map(|tag| tag.as_category().to_string()))
            .collect()
    }

    pub fn contains(&self, tag: ComponentTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Returns false if the tag was already present.
    pub fn insert(&mut self, tag: ComponentTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn other(&self) -> &[String] {
        &self.other
    }
}

/// Identity of one stored object: recurring series share a uid and
/// detached overrides carry a recurrence id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId {
    pub uid: String,
    pub rid: Option<String>,
}

impl ComponentId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), rid: None }
    }
}

/// A VEVENT or VTODO as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalComponent {
    pub uid: String,
    /// Set on detached overrides of one occurrence of a series.
    pub recurrence_id: Option<CalDateTime>,
    pub kind: ComponentKind,
    pub status: ComponentStatus,
    pub summary: String,
    pub url: Option<String>,
    pub dtstart: Option<CalDateTime>,
    pub dtend: Option<CalDateTime>,
    /// DUE of a task; used as the end when there is no DTEND.
    pub due: Option<CalDateTime>,
    #[serde(default)]
    pub rrules: Vec<RecurrenceRule>,
    #[serde(default)]
    pub rdates: Vec<CalDateTime>,
    #[serde(default)]
    pub exdates: Vec<CalDateTime>,
    #[serde(default)]
    pub alarms: Vec<AlarmDefinition>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub categories: Categories,
}

impl CalComponent {
    pub fn new(uid: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            uid: uid.into(),
            recurrence_id: None,
            kind,
            status: ComponentStatus::None,
            summary: String::new(),
            url: None,
            dtstart: None,
            dtend: None,
            due: None,
            rrules: Vec::new(),
            rdates: Vec::new(),
            exdates: Vec::new(),
            alarms: Vec::new(),
            attendees: Vec::new(),
            categories: Categories::default(),
        }
    }

    /// A VEVENT spanning `dtstart..dtend`.
    pub fn event(
        uid: impl Into<String>,
        summary: impl Into<String>,
        dtstart: CalDateTime,
        dtend: CalDateTime,
    ) -> Self {
        let mut component = Self::new(uid, ComponentKind::Event);
        component.summary = summary.into();
        component.dtstart = Some(dtstart);
        component.dtend = Some(dtend);
        component
    }

    /// Identity of this object: uid plus recurrence id.
    pub fn id(&self) -> ComponentId {
        ComponentId {
            uid: self.uid.clone(),
            rid: self.recurrence_id.as_ref().map(|rid| rid.naive().to_string()),
        }
    }

    pub fn has_recurrences(&self) -> bool {
        !self.rrules.is_empty() || !self.rdates.is_empty()
    }

    /// No RRULE and no RDATE: the component happens exactly once.
    pub fn is_one_shot(&self) -> bool {
        !self.has_recurrences()
    }

    pub fn has_tag(&self, tag: ComponentTag) -> bool {
        self.categories.contains(tag)
    }

    /// End of the template occurrence: DTEND, else DUE.
    pub fn end(&self) -> Option<&CalDateTime> {
        self.dtend.as_ref().or(self.due.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;

    fn naive(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 10, 31).unwrap().and_hms_opt(h, 30, 59).unwrap()
    }

    #[test]
    fn categories_split_known_tags_from_foreign_ones() {
        let categories = Categories::from_strings(["Work", "X-CANONICAL-ALARM", "Holiday"]);

        assert!(categories.contains(ComponentTag::Alarm));
        assert!(!categories.contains(ComponentTag::Disabled));
        assert_eq!(categories.other(), ["Work".to_string(), "Holiday".to_string()]);
    }

    #[test]
    fn categories_write_back_with_tags_last() {
        let mut categories = Categories::from_strings(["x-canonical-alarm", "Work"]);
        assert!(categories.insert(ComponentTag::Disabled));
        assert!(!categories.insert(ComponentTag::Disabled));

        assert_eq!(
            categories.to_strings(),
            vec!["Work", "x-canonical-alarm", "x-canonical-disabled"]
        );
    }

    #[test]
    fn one_shot_means_no_rrule_and_no_rdate() {
        let mut component = CalComponent::event(
            "a",
            "Alarm",
            CalDateTime::floating(naive(7)),
            CalDateTime::floating(naive(7)),
        );
        assert!(component.is_one_shot());

        component.rdates.push(CalDateTime::floating(naive(8)));
        assert!(!component.is_one_shot());

        component.rdates.clear();
        component.rrules.push(RecurrenceRule::new(Frequency::Daily));
        assert!(!component.is_one_shot());
    }

    #[test]
    fn zoned_values_resolve_in_the_given_zone() {
        let value = CalDateTime::zoned(naive(18), "America/New_York");
        let zone = Timezone::named("America/New_York").unwrap();

        let dt = value.to_datetime(zone);
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S"), "2020-10-31 18:30:59");
        assert_eq!(value.tzid(), Some("America/New_York"));
    }

    #[test]
    fn statuses_parse_ical_spellings() {
        assert_eq!(ComponentStatus::from_str("CANCELLED").unwrap(), ComponentStatus::Cancelled);
        assert_eq!(ComponentStatus::from_str("NEEDS-ACTION").unwrap(), ComponentStatus::NeedsAction);
        assert_eq!(ParticipationStatus::from_str("Declined").unwrap(), ParticipationStatus::Declined);
        assert_eq!(ComponentKind::from_str("VTODO").unwrap(), ComponentKind::Todo);
    }

    #[test]
    fn override_identity_includes_recurrence_id() {
        let mut component = CalComponent::new("series", ComponentKind::Event);
        assert_eq!(component.id(), ComponentId::new("series"));

        component.recurrence_id = Some(CalDateTime::floating(naive(9)));
        assert_eq!(component.id().rid.as_deref(), Some("2020-10-31 09:30:59"));
    }
}
