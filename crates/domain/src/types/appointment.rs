//! Appointment and alarm records handed to callers
//!
//! One `Appointment` is one concrete occurrence. A recurring series yields
//! many appointments sharing a `uid` with distinct `begin`/`end`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DateTime;
use crate::impl_domain_status_conversions;

/// What kind of entry an appointment represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    /// A regular calendar entry.
    #[default]
    Event,
    /// A clock alarm created by the alarm app, tagged `x-canonical-alarm`.
    UbuntuAlarm,
}

impl_domain_status_conversions!(AppointmentType {
    Event => "event",
    UbuntuAlarm => "ubuntu_alarm",
});

/// One trigger moment of an appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub text: String,
    pub audio_url: String,
    pub time: DateTime,
    /// How long the alarm sound should keep playing. Zero means the player
    /// default.
    pub duration: Duration,
}

impl Alarm {
    pub fn new(time: DateTime) -> Self {
        Self { text: String::new(), audio_url: String::new(), time, duration: Duration::ZERO }
    }
}

/// One concrete occurrence of a calendar component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub uid: String,
    pub source_uid: String,
    pub summary: String,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: AppointmentType,
    pub begin: DateTime,
    pub end: DateTime,
    pub activation_url: String,
    pub alarms: Vec<Alarm>,
}

impl Appointment {
    /// Whether this is a clock alarm rather than a regular event.
    pub fn is_ubuntu_alarm(&self) -> bool {
        self.kind == AppointmentType::UbuntuAlarm
    }

    /// Length of the occurrence; zero for instants and inverted ranges.
    pub fn duration(&self) -> Duration {
        let seconds = self.end.to_unix() - self.begin.to_unix();
        Duration::from_secs(u64::try_from(seconds).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::Timezone;

    fn appointment(begin: i64, end: i64) -> Appointment {
        Appointment {
            uid: "uid-1".into(),
            source_uid: "personal".into(),
            summary: "Review".into(),
            color: "#3465a4".into(),
            kind: AppointmentType::Event,
            begin: DateTime::from_unix(begin, Timezone::utc()).unwrap(),
            end: DateTime::from_unix(end, Timezone::utc()).unwrap(),
            activation_url: String::new(),
            alarms: Vec::new(),
        }
    }

    #[test]
    fn duration_is_end_minus_begin() {
        assert_eq!(appointment(1_000, 4_600).duration(), Duration::from_secs(3_600));
        assert_eq!(appointment(1_000, 1_000).duration(), Duration::ZERO);
        assert_eq!(appointment(1_000, 500).duration(), Duration::ZERO);
    }

    #[test]
    fn equality_is_structural() {
        let a = appointment(1_000, 2_000);
        let mut b = a.clone();
        assert_eq!(a, b);

        b.alarms.push(Alarm::new(b.begin));
        assert_ne!(a, b);
    }

    #[test]
    fn appointment_type_round_trips_through_strings() {
        assert_eq!(AppointmentType::UbuntuAlarm.to_string(), "ubuntu_alarm");
        assert_eq!(AppointmentType::from_str("EVENT").unwrap(), AppointmentType::Event);
    }
}
