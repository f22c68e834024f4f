//! Shared test helpers for `datebook-core` integration tests.
//!
//! These helpers provide scripted fakes for the backend ports and for the
//! engine port, so tests can focus on behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod backend;
pub mod engine;

use std::time::Duration;

use datebook_domain::{Appointment, AppointmentType, DateTime, Timezone};

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime {
    DateTime::in_zone(Timezone::utc(), year, month, day, hour, minute, 0).unwrap()
}

pub fn appointment(uid: &str, begin: DateTime, end: DateTime) -> Appointment {
    Appointment {
        uid: uid.into(),
        source_uid: "personal".into(),
        summary: uid.into(),
        color: "#3465a4".into(),
        kind: AppointmentType::Event,
        begin,
        end,
        activation_url: String::new(),
        alarms: Vec::new(),
    }
}
