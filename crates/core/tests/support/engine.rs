use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datebook_core::{AppointmentCallback, AppointmentEngine};
use datebook_domain::{Appointment, DateTime, Timezone};
use tokio::sync::broadcast;

/// In-memory mock for `AppointmentEngine`.
///
/// Answers queries from a fixed list, returning the appointments that
/// overlap the window, and records every window it was asked for.
#[derive(Clone)]
pub struct MockEngine {
    appointments: Arc<Mutex<Vec<Appointment>>>,
    queries: Arc<Mutex<Vec<(DateTime, DateTime)>>>,
    disabled: Arc<Mutex<Vec<String>>>,
    changed: broadcast::Sender<()>,
}

impl MockEngine {
    pub fn new(appointments: Vec<Appointment>) -> Self {
        Self {
            appointments: Arc::new(Mutex::new(appointments)),
            queries: Arc::new(Mutex::new(Vec::new())),
            disabled: Arc::new(Mutex::new(Vec::new())),
            changed: broadcast::channel(8).0,
        }
    }

    pub fn replace(&self, appointments: Vec<Appointment>) {
        *self.appointments.lock().unwrap() = appointments;
        let _ = self.changed.send(());
    }

    pub fn queries(&self) -> Vec<(DateTime, DateTime)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentEngine for MockEngine {
    fn get_appointments(
        &self,
        begin: DateTime,
        end: DateTime,
        _timezone: Timezone,
        callback: AppointmentCallback,
    ) {
        self.queries.lock().unwrap().push((begin, end));
        let mut matching: Vec<_> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|appointment| appointment.begin <= end && appointment.end >= begin)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.begin.cmp(&b.begin));
        callback(matching);
    }

    fn changed(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    fn disable_ubuntu_alarm(&self, appointment: &Appointment) {
        self.disabled.lock().unwrap().push(appointment.uid.clone());
    }
}
