//! Shared completion state of one appointment query
//!
//! Every in-flight piece of a query (one per client, one per uid being
//! expanded) holds an `Arc<AppointmentTask>`. When the last one is dropped
//! the collected appointments are sorted by begin and handed to the
//! callback. A query abandoned by engine shutdown delivers nothing.

use datebook_domain::Appointment;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine_ports::AppointmentCallback;

pub(crate) struct AppointmentTask {
    appointments: Mutex<Vec<Appointment>>,
    callback: Mutex<Option<AppointmentCallback>>,
    cancel: CancellationToken,
}

impl AppointmentTask {
    pub(crate) fn new(callback: AppointmentCallback, cancel: CancellationToken) -> Self {
        Self {
            appointments: Mutex::new(Vec::new()),
            callback: Mutex::new(Some(callback)),
            cancel,
        }
    }

    pub(crate) fn extend(&self, appointments: Vec<Appointment>) {
        self.appointments.lock().extend(appointments);
    }
}

impl Drop for AppointmentTask {
    fn drop(&mut self) {
        let Some(callback) = self.callback.get_mut().take() else {
            return;
        };
        if self.cancel.is_cancelled() {
            return;
        }

        let mut appointments = std::mem::take(self.appointments.get_mut());
        appointments.sort_by(|a, b| a.begin.cmp(&b.begin));
        debug!(count = appointments.len(), "Delivering appointments");
        callback(appointments);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datebook_domain::{AppointmentType, DateTime, Timezone};

    use super::*;

    fn appointment(uid: &str, begin: i64) -> Appointment {
        let at = DateTime::from_unix(begin, Timezone::utc()).unwrap();
        Appointment {
            uid: uid.into(),
            source_uid: "personal".into(),
            summary: uid.into(),
            color: String::new(),
            kind: AppointmentType::Event,
            begin: at,
            end: at,
            activation_url: String::new(),
            alarms: Vec::new(),
        }
    }

    fn recording_callback() -> (AppointmentCallback, Arc<Mutex<Option<Vec<String>>>>) {
        let delivered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&delivered);
        let callback: AppointmentCallback = Box::new(move |appointments| {
            let uids = appointments.into_iter().map(|a| a.uid).collect();
            assert!(sink.lock().replace(uids).is_none(), "delivered twice");
        });
        (callback, delivered)
    }

    #[test]
    fn last_owner_delivers_sorted_results() {
        let (callback, delivered) = recording_callback();
        let task = Arc::new(AppointmentTask::new(callback, CancellationToken::new()));

        let first = Arc::clone(&task);
        let second = Arc::clone(&task);
        drop(task);

        first.extend(vec![appointment("late", 300), appointment("early", 100)]);
        drop(first);
        assert!(delivered.lock().is_none());

        second.extend(vec![appointment("middle", 200), appointment("middle-2", 200)]);
        drop(second);

        assert_eq!(
            delivered.lock().clone().unwrap(),
            vec!["early", "middle", "middle-2", "late"]
        );
    }

    #[test]
    fn empty_query_still_delivers() {
        let (callback, delivered) = recording_callback();
        drop(AppointmentTask::new(callback, CancellationToken::new()));

        assert_eq!(delivered.lock().clone(), Some(Vec::new()));
    }

    #[test]
    fn cancelled_query_never_delivers() {
        let (callback, delivered) = recording_callback();
        let cancel = CancellationToken::new();
        let task = AppointmentTask::new(callback, cancel.clone());
        task.extend(vec![appointment("a", 100)]);

        cancel.cancel();
        drop(task);

        assert!(delivered.lock().is_none());
    }
}
