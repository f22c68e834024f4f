//! Appointment engine port
//!
//! Implemented by [`crate::engine::Engine`]; consumers such as the
//! [`crate::planner::Planner`] depend on this trait so they can be driven by a
//! scripted engine in tests.

use async_trait::async_trait;
use datebook_domain::{Appointment, DatebookError, DateTime, Result, Timezone};
use tokio::sync::{broadcast, oneshot};

/// Receives the sorted result of one query.
pub type AppointmentCallback = Box<dyn FnOnce(Vec<Appointment>) + Send + 'static>;

/// Queries and change notifications over every connected source.
#[async_trait]
pub trait AppointmentEngine: Send + Sync {
    /// Expand every connected source over `[begin, end]` and deliver the
    /// merged list, sorted by `begin`, through `callback` exactly once.
    /// The callback is dropped uncalled if the engine shuts down first.
    fn get_appointments(
        &self,
        begin: DateTime,
        end: DateTime,
        timezone: Timezone,
        callback: AppointmentCallback,
    );

    /// Fires at most once per batching window after calendar data changed.
    fn changed(&self) -> broadcast::Receiver<()>;

    /// Retire a one-shot clock alarm after it has gone off.
    fn disable_ubuntu_alarm(&self, appointment: &Appointment);

    /// Future-based form of [`AppointmentEngine::get_appointments`].
    ///
    /// # Errors
    /// Returns `DatebookError::Cancelled` if the engine shuts down before
    /// the query completes.
    async fn appointments(
        &self,
        begin: DateTime,
        end: DateTime,
        timezone: Timezone,
    ) -> Result<Vec<Appointment>> {
        let (tx, rx) = oneshot::channel();
        self.get_appointments(
            begin,
            end,
            timezone,
            Box::new(move |appointments| {
                let _ = tx.send(appointments);
            }),
        );
        rx.await.map_err(|_| DatebookError::Cancelled)
    }
}
