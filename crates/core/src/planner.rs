//! Planner: the appointment lists a date/time indicator shows
//!
//! Tracks a reference time and keeps two lists current: the next few
//! appointments from that time on, and everything in its calendar month.
//! Both are re-queried when the time is set and whenever the engine
//! reports changed calendar data.

use std::sync::Arc;

use datebook_domain::{Appointment, DateTime, PlannerConfig, Timezone};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine_ports::AppointmentEngine;

#[derive(Debug, Clone)]
struct PlannerSettings {
    upcoming_days: i64,
    max_upcoming: usize,
}

/// Keeps the upcoming and this-month lists current for a reference time.
pub struct Planner {
    time: watch::Sender<DateTime>,
    upcoming: watch::Receiver<Vec<Appointment>>,
    this_month: watch::Receiver<Vec<Appointment>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Planner {
    /// Start tracking `time` against `engine`. The query zone comes from
    /// `config.timezone`, falling back to the system zone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(engine: Arc<dyn AppointmentEngine>, config: &PlannerConfig, time: DateTime) -> Self {
        let zone = Timezone::resolve_or_system(config.timezone.as_deref());
        let settings = PlannerSettings {
            upcoming_days: i64::from(config.upcoming_days),
            max_upcoming: config.max_upcoming,
        };

        let (time_tx, time_rx) = watch::channel(time.to_timezone(zone));
        let (upcoming_tx, upcoming) = watch::channel(Vec::new());
        let (this_month_tx, this_month) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();

        let changed = engine.changed();
        let task = tokio::spawn(run(
            engine,
            settings,
            zone,
            time_rx,
            changed,
            upcoming_tx,
            this_month_tx,
            cancel.clone(),
        ));
        info!(%zone, "Planner started");

        Self { time: time_tx, upcoming, this_month, cancel, task: Some(task) }
    }

    /// Current reference time, in the planner's zone.
    pub fn time(&self) -> DateTime {
        *self.time.borrow()
    }

    /// Move the reference time; both lists are refreshed.
    pub fn set_time(&self, time: DateTime) {
        let zone = self.time.borrow().zone();
        self.time.send_replace(time.to_timezone(zone));
    }

    /// Appointments from the reference time on, at most the configured
    /// count, excluding ones already over.
    pub fn upcoming(&self) -> watch::Receiver<Vec<Appointment>> {
        self.upcoming.clone()
    }

    /// Appointments in the calendar month of the reference time.
    pub fn this_month(&self) -> watch::Receiver<Vec<Appointment>> {
        self.this_month.clone()
    }

    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!("Planner stopped");
    }
}

impl Drop for Planner {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    engine: Arc<dyn AppointmentEngine>,
    settings: PlannerSettings,
    zone: Timezone,
    mut time: watch::Receiver<DateTime>,
    mut changed: broadcast::Receiver<()>,
    upcoming: watch::Sender<Vec<Appointment>>,
    this_month: watch::Sender<Vec<Appointment>>,
    cancel: CancellationToken,
) {
    loop {
        let now = *time.borrow_and_update();
        let refresh = async {
            let upcoming_list = query_upcoming(engine.as_ref(), &settings, zone, now).await?;
            let month_list = query_this_month(engine.as_ref(), zone, now).await?;
            Some((upcoming_list, month_list))
        };

        tokio::select! {
            _ = cancel.cancelled() => return,
            lists = refresh => {
                if let Some((upcoming_list, month_list)) = lists {
                    debug!(upcoming = upcoming_list.len(), this_month = month_list.len(), "Planner refreshed");
                    upcoming.send_replace(upcoming_list);
                    this_month.send_replace(month_list);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            result = time.changed() => {
                if result.is_err() {
                    return;
                }
            }
            result = changed.recv() => {
                if let Err(broadcast::error::RecvError::Closed) = result {
                    return;
                }
            }
        }
    }
}

async fn query_upcoming(
    engine: &dyn AppointmentEngine,
    settings: &PlannerSettings,
    zone: Timezone,
    now: DateTime,
) -> Option<Vec<Appointment>> {
    let begin = now.start_of_day();
    let end = now.add_days(settings.upcoming_days);
    let appointments = engine.appointments(begin, end, zone).await.ok()?;

    Some(
        appointments
            .into_iter()
            .filter(|appointment| appointment.begin >= now || appointment.end > now)
            .take(settings.max_upcoming)
            .collect(),
    )
}

async fn query_this_month(
    engine: &dyn AppointmentEngine,
    zone: Timezone,
    now: DateTime,
) -> Option<Vec<Appointment>> {
    engine.appointments(now.start_of_month(), now.end_of_month(), zone).await.ok()
}
