//! Appointment engine
//!
//! Watches the backend's source registry, keeps a client and a change view
//! open for every enabled calendar and task list, and answers appointment
//! queries by expanding every connected source over the requested window.
//!
//! All work runs on tokio tasks tied to one [`CancellationToken`]. Dropping
//! the engine (or calling [`Engine::shutdown`]) cancels every pending
//! connection, view listener and query; cancelled queries never deliver.

mod disable;
mod query;
mod registry;
mod source;
mod task;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datebook_domain::{Appointment, BatchConfig, CalComponent, DateTime, Timezone};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::calendar_ports::{CalendarBackend, CalendarClient};
use crate::engine_ports::{AppointmentCallback, AppointmentEngine};
use crate::expansion::SourceInfo;
use crate::scheduler::RebuildScheduler;

use self::source::SourceEntry;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct EngineShared {
    backend: Arc<dyn CalendarBackend>,
    sources: Mutex<HashMap<String, SourceEntry>>,
    scheduler: RebuildScheduler,
    cancel: CancellationToken,
}

impl EngineShared {
    /// Connected clients with the source details attached to their results.
    fn connected_clients(&self) -> Vec<(SourceInfo, Arc<dyn CalendarClient>)> {
        let sources = self.sources.lock();
        let mut clients: Vec<_> = sources
            .values()
            .filter_map(|entry| {
                let client = entry.client()?;
                let info = SourceInfo {
                    uid: entry.source.uid.clone(),
                    color: entry.source.color.clone(),
                };
                Some((info, client))
            })
            .collect();
        clients.sort_by(|a, b| a.0.uid.cmp(&b.0.uid));
        clients
    }

    /// Spawn `work` on the runtime, abandoning it on engine shutdown.
    fn spawn<F>(&self, work: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = work => {}
            }
        })
    }
}

/// Appointment engine backed by a [`CalendarBackend`].
pub struct Engine {
    shared: Arc<EngineShared>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create the engine and start watching the backend's registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backend: Arc<dyn CalendarBackend>, batch: &BatchConfig) -> Self {
        let shared = Arc::new(EngineShared {
            backend,
            sources: Mutex::new(HashMap::new()),
            scheduler: RebuildScheduler::from_config(batch),
            cancel: CancellationToken::new(),
        });

        let watcher = shared.spawn(registry::watch_registry(Arc::clone(&shared)));
        info!("Appointment engine started");

        Self { shared, watcher: Mutex::new(Some(watcher)) }
    }

    /// Uids of the sources that currently have a live client, sorted.
    pub fn connected_sources(&self) -> Vec<String> {
        self.shared.connected_clients().into_iter().map(|(info, _)| info.uid).collect()
    }

    /// Snapshot of the components cached from a source's change view.
    pub fn cached_components(&self, source_uid: &str) -> Vec<CalComponent> {
        let sources = self.shared.sources.lock();
        let mut components: Vec<_> = sources
            .get(source_uid)
            .map(|entry| entry.cached_components())
            .unwrap_or_default();
        components.sort_by(|a, b| a.id().cmp(&b.id()));
        components
    }

    /// False once `shutdown` has started.
    pub fn is_running(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    /// Cancel all outstanding work, release every source and wait for the
    /// registry watcher to exit.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();

        let released: Vec<SourceEntry> =
            self.shared.sources.lock().drain().map(|(_, entry)| entry).collect();
        drop(released);

        let watcher = self.watcher.lock().take();
        if let Some(handle) = watcher {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = ?err, "Registry watcher ended abnormally"),
                Err(_) => warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Registry watcher did not stop in time"
                ),
            }
        }

        info!("Appointment engine stopped");
    }
}

#[async_trait]
impl AppointmentEngine for Engine {
    fn get_appointments(
        &self,
        begin: DateTime,
        end: DateTime,
        timezone: Timezone,
        callback: AppointmentCallback,
    ) {
        query::get_appointments(&self.shared, begin, end, timezone, callback);
    }

    fn changed(&self) -> broadcast::Receiver<()> {
        self.shared.scheduler.subscribe()
    }

    fn disable_ubuntu_alarm(&self, appointment: &Appointment) {
        disable::disable_ubuntu_alarm(&self.shared, appointment);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.shared.cancel.is_cancelled() {
            debug!("Engine dropped, cancelling outstanding work");
            self.shared.cancel.cancel();
        }
        if let Some(handle) = self.watcher.get_mut().take() {
            handle.abort();
        }
    }
}
