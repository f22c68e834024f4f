//! In-memory calendar backend
//!
//! Implements every calendar port of `datebook-core` over process memory:
//! a source registry with live events, one object store per source, change
//! views, recurrence expansion and alarm generation. Connections and view
//! opens can be made to fail per source.

mod alarms;
mod client;
mod recurrence;
mod registry;
mod store;
mod view;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use datebook_core::{CalendarBackend, CalendarClient, SourceRegistry};
use datebook_domain::{CalendarSource, DatebookError, Result, SourceKind};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

pub use client::MemoryClient;
pub use registry::MemoryRegistry;
pub use store::CalendarStore;
pub use view::MemoryView;

/// Per-source failure switches.
#[derive(Debug, Default)]
pub(crate) struct Failures {
    connect: Mutex<HashSet<String>>,
    view: Mutex<HashSet<String>>,
}

impl Failures {
    fn connect_refused(&self, uid: &str) -> bool {
        self.connect.lock().contains(uid)
    }

    pub(crate) fn view_refused(&self, uid: &str) -> bool {
        self.view.lock().contains(uid)
    }
}

/// Backend whose sources and objects live in process memory.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    registry: Arc<MemoryRegistry>,
    stores: Arc<Mutex<HashMap<String, Arc<CalendarStore>>>>,
    failures: Arc<Failures>,
}

impl MemoryBackend {
    /// Backend with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend's source registry.
    pub fn registry(&self) -> Arc<MemoryRegistry> {
        Arc::clone(&self.registry)
    }

    /// Register `source` and return its object store.
    pub fn add_source(&self, source: CalendarSource) -> Arc<CalendarStore> {
        let store = self.store(&source.uid);
        self.registry.add(source);
        store
    }

    /// Object store of a source, created empty on first use. Stores outlive
    /// registry removal so a re-added source keeps its objects.
    pub fn store(&self, uid: &str) -> Arc<CalendarStore> {
        Arc::clone(self.stores.lock().entry(uid.to_string()).or_default())
    }

    /// Make connecting to `uid` fail until [`Self::restore`].
    pub fn refuse_connections(&self, uid: &str) {
        self.failures.connect.lock().insert(uid.to_string());
    }

    /// Make opening a view on `uid` fail until [`Self::restore`].
    pub fn refuse_views(&self, uid: &str) {
        self.failures.view.lock().insert(uid.to_string());
    }

    /// Undo `refuse_connections` and `refuse_views` for `uid`.
    pub fn restore(&self, uid: &str) {
        self.failures.connect.lock().remove(uid);
        self.failures.view.lock().remove(uid);
    }
}

#[async_trait]
impl CalendarBackend for MemoryBackend {
    async fn open_registry(&self) -> Result<Arc<dyn SourceRegistry>> {
        Ok(self.registry())
    }

    async fn connect(
        &self,
        source: &CalendarSource,
        kind: SourceKind,
    ) -> Result<Arc<dyn CalendarClient>> {
        if self.failures.connect_refused(&source.uid) {
            return Err(DatebookError::Backend(format!("{}: connection refused", source.uid)));
        }
        if self.registry.get(&source.uid).is_none() {
            return Err(DatebookError::NotFound(format!("source {}", source.uid)));
        }
        if !source.extensions.contains(&kind.extension()) {
            return Err(DatebookError::InvalidInput(format!(
                "{} cannot be opened as {kind}",
                source.uid
            )));
        }

        debug!(source_uid = %source.uid, %kind, "Opening in-memory client");
        Ok(Arc::new(MemoryClient::new(
            source.uid.clone(),
            kind,
            self.store(&source.uid),
            Arc::clone(&self.failures),
        )))
    }
}

/// Receiver as a stream, skipping over lag and ending when the sender goes.
pub(crate) fn broadcast_stream<T: Clone + Send + 'static>(
    receiver: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(item) => return Some((item, receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
