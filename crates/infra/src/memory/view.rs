//! Change view over an in-memory calendar

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use datebook_core::{ClientView, ViewEvent};
use datebook_domain::constants::ALL_OBJECTS_FILTER;
use datebook_domain::{DatebookError, Result};
use futures::stream::{self, BoxStream, StreamExt};

use super::broadcast_stream;
use super::store::CalendarStore;

/// Change view over every object of a [`CalendarStore`].
pub struct MemoryView {
    store: Arc<CalendarStore>,
    running: Arc<AtomicBool>,
}

impl MemoryView {
    /// Only the match-everything filter is understood.
    pub(crate) fn open(store: Arc<CalendarStore>, filter: &str) -> Result<Self> {
        if filter.trim() != ALL_OBJECTS_FILTER {
            return Err(DatebookError::InvalidInput(format!("unsupported view filter {filter:?}")));
        }
        Ok(Self { store, running: Arc::new(AtomicBool::new(false)) })
    }

    /// Between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl ClientView for MemoryView {
    fn start(&self) -> Result<BoxStream<'static, ViewEvent>> {
        // Subscribe before the snapshot so no change is lost in between.
        let changes = broadcast_stream(self.store.subscribe());
        let current = self.store.snapshot();
        self.running.store(true, Ordering::SeqCst);

        let initial = (!current.is_empty()).then(|| ViewEvent::ObjectsAdded(current));
        let running = Arc::clone(&self.running);
        Ok(stream::iter(initial)
            .chain(changes)
            .take_while(move |_| futures::future::ready(running.load(Ordering::SeqCst)))
            .boxed())
    }

    fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
