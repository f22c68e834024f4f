//! In-memory source registry
//!
//! Mutations emit the matching [`RegistryEvent`] to every subscriber.

use std::collections::BTreeMap;

use async_trait::async_trait;
use datebook_core::{RegistryEvent, SourceRegistry};
use datebook_domain::{CalendarSource, DatebookError, Result, SourceExtension};
use futures::stream::BoxStream;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::broadcast_stream;

const REGISTRY_EVENT_CAPACITY: usize = 64;

/// In-memory source registry broadcasting lifecycle events.
pub struct MemoryRegistry {
    sources: RwLock<BTreeMap<String, CalendarSource>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self {
            sources: RwLock::new(BTreeMap::new()),
            events: broadcast::channel(REGISTRY_EVENT_CAPACITY).0,
        }
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source registered under `uid`.
    pub fn get(&self, uid: &str) -> Option<CalendarSource> {
        self.sources.read().get(uid).cloned()
    }

    /// Add a source, or replace it when the uid is already known.
    pub fn add(&self, source: CalendarSource) {
        let replaced = self.sources.write().insert(source.uid.clone(), source.clone()).is_some();
        debug!(source_uid = %source.uid, replaced, "Registry source added");
        if replaced {
            self.emit(RegistryEvent::Changed(source));
        } else {
            self.emit(RegistryEvent::Added(source));
        }
    }

    /// # Errors
    /// `DatebookError::NotFound` for an unknown uid.
    pub fn remove(&self, uid: &str) -> Result<CalendarSource> {
        let removed = self.sources.write().remove(uid).ok_or_else(|| unknown(uid))?;
        self.emit(RegistryEvent::Removed(uid.to_string()));
        Ok(removed)
    }

    /// # Errors
    /// `DatebookError::NotFound` for an unknown uid.
    pub fn enable(&self, uid: &str) -> Result<()> {
        let source = self.set_enabled(uid, true)?;
        self.emit(RegistryEvent::Enabled(source));
        Ok(())
    }

    /// # Errors
    /// `DatebookError::NotFound` for an unknown uid.
    pub fn disable(&self, uid: &str) -> Result<()> {
        self.set_enabled(uid, false)?;
        self.emit(RegistryEvent::Disabled(uid.to_string()));
        Ok(())
    }

    /// Replace a known source's descriptor (colour, name, flags).
    ///
    /// # Errors
    /// `DatebookError::NotFound` for an unknown uid.
    pub fn update(&self, source: CalendarSource) -> Result<()> {
        {
            let mut sources = self.sources.write();
            let slot = sources.get_mut(&source.uid).ok_or_else(|| unknown(&source.uid))?;
            *slot = source.clone();
        }
        self.emit(RegistryEvent::Changed(source));
        Ok(())
    }

    fn set_enabled(&self, uid: &str, enabled: bool) -> Result<CalendarSource> {
        let mut sources = self.sources.write();
        let source = sources.get_mut(uid).ok_or_else(|| unknown(uid))?;
        source.enabled = enabled;
        Ok(source.clone())
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.events.send(event);
    }
}

fn unknown(uid: &str) -> DatebookError {
    DatebookError::NotFound(format!("source {uid}"))
}

#[async_trait]
impl SourceRegistry for MemoryRegistry {
    async fn list_sources(&self, extension: SourceExtension) -> Result<Vec<CalendarSource>> {
        Ok(self
            .sources
            .read()
            .values()
            .filter(|source| source.extensions.contains(&extension))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> BoxStream<'static, RegistryEvent> {
        broadcast_stream(self.events.subscribe())
    }
}
