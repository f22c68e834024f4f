//! Per-source connection state and its lifecycle
//!
//! A recorded source moves through: known (not connected), connecting,
//! connected (client stored), watched (view open and listened to). Disable
//! and removal tear the connection down. Every teardown bumps the entry's
//! generation so that connect and view-open completions arriving late are
//! recognised as stale and discarded.

use std::collections::HashMap;
use std::sync::Arc;

use datebook_domain::constants::ALL_OBJECTS_FILTER;
use datebook_domain::{CalComponent, CalendarSource, ComponentId, SourceKind};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::EngineShared;
use crate::calendar_ports::{CalendarClient, ClientView, ViewEvent};
use crate::log_failure;

pub(crate) struct SourceEntry {
    pub(crate) source: CalendarSource,
    generation: u64,
    connecting: bool,
    connection: Option<Connection>,
}

struct Connection {
    client: Arc<dyn CalendarClient>,
    view: Option<ViewHandle>,
    cache: HashMap<ComponentId, CalComponent>,
}

/// Open change view plus the task draining its events. Dropping it stops
/// the view.
struct ViewHandle {
    source_uid: String,
    view: Arc<dyn ClientView>,
    listener: JoinHandle<()>,
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.listener.abort();
        if let Err(err) = self.view.stop() {
            log_failure(&self.source_uid, "stop view", &err);
        }
    }
}

impl SourceEntry {
    fn new(source: CalendarSource) -> Self {
        Self { source, generation: 0, connecting: false, connection: None }
    }

    pub(crate) fn client(&self) -> Option<Arc<dyn CalendarClient>> {
        self.connection.as_ref().map(|connection| Arc::clone(&connection.client))
    }

    pub(crate) fn cached_components(&self) -> Vec<CalComponent> {
        self.connection
            .as_ref()
            .map(|connection| connection.cache.values().cloned().collect())
            .unwrap_or_default()
    }

    fn is_live(&self) -> bool {
        self.connecting || self.connection.is_some()
    }

    /// Drop the connection and invalidate in-flight completions.
    fn release(&mut self) -> Option<Connection> {
        self.generation = self.generation.wrapping_add(1);
        self.connecting = false;
        self.connection.take()
    }
}

pub(crate) fn on_source_added(shared: &Arc<EngineShared>, source: CalendarSource) {
    let known = shared.sources.lock().contains_key(&source.uid);
    if known {
        on_source_changed(shared, source);
        return;
    }

    debug!(source_uid = %source.uid, enabled = source.enabled, "Source added");
    let enabled = source.enabled;
    shared.sources.lock().insert(source.uid.clone(), SourceEntry::new(source.clone()));
    if enabled {
        on_source_enabled(shared, source);
    }
}

pub(crate) fn on_source_enabled(shared: &Arc<EngineShared>, source: CalendarSource) {
    let Some(kind) = source.kind() else {
        debug!(source_uid = %source.uid, "Ignoring source without calendar or task list extension");
        return;
    };

    let generation = {
        let mut sources = shared.sources.lock();
        let entry = sources
            .entry(source.uid.clone())
            .or_insert_with(|| SourceEntry::new(source.clone()));
        entry.source = source.clone();
        entry.source.enabled = true;
        if entry.is_live() {
            return;
        }
        entry.connecting = true;
        entry.generation
    };

    debug!(source_uid = %source.uid, %kind, "Connecting to source");
    let task_shared = Arc::clone(shared);
    shared.spawn(connect_source(task_shared, source, kind, generation));
}

pub(crate) fn on_source_disabled(shared: &Arc<EngineShared>, uid: &str) {
    let released = {
        let mut sources = shared.sources.lock();
        sources.get_mut(uid).and_then(|entry| {
            entry.source.enabled = false;
            entry.release()
        })
    };

    if released.is_some() {
        info!(source_uid = uid, "Source disabled, connection released");
    }
    drop(released);
    shared.scheduler.mark_dirty();
}

pub(crate) fn on_source_removed(shared: &Arc<EngineShared>, uid: &str) {
    let removed = shared.sources.lock().remove(uid);
    if let Some(mut entry) = removed {
        drop(entry.release());
        info!(source_uid = uid, "Source removed");
    }
    shared.scheduler.mark_dirty();
}

/// Refresh the recorded descriptor and reconcile the connection with the
/// source's enabled flag.
pub(crate) fn on_source_changed(shared: &Arc<EngineShared>, source: CalendarSource) {
    let live = {
        let mut sources = shared.sources.lock();
        let entry = sources
            .entry(source.uid.clone())
            .or_insert_with(|| SourceEntry::new(source.clone()));
        entry.source = source.clone();
        entry.is_live()
    };

    debug!(source_uid = %source.uid, enabled = source.enabled, "Source changed");
    match (source.enabled, live) {
        (true, false) => on_source_enabled(shared, source),
        (false, true) => on_source_disabled(shared, &source.uid),
        _ => shared.scheduler.mark_dirty(),
    }
}

async fn connect_source(
    shared: Arc<EngineShared>,
    source: CalendarSource,
    kind: SourceKind,
    generation: u64,
) {
    let uid = source.uid.clone();

    let client = match shared.backend.connect(&source, kind).await {
        Ok(client) => client,
        Err(err) => {
            if let Some(entry) = shared.sources.lock().get_mut(&uid) {
                if entry.generation == generation {
                    entry.connecting = false;
                }
            }
            log_failure(&uid, "connect", &err);
            return;
        }
    };

    {
        let mut sources = shared.sources.lock();
        let Some(entry) = sources.get_mut(&uid).filter(|entry| entry.generation == generation)
        else {
            debug!(source_uid = %uid, "Discarding connection to a source that went away");
            return;
        };
        entry.connecting = false;
        entry.connection =
            Some(Connection { client: Arc::clone(&client), view: None, cache: HashMap::new() });
    }
    info!(source_uid = %uid, %kind, "Source connected");
    shared.scheduler.mark_dirty();

    let view = match client.get_view(ALL_OBJECTS_FILTER).await {
        Ok(view) => view,
        Err(err) => {
            log_failure(&uid, "open view", &err);
            return;
        }
    };

    let events = match view.start() {
        Ok(events) => events,
        Err(err) => {
            log_failure(&uid, "start view", &err);
            return;
        }
    };

    let listener = shared.spawn(listen(Arc::clone(&shared), uid.clone(), generation, events));
    let handle = ViewHandle { source_uid: uid.clone(), view, listener };

    let stale = {
        let mut sources = shared.sources.lock();
        match sources
            .get_mut(&uid)
            .filter(|entry| entry.generation == generation)
            .and_then(|entry| entry.connection.as_mut())
        {
            Some(connection) => {
                connection.view = Some(handle);
                None
            }
            None => Some(handle),
        }
    };

    match stale {
        None => debug!(source_uid = %uid, "Change view opened"),
        Some(handle) => {
            debug!(source_uid = %uid, "Discarding view of a source that went away");
            drop(handle);
        }
    }
}

async fn listen(
    shared: Arc<EngineShared>,
    uid: String,
    generation: u64,
    mut events: BoxStream<'static, ViewEvent>,
) {
    while let Some(event) = events.next().await {
        {
            let mut sources = shared.sources.lock();
            let Some(connection) = sources
                .get_mut(&uid)
                .filter(|entry| entry.generation == generation)
                .and_then(|entry| entry.connection.as_mut())
            else {
                return;
            };
            apply_view_event(&mut connection.cache, event);
        }
        shared.scheduler.mark_dirty();
    }
    debug!(source_uid = %uid, "Change view closed");
}

fn apply_view_event(cache: &mut HashMap<ComponentId, CalComponent>, event: ViewEvent) {
    match event {
        ViewEvent::ObjectsAdded(components) | ViewEvent::ObjectsModified(components) => {
            for component in components {
                cache.insert(component.id(), component);
            }
        }
        ViewEvent::ObjectsRemoved(ids) => {
            for id in ids {
                // Removing a series by bare uid removes its overrides too.
                if id.rid.is_none() {
                    cache.retain(|key, _| key.uid != id.uid);
                } else {
                    cache.remove(&id);
                }
            }
        }
    }
}
