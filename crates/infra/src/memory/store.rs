//! Objects stored for one in-memory calendar
//!
//! Every mutation is broadcast to open views as a [`ViewEvent`].

use std::collections::{BTreeMap, HashMap};

use datebook_core::ViewEvent;
use datebook_domain::{CalComponent, ComponentId, DatebookError, Result};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

const VIEW_EVENT_CAPACITY: usize = 256;

/// Objects, VTIMEZONEs and owner address of one in-memory calendar.
pub struct CalendarStore {
    objects: RwLock<BTreeMap<ComponentId, CalComponent>>,
    vtimezones: RwLock<HashMap<String, String>>,
    user_email: RwLock<Option<String>>,
    events: broadcast::Sender<ViewEvent>,
}

impl Default for CalendarStore {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            vtimezones: RwLock::new(HashMap::new()),
            user_email: RwLock::new(None),
            events: broadcast::channel(VIEW_EVENT_CAPACITY).0,
        }
    }
}

impl CalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, replacing one with the same identity.
    pub fn insert(&self, component: CalComponent) {
        let id = component.id();
        let replaced = self.objects.write().insert(id.clone(), component.clone()).is_some();
        trace!(uid = %id.uid, replaced, "Stored object");
        if replaced {
            self.notify(ViewEvent::ObjectsModified(vec![component]));
        } else {
            self.notify(ViewEvent::ObjectsAdded(vec![component]));
        }
    }

    /// Replace an existing object.
    ///
    /// # Errors
    /// `DatebookError::NotFound` if no object has the component's identity.
    pub fn modify(&self, component: CalComponent) -> Result<()> {
        let id = component.id();
        {
            let mut objects = self.objects.write();
            let Some(slot) = objects.get_mut(&id) else {
                return Err(DatebookError::NotFound(format!("object {}", id.uid)));
            };
            *slot = component.clone();
        }
        self.notify(ViewEvent::ObjectsModified(vec![component]));
        Ok(())
    }

    /// Remove a series (master and overrides) or a single one-off object.
    /// Returns the identities removed.
    pub fn remove(&self, uid: &str) -> Vec<ComponentId> {
        let removed: Vec<ComponentId> = {
            let mut objects = self.objects.write();
            let ids: Vec<ComponentId> =
                objects.keys().filter(|id| id.uid == uid).cloned().collect();
            for id in &ids {
                objects.remove(id);
            }
            ids
        };
        if !removed.is_empty() {
            self.notify(ViewEvent::ObjectsRemoved(removed.clone()));
        }
        removed
    }

    /// Object stored under `id`.
    pub fn get(&self, id: &ComponentId) -> Option<CalComponent> {
        self.objects.read().get(id).cloned()
    }

    pub fn objects_for_uid(&self, uid: &str) -> Vec<CalComponent> {
        self.objects.read().values().filter(|c| c.uid == uid).cloned().collect()
    }

    /// Every stored object, ordered by id.
    pub fn snapshot(&self) -> Vec<CalComponent> {
        self.objects.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Record a VTIMEZONE stored with the calendar: its TZID and the zone
    /// location it describes.
    pub fn add_vtimezone(&self, tzid: impl Into<String>, location: impl Into<String>) {
        self.vtimezones.write().insert(tzid.into(), location.into());
    }

    pub fn vtimezone(&self, tzid: &str) -> Option<String> {
        self.vtimezones.read().get(tzid).cloned()
    }

    pub(crate) fn vtimezones(&self) -> HashMap<String, String> {
        self.vtimezones.read().clone()
    }

    pub fn set_user_email(&self, email: Option<String>) {
        *self.user_email.write() = email;
    }

    /// Address of the calendar owner.
    pub fn user_email(&self) -> Option<String> {
        self.user_email.read().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: ViewEvent) {
        // No receivers simply means no open views.
        let _ = self.events.send(event);
    }
}
