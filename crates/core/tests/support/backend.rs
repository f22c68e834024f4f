use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use datebook_core::{
    AlarmInstance, CalendarBackend, CalendarClient, ClientView, Instance, RegistryEvent,
    SourceRegistry, ViewEvent,
};
use datebook_domain::{
    CalComponent, CalendarSource, DatebookError, DateTime, Result as DomainResult,
    SourceExtension, SourceKind, Timezone,
};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

fn broadcast_stream<T: Clone + Send + 'static>(
    receiver: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(item) => return Some((item, receiver)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// Scripted backend: sources, per-source instance lists and failures are
/// set up by the test; nothing is computed.
#[derive(Clone, Default)]
pub struct FakeBackend {
    registry: Arc<FakeRegistry>,
    clients: Arc<Mutex<HashMap<String, Arc<FakeClient>>>>,
    refuse: Arc<Mutex<HashSet<String>>>,
    connects: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source and the client it will connect to.
    pub fn with_source(self, source: CalendarSource, client: FakeClient) -> Self {
        self.clients.lock().unwrap().insert(source.uid.clone(), Arc::new(client));
        self.registry.sources.lock().unwrap().push(source);
        self
    }

    pub fn refuse_connection(self, uid: &str) -> Self {
        self.refuse.lock().unwrap().insert(uid.to_string());
        self
    }

    pub fn client(&self, uid: &str) -> Arc<FakeClient> {
        Arc::clone(&self.clients.lock().unwrap()[uid])
    }

    pub fn add_client(&self, uid: &str, client: FakeClient) {
        self.clients.lock().unwrap().insert(uid.to_string(), Arc::new(client));
    }

    pub fn emit(&self, event: RegistryEvent) {
        let _ = self.registry.events.send(event);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarBackend for FakeBackend {
    async fn open_registry(&self) -> DomainResult<Arc<dyn SourceRegistry>> {
        Ok(self.registry.clone())
    }

    async fn connect(
        &self,
        source: &CalendarSource,
        _kind: SourceKind,
    ) -> DomainResult<Arc<dyn CalendarClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.lock().unwrap().contains(&source.uid) {
            return Err(DatebookError::Backend(format!("{} refused connection", source.uid)));
        }
        let client = self.clients.lock().unwrap().get(&source.uid).cloned();
        match client {
            Some(client) => Ok(client),
            None => Err(DatebookError::NotFound(source.uid.clone())),
        }
    }
}

pub struct FakeRegistry {
    sources: Mutex<Vec<CalendarSource>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self { sources: Mutex::new(Vec::new()), events: broadcast::channel(64).0 }
    }
}

#[async_trait]
impl SourceRegistry for FakeRegistry {
    async fn list_sources(&self, extension: SourceExtension) -> DomainResult<Vec<CalendarSource>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .filter(|source| source.extensions.contains(&extension))
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> BoxStream<'static, RegistryEvent> {
        broadcast_stream(self.events.subscribe())
    }
}

/// Scripted client returning fixed instances and alarm firings.
pub struct FakeClient {
    uid: String,
    email: Option<String>,
    instances: Mutex<Vec<Instance>>,
    objects: Mutex<Vec<CalComponent>>,
    alarms: Mutex<Vec<AlarmInstance>>,
    vtimezones: HashMap<String, String>,
    modified: Mutex<Vec<CalComponent>>,
    view_events: broadcast::Sender<ViewEvent>,
    view_stopped: Arc<AtomicBool>,
}

impl FakeClient {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: None,
            instances: Mutex::new(Vec::new()),
            objects: Mutex::new(Vec::new()),
            alarms: Mutex::new(Vec::new()),
            vtimezones: HashMap::new(),
            modified: Mutex::new(Vec::new()),
            view_events: broadcast::channel(64).0,
            view_stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_vtimezone(mut self, tzid: &str, location: &str) -> Self {
        self.vtimezones.insert(tzid.to_string(), location.to_string());
        self
    }

    /// Store `component` and generate one instance spanning its DTSTART to
    /// DTEND.
    pub fn with_object(self, component: CalComponent) -> Self {
        self.instances.lock().unwrap().push(Instance {
            start: component.dtstart.clone(),
            end: component.dtend.clone(),
            component: component.clone(),
        });
        self.objects.lock().unwrap().push(component);
        self
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        self.instances.lock().unwrap().push(instance);
        self
    }

    pub fn with_alarm(self, alarm: AlarmInstance) -> Self {
        self.alarms.lock().unwrap().push(alarm);
        self
    }

    pub fn modified(&self) -> Vec<CalComponent> {
        self.modified.lock().unwrap().clone()
    }

    pub fn view_stopped(&self) -> bool {
        self.view_stopped.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: ViewEvent) {
        let _ = self.view_events.send(event);
    }
}

#[async_trait]
impl CalendarClient for FakeClient {
    fn source_uid(&self) -> &str {
        &self.uid
    }

    fn user_email(&self) -> Option<String> {
        self.email.clone()
    }

    fn generate_instances(
        &self,
        _begin: DateTime,
        _end: DateTime,
        _default_zone: Timezone,
    ) -> BoxStream<'static, DomainResult<Instance>> {
        let instances = self.instances.lock().unwrap().clone();
        stream::iter(instances.into_iter().map(Ok)).boxed()
    }

    async fn get_objects_for_uid(&self, uid: &str) -> DomainResult<Vec<CalComponent>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|component| component.uid == uid)
            .cloned()
            .collect())
    }

    async fn get_object(&self, uid: &str) -> DomainResult<Option<CalComponent>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .find(|component| component.uid == uid && component.recurrence_id.is_none())
            .cloned())
    }

    async fn modify_object(&self, component: &CalComponent) -> DomainResult<()> {
        self.modified.lock().unwrap().push(component.clone());
        Ok(())
    }

    async fn get_view(&self, _filter: &str) -> DomainResult<Arc<dyn ClientView>> {
        Ok(Arc::new(FakeView {
            events: self.view_events.clone(),
            stopped: Arc::clone(&self.view_stopped),
        }))
    }

    async fn resolve_tzid(&self, tzid: &str) -> DomainResult<Option<String>> {
        Ok(self.vtimezones.get(tzid).cloned())
    }

    async fn generate_alarms(
        &self,
        components: &[CalComponent],
        _begin: DateTime,
        _end: DateTime,
        _default_zone: Timezone,
    ) -> DomainResult<Vec<AlarmInstance>> {
        let uids: HashSet<&str> = components.iter().map(|c| c.uid.as_str()).collect();
        Ok(self
            .alarms
            .lock()
            .unwrap()
            .iter()
            .filter(|alarm| uids.contains(alarm.component.uid.as_str()))
            .cloned()
            .collect())
    }
}

struct FakeView {
    events: broadcast::Sender<ViewEvent>,
    stopped: Arc<AtomicBool>,
}

impl ClientView for FakeView {
    fn start(&self) -> DomainResult<BoxStream<'static, ViewEvent>> {
        Ok(broadcast_stream(self.events.subscribe()))
    }

    fn stop(&self) -> DomainResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}
