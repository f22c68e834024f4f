//! Calendar backend port interfaces
//!
//! The engine never talks to a calendar service directly. Everything it
//! needs (source discovery, connections, instance generation, alarm
//! generation, change notification) goes through these traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use datebook_domain::{
    AlarmDefinition, CalComponent, CalDateTime, CalendarSource, ComponentId, DateTime, Result,
    SourceExtension, SourceKind, Timezone,
};
use futures::stream::BoxStream;

/// Source lifecycle notification from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A new source was configured.
    Added(CalendarSource),
    /// The source with this uid is gone.
    Removed(String),
    /// A disabled source was switched back on.
    Enabled(CalendarSource),
    /// The source with this uid was switched off.
    Disabled(String),
    /// Name, colour or extensions of a source changed.
    Changed(CalendarSource),
}

/// Change notification from an open view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// New objects, or the initial contents after `start`.
    ObjectsAdded(Vec<CalComponent>),
    /// Objects replaced by a newer revision.
    ObjectsModified(Vec<CalComponent>),
    /// Objects deleted from the calendar.
    ObjectsRemoved(Vec<ComponentId>),
}

/// One generated occurrence: the component that produced it (the series
/// master or a detached override) with the occurrence bounds. Backends pass
/// malformed components through with `start` unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Series master or detached override.
    pub component: CalComponent,
    /// Occurrence start; `None` for malformed components.
    pub start: Option<CalDateTime>,
    /// Occurrence end; `None` when the component declares no end.
    pub end: Option<CalDateTime>,
}

/// One alarm firing for one occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmInstance {
    /// Component the alarm belongs to.
    pub component: ComponentId,
    /// When this firing goes off.
    pub trigger: chrono::DateTime<Utc>,
    /// Start of the occurrence the firing belongs to.
    pub occur_start: chrono::DateTime<Utc>,
    /// End of that occurrence.
    pub occur_end: chrono::DateTime<Utc>,
    /// The VALARM that fired.
    pub alarm: AlarmDefinition,
}

/// Entry point to a calendar service
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Registry of configured sources.
    async fn open_registry(&self) -> Result<Arc<dyn SourceRegistry>>;

    /// Open a client for a source, as an event calendar or a task list.
    async fn connect(
        &self,
        source: &CalendarSource,
        kind: SourceKind,
    ) -> Result<Arc<dyn CalendarClient>>;
}

/// Live set of configured sources
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Sources declaring `extension`.
    async fn list_sources(&self, extension: SourceExtension) -> Result<Vec<CalendarSource>>;

    /// Events emitted after this call. Callers subscribe before listing so
    /// that nothing falls between the two.
    fn subscribe(&self) -> BoxStream<'static, RegistryEvent>;
}

/// Connection to one source
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Uid of the source this client is connected to.
    fn source_uid(&self) -> &str;

    /// Address of the account owner, used to find the user among attendees.
    fn user_email(&self) -> Option<String>;

    /// Occurrences overlapping `[begin, end]`. Floating and all-day values
    /// are placed in `default_zone`. Dropping the stream stops generation.
    fn generate_instances(
        &self,
        begin: DateTime,
        end: DateTime,
        default_zone: Timezone,
    ) -> BoxStream<'static, Result<Instance>>;

    /// The series master and every detached override sharing `uid`.
    async fn get_objects_for_uid(&self, uid: &str) -> Result<Vec<CalComponent>>;

    /// The series master (or the one-off object) for `uid`.
    async fn get_object(&self, uid: &str) -> Result<Option<CalComponent>>;

    /// Replace the stored object with the same id.
    async fn modify_object(&self, component: &CalComponent) -> Result<()>;

    /// Open a change view over the objects matching `filter`.
    async fn get_view(&self, filter: &str) -> Result<Arc<dyn ClientView>>;

    /// Look up a TZID defined by a VTIMEZONE stored with the calendar.
    /// Returns the zone's location name.
    async fn resolve_tzid(&self, tzid: &str) -> Result<Option<String>>;

    /// Alarm firings with triggers inside `[begin, end]` for the given
    /// recurrence set, one record per alarm definition and occurrence.
    async fn generate_alarms(
        &self,
        components: &[CalComponent],
        begin: DateTime,
        end: DateTime,
        default_zone: Timezone,
    ) -> Result<Vec<AlarmInstance>>;
}

/// Change subscription over a client's objects
pub trait ClientView: Send + Sync {
    /// Start delivering events. The current contents arrive first as
    /// `ObjectsAdded`.
    fn start(&self) -> Result<BoxStream<'static, ViewEvent>>;

    /// Stop delivering events; the stream returned by `start` ends.
    fn stop(&self) -> Result<()>;
}
