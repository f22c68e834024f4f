//! Connection to one in-memory calendar

use std::sync::Arc;

use async_trait::async_trait;
use datebook_core::{AlarmInstance, CalendarClient, ClientView, Instance};
use datebook_domain::{
    CalComponent, ComponentId, ComponentKind, DatebookError, DateTime, Result, SourceKind,
    Timezone,
};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, trace};

use super::alarms::generate_alarms;
use super::recurrence::{expand_series, group_series, ZoneContext};
use super::store::CalendarStore;
use super::view::MemoryView;
use super::Failures;

/// Connection to one in-memory source.
pub struct MemoryClient {
    source_uid: String,
    kind: SourceKind,
    store: Arc<CalendarStore>,
    failures: Arc<Failures>,
}

impl MemoryClient {
    pub(crate) fn new(
        source_uid: String,
        kind: SourceKind,
        store: Arc<CalendarStore>,
        failures: Arc<Failures>,
    ) -> Self {
        Self { source_uid, kind, store, failures }
    }

    /// Whether this connection serves events or tasks.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    fn zones(&self, default_zone: Timezone) -> ZoneContext {
        ZoneContext::new(self.store.vtimezones(), default_zone)
    }

    /// Stored objects this connection serves: events for calendars, tasks
    /// for task lists.
    fn served(&self) -> Vec<CalComponent> {
        let kind = match self.kind {
            SourceKind::Events => ComponentKind::Event,
            SourceKind::Tasks => ComponentKind::Todo,
        };
        let mut objects = self.store.snapshot();
        objects.retain(|component| component.kind == kind);
        objects
    }
}

#[async_trait]
impl CalendarClient for MemoryClient {
    fn source_uid(&self) -> &str {
        &self.source_uid
    }

    fn user_email(&self) -> Option<String> {
        self.store.user_email()
    }

    fn generate_instances(
        &self,
        begin: DateTime,
        end: DateTime,
        default_zone: Timezone,
    ) -> BoxStream<'static, Result<Instance>> {
        let zones = self.zones(default_zone);
        let objects = self.served();
        let mut instances = Vec::new();

        for series in group_series(&objects) {
            if series.master.dtstart.is_none() {
                instances.push(Instance { component: series.master.clone(), start: None, end: None });
                continue;
            }
            for occurrence in expand_series(&series, begin.instant(), end.instant(), &zones) {
                instances.push(Instance {
                    component: occurrence.component,
                    start: Some(occurrence.start),
                    end: occurrence.end,
                });
            }
        }

        trace!(source_uid = %self.source_uid, count = instances.len(), "Generated instances");
        stream::iter(instances.into_iter().map(Ok)).boxed()
    }

    async fn get_objects_for_uid(&self, uid: &str) -> Result<Vec<CalComponent>> {
        let objects = self.store.objects_for_uid(uid);
        if objects.is_empty() {
            return Err(DatebookError::NotFound(format!("object {uid}")));
        }
        Ok(objects)
    }

    async fn get_object(&self, uid: &str) -> Result<Option<CalComponent>> {
        Ok(self.store.get(&ComponentId::new(uid)))
    }

    async fn modify_object(&self, component: &CalComponent) -> Result<()> {
        self.store.modify(component.clone())?;
        debug!(source_uid = %self.source_uid, uid = %component.uid, "Object modified");
        Ok(())
    }

    async fn get_view(&self, filter: &str) -> Result<Arc<dyn ClientView>> {
        if self.failures.view_refused(&self.source_uid) {
            return Err(DatebookError::Backend(format!(
                "{}: view could not be opened",
                self.source_uid
            )));
        }
        Ok(Arc::new(MemoryView::open(Arc::clone(&self.store), filter)?))
    }

    async fn resolve_tzid(&self, tzid: &str) -> Result<Option<String>> {
        Ok(self.store.vtimezone(tzid))
    }

    async fn generate_alarms(
        &self,
        components: &[CalComponent],
        begin: DateTime,
        end: DateTime,
        default_zone: Timezone,
    ) -> Result<Vec<AlarmInstance>> {
        let zones = self.zones(default_zone);
        Ok(generate_alarms(components, begin.instant(), end.instant(), &zones))
    }
}
