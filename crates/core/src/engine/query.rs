//! Appointment queries
//!
//! A query fans out to every connected client. Each client streams the
//! occurrences overlapping the window; occurrences are grouped by uid and
//! each uid is expanded on its own task (recurrence set fetch, alarm
//! generation, appointment building). All of these hold the query's
//! [`AppointmentTask`], which delivers once the last of them finishes.

use std::collections::HashMap;
use std::sync::Arc;

use datebook_domain::{CalComponent, ComponentId, DateTime, Timezone};
use futures::StreamExt;
use tracing::{debug, trace};

use super::task::AppointmentTask;
use super::EngineShared;
use crate::calendar_ports::CalendarClient;
use crate::engine_ports::AppointmentCallback;
use crate::expansion::{build_appointments, ResolvedInstance, SourceInfo};
use crate::filter::is_interesting;
use crate::log_failure;
use crate::timezone::ZoneResolver;

#[derive(Debug, Clone, Copy)]
struct Window {
    begin: DateTime,
    end: DateTime,
    zone: Timezone,
}

/// Occurrences of one uid within the window.
struct UidGroup {
    uid: String,
    instances: Vec<ResolvedInstance>,
}

impl UidGroup {
    /// Distinct components behind the occurrences, master first.
    fn components(&self) -> Vec<CalComponent> {
        let mut seen: Vec<ComponentId> = Vec::new();
        let mut components = Vec::new();
        for instance in &self.instances {
            let id = instance.component.id();
            if !seen.contains(&id) {
                seen.push(id);
                components.push(instance.component.clone());
            }
        }
        components.sort_by_key(|component| component.recurrence_id.is_some());
        components
    }

    fn has_recurrences(&self) -> bool {
        self.instances.iter().any(|instance| {
            instance.component.has_recurrences() || instance.component.recurrence_id.is_some()
        })
    }
}

pub(crate) fn get_appointments(
    shared: &Arc<EngineShared>,
    begin: DateTime,
    end: DateTime,
    zone: Timezone,
    callback: AppointmentCallback,
) {
    let clients = shared.connected_clients();
    debug!(%begin, %end, %zone, clients = clients.len(), "Querying appointments");

    let window = Window { begin, end, zone };
    let task = Arc::new(AppointmentTask::new(callback, shared.cancel.clone()));
    for (source, client) in clients {
        let query = query_client(Arc::clone(shared), client, source, window, Arc::clone(&task));
        shared.spawn(query);
    }
}

async fn query_client(
    shared: Arc<EngineShared>,
    client: Arc<dyn CalendarClient>,
    source: SourceInfo,
    window: Window,
    task: Arc<AppointmentTask>,
) {
    let user_email = client.user_email();
    let groups = collect_instances(client.as_ref(), &source, window).await;
    trace!(source_uid = %source.uid, uids = groups.len(), "Generated instances");

    for group in groups {
        if !group
            .instances
            .iter()
            .any(|instance| is_interesting(&instance.component, user_email.as_deref()))
        {
            continue;
        }
        let expand = expand_uid(
            Arc::clone(&client),
            source.clone(),
            window,
            user_email.clone(),
            group,
            Arc::clone(&task),
        );
        shared.spawn(expand);
    }
}

async fn collect_instances(
    client: &dyn CalendarClient,
    source: &SourceInfo,
    window: Window,
) -> Vec<UidGroup> {
    let mut resolver = ZoneResolver::new(window.zone);
    let mut groups: Vec<UidGroup> = Vec::new();
    let mut by_uid: HashMap<String, usize> = HashMap::new();

    let mut instances = client.generate_instances(window.begin, window.end, window.zone);
    while let Some(item) = instances.next().await {
        let instance = match item {
            Ok(instance) => instance,
            Err(err) => {
                log_failure(&source.uid, "generate instances", &err);
                break;
            }
        };

        let Some(start) = instance.start.as_ref() else {
            debug!(uid = %instance.component.uid, "Skipping occurrence without a start time");
            continue;
        };
        let begin = resolver.to_datetime(start, client).await;
        let end = match instance.end.as_ref() {
            Some(end) => resolver.to_datetime(end, client).await,
            None => begin,
        };

        let uid = instance.component.uid.clone();
        let index = *by_uid.entry(uid.clone()).or_insert_with(|| {
            groups.push(UidGroup { uid, instances: Vec::new() });
            groups.len() - 1
        });
        groups[index].instances.push(ResolvedInstance {
            component: instance.component,
            begin,
            end,
        });
    }

    groups
}

async fn expand_uid(
    client: Arc<dyn CalendarClient>,
    source: SourceInfo,
    window: Window,
    user_email: Option<String>,
    group: UidGroup,
    task: Arc<AppointmentTask>,
) {
    let components = if group.has_recurrences() {
        match client.get_objects_for_uid(&group.uid).await {
            Ok(components) if !components.is_empty() => components,
            Ok(_) => group.components(),
            Err(err) => {
                log_failure(&source.uid, "get objects for uid", &err);
                group.components()
            }
        }
    } else {
        group.components()
    };

    let alarms = if components.iter().any(|component| !component.alarms.is_empty()) {
        match client.generate_alarms(&components, window.begin, window.end, window.zone).await {
            Ok(alarms) => alarms,
            Err(err) => {
                log_failure(&source.uid, "generate alarms", &err);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let appointments = build_appointments(
        &group.instances,
        &components,
        &alarms,
        &source,
        window.zone,
        user_email.as_deref(),
    );
    trace!(uid = %group.uid, count = appointments.len(), "Expanded uid");
    task.extend(appointments);
}
