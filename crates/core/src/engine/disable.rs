//! Retiring one-shot clock alarms after they fire

use std::sync::Arc;

use datebook_domain::{Appointment, ComponentTag, DatebookError};
use tracing::{debug, info};

use super::EngineShared;
use crate::calendar_ports::CalendarClient;
use crate::log_failure;

/// Tag the component behind a one-shot alarm as disabled in every source
/// that holds it. Recurring alarms are left alone so future occurrences
/// still ring. Failures are logged and absorbed.
pub(crate) fn disable_ubuntu_alarm(shared: &Arc<EngineShared>, appointment: &Appointment) {
    if !appointment.is_ubuntu_alarm() {
        return;
    }

    for (source, client) in shared.connected_clients() {
        let uid = appointment.uid.clone();
        shared.spawn(async move { disable_in_client(client.as_ref(), &source.uid, &uid).await });
    }
}

async fn disable_in_client(client: &dyn CalendarClient, source_uid: &str, uid: &str) {
    let mut component = match client.get_object(uid).await {
        Ok(Some(component)) => component,
        Ok(None) | Err(DatebookError::NotFound(_)) => return,
        Err(err) => {
            log_failure(source_uid, "get object", &err);
            return;
        }
    };

    if !component.is_one_shot() {
        debug!(source_uid, uid, "Leaving recurring alarm enabled");
        return;
    }
    if !component.categories.insert(ComponentTag::Disabled) {
        return;
    }

    match client.modify_object(&component).await {
        Ok(()) => info!(source_uid, uid, "Disabled one-shot alarm"),
        Err(err) => log_failure(source_uid, "modify object", &err),
    }
}
