//! Source registry watcher

use std::sync::Arc;

use datebook_domain::SourceExtension;
use futures::StreamExt;
use tracing::{debug, info};

use super::source::{
    on_source_added, on_source_changed, on_source_disabled, on_source_enabled, on_source_removed,
};
use super::EngineShared;
use crate::calendar_ports::RegistryEvent;
use crate::log_failure;

const REGISTRY: &str = "registry";

/// Open the registry, record the sources it already knows about and follow
/// its events until the engine shuts down or the registry goes away.
pub(crate) async fn watch_registry(shared: Arc<EngineShared>) {
    let registry = match shared.backend.open_registry().await {
        Ok(registry) => registry,
        Err(err) => {
            log_failure(REGISTRY, "open registry", &err);
            return;
        }
    };

    let mut events = registry.subscribe();

    for extension in [SourceExtension::Calendar, SourceExtension::TaskList] {
        match registry.list_sources(extension).await {
            Ok(sources) => {
                debug!(%extension, count = sources.len(), "Listed sources");
                for source in sources {
                    on_source_added(&shared, source);
                }
            }
            Err(err) => log_failure(REGISTRY, "list sources", &err),
        }
    }
    info!("Watching source registry");

    while let Some(event) = events.next().await {
        match event {
            RegistryEvent::Added(source) => on_source_added(&shared, source),
            RegistryEvent::Enabled(source) => on_source_enabled(&shared, source),
            RegistryEvent::Changed(source) => on_source_changed(&shared, source),
            RegistryEvent::Disabled(uid) => on_source_disabled(&shared, &uid),
            RegistryEvent::Removed(uid) => on_source_removed(&shared, &uid),
        }
    }

    debug!("Source registry closed");
}
