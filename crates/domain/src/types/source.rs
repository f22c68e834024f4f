//! Calendar source descriptors as reported by the source registry

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Capability extension a source declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceExtension {
    Calendar,
    TaskList,
    MemoList,
    AddressBook,
}

impl_domain_status_conversions!(SourceExtension {
    Calendar => "calendar",
    TaskList => "task_list",
    MemoList => "memo_list",
    AddressBook => "address_book",
});

/// Which kind of client a source is opened as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Events,
    Tasks,
}

impl_domain_status_conversions!(SourceKind {
    Events => "events",
    Tasks => "tasks",
});

impl SourceKind {
    /// Calendars win over task lists when a source declares both. Sources
    /// with neither are not ours to watch.
    pub fn from_extensions(extensions: &[SourceExtension]) -> Option<Self> {
        if extensions.contains(&SourceExtension::Calendar) {
            Some(Self::Events)
        } else if extensions.contains(&SourceExtension::TaskList) {
            Some(Self::Tasks)
        } else {
            None
        }
    }

    pub fn extension(&self) -> SourceExtension {
        match self {
            Self::Events => SourceExtension::Calendar,
            Self::Tasks => SourceExtension::TaskList,
        }
    }
}

/// One calendar or task list known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub uid: String,
    pub display_name: String,
    pub enabled: bool,
    pub extensions: Vec<SourceExtension>,
    /// Display colour, e.g. `#3465a4`. Empty when the source has none.
    pub color: String,
}

impl CalendarSource {
    pub fn new(uid: impl Into<String>, extensions: Vec<SourceExtension>) -> Self {
        let uid = uid.into();
        Self {
            display_name: uid.clone(),
            uid,
            enabled: true,
            extensions,
            color: String::new(),
        }
    }

    /// An enabled event calendar.
    pub fn calendar(uid: impl Into<String>) -> Self {
        Self::new(uid, vec![SourceExtension::Calendar])
    }

    /// An enabled task list.
    pub fn task_list(uid: impl Into<String>) -> Self {
        Self::new(uid, vec![SourceExtension::TaskList])
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// How the engine connects to this source, if at all.
    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_extensions(&self.extensions)
    }
}
