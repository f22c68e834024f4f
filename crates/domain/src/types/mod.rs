//! Domain types and models

pub mod appointment;
pub mod component;
pub mod datetime;
pub mod source;

pub use appointment::{Alarm, Appointment, AppointmentType};
pub use component::{
    AlarmAction, AlarmDefinition, AlarmTrigger, Attendee, CalComponent, CalDateTime, Categories,
    ComponentId, ComponentKind, ComponentStatus, ComponentTag, Frequency, ParticipationStatus,
    RecurrenceRule,
};
pub use datetime::{DateTime, Timezone};
pub use source::{CalendarSource, SourceExtension, SourceKind};
