//! Which calendar components are surfaced at all

use datebook_domain::{CalComponent, ComponentKind, ComponentStatus, ComponentTag, ParticipationStatus};

/// Whether a component belongs in query results.
///
/// Events and tasks only; nothing completed or cancelled; nothing tagged
/// disabled; nothing the user declined. Other attendees' answers do not
/// matter, and neither does the user's absence from the attendee list.
pub fn is_interesting(component: &CalComponent, user_email: Option<&str>) -> bool {
    if !matches!(component.kind, ComponentKind::Event | ComponentKind::Todo) {
        return false;
    }

    if matches!(component.status, ComponentStatus::Completed | ComponentStatus::Cancelled) {
        return false;
    }

    if component.has_tag(ComponentTag::Disabled) {
        return false;
    }

    !declined_by(component, user_email)
}

fn declined_by(component: &CalComponent, user_email: Option<&str>) -> bool {
    let Some(user) = user_email.map(normalize_address).filter(|user| !user.is_empty()) else {
        return false;
    };

    component
        .attendees
        .iter()
        .filter(|attendee| normalize_address(&attendee.email) == user)
        .any(|attendee| attendee.status == ParticipationStatus::Declined)
}

fn normalize_address(address: &str) -> String {
    let address = address.trim();
    let bare = match address.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &address[7..],
        _ => address,
    };
    bare.trim().to_lowercase()
}
