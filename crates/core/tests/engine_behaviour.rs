//! Engine behaviour against scripted backend fakes.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use datebook_core::{AlarmInstance, AppointmentEngine, Engine, Instance, RegistryEvent, ViewEvent};
use datebook_domain::{
    AlarmAction, AlarmDefinition, AlarmTrigger, AppointmentType, Attendee, BatchConfig,
    CalComponent, CalDateTime, CalendarSource, Categories, ComponentId, ComponentStatus,
    DatebookError, Frequency, ParticipationStatus, RecurrenceRule, SourceExtension, Timezone,
};
use support::backend::{FakeBackend, FakeClient};
use support::{utc, wait_until};

fn naive(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
}

fn event(uid: &str, day: u32, hour: u32) -> CalComponent {
    CalComponent::event(
        uid,
        uid,
        CalDateTime::utc(naive(day, hour).and_utc()),
        CalDateTime::utc(naive(day, hour + 1).and_utc()),
    )
}

fn engine(backend: &FakeBackend) -> Engine {
    Engine::new(Arc::new(backend.clone()), &BatchConfig::default())
}

async fn connected(engine: &Engine, expected: &[&str]) -> bool {
    wait_until(|| engine.connected_sources() == expected).await
}

async fn query(engine: &Engine) -> Vec<datebook_domain::Appointment> {
    engine
        .appointments(utc(2021, 3, 1, 0, 0), utc(2021, 3, 31, 0, 0), Timezone::utc())
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn connects_enabled_calendars_and_task_lists() {
    // Arrange
    let mut disabled = CalendarSource::calendar("archive");
    disabled.enabled = false;
    let backend = FakeBackend::new()
        .with_source(CalendarSource::calendar("personal"), FakeClient::new("personal"))
        .with_source(CalendarSource::task_list("chores"), FakeClient::new("chores"))
        .with_source(
            CalendarSource::new("contacts", vec![SourceExtension::AddressBook]),
            FakeClient::new("contacts"),
        )
        .with_source(disabled, FakeClient::new("archive"));

    // Act
    let engine = engine(&backend);

    // Assert
    assert!(connected(&engine, &["chores", "personal"]).await);
    assert_eq!(backend.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn query_merges_sources_sorted_with_source_details() {
    let backend = FakeBackend::new()
        .with_source(
            CalendarSource::calendar("work").with_color("#ff0000"),
            FakeClient::new("work").with_object(event("review", 3, 15)),
        )
        .with_source(
            CalendarSource::calendar("home").with_color("#00ff00"),
            FakeClient::new("home")
                .with_object(event("dentist", 2, 9))
                .with_object(event("dinner", 3, 19)),
        );
    let engine = engine(&backend);
    assert!(connected(&engine, &["home", "work"]).await);

    let appointments = query(&engine).await;

    let uids: Vec<_> = appointments.iter().map(|a| a.uid.as_str()).collect();
    assert_eq!(uids, ["dentist", "review", "dinner"]);
    assert_eq!(appointments[1].color, "#ff0000");
    assert_eq!(appointments[1].source_uid, "work");
    assert_eq!(appointments[2].color, "#00ff00");
    assert!(appointments.windows(2).all(|pair| pair[0].begin <= pair[1].begin));
}

#[tokio::test(start_paused = true)]
async fn refused_connection_only_loses_that_source() {
    let backend = FakeBackend::new()
        .with_source(
            CalendarSource::calendar("flaky"),
            FakeClient::new("flaky").with_object(event("lost", 2, 9)),
        )
        .with_source(
            CalendarSource::calendar("solid"),
            FakeClient::new("solid").with_object(event("kept", 2, 10)),
        )
        .refuse_connection("flaky");
    let engine = engine(&backend);
    assert!(connected(&engine, &["solid"]).await);

    let appointments = query(&engine).await;

    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].uid, "kept");
}

#[tokio::test(start_paused = true)]
async fn uninteresting_components_never_appear() {
    let mut declined = event("declined", 2, 9);
    declined.attendees.push(Attendee {
        email: "mailto:me@example.com".into(),
        status: ParticipationStatus::Declined,
    });
    let mut cancelled = event("cancelled", 2, 10);
    cancelled.status = ComponentStatus::Cancelled;
    let mut disabled = event("disabled", 2, 11);
    disabled.categories = Categories::from_strings(["x-canonical-disabled"]);
    let mut declined_by_other = event("other-declined", 2, 12);
    declined_by_other.attendees.push(Attendee {
        email: "mailto:you@example.com".into(),
        status: ParticipationStatus::Declined,
    });

    let client = FakeClient::new("personal")
        .with_email("me@example.com")
        .with_object(declined)
        .with_object(cancelled)
        .with_object(disabled)
        .with_object(declined_by_other);
    let backend =
        FakeBackend::new().with_source(CalendarSource::calendar("personal"), client);
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    let appointments = query(&engine).await;

    let uids: Vec<_> = appointments.iter().map(|a| a.uid.as_str()).collect();
    assert_eq!(uids, ["other-declined"]);
}

#[tokio::test(start_paused = true)]
async fn alarms_with_same_trigger_collapse() {
    let component = event("standup", 2, 9);
    let trigger = Utc.with_ymd_and_hms(2021, 3, 2, 8, 50, 0).unwrap();
    let occur_start = naive(2, 9).and_utc();
    let occur_end = naive(2, 10).and_utc();
    let firing = |action, description: Option<&str>, attachment: Option<&str>| {
        let mut alarm = AlarmDefinition::new("a", action, AlarmTrigger::RelativeStart(-600));
        alarm.description = description.map(str::to_string);
        alarm.attachment = attachment.map(str::to_string);
        AlarmInstance {
            component: ComponentId::new("standup"),
            trigger,
            occur_start,
            occur_end,
            alarm,
        }
    };
    let mut with_alarms = component.clone();
    with_alarms.alarms.push(firing(AlarmAction::Display, None, None).alarm);

    let client = FakeClient::new("personal")
        .with_object(with_alarms)
        .with_alarm(firing(AlarmAction::Display, Some("Standup in 10"), None))
        .with_alarm(firing(AlarmAction::Audio, None, Some("file:///bell.ogg")));
    let backend =
        FakeBackend::new().with_source(CalendarSource::calendar("personal"), client);
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    let appointments = query(&engine).await;

    assert_eq!(appointments.len(), 1);
    let alarms = &appointments[0].alarms;
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].time.instant(), trigger);
    assert_eq!(alarms[0].text, "Standup in 10");
    assert_eq!(alarms[0].audio_url, "file:///bell.ogg");
}

#[tokio::test(start_paused = true)]
async fn tzids_resolve_through_the_lookup_chain() {
    let zoned = |uid: &str, tzid: &str| {
        let start = CalDateTime::zoned(naive(2, 9), tzid);
        let end = CalDateTime::zoned(naive(2, 10), tzid);
        CalComponent::event(uid, uid, start, end)
    };
    let client = FakeClient::new("personal")
        .with_vtimezone("Custom Eastern", "America/New_York")
        .with_object(zoned("olson", "Europe/Berlin"))
        .with_object(zoned("vtimezone", "Custom Eastern"))
        .with_object(zoned("legacy", "/softwarestudio.org/Olson_20011030_5/Asia/Tokyo"))
        .with_object(zoned("unknown", "Nowhere/Special"));
    let backend =
        FakeBackend::new().with_source(CalendarSource::calendar("personal"), client);
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    let appointments = query(&engine).await;

    let begin_of = |uid: &str| {
        appointments.iter().find(|a| a.uid == uid).map(|a| a.begin.instant()).unwrap()
    };
    assert_eq!(begin_of("olson"), Utc.with_ymd_and_hms(2021, 3, 2, 8, 0, 0).unwrap());
    assert_eq!(begin_of("vtimezone"), Utc.with_ymd_and_hms(2021, 3, 2, 14, 0, 0).unwrap());
    assert_eq!(begin_of("legacy"), Utc.with_ymd_and_hms(2021, 3, 2, 0, 0, 0).unwrap());
    assert_eq!(begin_of("unknown"), Utc.with_ymd_and_hms(2021, 3, 2, 9, 0, 0).unwrap());
}

#[tokio::test(start_paused = true)]
async fn occurrences_without_start_are_skipped() {
    let mut broken = event("broken", 2, 9);
    broken.dtstart = None;
    let client = FakeClient::new("personal")
        .with_instance(Instance { component: broken, start: None, end: None })
        .with_object(event("fine", 2, 10));
    let backend =
        FakeBackend::new().with_source(CalendarSource::calendar("personal"), client);
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    let appointments = query(&engine).await;

    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].uid, "fine");
}

#[tokio::test(start_paused = true)]
async fn occurrences_without_end_end_when_they_begin() {
    let mut reminder = event("reminder", 4, 8);
    reminder.dtend = None;
    let start = CalDateTime::utc(naive(4, 8).and_utc());
    let client = FakeClient::new("personal").with_instance(Instance {
        component: reminder,
        start: Some(start),
        end: None,
    });
    let backend =
        FakeBackend::new().with_source(CalendarSource::calendar("personal"), client);
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    let appointments = query(&engine).await;

    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].begin, utc(2021, 3, 4, 8, 0));
    assert_eq!(appointments[0].end, appointments[0].begin);
}

#[tokio::test(start_paused = true)]
async fn view_changes_coalesce_into_one_changed_signal() {
    let backend = FakeBackend::new()
        .with_source(CalendarSource::calendar("personal"), FakeClient::new("personal"));
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let mut changed = engine.changed();

    let client = backend.client("personal");
    client.emit(ViewEvent::ObjectsAdded(vec![event("a", 2, 9)]));
    client.emit(ViewEvent::ObjectsModified(vec![event("a", 2, 10)]));
    client.emit(ViewEvent::ObjectsAdded(vec![event("b", 3, 9)]));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(changed.try_recv().is_ok());
    assert!(changed.try_recv().is_err());

    let cached = engine.cached_components("personal");
    let summaries: Vec<_> = cached.iter().map(|c| c.uid.as_str()).collect();
    assert_eq!(summaries, ["a", "b"]);
    assert_eq!(cached[0].dtstart, event("a", 2, 10).dtstart);
}

#[tokio::test(start_paused = true)]
async fn disabling_a_source_tears_down_its_connection() {
    let backend = FakeBackend::new()
        .with_source(CalendarSource::calendar("personal"), FakeClient::new("personal"));
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let client = backend.client("personal");
    assert!(!client.view_stopped());

    backend.emit(RegistryEvent::Disabled("personal".into()));

    assert!(connected(&engine, &[]).await);
    assert!(wait_until(|| client.view_stopped()).await);
}

#[tokio::test(start_paused = true)]
async fn changed_source_is_reconnected_when_enabled() {
    let mut source = CalendarSource::calendar("personal");
    source.enabled = false;
    let backend = FakeBackend::new().with_source(source.clone(), FakeClient::new("personal"));
    let engine = engine(&backend);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.connected_sources().is_empty());

    source.enabled = true;
    backend.emit(RegistryEvent::Changed(source));

    assert!(connected(&engine, &["personal"]).await);
}

#[tokio::test(start_paused = true)]
async fn added_source_is_connected() {
    let backend = FakeBackend::new();
    let engine = engine(&backend);
    tokio::time::sleep(Duration::from_millis(100)).await;

    backend.add_client("late", FakeClient::new("late"));
    backend.emit(RegistryEvent::Added(CalendarSource::calendar("late")));

    assert!(connected(&engine, &["late"]).await);

    backend.emit(RegistryEvent::Removed("late".into()));
    assert!(connected(&engine, &[]).await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_queries() {
    let backend = FakeBackend::new().with_source(
        CalendarSource::calendar("personal"),
        FakeClient::new("personal").with_object(event("a", 2, 9)),
    );
    let engine = engine(&backend);
    assert!(connected(&engine, &["personal"]).await);

    engine.shutdown().await;

    let result = engine
        .appointments(utc(2021, 3, 1, 0, 0), utc(2021, 3, 31, 0, 0), Timezone::utc())
        .await;
    assert_eq!(result, Err(DatebookError::Cancelled));
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn only_one_shot_alarms_are_disabled() {
    let mut once = event("wake-once", 2, 7);
    once.categories = Categories::from_strings(["x-canonical-alarm"]);
    let mut daily = event("wake-daily", 2, 8);
    daily.categories = Categories::from_strings(["x-canonical-alarm"]);
    daily.rrules.push(RecurrenceRule::new(Frequency::Daily));
    let meeting = event("meeting", 2, 9);

    let backend = FakeBackend::new().with_source(
        CalendarSource::calendar("alarms"),
        FakeClient::new("alarms").with_object(once).with_object(daily).with_object(meeting),
    );
    let engine = engine(&backend);
    assert!(connected(&engine, &["alarms"]).await);
    let appointments = query(&engine).await;
    let kinds: Vec<_> = appointments.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        [AppointmentType::UbuntuAlarm, AppointmentType::UbuntuAlarm, AppointmentType::Event]
    );

    for appointment in &appointments {
        engine.disable_ubuntu_alarm(appointment);
    }

    let client = backend.client("alarms");
    assert!(wait_until(|| !client.modified().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let modified = client.modified();
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].uid, "wake-once");
    assert_eq!(
        modified[0].categories.to_strings(),
        vec!["x-canonical-alarm", "x-canonical-disabled"]
    );
}
