//! End-to-end sequence scenarios

use chrono::{DateTime, Duration, TimeZone, Utc};
use leadscope::mail::{
    record_open, wait_all, LogSender, MailDispatcher, MailQueue, VariableRenderer,
};
use leadscope::sequence::{enroll_request, EnrollRequest, SequenceEngine};
use leadscope::state::{ContactStage, EnrollmentStatus};
use leadscope::storage::{
    format_timestamp, lock_storage, shared, ContactFilter, NewContact, SharedStorage,
    SqliteStorage, StepCondition, Storage,
};
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
}

fn engine(storage: &SharedStorage) -> SequenceEngine {
    let (queue, _worker) =
        MailQueue::start(MailDispatcher::new(storage.clone(), Arc::new(LogSender)), 4);
    SequenceEngine::new(
        storage.clone(),
        Arc::new(VariableRenderer::new("Jan Dvořák", "LeadScope")),
        queue,
    )
}

/// Three new contacts, one client, and a three-step sequence (1, 2, 4 days)
fn seed() -> (SharedStorage, i64) {
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    for (name, domain, stage) in [
        ("Pekárna U Mlýna", "pekarna-umlyna.cz", ContactStage::New),
        ("Autoservis Kučera", "autoservis-kucera.cz", ContactStage::New),
        ("Květinářství Lilie", "kvetiny-lilie.cz", ContactStage::New),
        ("Zámečnictví Bureš", "zamecnictvi-bures.cz", ContactStage::Client),
    ] {
        storage
            .insert_contact(
                &NewContact {
                    business_name: Some(name.to_string()),
                    email: Some(format!("info@{}", domain)),
                    domain: Some(domain.to_string()),
                    stage: Some(stage),
                    ..Default::default()
                },
                start(),
            )
            .unwrap();
    }

    let first = storage
        .insert_template("Úvod", "Web pro {{firma}}", "<p>Dobrý den, {{firma}}.</p><p>{{odesilatel}}</p>")
        .unwrap();
    let second = storage
        .insert_template("Připomenutí", "Připomínám se", "<p>{{firma}}</p>")
        .unwrap();
    let sequence_id = storage.insert_sequence("Nové leady", true).unwrap();
    storage.insert_sequence_step(sequence_id, 0, first, 1, None).unwrap();
    storage
        .insert_sequence_step(
            sequence_id,
            1,
            second,
            2,
            Some(StepCondition {
                skip_if_replied: true,
                skip_if_opened: false,
            }),
        )
        .unwrap();
    storage.insert_sequence_step(sequence_id, 2, second, 4, None).unwrap();

    (shared(storage), sequence_id)
}

fn enroll_new(storage: &SharedStorage, sequence_id: i64) -> usize {
    let request = EnrollRequest {
        contact_ids: None,
        filter: Some(ContactFilter {
            stage: Some(ContactStage::New),
            ..Default::default()
        }),
    };
    let mut guard = lock_storage(storage).unwrap();
    enroll_request(&mut *guard, sequence_id, &request, start())
        .unwrap()
        .enrolled
}

#[tokio::test]
async fn test_first_step_for_filtered_contacts() {
    let (storage, sequence_id) = seed();
    assert_eq!(enroll_new(&storage, sequence_id), 3);

    let engine = engine(&storage);

    // Nothing is due before the first delay elapses
    assert_eq!(engine.tick(start() + Duration::hours(23)).unwrap().due, 0);

    let tick_at = start() + Duration::days(1) + Duration::minutes(5);
    let report = engine.tick(tick_at).unwrap();
    assert_eq!(report.sent, 3);
    let outcomes = wait_all(report.deliveries).await;
    assert!(outcomes.iter().all(|o| o.success));

    let guard = lock_storage(&storage).unwrap();
    let expected_next = format_timestamp(tick_at + Duration::days(2));
    for enrollment in guard.list_enrollments(sequence_id).unwrap() {
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(enrollment.current_step, 1);
        assert_eq!(enrollment.next_send_at.as_deref(), Some(expected_next.as_str()));

        let contact = guard.get_contact(enrollment.contact_id).unwrap().unwrap();
        assert_eq!(contact.stage, ContactStage::Contacted);

        let emails = guard.list_emails_for_contact(contact.id).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(
            emails[0].subject,
            format!("Web pro {}", contact.business_name.unwrap())
        );
    }
}

#[tokio::test]
async fn test_full_run_with_reply() {
    let (storage, sequence_id) = seed();
    enroll_new(&storage, sequence_id);
    let engine = engine(&storage);

    let day1 = start() + Duration::days(1);
    wait_all(engine.tick(day1).unwrap().deliveries).await;

    // One contact answers before the second step
    let replied = {
        let mut guard = lock_storage(&storage).unwrap();
        let enrollment = guard.list_enrollments(sequence_id).unwrap()[0].clone();
        guard
            .update_contact_stage(enrollment.contact_id, ContactStage::Responded, day1)
            .unwrap();
        enrollment.contact_id
    };

    let day3 = day1 + Duration::days(2);
    let report = engine.tick(day3).unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.completed, 1);
    wait_all(report.deliveries).await;

    let day7 = day3 + Duration::days(4);
    let report = engine.tick(day7).unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.completed, 2);
    wait_all(report.deliveries).await;

    let guard = lock_storage(&storage).unwrap();
    for enrollment in guard.list_enrollments(sequence_id).unwrap() {
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        let sent = guard.list_emails_for_contact(enrollment.contact_id).unwrap().len();
        if enrollment.contact_id == replied {
            assert_eq!(sent, 1);
        } else {
            assert_eq!(sent, 3);
        }
    }

    // Completed enrollments never come back
    drop(guard);
    assert_eq!(engine.tick(day7 + Duration::days(30)).unwrap().due, 0);
}

#[tokio::test]
async fn test_contact_losing_email_is_cancelled() {
    let (storage, sequence_id) = seed();
    let contact_id = {
        let mut guard = lock_storage(&storage).unwrap();
        let contact_id = guard
            .insert_contact(&NewContact::default(), start())
            .unwrap();
        leadscope::sequence::enroll(&mut *guard, sequence_id, &[contact_id], start()).unwrap();
        contact_id
    };

    let report = engine(&storage).tick(start() + Duration::days(1)).unwrap();
    assert_eq!(report.cancelled, 1);
    wait_all(report.deliveries).await;

    let guard = lock_storage(&storage).unwrap();
    let enrollment = guard
        .list_enrollments(sequence_id)
        .unwrap()
        .into_iter()
        .find(|e| e.contact_id == contact_id)
        .unwrap();
    assert_eq!(enrollment.status, EnrollmentStatus::Cancelled);
}

#[tokio::test]
async fn test_opened_email_stops_follow_up() {
    let (storage, sequence_id, opener, ignorer) = {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut ids = Vec::new();
        for domain in ["elektro-horak.cz", "instalater-pokorny.cz"] {
            ids.push(
                storage
                    .insert_contact(
                        &NewContact {
                            email: Some(format!("info@{}", domain)),
                            domain: Some(domain.to_string()),
                            ..Default::default()
                        },
                        start(),
                    )
                    .unwrap(),
            );
        }
        let intro = storage.insert_template("Úvod", "Nový web", "<p>Dobrý den</p>").unwrap();
        let nudge = storage.insert_template("Znovu", "Ještě jednou", "<p>Znovu</p>").unwrap();
        let sequence_id = storage.insert_sequence("Po otevření stop", true).unwrap();
        storage.insert_sequence_step(sequence_id, 0, intro, 1, None).unwrap();
        storage
            .insert_sequence_step(
                sequence_id,
                1,
                nudge,
                3,
                Some(StepCondition {
                    skip_if_replied: false,
                    skip_if_opened: true,
                }),
            )
            .unwrap();
        leadscope::sequence::enroll(&mut storage, sequence_id, &ids, start()).unwrap();
        (shared(storage), sequence_id, ids[0], ids[1])
    };
    let engine = engine(&storage);

    let day1 = start() + Duration::days(1);
    let report = engine.tick(day1).unwrap();
    assert_eq!(report.sent, 2);
    wait_all(report.deliveries).await;

    {
        let mut guard = lock_storage(&storage).unwrap();
        let tracking_id = guard.list_emails_for_contact(opener).unwrap()[0]
            .tracking_id
            .clone();
        assert!(record_open(&mut *guard, &tracking_id, day1 + Duration::hours(2)).unwrap());
    }

    let report = engine.tick(day1 + Duration::days(3)).unwrap();
    assert_eq!(report.due, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.completed, 2);
    wait_all(report.deliveries).await;

    let guard = lock_storage(&storage).unwrap();
    for enrollment in guard.list_enrollments(sequence_id).unwrap() {
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
    }
    assert_eq!(guard.list_emails_for_contact(opener).unwrap().len(), 1);
    assert_eq!(guard.list_emails_for_contact(ignorer).unwrap().len(), 2);
}
