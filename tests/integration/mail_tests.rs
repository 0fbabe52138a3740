//! Provider sender and dispatch tests against a mock email API

use chrono::Utc;
use leadscope::config::MailConfig;
use leadscope::mail::{
    EmailSender, MailDispatcher, MailQueue, OutgoingEmail, ResendSender, SendError,
};
use leadscope::state::{CampaignStatus, SentEmailStatus};
use leadscope::storage::{lock_storage, shared, NewContact, NewSentEmail, SqliteStorage, Storage};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mail_config(endpoint: String) -> MailConfig {
    MailConfig {
        endpoint,
        sender_name: "Jan Dvořák".to_string(),
        sender_email: "jan@leadscope.cz".to_string(),
        tracking_base_url: "https://crm.leadscope.cz".to_string(),
        ..Default::default()
    }
}

fn outgoing() -> OutgoingEmail {
    OutgoingEmail {
        email_id: 12,
        to: "info@pekarna-brno.cz".to_string(),
        subject: "Nový web pro Pekárnu".to_string(),
        html: "<p>Dobrý den</p>".to_string(),
        tracking_id: "trk-12".to_string(),
    }
}

#[tokio::test]
async fn test_provider_send() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(serde_json::json!({
            "from": "Jan Dvořák <jan@leadscope.cz>",
            "to": ["info@pekarna-brno.cz"],
            "subject": "Nový web pro Pekárnu",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = ResendSender::new(&mail_config(format!("{}/emails", mock_server.uri())), "re_test")
        .expect("Failed to build sender");
    let id = sender.deliver(&outgoing()).await.expect("Send failed");

    assert_eq!(id, "msg_1");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["html"]
        .as_str()
        .unwrap()
        .contains("https://crm.leadscope.cz/api/track/open/trk-12"));
}

#[tokio::test]
async fn test_provider_rejection() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({ "message": "Invalid `to` field" })),
        )
        .mount(&mock_server)
        .await;

    let sender = ResendSender::new(&mail_config(mock_server.uri()), "re_test").unwrap();
    let err = sender.deliver(&outgoing()).await.unwrap_err();

    assert!(matches!(err, SendError::Provider(ref m) if m == "Invalid `to` field"));
}

#[tokio::test]
async fn test_campaign_email_through_queue() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_9" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let contact_id = storage
        .insert_contact(
            &NewContact {
                email: Some("info@pekarna-brno.cz".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
    let campaign_id = storage
        .insert_campaign("Pekárny", CampaignStatus::Running)
        .unwrap();
    let email_id = storage
        .queue_email(
            &NewSentEmail {
                campaign_id: Some(campaign_id),
                contact_id,
                template_id: None,
                subject: "Nový web".to_string(),
                body_html: "<p>Dobrý den</p>".to_string(),
                to_email: "info@pekarna-brno.cz".to_string(),
                tracking_id: "trk-q".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
    let storage = shared(storage);

    let sender = ResendSender::new(&mail_config(mock_server.uri()), "re_test").unwrap();
    let (queue, _worker) =
        MailQueue::start(MailDispatcher::new(storage.clone(), Arc::new(sender)), 3);

    let outcome = queue.submit(email_id).unwrap().wait().await;
    assert!(outcome.success);
    assert_eq!(outcome.provider_id.as_deref(), Some("msg_9"));

    let guard = lock_storage(&storage).unwrap();
    let email = guard.get_sent_email(email_id).unwrap().unwrap();
    assert_eq!(email.status, SentEmailStatus::Sent);
    assert_eq!(email.provider_id.as_deref(), Some("msg_9"));
    assert_eq!(guard.get_campaign(campaign_id).unwrap().unwrap().total_sent, 1);
}
