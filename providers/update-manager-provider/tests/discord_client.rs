use chrono::Utc;
use update_manager_provider::formatter::{format_batch_update, format_single_update};
use update_manager_provider::{DiscordWebhookClient, FormatContext};
use update_notification_common::{DeliveryError, NotificationSink, UpdateEvent};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_event(entity_id: &str) -> UpdateEvent {
    UpdateEvent {
        entity_id: entity_id.to_string(),
        previous_version: "v1.0.0".to_string(),
        new_version: "v1.1.0".to_string(),
        backup_path: None,
        backup_created: false,
        occurred_at: Utc::now(),
        notified: false,
        sequence: 1,
    }
}

#[tokio::test]
async fn test_successful_webhook_delivery() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/webhooks/1/token"))
        .and(body_partial_json(serde_json::json!({
            "content": "<@&42> 🔄 Plugin update completed - restart required!"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client =
        DiscordWebhookClient::new(format!("{}/api/webhooks/1/token", mock_server.uri())).unwrap();
    let ctx = FormatContext {
        mention_prefix: Some("<@&42>".to_string()),
        ..FormatContext::default()
    };
    let message = format_single_update(&ctx, &create_test_event("AutoTK"), Utc::now());

    client.deliver(&message).await.unwrap();
}

#[tokio::test]
async fn test_rejected_webhook_delivery() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid Form Body"))
        .mount(&mock_server)
        .await;

    let client = DiscordWebhookClient::new(mock_server.uri()).unwrap();
    let events = vec![create_test_event("AutoTK"), create_test_event("SeedingMode")];
    let message = format_batch_update(&FormatContext::default(), &events, Utc::now());

    match client.deliver(&message).await {
        Err(DeliveryError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "Invalid Form Body");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_webhook_is_network_error() {
    let client = DiscordWebhookClient::new("http://127.0.0.1:1/webhook").unwrap();
    let message = format_single_update(
        &FormatContext::default(),
        &create_test_event("AutoTK"),
        Utc::now(),
    );

    let err = client.deliver(&message).await.unwrap_err();
    assert_eq!(err.error_code(), "NETWORK");
}
