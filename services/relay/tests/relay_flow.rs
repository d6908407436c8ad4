//! Token fetch, delivery and end-to-end relay behaviour against mock HTTP
//! servers standing in for the identity server and the webhook consumer.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rstest::rstest;
use tracing::Level;
use usersync_events::{
    AdminEvent, OperationType, OutboundEvent, ResourceType, UserEvent, UserEventKind,
};
use usersync_relay::{
    AccessToken, AuthError, Config, EventListenerProvider, EventListenerProviderFactory,
    Forwarder, TokenClient, UserSyncListener, UserSyncListenerFactory, WebhookSender,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const REALM: &str = "test";
const TOKEN_PATH: &str = "/realms/test/protocol/openid-connect/token";
const WEBHOOK_PATH: &str = "/api/v1/auth/sync/user-event";
const TOKEN: &str = "tok-123";
const CLIENT_SECRET: &str = "relay-secret";

fn test_config(identity: &MockServer, webhook: &MockServer) -> Config {
    let properties: HashMap<String, String> = [
        ("keycloak.server-url", identity.uri()),
        ("keycloak.realm", REALM.to_string()),
        ("keycloak.auth-service.client-id", "relay".to_string()),
        ("keycloak.auth-service.client-secret", CLIENT_SECRET.to_string()),
        ("user.sync.webhook.url", format!("{}{WEBHOOK_PATH}", webhook.uri())),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Config::from_sources(&properties, |_| None).unwrap()
}

async fn mount_token_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": 300,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

async fn mount_webhook(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Poll until `server` has seen `count` requests or the deadline passes.
async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count || tokio::time::Instant::now() >= deadline {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn start_listener(config: Config) -> (UserSyncListenerFactory, UserSyncListener) {
    let mut factory = UserSyncListenerFactory::new();
    factory.init_with_config(config).unwrap();
    factory.post_init();
    let listener = factory.create().unwrap();
    (factory, listener)
}

// =============================================================================
// Token Client
// =============================================================================

#[tokio::test]
async fn token_request_uses_client_credentials_form() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("client_id=relay"))
        .and(body_string_contains("client_secret=relay-secret"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TOKEN,
            "expires_in": 60
        })))
        .expect(1)
        .mount(&identity)
        .await;

    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);

    let token = tokens.fetch_service_token().await.unwrap();
    assert_eq!(token.secret(), TOKEN);
    assert_eq!(token.expires_in(), Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn token_client_reports_unauthorized() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "unauthorized_client",
                "error_description": "Invalid client secret"
            })),
        )
        .mount(&identity)
        .await;

    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);

    let err = tokens.fetch_service_token().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(err, AuthError::Status { .. }));
}

#[tokio::test]
async fn token_client_rejects_malformed_body() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&identity)
        .await;

    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);

    let err = tokens.fetch_service_token().await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidResponse(_)));
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn token_paths_never_log_the_client_secret() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let webhook = MockServer::start().await;

    // Success
    let identity = MockServer::start().await;
    mount_token_ok(&identity).await;
    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);
    assert!(tokens.fetch_service_token().await.is_ok());

    // Refused, through the forwarder so its error line is captured too
    let identity = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .mount(&identity)
        .await;
    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);
    assert!(tokens.fetch_service_token().await.is_err());
    let forwarder = Forwarder::with_client(reqwest::Client::new(), &config);
    let event = OutboundEvent::new("USER_REGISTERED", Some("u1".to_string()), None);
    assert!(!forwarder.forward(event).await);

    // Unparsable
    let identity = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&identity)
        .await;
    let config = test_config(&identity, &webhook);
    let tokens = TokenClient::new(reqwest::Client::new(), &config);
    assert!(tokens.fetch_service_token().await.is_err());

    let output = logs.contents();
    assert!(output.contains("Requesting service token"));
    assert!(output.contains("Obtained service token"));
    assert!(output.contains("Failed to obtain service token"));
    assert!(output.contains("Unparsable token response"));
    assert!(!output.contains(CLIENT_SECRET), "secret leaked into logs:\n{output}");
}

// =============================================================================
// Webhook Sender
// =============================================================================

#[rstest]
#[case(200, true)]
#[case(201, true)]
#[case(204, true)]
#[case(299, true)]
#[case(400, false)]
#[case(401, false)]
#[case(404, false)]
#[case(500, false)]
#[case(503, false)]
#[tokio::test]
async fn webhook_result_follows_status(#[case] status: u16, #[case] expected: bool) {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("{\"ok\":false}"))
        .mount(&webhook)
        .await;

    let sender = WebhookSender::new(reqwest::Client::new());
    let event = OutboundEvent::new("USER_REGISTERED", Some("u1".to_string()), None);
    let token = AccessToken::new(TOKEN, None);
    let url = format!("{}{WEBHOOK_PATH}", webhook.uri());

    assert_eq!(sender.deliver(&url, &event, &token).await, expected);
}

#[tokio::test]
async fn webhook_sends_bearer_and_json_headers() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let sender = WebhookSender::new(reqwest::Client::new());
    let event = OutboundEvent::new("EMAIL_VERIFIED", Some("u1".to_string()), None);
    let token = AccessToken::new(TOKEN, None);
    let url = format!("{}{WEBHOOK_PATH}", webhook.uri());

    assert!(sender.deliver(&url, &event, &token).await);
}

#[tokio::test]
async fn webhook_unreachable_is_false() {
    // Nothing listens on port 1.
    let url = format!("http://127.0.0.1:1{WEBHOOK_PATH}");

    let sender = WebhookSender::new(reqwest::Client::new());
    let event = OutboundEvent::new("EMAIL_VERIFIED", None, None);
    let token = AccessToken::new(TOKEN, None);

    assert!(!sender.deliver(&url, &event, &token).await);
}

// =============================================================================
// Forwarding
// =============================================================================

#[tokio::test]
async fn forward_skips_delivery_when_token_is_refused() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&identity)
        .await;
    mount_webhook(&webhook, 200).await;

    let forwarder = Forwarder::new(&test_config(&identity, &webhook)).unwrap();
    let event = OutboundEvent::new("USER_REGISTERED", Some("u1".to_string()), None);

    assert!(!forwarder.forward(event).await);
    assert!(webhook.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn every_forward_fetches_a_new_token() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_token_ok(&identity).await;
    mount_webhook(&webhook, 200).await;

    let forwarder = Forwarder::new(&test_config(&identity, &webhook)).unwrap();
    for _ in 0..3 {
        let event = OutboundEvent::new("PASSWORD_UPDATED", Some("u1".to_string()), None);
        assert!(forwarder.forward(event).await);
    }

    assert_eq!(identity.received_requests().await.unwrap().len(), 3);
    assert_eq!(webhook.received_requests().await.unwrap().len(), 3);
}

// =============================================================================
// End to end through the listener
// =============================================================================

#[tokio::test]
async fn register_event_is_relayed() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_token_ok(&identity).await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook)
        .await;

    let (_factory, listener) = start_listener(test_config(&identity, &webhook)).await;

    let event = UserEvent::new(UserEventKind::Register)
        .with_user_id("u1")
        .with_detail("username", "ada")
        .with_detail("register_method", "form");

    let before = Utc::now();
    listener.on_event(&event);

    let requests = wait_for_requests(&webhook, 1).await;
    let after = Utc::now();
    assert_eq!(requests.len(), 1);

    let payload: OutboundEvent = requests[0].body_json().unwrap();
    assert_eq!(payload.event_type(), "USER_REGISTERED");
    assert_eq!(payload.user_id(), Some("u1"));
    assert!(payload.timestamp() >= before && payload.timestamp() <= after);
    assert_eq!(payload.details(), event.details.as_ref());
}

#[tokio::test]
async fn admin_delete_is_relayed_with_parsed_user_id() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_token_ok(&identity).await;
    mount_webhook(&webhook, 204).await;

    let (_factory, listener) = start_listener(test_config(&identity, &webhook)).await;

    let event = AdminEvent::new(ResourceType::User, OperationType::Delete)
        .with_resource_path("users/abc-123");
    listener.on_admin_event(&event, false);

    let requests = wait_for_requests(&webhook, 1).await;
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["eventType"], "USER_DELETED_ADMIN");
    assert_eq!(body["userId"], "abc-123");
    assert!(body["details"].is_null());
}

#[tokio::test]
async fn ignored_events_never_reach_the_network() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;
    mount_token_ok(&identity).await;
    mount_webhook(&webhook, 200).await;

    let (_factory, listener) = start_listener(test_config(&identity, &webhook)).await;

    listener.on_event(&UserEvent::new(UserEventKind::Login).with_user_id("u1"));
    listener.on_event(&UserEvent::new(UserEventKind::Logout).with_user_id("u1"));
    listener.on_admin_event(
        &AdminEvent::new(ResourceType::Group, OperationType::Create)
            .with_resource_path("groups/xyz"),
        false,
    );
    listener.on_admin_event(
        &AdminEvent::new(ResourceType::User, OperationType::Action)
            .with_resource_path("users/u1/reset-password"),
        false,
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(identity.received_requests().await.unwrap().is_empty());
    assert!(webhook.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn token_failure_does_not_reach_the_caller() {
    let identity = MockServer::start().await;
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&identity)
        .await;
    mount_webhook(&webhook, 200).await;

    let (_factory, listener) = start_listener(test_config(&identity, &webhook)).await;

    let event = UserEvent::new(UserEventKind::Login)
        .with_user_id("u1")
        .with_detail("identity_provider", "github");
    assert!(listener.router().on_event(&event));

    // The token request happens, the webhook call does not.
    let token_requests = wait_for_requests(&identity, 1).await;
    assert_eq!(token_requests.len(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(webhook.received_requests().await.unwrap().is_empty());

    // The listener keeps working afterwards.
    listener.on_event(&UserEvent::new(UserEventKind::VerifyEmail).with_user_id("u1"));
    let token_requests = wait_for_requests(&identity, 2).await;
    assert_eq!(token_requests.len(), 2);
}
