mod dispatch;
mod payload;
mod slack;
mod verify;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use dispatch::{dispatch, Messenger};
use payload::{classify, ContentKind};
use slack::SlackWebClient;
use verify::{verify, RawRequest, SigningSecret};

#[derive(Clone)]
struct AppState {
    messenger: Arc<dyn Messenger>,
    signing_secret: Arc<SigningSecret>,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slackbot=info".into()),
        )
        .init();

    // Read configuration; missing credentials are fatal at startup, not per-request
    let bot_token =
        std::env::var("SLACK_BOT_TOKEN").expect("SLACK_BOT_TOKEN must be set in .env file");
    let signing_secret = std::env::var("SLACK_SIGNING_SECRET")
        .expect("SLACK_SIGNING_SECRET must be set in .env file");
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .expect("PORT must be a valid u16");

    let state = AppState {
        messenger: Arc::new(SlackWebClient::new(bot_token)),
        signing_secret: Arc::new(SigningSecret::new(signing_secret)),
    };

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app(state)).await.unwrap();
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/slack/events", post(slack_events_handler))
        .route("/slack/commands", post(slack_commands_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn raw_request(headers: &HeaderMap, body: Bytes) -> RawRequest {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    RawRequest {
        timestamp: header("x-slack-request-timestamp"),
        signature: header("x-slack-signature"),
        body,
        now,
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "invalid request signature" })),
    )
}

async fn slack_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let raw = raw_request(&headers, body);
    let verified = match verify(&raw, &state.signing_secret) {
        Ok(v) => v,
        Err(e) => {
            warn!("Signature verification failed for event delivery: {}", e);
            return unauthorized();
        }
    };

    let payload = match classify(&verified, ContentKind::Json) {
        Ok(p) => p,
        Err(e) => {
            // Still acked with a 2xx: Slack retries failed event deliveries,
            // which would duplicate side effects.
            warn!("Ignoring unreadable event payload: {}", e);
            return (StatusCode::OK, Json(json!({})));
        }
    };

    let result = dispatch(payload, state.messenger.clone()).await;
    (result.status, Json(result.body))
}

async fn slack_commands_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let raw = raw_request(&headers, body);
    let verified = match verify(&raw, &state.signing_secret) {
        Ok(v) => v,
        Err(e) => {
            warn!("Signature verification failed for slash command: {}", e);
            return unauthorized();
        }
    };

    let payload = match classify(&verified, ContentKind::Form) {
        Ok(p) => p,
        Err(e) => {
            // A human is waiting on this response, so say what went wrong.
            warn!("Malformed slash command: {}", e);
            return (
                StatusCode::OK,
                Json(json!({
                    "response_type": "ephemeral",
                    "text": format!("Sorry, I couldn't read that command ({}).", e),
                })),
            );
        }
    };

    let result = dispatch(payload, state.messenger.clone()).await;
    (result.status, Json(result.body))
}
