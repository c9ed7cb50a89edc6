//! Payload dispatch: one behavior per payload variant.
//!
//! Dispatch is stateless across calls. The only collaborator is a
//! [`Messenger`], injected so handlers and tests can substitute the real
//! Slack client. Event callbacks are acknowledged immediately and any
//! outbound send happens on a detached task; slash commands await the send
//! because Slack shows the HTTP response body to the user.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::payload::{Event, Payload, SlashCommand};

/// Outbound "post a message" capability.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), String>;
}

/// What the HTTP layer sends back for a dispatched payload.
#[derive(Debug)]
pub struct DispatchResult {
    pub status: StatusCode,
    pub body: Value,
}

impl DispatchResult {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn ephemeral(text: impl Into<String>) -> Self {
        Self::ok(json!({ "response_type": "ephemeral", "text": text.into() }))
    }
}

/// Runs the behavior for a classified payload.
///
/// Every structurally valid payload gets a 2xx response; delivery failures
/// of the messenger are logged or turned into ephemeral text, never into an
/// error status. Slack retries event deliveries that are not acked with a
/// 2xx, which would duplicate side effects.
pub async fn dispatch(payload: Payload, messenger: Arc<dyn Messenger>) -> DispatchResult {
    match payload {
        Payload::Challenge(challenge) => {
            info!("Responding to URL verification challenge");
            DispatchResult::ok(json!({ "challenge": challenge.challenge }))
        }
        Payload::EventCallback(callback) => {
            match callback.event {
                Event::AppMention { channel, user, ts, .. } => {
                    info!("Responding to app mention in {}", channel);
                    let text = format!("Hello <@{}>! You mentioned me. How can I help?", user);
                    // Detached: the ack must not wait on Slack's API.
                    tokio::spawn(async move {
                        if let Err(e) = messenger.post_message(&channel, Some(&ts), &text).await {
                            error!("Failed to respond to mention: {}", e);
                        }
                    });
                }
                // Other event types are acknowledged without action.
                Event::Message { .. } | Event::Unknown => {}
            }
            DispatchResult::ok(json!({}))
        }
        Payload::SlashCommand(cmd) => dispatch_command(cmd, messenger).await,
    }
}

async fn dispatch_command(cmd: SlashCommand, messenger: Arc<dyn Messenger>) -> DispatchResult {
    info!(
        "Received slash command: {} from {} in {}",
        cmd.command,
        cmd.user_name.as_deref().unwrap_or("unknown"),
        cmd.channel_name.as_deref().unwrap_or("unknown"),
    );
    match cmd.command.as_str() {
        "/greet" => {
            let text = match &cmd.text {
                Some(t) => format!("Hello <@{}>! :wave: You said: \"{}\"", cmd.user_id, t),
                None => format!("Hello <@{}>! :wave: How can I help you today?", cmd.user_id),
            };
            match messenger.post_message(&cmd.channel_id, None, &text).await {
                Ok(()) => DispatchResult::ephemeral("Greeting sent!"),
                Err(e) => {
                    warn!("Failed to send greeting: {}", e);
                    DispatchResult::ephemeral("Sorry, couldn't send the greeting.")
                }
            }
        }
        "/ping" => DispatchResult::ephemeral("Pong!"),
        other => DispatchResult::ephemeral(format!(
            "Unknown command: {}. Available commands: /greet, /ping",
            other
        )),
    }
}
