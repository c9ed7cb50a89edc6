//! Classification of verified request bodies into Slack payloads.
//!
//! The Events API delivers JSON (URL verification challenges and event
//! callbacks); slash commands arrive as URL-encoded forms. Both routes feed
//! a [`VerifiedBody`] through [`classify`], which either produces one case
//! of the closed [`Payload`] set or a [`ClassificationError`] — never a
//! panic, however malformed the input.

use serde::Deserialize;

use crate::verify::VerifiedBody;

/// Which decoding the route's content type calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Form,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Challenge(Challenge),
    EventCallback(EventCallback),
    SlashCommand(SlashCommand),
}

/// One-time URL ownership handshake; the challenge text must be echoed back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Challenge {
    #[allow(dead_code)]
    pub token: String,
    pub challenge: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventCallback {
    #[allow(dead_code)]
    pub team_id: String,
    #[allow(dead_code)]
    pub api_app_id: String,
    #[allow(dead_code)]
    pub event_id: String,
    #[allow(dead_code)]
    pub event_time: u64,
    pub event: Event,
}

/// Inner event of an `event_callback`. Unrecognized event types land in
/// `Unknown` and get acknowledged without further handling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "app_mention")]
    AppMention {
        channel: String,
        user: String,
        #[allow(dead_code)]
        text: String,
        ts: String,
    },
    #[serde(rename = "message")]
    #[allow(dead_code)]
    Message {
        channel: String,
        user: String,
        text: String,
        ts: String,
        channel_type: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlashCommand {
    pub command: String,
    /// Normalized: Slack sends `text=` for a bare command, which becomes `None`.
    pub text: Option<String>,
    pub user_id: String,
    pub user_name: Option<String>,
    pub channel_id: String,
    pub channel_name: Option<String>,
    #[allow(dead_code)]
    pub response_url: String,
    #[allow(dead_code)]
    pub trigger_id: Option<String>,
    #[allow(dead_code)]
    pub team_id: Option<String>,
    #[allow(dead_code)]
    pub team_domain: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ClassificationError {
    MalformedPayload,
    MissingRequiredField(&'static str),
}

impl std::fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationError::MalformedPayload => write!(f, "malformed payload"),
            ClassificationError::MissingRequiredField(name) => {
                write!(f, "missing required field: {}", name)
            }
        }
    }
}

impl std::error::Error for ClassificationError {}

// JSON envelope, discriminated on the top-level "type" field. Anything
// other than these two tags is a malformed payload as far as the events
// route is concerned.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Envelope {
    #[serde(rename = "url_verification")]
    Challenge(Challenge),
    #[serde(rename = "event_callback")]
    EventCallback(EventCallback),
}

// Form fields all optional at decode time so a missing required one can be
// reported by name instead of as a generic decode failure.
#[derive(Debug, Deserialize)]
struct RawSlashCommand {
    command: Option<String>,
    text: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    channel_id: Option<String>,
    channel_name: Option<String>,
    response_url: Option<String>,
    trigger_id: Option<String>,
    team_id: Option<String>,
    team_domain: Option<String>,
}

pub fn classify(body: &VerifiedBody, kind: ContentKind) -> Result<Payload, ClassificationError> {
    match kind {
        ContentKind::Json => {
            let envelope: Envelope = serde_json::from_slice(body.as_bytes())
                .map_err(|_| ClassificationError::MalformedPayload)?;
            Ok(match envelope {
                Envelope::Challenge(challenge) => Payload::Challenge(challenge),
                Envelope::EventCallback(callback) => Payload::EventCallback(callback),
            })
        }
        ContentKind::Form => {
            let raw: RawSlashCommand = serde_urlencoded::from_bytes(body.as_bytes())
                .map_err(|_| ClassificationError::MalformedPayload)?;
            Ok(Payload::SlashCommand(SlashCommand {
                command: require(raw.command, "command")?,
                text: raw.text.filter(|t| !t.is_empty()),
                user_id: require(raw.user_id, "user_id")?,
                user_name: raw.user_name,
                channel_id: require(raw.channel_id, "channel_id")?,
                channel_name: raw.channel_name,
                response_url: require(raw.response_url, "response_url")?,
                trigger_id: raw.trigger_id,
                team_id: raw.team_id,
                team_domain: raw.team_domain,
            }))
        }
    }
}

fn require(
    field: Option<String>,
    name: &'static str,
) -> Result<String, ClassificationError> {
    field.ok_or(ClassificationError::MissingRequiredField(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use crate::verify::{verify, RawRequest, SigningSecret};

    // Classification only accepts a VerifiedBody, so tests go through a
    // real signed request.
    fn verified(body: &[u8]) -> VerifiedBody {
        let secret = "test-secret";
        let now = 1_700_000_000u64;
        let raw = RawRequest {
            timestamp: Some(now.to_string()),
            signature: Some(crate::verify::sign(secret, &now.to_string(), body)),
            body: Bytes::copy_from_slice(body),
            now,
        };
        verify(&raw, &SigningSecret::new(secret.into())).unwrap()
    }

    #[test]
    fn classifies_url_verification_challenge() {
        let body = verified(br#"{"type":"url_verification","token":"t","challenge":"abc123"}"#);
        let payload = classify(&body, ContentKind::Json).unwrap();
        assert_eq!(
            payload,
            Payload::Challenge(Challenge {
                token: "t".into(),
                challenge: "abc123".into(),
            })
        );
    }

    #[test]
    fn classifies_app_mention_callback() {
        let body = verified(
            br#"{
                "type": "event_callback",
                "token": "t",
                "team_id": "T1",
                "api_app_id": "A1",
                "event_id": "Ev1",
                "event_time": 1700000000,
                "event": {
                    "type": "app_mention",
                    "channel": "C1",
                    "user": "U1",
                    "text": "<@UBOT> hello",
                    "ts": "111.1",
                    "event_ts": "111.1"
                }
            }"#,
        );
        let Payload::EventCallback(callback) = classify(&body, ContentKind::Json).unwrap() else {
            panic!("expected event callback");
        };
        assert_eq!(callback.team_id, "T1");
        assert_eq!(
            callback.event,
            Event::AppMention {
                channel: "C1".into(),
                user: "U1".into(),
                text: "<@UBOT> hello".into(),
                ts: "111.1".into(),
            }
        );
    }

    #[test]
    fn classifies_message_event_with_channel_type() {
        let body = verified(
            br#"{
                "type": "event_callback",
                "team_id": "T1",
                "api_app_id": "A1",
                "event_id": "Ev2",
                "event_time": 1700000000,
                "event": {
                    "type": "message",
                    "channel": "D1",
                    "user": "U2",
                    "text": "hi",
                    "ts": "222.2",
                    "channel_type": "im"
                }
            }"#,
        );
        let Payload::EventCallback(callback) = classify(&body, ContentKind::Json).unwrap() else {
            panic!("expected event callback");
        };
        assert_eq!(
            callback.event,
            Event::Message {
                channel: "D1".into(),
                user: "U2".into(),
                text: "hi".into(),
                ts: "222.2".into(),
                channel_type: Some("im".into()),
            }
        );
    }

    #[test]
    fn unrecognized_inner_event_degrades_to_unknown() {
        let body = verified(
            br#"{
                "type": "event_callback",
                "team_id": "T1",
                "api_app_id": "A1",
                "event_id": "Ev3",
                "event_time": 1700000000,
                "event": {"type": "reaction_added", "user": "U1"}
            }"#,
        );
        let Payload::EventCallback(callback) = classify(&body, ContentKind::Json).unwrap() else {
            panic!("expected event callback");
        };
        assert_eq!(callback.event, Event::Unknown);
    }

    #[test]
    fn unknown_top_level_type_is_malformed() {
        let body = verified(br#"{"type":"block_actions","token":"t"}"#);
        let err = classify(&body, ContentKind::Json).unwrap_err();
        assert_eq!(err, ClassificationError::MalformedPayload);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let body = verified(b"{not json");
        let err = classify(&body, ContentKind::Json).unwrap_err();
        assert_eq!(err, ClassificationError::MalformedPayload);
    }

    #[test]
    fn extra_json_fields_are_ignored() {
        let body = verified(
            br#"{"type":"url_verification","token":"t","challenge":"c","is_enterprise_install":false}"#,
        );
        assert!(matches!(
            classify(&body, ContentKind::Json).unwrap(),
            Payload::Challenge(_)
        ));
    }

    #[test]
    fn classifies_full_slash_command_form() {
        let body = verified(
            b"token=tok&team_id=T1&team_domain=acme&channel_id=C1&channel_name=general\
              &user_id=U1&user_name=alice&command=%2Fgreet&text=hello+there\
              &response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2F123&trigger_id=42.1",
        );
        let Payload::SlashCommand(cmd) = classify(&body, ContentKind::Form).unwrap() else {
            panic!("expected slash command");
        };
        assert_eq!(cmd.command, "/greet");
        assert_eq!(cmd.text.as_deref(), Some("hello there"));
        assert_eq!(cmd.user_id, "U1");
        assert_eq!(cmd.channel_id, "C1");
        assert_eq!(cmd.response_url, "https://hooks.slack.com/commands/123");
        assert_eq!(cmd.team_domain.as_deref(), Some("acme"));
    }

    #[test]
    fn empty_command_text_becomes_none() {
        let body = verified(
            b"command=%2Fgreet&text=&user_id=U1&channel_id=C1&response_url=https%3A%2F%2Fr",
        );
        let Payload::SlashCommand(cmd) = classify(&body, ContentKind::Form).unwrap() else {
            panic!("expected slash command");
        };
        assert_eq!(cmd.text, None);
    }

    #[test]
    fn each_missing_required_form_field_is_reported() {
        let cases: [(&[u8], &str); 4] = [
            (b"user_id=U1&channel_id=C1&response_url=r", "command"),
            (b"command=%2Fping&channel_id=C1&response_url=r", "user_id"),
            (b"command=%2Fping&user_id=U1&response_url=r", "channel_id"),
            (b"command=%2Fping&user_id=U1&channel_id=C1", "response_url"),
        ];
        for (form, field) in cases {
            let err = classify(&verified(form), ContentKind::Form).unwrap_err();
            assert_eq!(err, ClassificationError::MissingRequiredField(field));
        }
    }

    #[test]
    fn unknown_form_fields_are_ignored() {
        let body = verified(
            b"command=%2Fping&user_id=U1&channel_id=C1&response_url=r&enterprise_id=E1",
        );
        assert!(classify(&body, ContentKind::Form).is_ok());
    }
}
