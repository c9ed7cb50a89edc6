//! Slack Web API client: the production [`Messenger`] implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dispatch::Messenger;

pub struct SlackWebClient {
    bot_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse<T> {
    ok: bool,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Serialize)]
struct ChatPostMessageRequest {
    channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<String>,
    text: String,
}

impl SlackWebClient {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    pub async fn chat_post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), String> {
        let url = "https://slack.com/api/chat.postMessage";
        let payload = ChatPostMessageRequest {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(|s| s.to_string()),
            text: text.to_string(),
        };

        let response: SlackApiResponse<HashMap<String, serde_json::Value>> = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Parse failed: {}", e))?;

        if !response.ok {
            return Err(format!("Slack API error: {:?}", response.data));
        }

        Ok(())
    }
}

#[async_trait]
impl Messenger for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), String> {
        self.chat_post_message(channel, thread_ts, text).await
    }
}
