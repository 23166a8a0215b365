use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

use crate::app::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    message: String,
}

#[derive(Deserialize)]
struct HistoryEntry {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    message: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Deserialize)]
struct ChatErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct ClearResponse {
    message: String,
}

/// What the server decided about a completed login request. Transport
/// failures (connection refused, malformed body) never reach this type;
/// they surface as `Err` from [`ApiClient::login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted(String),
    Rejected(String),
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate against the backend. Any HTTP status carries a
    /// `{message}` body; the status range alone decides accepted/rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let url = format!("{}/api/login", self.base_url);

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        let accepted = response.status().is_success();
        let body: LoginResponse = response.json().await?;

        if accepted {
            Ok(LoginOutcome::Accepted(body.message))
        } else {
            Ok(LoginOutcome::Rejected(body.message))
        }
    }

    /// Fetch the prior conversation, mapping each `{role, content}` entry
    /// into the display shape. Only `"user"` maps to the user side.
    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        let url = format!("{}/api/chat_history", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "history request failed with status: {}",
                response.status()
            ));
        }

        let entries: Vec<HistoryEntry> = response.json().await?;
        let messages = entries
            .into_iter()
            .map(|entry| ChatMessage {
                role: if entry.role == "user" {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                },
                content: entry.content,
            })
            .collect();

        Ok(messages)
    }

    /// Send one message and return the assistant's answer. Failure statuses
    /// carry an `{error}` body whose text is folded into the error.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response
                .json::<ChatErrorResponse>()
                .await
                .map(|body| body.error)
                .unwrap_or_default();
            return Err(anyhow!("chat request failed with status {}: {}", status, reason));
        }

        let body: ChatResponse = response.json().await?;
        Ok(body.answer)
    }

    /// Reset the server-side conversation history.
    pub async fn clear_history(&self) -> Result<String> {
        let url = format!("{}/api/clear", self.base_url);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "clear request failed with status: {}",
                response.status()
            ));
        }

        let body: ClearResponse = response.json().await?;
        Ok(body.message)
    }
}
