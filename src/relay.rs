//! Relay of free-text questions to the external assistant webhook.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Reply fields checked in order; the first non-empty string wins.
const REPLY_FIELDS: [&str; 5] = ["output", "response", "message", "text", "content"];

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("unknown agent {0:?} (expected teachers, families or management)")]
    UnknownAgent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    Teachers,
    Families,
    Management,
}

impl Agent {
    pub fn slug(self) -> &'static str {
        match self {
            Agent::Teachers => "teachers",
            Agent::Families => "families",
            Agent::Management => "management",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Agent {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "teachers" => Ok(Agent::Teachers),
            "families" => Ok(Agent::Families),
            "management" => Ok(Agent::Management),
            other => Err(RelayError::UnknownAgent(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    user_id: &'a str,
    message: &'a str,
    agent: Agent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// The payload itself was a JSON string.
    Text(String),
    /// Taken from one of the known reply fields.
    Field { field: &'static str, text: String },
    /// No known shape; the whole payload serialized.
    Raw(String),
}

impl AgentReply {
    pub fn from_payload(payload: &Value) -> Self {
        if let Value::String(text) = payload {
            return AgentReply::Text(text.clone());
        }

        for field in REPLY_FIELDS {
            if let Some(text) = payload.get(field).and_then(Value::as_str) {
                if !text.is_empty() {
                    return AgentReply::Field {
                        field,
                        text: text.to_string(),
                    };
                }
            }
        }

        AgentReply::Raw(payload.to_string())
    }

    pub fn text(&self) -> &str {
        match self {
            AgentReply::Text(text) | AgentReply::Raw(text) => text,
            AgentReply::Field { text, .. } => text,
        }
    }
}

pub fn generate_user_id() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

pub struct RelayClient {
    http: reqwest::Client,
    webhook_url: String,
}

impl RelayClient {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
        })
    }

    pub async fn send(&self, agent: Agent, user_id: &str, message: &str) -> Result<AgentReply, RelayError> {
        debug!(%agent, user_id, "relaying message");
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&RelayRequest {
                user_id,
                message,
                agent,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%agent, %status, "webhook rejected message");
            return Err(RelayError::Status(status));
        }

        let payload: Value = response.json().await?;
        Ok(AgentReply::from_payload(&payload))
    }
}
