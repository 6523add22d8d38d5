//! OpenAI-compatible request models.
//!
//! Only the chat completion request is modelled: it is validated before
//! being forwarded, with defaults filled in. Responses are relayed as raw
//! bytes and never deserialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ALLOWED_ROLES: &[&str] = &["system", "user", "assistant"];

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_top_p() -> f64 {
    1.0
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// Request to `/v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature (0-2).
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling (0-1).
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Fields the engine may understand but we do not check.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A request that violates the chat completion schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("messages must contain at least one message")]
    EmptyMessages,

    #[error("messages[{index}].role must be one of system, user, assistant (got '{role}')")]
    InvalidRole { index: usize, role: String },

    #[error("max_tokens must be between 1 and {max} (got {value})")]
    MaxTokensOutOfRange { value: u32, max: u32 },

    #[error("temperature must be between 0 and 2 (got {0})")]
    TemperatureOutOfRange(f64),

    #[error("top_p must be between 0 and 1 (got {0})")]
    TopPOutOfRange(f64),
}

impl ChatCompletionRequest {
    /// Check the request against the schema; `max_tokens_limit` is the
    /// engine's configured token limit.
    pub fn validate(&self, max_tokens_limit: u32) -> Result<(), ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::EmptyMessages);
        }
        if let Some((index, message)) = self
            .messages
            .iter()
            .enumerate()
            .find(|(_, m)| !ALLOWED_ROLES.contains(&m.role.as_str()))
        {
            return Err(ValidationError::InvalidRole {
                index,
                role: message.role.clone(),
            });
        }
        if !(1..=max_tokens_limit).contains(&self.max_tokens) {
            return Err(ValidationError::MaxTokensOutOfRange {
                value: self.max_tokens,
                max: max_tokens_limit,
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::TemperatureOutOfRange(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ValidationError::TopPOutOfRange(self.top_p));
        }
        Ok(())
    }
}
