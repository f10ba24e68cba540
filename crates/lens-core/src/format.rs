//! API wire-format detection from the request path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire shape of a request/response payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiFormat {
    /// OpenAI Responses API, including the ChatGPT backend API.
    Responses,
    /// OpenAI Chat Completions API and compatibles.
    ChatCompletions,
    /// Anthropic Messages API.
    AnthropicMessages,
    /// Anything else.
    #[default]
    Unknown,
}

impl ApiFormat {
    /// Detects the format from a request path.
    ///
    /// Any ChatGPT `/backend-api/` path counts as the Responses format.
    pub fn from_path(path: &str) -> Self {
        if path.contains("/backend-api/") || path.contains("/responses") {
            ApiFormat::Responses
        } else if path.contains("/chat/completions") {
            ApiFormat::ChatCompletions
        } else if path.contains("/v1/messages") {
            ApiFormat::AnthropicMessages
        } else {
            ApiFormat::Unknown
        }
    }

    /// Returns the wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiFormat::Responses => "responses",
            ApiFormat::ChatCompletions => "chat-completions",
            ApiFormat::AnthropicMessages => "anthropic-messages",
            ApiFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
