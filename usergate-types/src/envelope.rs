//! The uniform response wrapper.

use serde::{Deserialize, Serialize};

/// `{"s": 1|0, "m": "...", "r"?: ..., "c"?: "..."}`
///
/// Successes never carry a code; failures never carry a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    #[serde(rename = "s")]
    pub status: u8,
    #[serde(rename = "m")]
    pub message: String,
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, result: Option<T>) -> Self {
        Self {
            status: 1,
            message: message.into(),
            result,
            code: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
            result: None,
            code: Some(code.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}
