//! `[SOURCE]` payload parsing

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A retrieved passage cited by the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePayload {
    pub name: String,
    pub page_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Why a source payload was discarded. Never fatal to the turn.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed source JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("source payload missing required field `{0}`")]
    MissingField(&'static str),
}

/// Loose wire shape: required fields are validated after deserialization so
/// that absent and empty values are reported the same way.
#[derive(Deserialize)]
struct WireSource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    page_content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl SourcePayload {
    pub fn new(name: impl Into<String>, page_content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_content: page_content.into(),
            url: None,
            category: None,
            updated_at: None,
        }
    }

    /// Parse the remainder of a `[SOURCE] ` frame.
    ///
    /// The backend serializes passages that may contain raw line breaks, so
    /// those are stripped before the JSON parse.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let cleaned: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let wire: WireSource = serde_json::from_str(&cleaned)?;

        let name = wire
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ParseError::MissingField("name"))?;
        let page_content = wire
            .page_content
            .filter(|c| !c.is_empty())
            .ok_or(ParseError::MissingField("page_content"))?;

        Ok(Self {
            name,
            page_content,
            url: wire.url,
            category: wire.category,
            updated_at: wire.updated_at,
        })
    }
}
