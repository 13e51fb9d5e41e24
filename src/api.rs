//! Wire types shared by the relay and the client.
//!
//! The streaming protocol puts exactly one [`Event`] per
//! newline-terminated line. The single-shot protocol returns
//! one buffered [`AgentReply`]. Both shapes deserialize with serde and are
//! the only payloads that ever cross the `/api/chat` boundary.

use serde::{Deserialize, Serialize};

/// One protocol event, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Event {
    /// Progress line from the backend's agent pipeline.
    Status(String),
    /// A batch of references contributed by one sub-query.
    Sources(Vec<Reference>),
    /// The next fragment of the answer body.
    Content(String),
    /// Terminal or inline failure diagnosis.
    Error(String),
}

impl Event {
    /// Serialize to one newline-terminated NDJSON line.
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            // Event variants only hold strings and reference lists, so
            // serialization cannot fail; keep the wire parseable anyway.
            r#"{"type":"error","data":"event serialization failure"}"#.to_string()
        });
        line.push('\n');
        line
    }
}

/// A knowledge-base reference on the streaming wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// The same reference in the single-shot reply shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefItem {
    pub txt: String,
    pub link: String,
}

impl From<RefItem> for Reference {
    fn from(item: RefItem) -> Self {
        Reference {
            title: item.txt,
            url: item.link,
        }
    }
}

/// Request body accepted by `POST /api/chat` and forwarded upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub msg: String,
    #[serde(rename = "type", default = "default_request_kind")]
    pub kind: String,
}

fn default_request_kind() -> String {
    "text".to_string()
}

impl ChatRequest {
    pub fn text(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            kind: default_request_kind(),
        }
    }
}

/// Avatar display state carried by single-shot replies.
///
/// Present on every reply, including shaped error replies, so consumers
/// never need to null-check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub state: String,
    pub mood: String,
}

impl Default for Avatar {
    fn default() -> Self {
        Self {
            state: "idle".to_string(),
            mood: "neutral".to_string(),
        }
    }
}

/// Complete reply shape of the single-shot protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub flow: String,
    #[serde(default)]
    pub avatar: Avatar,
    #[serde(default)]
    pub refs: Vec<RefItem>,
}
