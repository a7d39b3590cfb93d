//! Conversation turns and event folding

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stream::{StreamEvent, ToolCallFragment};

/// Opaque message identifier, unique within a store and ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MessageId(u64);

impl MessageId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool invocation requested by the assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    /// Correlation id, when the server provided one
    pub id: Option<String>,
    /// Tool name
    pub name: String,
    /// Accumulated argument text; valid JSON once the response completes
    pub arguments: String,
}

impl From<&ToolCallFragment> for ToolCall {
    fn from(fragment: &ToolCallFragment) -> Self {
        Self {
            id: fragment.id.clone(),
            name: fragment.name.clone(),
            arguments: fragment.arguments.clone(),
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    /// Text content, appended to while streaming
    pub content: String,
    /// Resolved URL of the synthesized reply audio
    pub audio_url: Option<String>,
    /// Tool calls in the order they were first seen
    pub tool_calls: Vec<ToolCall>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            audio_url: None,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Message identifier
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Message role
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Fold one event into this message
    pub(crate) fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => self.content.push_str(text),
            StreamEvent::AudioReady(url) => self.audio_url = Some(url.clone()),
            StreamEvent::ToolCallFragment(fragment) => self.merge_tool_call(fragment),
            StreamEvent::Error(message) => self.annotate_error(message),
            StreamEvent::Done => {}
        }
    }

    /// Merge a fragment into the matching tool call
    ///
    /// A fragment matches the entry with the same id. A fragment with
    /// neither id nor name continues the most recent call. Anything else
    /// starts a new call.
    fn merge_tool_call(&mut self, fragment: &ToolCallFragment) {
        let existing = match &fragment.id {
            Some(id) => self
                .tool_calls
                .iter_mut()
                .find(|call| call.id.as_ref() == Some(id)),
            None if fragment.name.is_empty() => self.tool_calls.last_mut(),
            None => None,
        };

        match existing {
            Some(call) => {
                call.arguments.push_str(&fragment.arguments);
                if call.name.is_empty() {
                    call.name.clone_from(&fragment.name);
                }
            }
            None => self.tool_calls.push(ToolCall::from(fragment)),
        }
    }

    fn annotate_error(&mut self, message: &str) {
        if !self.content.is_empty() {
            self.content.push_str("\n\n");
        }
        self.content.push_str("[error: ");
        self.content.push_str(message);
        self.content.push(']');
    }
}
