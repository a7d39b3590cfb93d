//! Normalized response events

/// One piece of a tool invocation as delivered by the server
///
/// Several fragments sharing an `id` make up one logical call; their
/// `arguments` are concatenated in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Correlation id grouping fragments of the same call
    pub id: Option<String>,
    /// Tool name, usually only present on the first fragment
    pub name: String,
    /// Partial JSON argument text
    pub arguments: String,
}

/// A decoded unit of meaning extracted from one response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the assistant message
    TextDelta(String),
    /// Synthesized audio is available at the resolved URL
    AudioReady(String),
    /// A tool-call fragment to merge into the message's tool calls
    ToolCallFragment(ToolCallFragment),
    /// Server-side or transport error
    Error(String),
    /// The response finished normally
    Done,
}

impl StreamEvent {
    /// Whether this event ends the response
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
