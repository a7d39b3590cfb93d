//! Ordered message list with a single streaming target

use std::sync::Arc;

use tokio::sync::watch;

use super::{Message, MessageId, Role};
use crate::stream::StreamEvent;
use crate::{Error, Result};

/// Point-in-time view of the conversation
///
/// Messages are shared with the store; a snapshot only owns the list.
pub type Snapshot = Vec<Arc<Message>>;

/// Owns the conversation's messages
///
/// Only the active streaming target may be mutated. After each complete
/// fold the store publishes a snapshot through a watch channel, so
/// observers never see a half-applied event. Untouched messages are shared
/// between the store and every snapshot; a fold copies at most the target.
#[derive(Debug)]
pub struct MessageStore {
    messages: Vec<Arc<Message>>,
    active: Option<MessageId>,
    next_id: u64,
    snapshots: watch::Sender<Snapshot>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            messages: Vec::new(),
            active: None,
            next_id: 1,
            snapshots,
        }
    }

    /// Subscribe to snapshots published after every change
    ///
    /// The receiver starts at the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        // Nothing is published while nobody listens
        self.snapshots.send_replace(self.messages.clone());
        self.snapshots.subscribe()
    }

    /// All messages in creation order
    #[must_use]
    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// Look up a message by id
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.id() == id)
            .map(Arc::as_ref)
    }

    /// Id of the message currently receiving streamed events
    #[must_use]
    pub const fn active(&self) -> Option<MessageId> {
        self.active
    }

    /// Append a completed user turn
    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages
            .push(Arc::new(Message::new(id, Role::User, content)));
        self.publish();
        id
    }

    /// Open a new, empty assistant turn and make it the streaming target
    ///
    /// A previous target that never received `Done` (an aborted decode)
    /// keeps its partial content and is no longer mutable.
    pub fn begin_assistant(&mut self) -> MessageId {
        if let Some(previous) = self.active.take() {
            tracing::debug!(%previous, "closing unfinished assistant message");
        }

        let id = self.allocate_id();
        self.messages
            .push(Arc::new(Message::new(id, Role::Assistant, "")));
        self.active = Some(id);
        self.publish();
        id
    }

    /// Fold one event into the streaming target
    ///
    /// `Done` closes the target.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not the active streaming target
    pub fn apply(&mut self, id: MessageId, event: &StreamEvent) -> Result<()> {
        if self.active != Some(id) {
            return Err(Error::Store(format!("{id} is not being streamed")));
        }

        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id() == id)
            .ok_or_else(|| Error::Store(format!("{id} not found")))?;

        // Copies the target only if a snapshot still shares it
        Arc::make_mut(message).apply(event);
        if event.is_done() {
            self.active = None;
        }

        tracing::trace!(%id, ?event, "applied stream event");
        self.publish();
        Ok(())
    }

    /// Close the streaming target without a `Done` event
    ///
    /// Used when a decode ends early; the partial content is kept.
    pub fn finish(&mut self, id: MessageId) {
        if self.active == Some(id) {
            self.active = None;
            self.publish();
        }
    }

    /// Remove every message
    pub fn clear(&mut self) {
        self.messages.clear();
        self.active = None;
        self.publish();
    }

    const fn allocate_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn publish(&self) {
        if self.snapshots.receiver_count() > 0 {
            self.snapshots.send_replace(self.messages.clone());
        }
    }
}
