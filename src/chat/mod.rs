//! Conversation state
//!
//! [`MessageStore`] owns the turns; [`Conversation`] runs a turn end to end
//! by feeding decoded response events into the store.

mod conversation;
mod message;
mod store;

pub use conversation::Conversation;
pub use message::{Message, MessageId, Role, ToolCall};
pub use store::{MessageStore, Snapshot};
