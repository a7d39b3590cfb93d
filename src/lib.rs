//! Voice chat client - record speech, send it to an inference server and
//! fold the streamed reply into a conversation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   WAV    ┌────────────────┐  multipart  ┌──────────────┐
//! │   Recorder   │────────▶ │ RequestBuilder │───────────▶ │  ChatClient  │
//! │ (+ silence)  │          │  (+ settings)  │             │  (reqwest)   │
//! └──────────────┘          └────────────────┘             └──────┬───────┘
//!                                                                 │ bytes
//! ┌──────────────┐  fold    ┌────────────────┐   events    ┌──────▼───────┐
//! │ MessageStore │◀──────── │  Conversation  │◀─────────── │ LineDecoder  │
//! └──────────────┘          └────────────────┘             └──────────────┘
//! ```
//!
//! The decoder only yields [`StreamEvent`]s; all mutation happens in
//! [`MessageStore`].

pub mod chat;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod stream;
pub mod voice;

pub use chat::{Conversation, Message, MessageId, MessageStore, Role, ToolCall};
pub use client::{AudioPayload, ChatClient, ChatRequest, RequestBuilder};
pub use config::{Settings, SettingsStore};
pub use error::{Error, Result};
pub use stream::{Framing, LineDecoder, StreamEvent, ToolCallFragment};
