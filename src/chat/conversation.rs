//! One spoken turn: request, stream, fold

use futures::StreamExt;

use super::{MessageId, MessageStore};
use crate::Result;
use crate::client::{AudioPayload, ChatClient, RequestBuilder};
use crate::config::Settings;
use crate::stream::StreamEvent;

/// Drives turns against the server and records them in a [`MessageStore`]
#[derive(Debug, Default)]
pub struct Conversation {
    client: ChatClient,
    store: MessageStore,
}

impl Conversation {
    /// Create a conversation using `client`
    #[must_use]
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            store: MessageStore::new(),
        }
    }

    /// Messages recorded so far
    #[must_use]
    pub const fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Send spoken input and fold the reply into a new assistant message
    ///
    /// `observer` sees every event right after it has been applied. The
    /// request is validated before anything is sent or stored. Dropping the
    /// returned future aborts the decode and leaves the assistant message
    /// with whatever it had accumulated.
    ///
    /// # Errors
    ///
    /// Returns error if the request is invalid (missing audio, malformed
    /// tool schema). Transport failures are not errors: they are folded into
    /// the assistant message.
    pub async fn send_audio<F>(
        &mut self,
        settings: &Settings,
        audio: AudioPayload,
        voice_prompt: Option<AudioPayload>,
        mut observer: F,
    ) -> Result<MessageId>
    where
        F: FnMut(&StreamEvent),
    {
        let request = RequestBuilder::new(settings)
            .audio(audio)
            .voice_prompt(voice_prompt)
            .build()?;

        self.store.push_user(describe_audio(&request.audio));
        let reply = self.store.begin_assistant();

        let mut events = self.client.send(request).await;
        let mut count = 0usize;
        while let Some(event) = events.next().await {
            self.store.apply(reply, &event)?;
            observer(&event);
            count += 1;
        }

        self.store.finish(reply);
        tracing::info!(%reply, events = count, "assistant turn complete");
        Ok(reply)
    }
}

fn describe_audio(audio: &AudioPayload) -> String {
    #[allow(clippy::cast_precision_loss)]
    let kib = audio.bytes.len() as f64 / 1024.0;
    format!("[voice message: {}, {kib:.1} KiB]", audio.file_name)
}
