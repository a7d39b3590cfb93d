//! Streaming response decoding
//!
//! Turns a response body into an ordered, lazy sequence of [`StreamEvent`]s:
//!
//! ```text
//!  chunks ──▶ LineDecoder ──▶ records ──▶ normalize ──▶ StreamEvent
//!             (reassembly)    (framing)   (key sniffing)
//! ```
//!
//! The decoder holds no state beyond the current response. Folding events
//! into a message is the job of [`crate::chat::MessageStore`].

mod decoder;
mod event;
mod normalize;

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};

pub use decoder::{DONE_SENTINEL, Framing, LineDecoder};
pub use event::{StreamEvent, ToolCallFragment};
pub use normalize::{decode_document, decode_record};

struct DecodeState<S> {
    source: Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<StreamEvent>,
    ended: bool,
}

/// Decode a chunked byte source into events
///
/// The sequence ends after [`StreamEvent::Done`] (sentinel or exhausted
/// source). A source error is surfaced once as [`StreamEvent::Error`] and
/// ends the sequence without `Done`. Decoding suspends only while awaiting
/// the next chunk; no timeout is applied.
pub fn decode_stream<S, B, E>(source: S, decoder: LineDecoder) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        source: Box::pin(source),
        decoder,
        pending: VecDeque::new(),
        ended: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.ended {
                return None;
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(chunk.as_ref());
                    state.pending.extend(events);
                    state.ended = state.decoder.is_finished();
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "response stream interrupted");
                    state
                        .pending
                        .push_back(StreamEvent::Error(format!("stream interrupted: {e}")));
                    state.ended = true;
                }
                None => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.ended = true;
                }
            }
        }
    })
}
