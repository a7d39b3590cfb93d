//! Incremental line decoder for streamed response bodies

use serde_json::Value;

use super::{StreamEvent, normalize};

/// Prefix of data records in event-stream framing
const DATA_PREFIX: &str = "data:";

/// Payload that ends a response early
pub const DONE_SENTINEL: &str = "[DONE]";

/// How records are laid out in a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`: records are `data:`-prefixed lines
    EventStream,
    /// Newline-delimited JSON: each line is a complete payload
    NewlineDelimited,
}

impl Framing {
    /// Pick the framing declared by a `Content-Type` header value
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("text/event-stream") => {
                Self::EventStream
            }
            _ => Self::NewlineDelimited,
        }
    }
}

/// Outcome of decoding one complete line
#[derive(Debug)]
enum Record {
    /// Blank, non-data or malformed line
    Skip,
    /// Sentinel reached
    Done,
    /// Zero or more normalized events
    Events(Vec<StreamEvent>),
}

/// Reassembles records across chunk boundaries and decodes them
///
/// Feed chunks in arrival order with [`LineDecoder::push`] and call
/// [`LineDecoder::finish`] once the source is exhausted. The emitted event
/// sequence does not depend on where chunk boundaries fall.
#[derive(Debug)]
pub struct LineDecoder {
    framing: Framing,
    server_url: String,
    buffer: Vec<u8>,
    finished: bool,
}

impl LineDecoder {
    /// Create a decoder for one response
    ///
    /// `server_url` is the base that relative audio references resolve against.
    #[must_use]
    pub fn new(framing: Framing, server_url: impl Into<String>) -> Self {
        Self {
            framing,
            server_url: server_url.into(),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Whether the sequence has ended; later input is ignored
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a chunk and decode every line it completes
    ///
    /// Once the sentinel is seen the returned events end with
    /// [`StreamEvent::Done`] and the rest of the input is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            match self.decode_line(line) {
                Record::Skip => {}
                Record::Events(decoded) => events.extend(decoded),
                Record::Done => {
                    tracing::debug!("stream sentinel reached");
                    self.finish_with(&mut events);
                    break;
                }
            }
        }

        events
    }

    /// Signal that the source is exhausted
    ///
    /// Any incomplete trailing line is discarded. Returns the final
    /// [`StreamEvent::Done`] unless the sequence already ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        if !self.buffer.is_empty() {
            tracing::debug!(
                bytes = self.buffer.len(),
                "discarding incomplete trailing record"
            );
        }

        let mut events = Vec::new();
        self.finish_with(&mut events);
        events
    }

    fn finish_with(&mut self, events: &mut Vec<StreamEvent>) {
        self.finished = true;
        self.buffer.clear();
        events.push(StreamEvent::Done);
    }

    fn decode_line(&self, line: &str) -> Record {
        let payload = match self.framing {
            Framing::EventStream => match line.strip_prefix(DATA_PREFIX) {
                Some(rest) => rest.trim(),
                None => return Record::Skip,
            },
            Framing::NewlineDelimited => line.trim(),
        };

        if payload.is_empty() {
            return Record::Skip;
        }
        if payload == DONE_SENTINEL {
            return Record::Done;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) if value.is_object() => {
                Record::Events(normalize::decode_record(&value, &self.server_url))
            }
            _ => match self.framing {
                Framing::NewlineDelimited => {
                    Record::Events(vec![StreamEvent::TextDelta(line.to_string())])
                }
                Framing::EventStream => {
                    tracing::trace!(payload, "dropping undecodable event-stream record");
                    Record::Skip
                }
            },
        }
    }
}
