//! JSON payload normalization
//!
//! Servers describe the same concept under several key names. This module
//! maps every accepted shape onto [`StreamEvent`] variants so the folding
//! logic never has to sniff JSON. A payload with no recognized field yields
//! no events.

use serde_json::Value;

use super::{StreamEvent, ToolCallFragment};
use crate::endpoint;

/// Keys that may carry a text delta in a streamed record, in priority order
const TEXT_KEYS: &[&str] = &["delta", "content", "text"];

/// Keys that may carry the response text of a single-shot document
const DOCUMENT_TEXT_KEYS: &[&str] = &["text", "response"];

/// Keys that may carry an audio reference
const AUDIO_KEYS: &[&str] = &["audio_url", "url"];

/// Decode one streamed JSON record into events
#[must_use]
pub fn decode_record(value: &Value, server_url: &str) -> Vec<StreamEvent> {
    if let Some(message) = error_message(value) {
        return vec![StreamEvent::Error(message)];
    }

    let mut events = Vec::new();

    if let Some(text) = first_text(value, TEXT_KEYS) {
        events.push(StreamEvent::TextDelta(text.to_string()));
    }

    push_common(value, server_url, &mut events);

    if let Some(choices) = value.get("choices").and_then(Value::as_array) {
        for delta in choices.iter().filter_map(|c| c.get("delta")) {
            if let Some(text) = delta
                .get("content")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            {
                events.push(StreamEvent::TextDelta(text.to_string()));
            }
            if let Some(calls) = delta.get("tool_calls") {
                push_fragments(calls, &mut events);
            }
        }
    }

    events
}

/// Decode a single-shot (non-streaming) response document
///
/// The returned sequence always ends with [`StreamEvent::Done`] unless the
/// document carries an error.
#[must_use]
pub fn decode_document(value: &Value, server_url: &str) -> Vec<StreamEvent> {
    if let Some(message) = error_message(value) {
        return vec![StreamEvent::Error(message)];
    }

    let mut events = Vec::new();

    if let Some(text) = first_text(value, DOCUMENT_TEXT_KEYS) {
        events.push(StreamEvent::TextDelta(text.to_string()));
    }

    push_common(value, server_url, &mut events);
    events.push(StreamEvent::Done);
    events
}

/// Audio and flat tool-call fields, shared by both payload kinds
fn push_common(value: &Value, server_url: &str, events: &mut Vec<StreamEvent>) {
    if let Some(reference) = first_text(value, AUDIO_KEYS) {
        events.push(StreamEvent::AudioReady(endpoint::resolve(
            server_url, reference,
        )));
    }

    if let Some(call) = value.get("tool_call") {
        push_fragments(call, events);
    }
    if let Some(calls) = value.get("tool_calls") {
        push_fragments(calls, events);
    }
}

/// First non-empty string value among `keys`
fn first_text<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Human-readable message of an `error` field, if the record carries one
fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map_or_else(|| Value::Object(obj.clone()).to_string(), ToString::to_string),
        ),
        other => Some(other.to_string()),
    }
}

/// Push one fragment or an array of fragments
fn push_fragments(value: &Value, events: &mut Vec<StreamEvent>) {
    match value {
        Value::Array(items) => {
            events.extend(
                items
                    .iter()
                    .filter_map(fragment)
                    .map(StreamEvent::ToolCallFragment),
            );
        }
        other => {
            if let Some(f) = fragment(other) {
                events.push(StreamEvent::ToolCallFragment(f));
            }
        }
    }
}

/// Normalize the flat `{id, name, arguments}` shape and the upstream
/// `{id, function: {name, arguments}}` shape into one fragment
fn fragment(value: &Value) -> Option<ToolCallFragment> {
    let obj = value.as_object()?;
    let function = obj.get("function").filter(|f| f.is_object());

    let field = |key: &str| {
        function
            .and_then(|f| f.get(key))
            .or_else(|| obj.get(key))
    };

    let name = field("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = field("arguments").map(arguments_text).unwrap_or_default();
    let id = obj.get("id").and_then(correlation_id);

    if id.is_none() && name.is_empty() && arguments.is_empty() {
        return None;
    }

    Some(ToolCallFragment {
        id,
        name,
        arguments,
    })
}

fn arguments_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn correlation_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
