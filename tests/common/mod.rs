//! Shared test utilities

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::stream;

use voice_chat_client::voice::SAMPLE_RATE;

/// Streamed reply used by the event-stream route, split mid-record on purpose
pub const SSE_CHUNKS: &[&str] = &[
    ": keep-alive\n\ndata: {\"delta\":\"Hel\"}\n\nda",
    "ta: {\"delta\":\"lo\"}\n\ndata: {\"tool_call\":{\"id\":\"call_1\",\"name\":\"get_weather\",",
    "\"arguments\":\"{\\\"city\\\":\"}}\n\ndata: {\"tool_call\":{\"id\":\"call_1\",\"arguments\":\"\\\"Paris\\\"}\"}}\r\n",
    "\r\ndata: {\"audio_url\":\"/audio/1.wav\"}\n\ndata: [DONE]\n\ndata: {\"delta\":\"ignored\"}\n\n",
];

/// Streamed reply used by the newline-delimited route
pub const NDJSON_CHUNKS: &[&str] = &[
    "{\"content\":\"Bon\"}\n{\"cont",
    "ent\":\"jour\"}\nplain words\n",
    "{\"audio_url\":\"https://cdn.example/a.mp3\"}\n",
];

/// Single-shot reply for the document route
pub const DOCUMENT: &str = r#"{"response":"Hi there","audio_url":"clips/7.wav","tool_calls":[{"id":"t1","function":{"name":"lookup","arguments":{"q":"x"}}}]}"#;

/// One multipart field seen by the test server
#[derive(Debug, Clone)]
pub struct ReceivedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ReceivedField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Every request body the test server received, as multipart fields
pub type Received = Arc<Mutex<Vec<Vec<ReceivedField>>>>;

/// Handle to a running test server
pub struct TestServer {
    pub base_url: String,
    pub received: Received,
}

impl TestServer {
    /// Fields of the `index`-th request
    pub fn request(&self, index: usize) -> Vec<ReceivedField> {
        self.received.lock().unwrap()[index].clone()
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

/// Look up a field by name
pub fn field<'a>(fields: &'a [ReceivedField], name: &str) -> Option<&'a ReceivedField> {
    fields.iter().find(|f| f.name == name)
}

/// Spawn a chat server on an ephemeral port
///
/// Routes:
/// - `/sse/chat/stream`: event-stream reply from [`SSE_CHUNKS`]
/// - `/ndjson/chat/stream`: newline-delimited reply from [`NDJSON_CHUNKS`]
/// - `/chat`: the [`DOCUMENT`] reply
/// - `/broken/chat/stream`: 500 with a plain-text body
pub async fn spawn_server() -> TestServer {
    let received = Received::default();

    let app = Router::new()
        .route("/sse/chat/stream", post(sse_reply))
        .route("/ndjson/chat/stream", post(ndjson_reply))
        .route("/chat", post(document_reply))
        .route("/broken/chat/stream", post(broken_reply))
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        received,
    }
}

async fn record_fields(received: &Received, mut multipart: Multipart) {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("malformed multipart") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field.bytes().await.expect("unreadable field").to_vec();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    received.lock().unwrap().push(fields);
}

fn chunked(content_type: &'static str, chunks: &'static [&'static str]) -> Response {
    let body = Body::from_stream(stream::iter(
        chunks.iter().map(|chunk| Ok::<_, Infallible>(*chunk)),
    ));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

async fn sse_reply(State(received): State<Received>, multipart: Multipart) -> Response {
    record_fields(&received, multipart).await;
    chunked("text/event-stream", SSE_CHUNKS)
}

async fn ndjson_reply(State(received): State<Received>, multipart: Multipart) -> Response {
    record_fields(&received, multipart).await;
    chunked("application/x-ndjson", NDJSON_CHUNKS)
}

async fn document_reply(State(received): State<Received>, multipart: Multipart) -> Response {
    record_fields(&received, multipart).await;
    ([(header::CONTENT_TYPE, "application/json")], DOCUMENT).into_response()
}

async fn broken_reply(State(received): State<Received>, multipart: Multipart) -> Response {
    record_fields(&received, multipart).await;
    (StatusCode::INTERNAL_SERVER_ERROR, "model offline").into_response()
}

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}
