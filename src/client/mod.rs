//! HTTP client for the inference server

mod request;

use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use reqwest::header::CONTENT_TYPE;

pub use request::{AudioPayload, ChatRequest, RequestBuilder, parse_tools_schema};

use crate::Result;
use crate::stream::{self as decode, Framing, LineDecoder, StreamEvent};

/// Sequence of events decoded from one response
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Sends chat requests and decodes their responses
#[derive(Debug, Clone, Default)]
pub struct ChatClient {
    http: reqwest::Client,
}

impl ChatClient {
    /// Create a client with default HTTP settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that gives up on unreachable servers after `timeout`
    ///
    /// Only connecting is bounded; a slow stream is never cut off.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be initialized
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Send a request and return its decoded response events
    ///
    /// Never fails: a transport failure (connection error, non-success
    /// status, unreadable body) becomes a single [`StreamEvent::Error`] and
    /// the sequence ends. Nothing is retried.
    pub async fn send(&self, request: ChatRequest) -> EventStream {
        let url = request.url.clone();
        let streaming = request.streaming;
        let server_url = request.server_url.clone();

        let form = match request.into_form() {
            Ok(form) => form,
            Err(e) => return transport_error(format!("failed to encode request: {e}")),
        };

        tracing::debug!(%url, streaming, "sending chat request");

        let response = match self.http.post(&url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, %url, "chat request failed");
                return transport_error(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "server returned error status");
            return transport_error(format_status_error(status, &body));
        }

        if streaming {
            let framing = Framing::from_content_type(
                response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok()),
            );
            tracing::debug!(?framing, "decoding streamed response");

            let decoder = LineDecoder::new(framing, server_url);
            decode::decode_stream(response.bytes_stream(), decoder).boxed()
        } else {
            stream::once(async move {
                match response.json::<serde_json::Value>().await {
                    Ok(document) => decode::decode_document(&document, &server_url),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to parse response document");
                        vec![StreamEvent::Error(format!("invalid response: {e}"))]
                    }
                }
            })
            .flat_map(stream::iter)
            .boxed()
        }
    }
}

fn format_status_error(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("server returned {status}")
    } else {
        format!("server returned {status}: {body}")
    }
}

fn transport_error(message: String) -> EventStream {
    stream::iter([StreamEvent::Error(message)]).boxed()
}
