//! Client settings

pub mod file;

use serde::{Deserialize, Serialize};

use crate::endpoint;

pub use file::{SettingsStore, settings_file_path};

/// Built-in server URL, overridable at build time with
/// `VOICECHAT_DEFAULT_SERVER_URL`
pub const DEFAULT_SERVER_URL: &str = match option_env!("VOICECHAT_DEFAULT_SERVER_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

/// Default path of the streaming endpoint
pub const DEFAULT_STREAM_PATH: &str = "/chat/stream";

/// Path of the single-shot JSON endpoint
pub const DOCUMENT_PATH: &str = "/chat";

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant. Keep answers short and conversational.";

/// Server URLs shipped as defaults by earlier releases
///
/// A persisted value equal to one of these is replaced on load.
pub const STALE_SERVER_URLS: &[&str] = &["http://localhost:5000", "http://127.0.0.1:5000"];

/// User-editable client configuration
///
/// Persisted as one camelCase JSON document. Missing keys take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Inference server base URL
    pub server_url: String,

    /// System prompt, sent verbatim
    pub system_prompt: String,

    /// Use the streaming endpoint and decode the response incrementally
    pub streaming_enabled: bool,

    /// Streaming endpoint path, appended to `server_url`
    pub stream_path: String,

    /// Optional model routing hint; blank means server default
    pub model_id: String,

    /// Optional JSON tool-definition document, as edited by the user
    pub tools_schema: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            streaming_enabled: true,
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            model_id: String::new(),
            tools_schema: String::new(),
        }
    }
}

impl Settings {
    /// Endpoint selected by `streaming_enabled`
    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.streaming_enabled {
            let path = if self.stream_path.trim().is_empty() {
                DEFAULT_STREAM_PATH
            } else {
                self.stream_path.trim()
            };
            endpoint::resolve(&self.server_url, path)
        } else {
            endpoint::resolve(&self.server_url, DOCUMENT_PATH)
        }
    }

    /// Replace a stale or blank server URL with the current default
    ///
    /// Returns `true` if the URL was changed.
    pub fn migrate_server_url(&mut self) -> bool {
        let current = self.server_url.trim();
        let stale = current.is_empty()
            || STALE_SERVER_URLS
                .iter()
                .any(|s| s.trim_end_matches('/') == current.trim_end_matches('/'));

        if stale {
            tracing::info!(
                previous = %self.server_url,
                replacement = DEFAULT_SERVER_URL,
                "replacing outdated server URL"
            );
            self.server_url = DEFAULT_SERVER_URL.to_string();
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_stream_from_default_server() {
        let settings = Settings::default();
        assert!(settings.streaming_enabled);
        assert_eq!(
            settings.endpoint(),
            format!("{}/chat/stream", DEFAULT_SERVER_URL.trim_end_matches('/'))
        );
    }

    #[test]
    fn blank_stream_path_uses_default() {
        let settings = Settings {
            server_url: "https://h".to_string(),
            stream_path: " ".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.endpoint(), "https://h/chat/stream");
    }

    #[test]
    fn partial_document_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"serverUrl":"https://h","streamingEnabled":false}"#).unwrap();
        assert_eq!(settings.server_url, "https://h");
        assert!(!settings.streaming_enabled);
        assert_eq!(settings.stream_path, DEFAULT_STREAM_PATH);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        for key in [
            "serverUrl",
            "systemPrompt",
            "streamingEnabled",
            "streamPath",
            "modelId",
            "toolsSchema",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn stale_server_url_is_migrated() {
        let mut settings = Settings {
            server_url: "http://localhost:5000/".to_string(),
            ..Settings::default()
        };
        assert!(settings.migrate_server_url());
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);

        let mut custom = Settings {
            server_url: "https://my-server".to_string(),
            ..Settings::default()
        };
        assert!(!custom.migrate_server_url());
        assert_eq!(custom.server_url, "https://my-server");
    }
}
