//! Outbound chat request assembly

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::config::Settings;
use crate::{Error, Result};

/// An audio file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Encoded audio
    pub bytes: Vec<u8>,
    /// File name reported in the multipart part
    pub file_name: String,
    /// MIME type of `bytes`
    pub mime_type: String,
}

impl AudioPayload {
    /// Wrap WAV bytes produced by the recorder
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "recording.wav".to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }

    /// Read an audio file, inferring its MIME type from the extension
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or has an unsupported extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mime_type = mime_for_extension(&extension).ok_or_else(|| {
            Error::Audio(format!("unsupported audio file type: {}", path.display()))
        })?;

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        tracing::debug!(file = %path.display(), bytes = bytes.len(), mime_type, "loaded audio file");

        Ok(Self {
            bytes,
            file_name,
            mime_type: mime_type.to_string(),
        })
    }

    fn into_part(self) -> Result<Part> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime_type)
            .map_err(|e| Error::Audio(format!("invalid MIME type: {e}")))
    }
}

/// MIME type for a lowercase audio file extension
fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "webm" => Some("audio/webm"),
        "ogg" | "oga" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        _ => None,
    }
}

/// Parse user-edited tool schema text
///
/// Blank text means no tools. Anything else must be a JSON array or object.
///
/// # Errors
///
/// Returns [`Error::ToolSchema`] if the text is not a JSON array or object
pub fn parse_tools_schema(text: &str) -> Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::ToolSchema(e.to_string()))?;

    if !(value.is_array() || value.is_object()) {
        return Err(Error::ToolSchema(
            "expected a JSON array or object of tool definitions".to_string(),
        ));
    }

    Ok(Some(value))
}

/// A validated request, ready to send
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Endpoint the request is posted to
    pub url: String,
    /// Whether the endpoint streams its response
    pub streaming: bool,
    /// Base URL that relative audio references in the reply resolve against
    pub server_url: String,
    /// Spoken user input
    pub audio: AudioPayload,
    /// Instructions sent verbatim
    pub system_prompt: String,
    /// Optional routing hint
    pub model: Option<String>,
    /// Optional reference voice for synthesized replies
    pub voice_prompt: Option<AudioPayload>,
    /// Tool definitions, already validated
    pub tools: Option<Value>,
}

impl ChatRequest {
    /// Encode as the multipart form the server expects
    ///
    /// # Errors
    ///
    /// Returns error if a payload carries an invalid MIME type
    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new()
            .part("audio", self.audio.into_part()?)
            .text("system_prompt", self.system_prompt);

        if let Some(model) = self.model {
            form = form.text("model", model);
        }
        if let Some(voice) = self.voice_prompt {
            form = form.part("voice_prompt", voice.into_part()?);
        }
        if let Some(tools) = self.tools {
            form = form.text("tools", serde_json::to_string(&tools)?);
        }

        Ok(form)
    }
}

/// Builds a [`ChatRequest`] from the current settings
///
/// All validation happens in [`RequestBuilder::build`], before any network
/// activity.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    settings: &'a Settings,
    audio: Option<AudioPayload>,
    voice_prompt: Option<AudioPayload>,
}

impl<'a> RequestBuilder<'a> {
    /// Start a request using `settings`
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            audio: None,
            voice_prompt: None,
        }
    }

    /// Set the captured audio
    #[must_use]
    pub fn audio(mut self, audio: AudioPayload) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Set an optional voice-prompt sample
    #[must_use]
    pub fn voice_prompt(mut self, voice_prompt: Option<AudioPayload>) -> Self {
        self.voice_prompt = voice_prompt;
        self
    }

    /// Validate inputs and produce the request
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no audio was set, or
    /// [`Error::ToolSchema`] if the configured tool schema is malformed
    pub fn build(self) -> Result<ChatRequest> {
        let audio = self
            .audio
            .ok_or_else(|| Error::Config("no audio to send".to_string()))?;

        if audio.bytes.is_empty() {
            return Err(Error::Config("captured audio is empty".to_string()));
        }

        let tools = parse_tools_schema(&self.settings.tools_schema)?;

        let model = Some(self.settings.model_id.trim())
            .filter(|m| !m.is_empty())
            .map(ToString::to_string);

        let request = ChatRequest {
            url: self.settings.endpoint(),
            streaming: self.settings.streaming_enabled,
            server_url: self.settings.server_url.clone(),
            audio,
            system_prompt: self.settings.system_prompt.clone(),
            model,
            voice_prompt: self.voice_prompt,
            tools,
        };

        tracing::debug!(
            url = %request.url,
            streaming = request.streaming,
            model = ?request.model,
            has_tools = request.tools.is_some(),
            has_voice_prompt = request.voice_prompt.is_some(),
            "built chat request"
        );

        Ok(request)
    }
}
