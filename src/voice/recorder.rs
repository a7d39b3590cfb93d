//! Recording state machine
//!
//! ```text
//!            start()                 stop() / silence
//!   Idle ─────────────▶ Recording ─────────────────────▶ Idle
//!          acquire device            release device,
//!          reset detector            encode WAV
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::capture::{CaptureDevice, encode_wav};
use super::silence::{SilenceConfig, SilenceDetector, rms};
use crate::client::AudioPayload;
use crate::{Error, Result};

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not capturing; the device is released
    Idle,
    /// Capturing; the device is held exclusively
    Recording,
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped by the caller
    Manual,
    /// Stopped after sustained silence
    Silence,
    /// The cancel signal fired while recording
    Cancelled,
}

impl StopReason {
    /// Short label for logs
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Silence => "silence",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A finished recording
#[derive(Debug, Clone)]
pub struct Recording {
    /// 16-bit mono WAV bytes
    pub wav: Vec<u8>,
    /// Number of captured samples
    pub samples: usize,
    /// Sample rate of the capture
    pub sample_rate: u32,
    /// Why recording stopped
    pub stop_reason: StopReason,
}

impl Recording {
    /// Captured duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let secs = self.samples as f64 / f64::from(self.sample_rate);
        Duration::from_secs_f64(secs)
    }

    /// Convert into an upload payload
    #[must_use]
    pub fn into_payload(self) -> AudioPayload {
        AudioPayload::wav(self.wav)
    }
}

/// Owns the capture device and silence detector for one microphone
pub struct Recorder<D: CaptureDevice> {
    device: D,
    state: RecorderState,
    detector: SilenceDetector,
    samples: Vec<f32>,
}

impl<D: CaptureDevice> Recorder<D> {
    /// Create an idle recorder
    pub const fn new(device: D, silence: SilenceConfig) -> Self {
        Self {
            device,
            state: RecorderState::Idle,
            detector: SilenceDetector::new(silence),
            samples: Vec::new(),
        }
    }

    /// Current state
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Whether the device is held
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Underlying capture device
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Start recording
    ///
    /// Starting while already recording is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureDenied`] if the device cannot be acquired; the
    /// recorder stays idle.
    pub fn start(&mut self) -> Result<()> {
        if self.is_recording() {
            return Ok(());
        }

        self.device.acquire()?;
        self.reset();
        self.state = RecorderState::Recording;
        tracing::info!("recording started");
        Ok(())
    }

    /// Take one amplitude sample
    ///
    /// Drains the device, feeds the RMS level of the new samples to the
    /// silence detector and, if it fires, stops recording. `elapsed` is the
    /// time covered since the previous poll.
    ///
    /// # Errors
    ///
    /// Returns error if the auto-stopped recording cannot be encoded
    pub fn poll(&mut self, elapsed: Duration) -> Result<Option<Recording>> {
        if !self.is_recording() {
            return Ok(None);
        }

        let fresh = self.device.drain();
        let level = rms(&fresh);
        self.samples.extend_from_slice(&fresh);

        tracing::trace!(level, samples = fresh.len(), "sampled input level");

        if self.detector.observe(level, elapsed) {
            return self.finish(StopReason::Silence).map(Some);
        }
        Ok(None)
    }

    /// Stop recording and return the captured audio
    ///
    /// # Errors
    ///
    /// Returns error if not recording or if WAV encoding fails
    pub fn stop(&mut self) -> Result<Recording> {
        if !self.is_recording() {
            return Err(Error::Audio("not recording".to_string()));
        }
        self.finish(StopReason::Manual)
    }

    /// Stop recording and discard the captured audio
    pub fn cancel(&mut self) {
        if self.is_recording() {
            self.device.release();
            self.state = RecorderState::Idle;
            self.reset();
            tracing::info!("recording cancelled");
        }
    }

    /// Record until silence or until `cancel` resolves
    ///
    /// Polls every `cadence`, feeding the detector the time that actually
    /// passed since the previous poll. On cancel, whatever was captured so
    /// far is returned. Dropping the returned future discards the recording
    /// and releases the device.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be acquired or encoding fails
    pub async fn record_until_silent<F>(&mut self, cadence: Duration, cancel: F) -> Result<Recording>
    where
        F: Future,
    {
        self.start()?;
        let mut recorder = CancelOnDrop(self);

        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;
        let mut last_poll = Instant::now();

        tokio::pin!(cancel);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_poll);
                    last_poll = now;

                    if let Some(recording) = recorder.0.poll(elapsed)? {
                        return Ok(recording);
                    }
                }
                _ = &mut cancel => {
                    let mut recording = recorder.0.stop()?;
                    recording.stop_reason = StopReason::Cancelled;
                    return Ok(recording);
                }
            }
        }
    }

    fn finish(&mut self, reason: StopReason) -> Result<Recording> {
        let mut tail = self.device.drain();
        self.samples.append(&mut tail);
        self.device.release();
        self.state = RecorderState::Idle;

        let samples = std::mem::take(&mut self.samples);
        let sample_rate = self.device.sample_rate();
        self.reset();

        let wav = encode_wav(&samples, sample_rate)?;
        let recording = Recording {
            wav,
            samples: samples.len(),
            sample_rate,
            stop_reason: reason,
        };

        tracing::info!(
            reason = reason.label(),
            samples = recording.samples,
            duration_ms = u64::try_from(recording.duration().as_millis()).unwrap_or(u64::MAX),
            "recording stopped"
        );
        Ok(recording)
    }

    /// Clear captured samples and detector state
    fn reset(&mut self) {
        self.samples.clear();
        self.detector.reset();
    }
}

/// Cancels a recording left running by an abandoned
/// [`Recorder::record_until_silent`]
struct CancelOnDrop<'a, D: CaptureDevice>(&'a mut Recorder<D>);

impl<D: CaptureDevice> Drop for CancelOnDrop<'_, D> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl<D: CaptureDevice> Drop for Recorder<D> {
    fn drop(&mut self) {
        if self.is_recording() {
            self.device.release();
        }
    }
}
