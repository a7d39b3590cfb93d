//! Microphone capture

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// An exclusively-held audio input
///
/// The recorder acquires the device when recording starts and releases it
/// when recording stops; nothing else touches it in between.
pub trait CaptureDevice {
    /// Open the input and start buffering samples
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureDenied`] if the input cannot be opened
    fn acquire(&mut self) -> Result<()>;

    /// Stop capturing and close the input
    fn release(&mut self);

    /// Take every sample buffered since the previous call
    fn drain(&mut self) -> Vec<f32>;

    /// Sample rate of drained samples
    fn sample_rate(&self) -> u32;
}

/// Captures mono audio from the default input device
#[derive(Default)]
pub struct AudioCapture {
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create an idle capture; the device is opened on [`CaptureDevice::acquire`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn input_config(device: &cpal::Device) -> Result<StreamConfig> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::CaptureDenied(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::CaptureDenied("no mono 16 kHz input config found".to_string()))?;

        Ok(supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config())
    }
}

impl CaptureDevice for AudioCapture {
    fn acquire(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::CaptureDenied("no input device available".to_string()))?;
        let config = Self::input_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "opening audio input"
        );

        // Drop leftovers before the callback can deliver fresh samples
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::CaptureDenied(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::CaptureDenied(e.to_string()))?;

        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    fn drain(&mut self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_and_length() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0];
        let wav = encode_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus two bytes per sample
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn wav_clamps_out_of_range_samples() {
        let wav = encode_wav(&[2.0, -2.0], SAMPLE_RATE).unwrap();
        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![32767, -32768]);
    }

    #[test]
    fn new_capture_is_idle() {
        let mut capture = AudioCapture::new();
        assert!(!capture.is_capturing());
        assert!(capture.drain().is_empty());
        assert_eq!(capture.sample_rate(), SAMPLE_RATE);
    }
}
