//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::collections::VecDeque;
use std::io::Cursor;
use std::time::Duration;

use voice_chat_client::voice::{
    CaptureDevice, DEFAULT_CADENCE, Recorder, RecorderState, SAMPLE_RATE, SilenceConfig,
    SilenceDetector, StopReason, encode_wav, rms,
};
use voice_chat_client::{Error, Result};

mod common;
use common::{generate_silence, generate_sine_samples};

/// Plays back a fixed list of frames, one per drain
#[derive(Default)]
struct ScriptedMic {
    frames: VecDeque<Vec<f32>>,
    open: bool,
    deny: bool,
}

impl ScriptedMic {
    fn new(frames: impl IntoIterator<Item = Vec<f32>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl CaptureDevice for ScriptedMic {
    fn acquire(&mut self) -> Result<()> {
        if self.deny {
            return Err(Error::CaptureDenied("permission denied".to_string()));
        }
        self.open = true;
        Ok(())
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn drain(&mut self) -> Vec<f32> {
        self.frames.pop_front().unwrap_or_default()
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// 100 ms frames: `speech` of tone followed by `quiet` of silence
fn utterance(speech: usize, quiet: usize) -> Vec<Vec<f32>> {
    let tone = (0..speech).map(|_| generate_sine_samples(440.0, 0.1, 0.3));
    let hush = (0..quiet).map(|_| generate_silence(0.1));
    tone.chain(hush).collect()
}

#[test]
fn test_rms_of_generated_signals() {
    assert!(rms(&generate_silence(0.1)) < 1e-6);

    // RMS of a sine is amplitude / sqrt(2)
    let level = rms(&generate_sine_samples(440.0, 0.5, 0.3));
    assert!((level - 0.3 / 2f32.sqrt()).abs() < 0.01, "rms was {level}");
}

#[test]
fn test_detector_fires_once_after_quiet_period() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let speech = rms(&generate_sine_samples(440.0, 0.1, 0.3));
    let quiet = rms(&generate_silence(0.1));

    for _ in 0..5 {
        assert!(!detector.observe(speech, DEFAULT_CADENCE));
    }

    // 15 quiet frames reach exactly 1.5s, which is not yet longer than the period
    let fired: Vec<bool> = (0..25)
        .map(|_| detector.observe(quiet, DEFAULT_CADENCE))
        .collect();
    assert_eq!(fired.iter().filter(|f| **f).count(), 1);
    assert!(fired[15]);
    assert!(detector.has_fired());
}

#[test]
fn test_speech_resets_quiet_streak() {
    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let speech = rms(&generate_sine_samples(440.0, 0.1, 0.3));
    let quiet = rms(&generate_silence(0.1));

    for _ in 0..10 {
        detector.observe(quiet, DEFAULT_CADENCE);
    }
    assert_eq!(detector.quiet_for(), Duration::from_secs(1));

    detector.observe(speech, DEFAULT_CADENCE);
    assert_eq!(detector.quiet_for(), Duration::ZERO);
    assert!(!detector.has_fired());
}

#[test]
fn test_quiet_speaker_counts_as_silence() {
    let config = SilenceConfig {
        threshold: 0.05,
        quiet_period: Duration::from_millis(300),
    };
    let mut detector = SilenceDetector::new(config);
    let murmur = rms(&generate_sine_samples(440.0, 0.1, 0.02));

    let fired = (0..4).any(|_| detector.observe(murmur, DEFAULT_CADENCE));
    assert!(fired);
}

#[test]
fn test_recorder_stops_on_silence() {
    let mut recorder = Recorder::new(ScriptedMic::new(utterance(8, 20)), SilenceConfig::default());
    recorder.start().unwrap();
    assert_eq!(recorder.state(), RecorderState::Recording);
    assert!(recorder.device().open);

    let mut recording = None;
    for _ in 0..40 {
        if let Some(done) = recorder.poll(DEFAULT_CADENCE).unwrap() {
            recording = Some(done);
            break;
        }
    }

    let recording = recording.expect("silence never detected");
    assert_eq!(recording.stop_reason, StopReason::Silence);
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert!(!recorder.device().open);

    // 8 speech frames, 16 quiet frames to fire, plus the drained tail frame
    assert_eq!(recording.samples, 25 * 1600);
    assert_eq!(recording.duration(), Duration::from_millis(2500));

    let reader = hound::WavReader::new(Cursor::new(recording.wav)).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as usize, 25 * 1600);
}

#[test]
fn test_denied_microphone_leaves_recorder_idle() {
    let mic = ScriptedMic {
        deny: true,
        ..ScriptedMic::default()
    };
    let mut recorder = Recorder::new(mic, SilenceConfig::default());

    assert!(matches!(recorder.start(), Err(Error::CaptureDenied(_))));
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert!(recorder.stop().is_err());
}

#[test]
fn test_manual_stop_keeps_speech() {
    let mut recorder = Recorder::new(ScriptedMic::new(utterance(3, 0)), SilenceConfig::default());
    recorder.start().unwrap();
    recorder.poll(DEFAULT_CADENCE).unwrap();
    recorder.poll(DEFAULT_CADENCE).unwrap();

    let recording = recorder.stop().unwrap();
    assert_eq!(recording.stop_reason, StopReason::Manual);
    assert_eq!(recording.samples, 3 * 1600);
    assert!(recording.into_payload().bytes.starts_with(b"RIFF"));
}

#[tokio::test(start_paused = true)]
async fn test_record_until_silent() {
    let mut recorder = Recorder::new(ScriptedMic::new(utterance(5, 30)), SilenceConfig::default());

    let recording = recorder
        .record_until_silent(DEFAULT_CADENCE, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(recording.stop_reason, StopReason::Silence);
    assert!(!recorder.is_recording());
}

#[tokio::test(start_paused = true)]
async fn test_record_until_cancelled() {
    // Never goes quiet
    let frames = utterance(100, 0);
    let mut recorder = Recorder::new(ScriptedMic::new(frames), SilenceConfig::default());

    let cancel = tokio::time::sleep(Duration::from_millis(550));
    let recording = recorder
        .record_until_silent(DEFAULT_CADENCE, cancel)
        .await
        .unwrap();

    assert_eq!(recording.stop_reason, StopReason::Cancelled);
    assert!(recording.samples > 0);
    assert!(!recorder.device().open);
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = encode_wav(&original_samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[1], 16383);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_recording_releases_microphone() {
    let mut recorder = Recorder::new(ScriptedMic::new(utterance(100, 0)), SilenceConfig::default());

    let outcome = tokio::time::timeout(
        Duration::from_millis(350),
        recorder.record_until_silent(DEFAULT_CADENCE, std::future::pending::<()>()),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(recorder.state(), RecorderState::Idle);
    assert!(!recorder.device().open);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_ticks_count_elapsed_quiet_time() {
    let mut recorder = Recorder::new(ScriptedMic::new(utterance(0, 40)), SilenceConfig::default());

    // Moves the clock past the quiet period between two ticks
    let stall = async {
        tokio::time::advance(Duration::from_secs(2)).await;
        std::future::pending::<()>().await;
    };
    let recording = recorder
        .record_until_silent(DEFAULT_CADENCE, stall)
        .await
        .unwrap();

    assert_eq!(recording.stop_reason, StopReason::Silence);
    // One poll plus the drained tail frame
    assert_eq!(recording.samples, 2 * 1600);
}
