//! Voice input
//!
//! Microphone capture, silence detection and the recorder state machine
//! that ties them together.

mod capture;
mod recorder;
mod silence;

pub use capture::{AudioCapture, CaptureDevice, SAMPLE_RATE, encode_wav};
pub use recorder::{Recorder, RecorderState, Recording, StopReason};
pub use silence::{
    DEFAULT_CADENCE, DEFAULT_QUIET_PERIOD, DEFAULT_THRESHOLD, SilenceConfig, SilenceDetector, rms,
};
