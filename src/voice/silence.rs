//! Silence detection for automatic recording stop

use std::time::Duration;

/// RMS amplitude below which input counts as quiet
pub const DEFAULT_THRESHOLD: f32 = 0.02;

/// Continuous quiet needed before recording stops
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);

/// How often the recorder samples amplitude
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(100);

/// Silence detector tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceConfig {
    /// RMS amplitude threshold
    pub threshold: f32,
    /// Quiet duration that triggers auto-stop
    pub quiet_period: Duration,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// Tracks continuous below-threshold amplitude
///
/// Fires once when the quiet streak exceeds the configured period, then
/// stays silent until [`SilenceDetector::reset`].
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    config: SilenceConfig,
    quiet_for: Duration,
    fired: bool,
}

impl SilenceDetector {
    /// Create a detector
    #[must_use]
    pub const fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            quiet_for: Duration::ZERO,
            fired: false,
        }
    }

    /// Record one amplitude sample covering `elapsed` time
    ///
    /// Returns `true` exactly once, on the sample that pushes the quiet
    /// streak past the quiet period.
    pub fn observe(&mut self, level: f32, elapsed: Duration) -> bool {
        if self.fired {
            return false;
        }

        if level >= self.config.threshold {
            self.quiet_for = Duration::ZERO;
            return false;
        }

        self.quiet_for = self.quiet_for.saturating_add(elapsed);
        if self.quiet_for > self.config.quiet_period {
            tracing::debug!(
                quiet_ms = u64::try_from(self.quiet_for.as_millis()).unwrap_or(u64::MAX),
                "silence detected"
            );
            self.fired = true;
            return true;
        }

        false
    }

    /// Current quiet streak
    #[must_use]
    pub const fn quiet_for(&self) -> Duration {
        self.quiet_for
    }

    /// Whether auto-stop already fired
    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.fired
    }

    /// Detector configuration
    #[must_use]
    pub const fn config(&self) -> SilenceConfig {
        self.config
    }

    /// Clear all detection state
    pub const fn reset(&mut self) {
        self.quiet_for = Duration::ZERO;
        self.fired = false;
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(SilenceConfig::default())
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
