//! Typed parameter set consumed by the compressor engine.

use crate::ratio::RatioChoice;

pub const THRESHOLD_MIN_DB: f32 = -60.0;
pub const THRESHOLD_MAX_DB: f32 = 12.0;
pub const THRESHOLD_DEFAULT_DB: f32 = 0.0;

pub const TIME_MIN_MS: f32 = 5.0;
pub const TIME_MAX_MS: f32 = 500.0;
pub const ATTACK_DEFAULT_MS: f32 = 50.0;
pub const RELEASE_DEFAULT_MS: f32 = 250.0;

/// Lowest ratio the gain computer accepts. 1:1 means no compression.
pub const RATIO_MIN: f32 = 1.0;
pub const RATIO_MAX: f32 = 100.0;

/// Snapshot of the four continuous compressor controls.
///
/// The engine only ever reads these; the host (or a control thread) owns them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub ratio: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: THRESHOLD_DEFAULT_DB,
            attack_ms: ATTACK_DEFAULT_MS,
            release_ms: RELEASE_DEFAULT_MS,
            ratio: RatioChoice::default().value(),
        }
    }
}

impl CompressorSettings {
    pub fn new(threshold_db: f32, attack_ms: f32, release_ms: f32, ratio: f32) -> Self {
        Self {
            threshold_db,
            attack_ms,
            release_ms,
            ratio,
        }
    }

    /// Clamp every field into its documented range. Non-finite values are
    /// replaced by the field default, so `ratio >= 1` always holds afterwards.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            threshold_db: clamp_or(
                self.threshold_db,
                THRESHOLD_MIN_DB,
                THRESHOLD_MAX_DB,
                defaults.threshold_db,
            ),
            attack_ms: clamp_or(self.attack_ms, TIME_MIN_MS, TIME_MAX_MS, defaults.attack_ms),
            release_ms: clamp_or(
                self.release_ms,
                TIME_MIN_MS,
                TIME_MAX_MS,
                defaults.release_ms,
            ),
            ratio: clamp_or(self.ratio, RATIO_MIN, RATIO_MAX, defaults.ratio),
        }
    }
}

#[inline]
pub fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
