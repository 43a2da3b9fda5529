//! Level detection and attack/release envelope for the compressor.
//!
//! # Design Notes
//! - Two stages per channel, run once per sample:
//!   1. **Detector**: short symmetric mean-square window, square-rooted (RMS).
//!      Keeps the steady-state level of periodic material free of ripple, so
//!      a sine at -6 dB RMS reads as -6 dB.
//!   2. **Ballistics**: one-pole follower on the detected level. Attack
//!      applies while the level rises, release while it falls.
//! - **No Allocations**: plain `Copy` state, safe on the audio thread.

use crate::dsp::utils::{ballistics, flush_denormal, time_constant_coeff};

/// RMS integration window. Short compared to the shortest attack (5 ms).
pub const RMS_WINDOW_MS: f32 = 5.0;

/// Coefficients shared by every channel of an engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeCoeffs {
    pub rms: f32,
    pub attack: f32,
    pub release: f32,
}

impl EnvelopeCoeffs {
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self {
            rms: time_constant_coeff(RMS_WINDOW_MS, sample_rate),
            attack: time_constant_coeff(attack_ms, sample_rate),
            release: time_constant_coeff(release_ms, sample_rate),
        }
    }
}

/// Per-channel envelope state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelEnvelope {
    // Mean-square detector state
    rms_sq: f32,
    // Smoothed level (linear)
    level: f32,
}

impl ChannelEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect the level of `input` and advance the envelope. Returns the
    /// smoothed linear level.
    #[inline]
    pub fn process_sample(&mut self, input: f32, coeffs: &EnvelopeCoeffs) -> f32 {
        let detected = self.detect(input, coeffs.rms);
        self.follow(detected, coeffs)
    }

    /// RMS detector stage.
    #[inline]
    pub fn detect(&mut self, input: f32, rms_coeff: f32) -> f32 {
        let x_sq = input * input;
        self.rms_sq = flush_denormal(rms_coeff * self.rms_sq + (1.0 - rms_coeff) * x_sq);
        // Protect against negative zero / NaN
        if !(self.rms_sq > 0.0) {
            self.rms_sq = 0.0;
        }
        self.rms_sq.sqrt()
    }

    /// Attack/release stage.
    #[inline]
    pub fn follow(&mut self, detected: f32, coeffs: &EnvelopeCoeffs) -> f32 {
        self.level = ballistics(self.level, detected, coeffs.attack, coeffs.release);
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.rms_sq = 0.0;
        self.level = 0.0;
    }
}
