//! Feedforward Compressor
//!
//! # Signal Flow (per channel, per sample)
//! 1. **Detector**: RMS level of the input (see `envelope`).
//! 2. **Ballistics**: attack while the level rises, release while it falls.
//! 3. **Gain computer**: hard knee. Below threshold nothing happens; above it
//!    the excess is scaled by `1 - 1/ratio` and removed.
//! 4. **Apply**: linear gain multiplied into the sample in place.
//!
//! # Lifecycle
//! - **Unprepared**: `process` refuses to run.
//! - **Prepared**: per-channel state sized, coefficients valid for the sample
//!   rate. `prepare` may be called again at any time the audio thread is idle.
//! - **Bypassed**: the buffer is left untouched and the envelopes are frozen,
//!   so resuming continues from the level seen before the bypass.
//!
//! # Real-time contract
//! `process` takes no locks, performs no I/O and never allocates. Parameter
//! changes arrive through `SharedSettings` and only cost a few `exp` calls
//! when a new snapshot is observed.

use crate::dsp::envelope::{ChannelEnvelope, EnvelopeCoeffs};
use crate::dsp::snapshot::SharedSettings;
use crate::dsp::utils::{db_to_lin, lin_to_db};
use crate::error::ConfigurationError;
use crate::settings::CompressorSettings;
use std::sync::Arc;

// Sequence value that never matches a published snapshot (published ones are even).
const FORCE_REFRESH: u32 = u32::MAX;

/// Static gain curve: dB of reduction for an envelope level in dB.
///
/// `(level - threshold) * (1 - 1/ratio)` at or above threshold, zero below.
#[inline]
pub fn gain_reduction_db(level_db: f32, threshold_db: f32, ratio: f32) -> f32 {
    let over_db = level_db - threshold_db;
    if over_db < 0.0 {
        return 0.0;
    }
    over_db * (1.0 - 1.0 / ratio.max(1.0))
}

#[derive(Clone, Copy, Debug, Default)]
struct ChannelState {
    envelope: ChannelEnvelope,
    // Last computed reduction (dB, positive), for metering
    gain_reduction_db: f32,
}

impl ChannelState {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain_reduction_db = 0.0;
    }
}

/// Single-band feedforward compressor with per-channel envelopes.
pub struct CompressorEngine {
    shared: Arc<SharedSettings>,
    seen_sequence: u32,

    // Applied (sanitized) parameters and what is derived from them
    settings: CompressorSettings,
    slope: f32,
    coeffs: EnvelopeCoeffs,

    channels: Vec<ChannelState>,
    sample_rate: f32,
    max_block_size: usize,
    prepared: bool,
}

impl Default for CompressorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressorEngine {
    pub fn new() -> Self {
        Self::with_shared(Arc::new(SharedSettings::default()))
    }

    /// Build an engine that reads its parameters from an existing cell.
    pub fn with_shared(shared: Arc<SharedSettings>) -> Self {
        let settings = CompressorSettings::default();
        Self {
            shared,
            seen_sequence: FORCE_REFRESH,
            settings,
            slope: 1.0 - 1.0 / settings.ratio,
            coeffs: EnvelopeCoeffs::new(settings.attack_ms, settings.release_ms, 44100.0),
            channels: Vec::new(),
            sample_rate: 0.0,
            max_block_size: 0,
            prepared: false,
        }
    }

    /// Size per-channel state and derive coefficients for `sample_rate`.
    ///
    /// Not real-time safe: may allocate. Any previous envelope state is
    /// discarded.
    pub fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        num_channels: usize,
    ) -> Result<(), ConfigurationError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigurationError::InvalidSampleRate(sample_rate));
        }
        if num_channels == 0 {
            return Err(ConfigurationError::NoChannels);
        }
        if max_block_size == 0 {
            return Err(ConfigurationError::InvalidBlockSize);
        }

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.channels.clear();
        self.channels.resize(num_channels, ChannelState::default());

        self.seen_sequence = FORCE_REFRESH;
        self.refresh_settings();
        self.prepared = true;

        log::debug!(
            "compressor prepared: {} Hz, {} channels, max block {}",
            sample_rate,
            num_channels,
            max_block_size
        );
        Ok(())
    }

    /// Publish new parameters. Callable from any thread without blocking;
    /// takes effect on the next `process` call.
    pub fn set_parameters(&self, settings: CompressorSettings) {
        self.shared.store(settings);
    }

    /// Compress `buffer` in place (one slice per channel).
    pub fn process(
        &mut self,
        buffer: &mut [&mut [f32]],
        bypassed: bool,
    ) -> Result<(), ConfigurationError> {
        if !self.prepared {
            return Err(ConfigurationError::NotPrepared);
        }
        if buffer.len() != self.channels.len() {
            return Err(ConfigurationError::ChannelCountMismatch {
                expected: self.channels.len(),
                actual: buffer.len(),
            });
        }
        let num_samples = buffer.first().map_or(0, |ch| ch.len());
        for (channel, samples) in buffer.iter().enumerate() {
            if samples.len() != num_samples {
                return Err(ConfigurationError::RaggedBuffer {
                    channel,
                    expected: num_samples,
                    actual: samples.len(),
                });
            }
        }

        self.refresh_settings();

        if bypassed || num_samples == 0 {
            return Ok(());
        }

        let coeffs = self.coeffs;
        let threshold_db = self.settings.threshold_db;
        let slope = self.slope;

        for (state, samples) in self.channels.iter_mut().zip(buffer.iter_mut()) {
            let mut reduction_db = state.gain_reduction_db;
            for sample in samples.iter_mut() {
                let level = state.envelope.process_sample(*sample, &coeffs);
                let over_db = lin_to_db(level) - threshold_db;
                reduction_db = if over_db > 0.0 { over_db * slope } else { 0.0 };
                if reduction_db > 0.0 {
                    *sample *= db_to_lin(-reduction_db);
                }
            }
            state.gain_reduction_db = reduction_db;
        }

        Ok(())
    }

    /// Clear envelopes without touching allocation or coefficients.
    pub fn reset(&mut self) {
        for state in self.channels.iter_mut() {
            state.reset();
        }
    }

    /// Pick up a newly published parameter set, if any.
    fn refresh_settings(&mut self) {
        if let Some((sequence, settings)) = self.shared.try_load(self.seen_sequence) {
            self.seen_sequence = sequence;
            self.apply_settings(settings);
        }
    }

    fn apply_settings(&mut self, settings: CompressorSettings) {
        let settings = settings.sanitized();
        self.settings = settings;
        self.slope = 1.0 - 1.0 / settings.ratio;
        if self.sample_rate > 0.0 {
            self.coeffs =
                EnvelopeCoeffs::new(settings.attack_ms, settings.release_ms, self.sample_rate);
        }
    }

    pub fn shared(&self) -> Arc<SharedSettings> {
        self.shared.clone()
    }

    /// Parameters currently in effect on the audio thread.
    pub fn current_settings(&self) -> CompressorSettings {
        self.settings
    }

    /// Most recent gain reduction on `channel`, in positive dB.
    pub fn gain_reduction_db(&self, channel: usize) -> f32 {
        self.channels
            .get(channel)
            .map_or(0.0, |state| state.gain_reduction_db)
    }

    /// Smoothed envelope level on `channel` (linear).
    pub fn envelope_level(&self, channel: usize) -> f32 {
        self.channels
            .get(channel)
            .map_or(0.0, |state| state.envelope.level())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
}
