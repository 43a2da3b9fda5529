//! Host-agnostic processor interface.
//!
//! `StatefulProcessor` is the narrow capability a host needs: prepare, process
//! in place, and save/restore parameters. The nih-plug shell in `lib.rs` and
//! the offline renderer both drive the compressor through these operations.

use crate::dsp::{CompressorEngine, SharedSettings};
use crate::error::{ConfigurationError, PersistenceError};
use crate::settings::CompressorSettings;
use crate::state::{self, PersistedState};
use std::sync::Arc;

pub trait StatefulProcessor {
    fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        num_channels: usize,
    ) -> Result<(), ConfigurationError>;

    fn process(&mut self, buffer: &mut [&mut [f32]]) -> Result<(), ConfigurationError>;

    fn get_state(&self) -> Result<String, PersistenceError>;

    /// Restore parameters. Unreadable data resets to defaults and reports the
    /// error; the processor stays usable either way.
    fn set_state(&mut self, data: &str) -> Result<(), PersistenceError>;
}

/// Compressor engine plus the parameter cell a control thread writes into.
pub struct CompressorProcessor {
    engine: CompressorEngine,
    shared: Arc<SharedSettings>,
}

impl Default for CompressorProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressorProcessor {
    pub fn new() -> Self {
        let shared = Arc::new(SharedSettings::default());
        Self {
            engine: CompressorEngine::with_shared(shared.clone()),
            shared,
        }
    }

    /// Handle for control threads: `store` settings, toggle bypass.
    pub fn controls(&self) -> Arc<SharedSettings> {
        self.shared.clone()
    }

    pub fn set_parameters(&self, settings: CompressorSettings) {
        self.shared.store(settings);
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.shared.set_bypassed(bypassed);
    }

    pub fn engine(&self) -> &CompressorEngine {
        &self.engine
    }

    fn apply(&self, restored: PersistedState) {
        self.shared.store(restored.settings());
        self.shared.set_bypassed(restored.bypassed);
    }
}

impl StatefulProcessor for CompressorProcessor {
    fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        num_channels: usize,
    ) -> Result<(), ConfigurationError> {
        self.engine
            .prepare(sample_rate, max_block_size, num_channels)
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) -> Result<(), ConfigurationError> {
        let bypassed = self.shared.bypassed();
        self.engine.process(buffer, bypassed)
    }

    fn get_state(&self) -> Result<String, PersistenceError> {
        let snapshot = PersistedState::from_settings(self.shared.load(), self.shared.bypassed());
        state::save(&snapshot)
    }

    fn set_state(&mut self, data: &str) -> Result<(), PersistenceError> {
        match state::load(data) {
            Ok(restored) => {
                self.apply(restored);
                Ok(())
            }
            Err(err) => {
                log::warn!("restoring defaults: {}", err);
                self.apply(PersistedState::default());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip_through_processor() {
        let mut source = CompressorProcessor::new();
        source.set_parameters(CompressorSettings::new(-18.0, 12.0, 180.0, 8.0));
        source.set_bypassed(true);
        let saved = source.get_state().unwrap();

        let mut restored = CompressorProcessor::new();
        restored.set_state(&saved).unwrap();
        assert_eq!(restored.get_state().unwrap(), saved);
    }

    #[test]
    fn test_bad_state_falls_back_to_defaults() {
        let mut p = CompressorProcessor::new();
        p.set_parameters(CompressorSettings::new(-40.0, 5.0, 5.0, 50.0));
        p.set_bypassed(true);

        assert!(p.set_state("<xml/>").is_err());
        let state = state::load(&p.get_state().unwrap()).unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn test_process_follows_shared_bypass() {
        let mut p = CompressorProcessor::new();
        p.set_parameters(CompressorSettings::new(-40.0, 5.0, 50.0, 20.0));
        p.prepare(48000.0, 256, 1).unwrap();

        let loud = vec![0.9f32; 256];
        let controls = p.controls();

        controls.set_bypassed(true);
        let mut block = loud.clone();
        p.process(&mut [&mut block[..]]).unwrap();
        assert_eq!(block, loud);

        controls.set_bypassed(false);
        for _ in 0..20 {
            block.copy_from_slice(&loud);
            p.process(&mut [&mut block[..]]).unwrap();
        }
        assert!(block[255] < 0.5);
        assert!(p.engine().gain_reduction_db(0) > 0.0);
    }

    #[test]
    fn test_process_before_prepare_errors() {
        let mut p = CompressorProcessor::new();
        let mut block = vec![0.0f32; 8];
        assert_eq!(
            p.process(&mut [&mut block[..]]),
            Err(ConfigurationError::NotPrepared)
        );
    }
}
