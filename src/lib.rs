pub mod debug;
pub mod dsp;
pub mod error;
pub mod processor;
pub mod ratio;
pub mod settings;
pub mod state;
mod ui;

use crate::debug::{EventRing, RtEvent};
use crate::dsp::CompressorEngine;
use crate::ratio::RatioChoice;
use crate::settings::{
    CompressorSettings, ATTACK_DEFAULT_MS, RELEASE_DEFAULT_MS, THRESHOLD_DEFAULT_DB,
    THRESHOLD_MAX_DB, THRESHOLD_MIN_DB, TIME_MAX_MS, TIME_MIN_MS,
};
use assert_no_alloc::permit_alloc;
use nih_plug::prelude::*;
use nih_plug_vizia::{create_vizia_editor, ViziaState, ViziaTheming};
use std::sync::Arc;
use ui::build_ui;

pub use crate::error::{ConfigurationError, PersistenceError};
pub use crate::processor::{CompressorProcessor, StatefulProcessor};

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

/// Host-facing parameters. The ids double as the persisted state keys.
#[derive(Params)]
pub struct CompressorParams {
    #[persist = "editor-state"]
    editor_state: Arc<ViziaState>,

    #[id = "Threshold"]
    pub threshold: FloatParam,

    #[id = "Attack"]
    pub attack: FloatParam,

    #[id = "Release"]
    pub release: FloatParam,

    #[id = "Ratio"]
    pub ratio: EnumParam<RatioChoice>,

    #[id = "Bypassed"]
    pub bypassed: BoolParam,
}

// Helper to format gain in dB
fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

// Helper to format times in milliseconds
fn format_ms(v: f32) -> String {
    format!("{:.0} ms", v)
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            editor_state: ui::default_state(),

            threshold: FloatParam::new(
                "Threshold",
                THRESHOLD_DEFAULT_DB,
                FloatRange::Linear {
                    min: THRESHOLD_MIN_DB,
                    max: THRESHOLD_MAX_DB,
                },
            )
            .with_step_size(1.0)
            .with_value_to_string(Arc::new(format_db)),

            attack: FloatParam::new(
                "Attack",
                ATTACK_DEFAULT_MS,
                FloatRange::Linear {
                    min: TIME_MIN_MS,
                    max: TIME_MAX_MS,
                },
            )
            .with_step_size(1.0)
            .with_value_to_string(Arc::new(format_ms)),

            release: FloatParam::new(
                "Release",
                RELEASE_DEFAULT_MS,
                FloatRange::Linear {
                    min: TIME_MIN_MS,
                    max: TIME_MAX_MS,
                },
            )
            .with_step_size(1.0)
            .with_value_to_string(Arc::new(format_ms)),

            ratio: EnumParam::new("Ratio", RatioChoice::default()),

            bypassed: BoolParam::new("Bypassed", false).make_bypass(),
        }
    }
}

impl CompressorParams {
    /// Typed snapshot of the current control values.
    pub fn settings(&self) -> CompressorSettings {
        CompressorSettings::new(
            self.threshold.value(),
            self.attack.value(),
            self.release.value(),
            self.ratio.value().value(),
        )
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------

/// Work the audio thread defers to the background thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginTask {
    DrainEvents,
}

pub struct CompressorPlugin {
    params: Arc<CompressorParams>,
    engine: CompressorEngine,
    events: Arc<EventRing>,
    // Last parameter set handed to the engine, to avoid republishing
    // unchanged values every block.
    last_published: Option<CompressorSettings>,
}

impl Default for CompressorPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(CompressorParams::default()),
            engine: CompressorEngine::new(),
            events: Arc::new(EventRing::default()),
            last_published: None,
        }
    }
}

impl Plugin for CompressorPlugin {
    const NAME: &'static str = "MultiBand Compressor";
    const VENDOR: &'static str = "MultiBand Compressor developers";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = PluginTask;

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(NonZeroU32::get)
            .unwrap_or(0) as usize;

        self.last_published = None;
        self.publish_settings();

        let prepared = permit_alloc(|| {
            self.engine.prepare(
                buffer_config.sample_rate,
                buffer_config.max_buffer_size as usize,
                num_channels,
            )
        });

        match prepared {
            Ok(()) => {
                log::info!(
                    "initialized at {} Hz, {} channels, max block {}",
                    buffer_config.sample_rate,
                    num_channels,
                    buffer_config.max_buffer_size
                );
                true
            }
            Err(err) => {
                log::error!("cannot initialize compressor: {}", err);
                false
            }
        }
    }

    fn editor(&mut self, _async_executor: AsyncExecutor<Self>) -> Option<Box<dyn Editor>> {
        let params = self.params.clone();
        create_vizia_editor(
            self.params.editor_state.clone(),
            ViziaTheming::default(),
            move |cx, _gui_context| {
                build_ui(cx, params.clone());
            },
        )
    }

    fn task_executor(&mut self) -> TaskExecutor<Self> {
        let events = self.events.clone();
        Box::new(move |task| match task {
            PluginTask::DrainEvents => {
                events.drain_to_log();
            }
        })
    }

    fn filter_state(state: &mut PluginState) {
        state::sanitize_plugin_state(state);
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        if self.publish_settings() && cfg!(feature = "debug") {
            let applied = self.params.settings();
            self.events.push(RtEvent::SettingsApplied {
                threshold_db: applied.threshold_db,
                ratio: applied.ratio,
            });
            context.execute_background(PluginTask::DrainEvents);
        }

        let bypassed = self.params.bypassed.value();
        if let Err(err) = self.engine.process(buffer.as_slice(), bypassed) {
            // Audio passes through untouched; report off the audio thread.
            self.events.push(RtEvent::Configuration(err));
            context.execute_background(PluginTask::DrainEvents);
        }

        ProcessStatus::Normal
    }

    fn reset(&mut self) {
        self.engine.reset();
    }
}

impl CompressorPlugin {
    /// Hand the current parameter values to the engine if they changed.
    /// Returns whether anything was published.
    fn publish_settings(&mut self) -> bool {
        let settings = self.params.settings();
        if self.last_published == Some(settings) {
            return false;
        }
        self.engine.set_parameters(settings);
        self.last_published = Some(settings);
        true
    }
}

impl ClapPlugin for CompressorPlugin {
    const CLAP_ID: &'static str = "com.mbcompressor.compressor";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("Feedforward dynamic range compressor");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Compressor,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for CompressorPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"MBCompressorShim";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Dynamics];
}

nih_export_clap!(CompressorPlugin);
nih_export_vst3!(CompressorPlugin);

#[cfg(test)]
mod tests {
    use super::*;
    use nih_plug::wrapper::state::ParamValue;
    use std::collections::BTreeMap;

    #[test]
    fn test_param_ids_match_state_keys() {
        let params = CompressorParams::default();
        let ids: Vec<String> = params
            .param_map()
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();
        for key in [
            state::KEY_THRESHOLD,
            state::KEY_ATTACK,
            state::KEY_RELEASE,
            state::KEY_RATIO,
            state::KEY_BYPASSED,
        ] {
            assert!(ids.iter().any(|id| id == key), "missing param id {}", key);
        }
    }

    #[test]
    fn test_default_params_match_default_settings() {
        let params = CompressorParams::default();
        assert_eq!(params.settings(), CompressorSettings::default());
        assert!(!params.bypassed.value());
        assert_eq!(params.ratio.value(), RatioChoice::R3);
    }

    #[test]
    fn test_filter_state_repairs_restored_params() {
        let mut params = BTreeMap::new();
        params.insert(state::KEY_THRESHOLD.to_string(), ParamValue::F32(80.0));
        params.insert(state::KEY_RATIO.to_string(), ParamValue::String("2.2".into()));
        let mut restored = PluginState {
            version: String::from("0.9.0"),
            params,
            fields: BTreeMap::new(),
        };

        CompressorPlugin::filter_state(&mut restored);
        assert!(matches!(
            restored.params[state::KEY_THRESHOLD],
            ParamValue::F32(v) if v == THRESHOLD_MAX_DB
        ));
        assert!(matches!(
            &restored.params[state::KEY_RATIO],
            ParamValue::String(id) if id == "2"
        ));
    }

    #[test]
    fn test_publish_only_on_change() {
        let mut plugin = CompressorPlugin::default();
        assert!(plugin.publish_settings());
        assert!(!plugin.publish_settings());
        assert_eq!(plugin.engine.shared().load(), CompressorSettings::default());
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(format_db(-12.0), "-12.0 dB");
        assert_eq!(format_ms(250.0), "250 ms");
    }
}
