//! Parameter persistence.
//!
//! Saved state is a flat JSON object with keys in a fixed order:
//! `Threshold`, `Attack`, `Release`, `Ratio`, `Bypassed`. Loading is lenient:
//! a value that is out of range is clamped, a ratio is snapped to the nearest
//! available choice, and anything missing or of the wrong type takes its
//! default. Only input that is not a JSON object at all is an error.

use crate::error::PersistenceError;
use crate::ratio::RatioChoice;
use crate::settings::{
    clamp_or, CompressorSettings, ATTACK_DEFAULT_MS, RELEASE_DEFAULT_MS, THRESHOLD_DEFAULT_DB,
    THRESHOLD_MAX_DB, THRESHOLD_MIN_DB, TIME_MAX_MS, TIME_MIN_MS,
};
use nih_plug::wrapper::state::{ParamValue, PluginState};
use serde::Serialize;
use serde_json::{Map, Value};

pub const KEY_THRESHOLD: &str = "Threshold";
pub const KEY_ATTACK: &str = "Attack";
pub const KEY_RELEASE: &str = "Release";
pub const KEY_RATIO: &str = "Ratio";
pub const KEY_BYPASSED: &str = "Bypassed";

/// Everything the host needs to restore a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PersistedState {
    #[serde(rename = "Threshold")]
    pub threshold_db: f32,
    #[serde(rename = "Attack")]
    pub attack_ms: f32,
    #[serde(rename = "Release")]
    pub release_ms: f32,
    #[serde(rename = "Ratio")]
    pub ratio: f32,
    #[serde(rename = "Bypassed")]
    pub bypassed: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::from_settings(CompressorSettings::default(), false)
    }
}

impl PersistedState {
    pub fn from_settings(settings: CompressorSettings, bypassed: bool) -> Self {
        Self {
            threshold_db: settings.threshold_db,
            attack_ms: settings.attack_ms,
            release_ms: settings.release_ms,
            ratio: settings.ratio,
            bypassed,
        }
    }

    pub fn settings(&self) -> CompressorSettings {
        CompressorSettings::new(self.threshold_db, self.attack_ms, self.release_ms, self.ratio)
    }
}

pub fn save(state: &PersistedState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(state)?)
}

/// Parse saved state, repairing individual fields as described above.
pub fn load(data: &str) -> Result<PersistedState, PersistenceError> {
    let value: Value = serde_json::from_str(data)?;
    let map = value.as_object().ok_or(PersistenceError::NotAnObject)?;

    for key in map.keys() {
        if ![KEY_THRESHOLD, KEY_ATTACK, KEY_RELEASE, KEY_RATIO, KEY_BYPASSED].contains(&key.as_str())
        {
            log::debug!("ignoring unknown state key '{}'", key);
        }
    }

    Ok(PersistedState {
        threshold_db: float_field(
            map,
            KEY_THRESHOLD,
            THRESHOLD_MIN_DB,
            THRESHOLD_MAX_DB,
            THRESHOLD_DEFAULT_DB,
        ),
        attack_ms: float_field(map, KEY_ATTACK, TIME_MIN_MS, TIME_MAX_MS, ATTACK_DEFAULT_MS),
        release_ms: float_field(map, KEY_RELEASE, TIME_MIN_MS, TIME_MAX_MS, RELEASE_DEFAULT_MS),
        ratio: ratio_field(map).value(),
        bypassed: bool_field(map, KEY_BYPASSED, false),
    })
}

/// Like `load`, but unreadable input yields the default parameters.
pub fn load_or_default(data: &str) -> PersistedState {
    match load(data) {
        Ok(state) => state,
        Err(err) => {
            log::warn!("discarding saved state, using defaults: {}", err);
            PersistedState::default()
        }
    }
}

fn float_field(map: &Map<String, Value>, key: &str, min: f32, max: f32, default: f32) -> f32 {
    match map.get(key).and_then(Value::as_f64) {
        Some(v) => clamp_or(v as f32, min, max, default),
        None => {
            log::debug!("state key '{}' missing or not a number", key);
            default
        }
    }
}

fn ratio_field(map: &Map<String, Value>) -> RatioChoice {
    match map.get(KEY_RATIO) {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| RatioChoice::nearest(v as f32))
            .unwrap_or_default(),
        Some(Value::String(s)) => RatioChoice::from_id_lenient(s),
        _ => RatioChoice::default(),
    }
}

fn bool_field(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(default, |v| v != 0.0),
        _ => default,
    }
}

// -----------------------------------------------------------------------------
// HOST STATE FILTER
// -----------------------------------------------------------------------------

/// Repair a host-restored parameter map in place before it is applied.
///
/// Floats are clamped, the ratio is mapped onto a known variant id whatever
/// form it was stored in, and values of the wrong type are replaced by the
/// parameter default. Keys that are absent stay absent.
pub fn sanitize_plugin_state(state: &mut PluginState) {
    let defaults = PersistedState::default();

    repair_float(
        state,
        KEY_THRESHOLD,
        THRESHOLD_MIN_DB,
        THRESHOLD_MAX_DB,
        defaults.threshold_db,
    );
    repair_float(state, KEY_ATTACK, TIME_MIN_MS, TIME_MAX_MS, defaults.attack_ms);
    repair_float(state, KEY_RELEASE, TIME_MIN_MS, TIME_MAX_MS, defaults.release_ms);

    if let Some(value) = state.params.get_mut(KEY_RATIO) {
        let choice = match value {
            ParamValue::String(id) => RatioChoice::from_id_lenient(id),
            ParamValue::I32(index) => usize::try_from(*index)
                .ok()
                .and_then(RatioChoice::from_position)
                .unwrap_or_default(),
            ParamValue::F32(v) => RatioChoice::nearest(*v),
            _ => RatioChoice::default(),
        };
        *value = ParamValue::String(choice.id().to_string());
    }

    if let Some(value) = state.params.get_mut(KEY_BYPASSED) {
        let bypassed = match value {
            ParamValue::Bool(b) => *b,
            ParamValue::I32(v) => *v != 0,
            ParamValue::F32(v) => *v >= 0.5,
            _ => defaults.bypassed,
        };
        *value = ParamValue::Bool(bypassed);
    }
}

fn repair_float(state: &mut PluginState, key: &str, min: f32, max: f32, default: f32) {
    if let Some(value) = state.params.get_mut(key) {
        let repaired = match value {
            ParamValue::F32(v) => clamp_or(*v, min, max, default),
            ParamValue::I32(v) => (*v as f32).clamp(min, max),
            _ => default,
        };
        if !matches!(value, ParamValue::F32(v) if *v == repaired) {
            log::warn!("restored '{}' repaired to {}", key, repaired);
        }
        *value = ParamValue::F32(repaired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_save_uses_ordered_keys() {
        let state = PersistedState::from_settings(
            CompressorSettings::new(-12.0, 10.0, 100.0, 4.0),
            true,
        );
        let json = save(&state).unwrap();
        assert_eq!(
            json,
            r#"{"Threshold":-12.0,"Attack":10.0,"Release":100.0,"Ratio":4.0,"Bypassed":true}"#
        );
        assert_eq!(load(&json).unwrap(), state);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let state =
            load(r#"{"Threshold":-120,"Attack":1,"Release":9000,"Ratio":7.4,"Bypassed":false}"#)
                .unwrap();
        assert_eq!(state.threshold_db, THRESHOLD_MIN_DB);
        assert_eq!(state.attack_ms, TIME_MIN_MS);
        assert_eq!(state.release_ms, TIME_MAX_MS);
        assert_eq!(state.ratio, 7.0);
    }

    #[test]
    fn test_wrong_types_and_missing_keys_take_defaults() {
        let state = load(r#"{"Threshold":"loud","Ratio":[1,2],"Bypassed":"yes","Mix":0.5}"#)
            .unwrap();
        assert_eq!(state, PersistedState::default());

        let state = load(r#"{"Ratio":"20","Bypassed":1}"#).unwrap();
        assert_eq!(state.ratio, 20.0);
        assert!(state.bypassed);
    }

    #[test]
    fn test_malformed_input_is_an_error_and_falls_back() {
        assert!(matches!(load("{not json"), Err(PersistenceError::Malformed(_))));
        assert!(matches!(load("[1, 2, 3]"), Err(PersistenceError::NotAnObject)));
        assert_eq!(load_or_default(""), PersistedState::default());
        assert_eq!(load_or_default("42"), PersistedState::default());
    }

    fn plugin_state(params: Vec<(&str, ParamValue)>) -> PluginState {
        PluginState {
            version: String::from("1.0.0"),
            params: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_plugin_state_is_repaired() {
        let mut state = plugin_state(vec![
            (KEY_THRESHOLD, ParamValue::F32(f32::NAN)),
            (KEY_ATTACK, ParamValue::F32(1000.0)),
            (KEY_RELEASE, ParamValue::String("slow".into())),
            (KEY_RATIO, ParamValue::I32(4)),
            (KEY_BYPASSED, ParamValue::I32(1)),
        ]);
        sanitize_plugin_state(&mut state);

        assert!(matches!(state.params[KEY_THRESHOLD], ParamValue::F32(v) if v == THRESHOLD_DEFAULT_DB));
        assert!(matches!(state.params[KEY_ATTACK], ParamValue::F32(v) if v == TIME_MAX_MS));
        assert!(matches!(state.params[KEY_RELEASE], ParamValue::F32(v) if v == RELEASE_DEFAULT_MS));
        assert!(matches!(&state.params[KEY_RATIO], ParamValue::String(id) if id == "4"));
        assert!(matches!(state.params[KEY_BYPASSED], ParamValue::Bool(true)));
    }

    #[test]
    fn test_plugin_state_unknown_ratio_id() {
        let mut state = plugin_state(vec![(KEY_RATIO, ParamValue::String("12.5".into()))]);
        sanitize_plugin_state(&mut state);
        assert!(matches!(&state.params[KEY_RATIO], ParamValue::String(id) if id == "10"));
        assert!(!state.params.contains_key(KEY_THRESHOLD));

        let mut state = plugin_state(vec![(KEY_RATIO, ParamValue::I32(99))]);
        sanitize_plugin_state(&mut state);
        assert!(matches!(&state.params[KEY_RATIO], ParamValue::String(id) if id == "3"));
    }
}
