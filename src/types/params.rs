//! Generation parameters and the per-call override merge.
//!
//! The default set is built once from the model configuration and shared
//! read-only; every request gets its own merged copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SongGenError};

use super::config::ModelConfig;

/// Names accepted as override keys.
pub const PARAMETER_NAMES: &[&str] = &[
    "cfg_coef",
    "temperature",
    "top_k",
    "top_p",
    "record_tokens",
    "record_window",
    "extend_stride",
    "duration",
];

/// Longest song a request may ask for, in seconds.
pub const MAX_DURATION_SEC: f32 = 300.0;

/// A single override value as it arrives from JSON or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Parses a command-line literal: `true`/`false`, an integer, or a float.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "true" => return Some(ParamValue::Bool(true)),
            "false" => return Some(ParamValue::Bool(false)),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return Some(ParamValue::Int(i));
        }
        s.parse::<f64>().ok().filter(|f| f.is_finite()).map(ParamValue::Float)
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
        }
    }

    /// Integers widen to floats; nothing else converts.
    fn as_float(&self, name: &str) -> Result<f32> {
        match *self {
            ParamValue::Float(f) if (f as f32).is_finite() => Ok(f as f32),
            ParamValue::Float(f) => Err(SongGenError::invalid_parameter(
                name,
                format!("must be a finite f32, got {}", f),
            )),
            ParamValue::Int(i) => Ok(i as f32),
            ParamValue::Bool(_) => Err(SongGenError::invalid_parameter(
                name,
                format!("expected float, got {}", self.type_name()),
            )),
        }
    }

    fn as_count(&self, name: &str) -> Result<usize> {
        match *self {
            ParamValue::Int(i) if i >= 0 => Ok(i as usize),
            ParamValue::Int(i) => Err(SongGenError::invalid_parameter(
                name,
                format!("must be >= 0, got {}", i),
            )),
            _ => Err(SongGenError::invalid_parameter(
                name,
                format!("expected integer, got {}", self.type_name()),
            )),
        }
    }

    fn as_bool(&self, name: &str) -> Result<bool> {
        match *self {
            ParamValue::Bool(b) => Ok(b),
            _ => Err(SongGenError::invalid_parameter(
                name,
                format!("expected boolean, got {}", self.type_name()),
            )),
        }
    }
}

/// Override map keyed by parameter name.
pub type ParamOverrides = BTreeMap<String, ParamValue>;

/// Parses a `key=value` command-line override.
pub fn parse_override(s: &str) -> Result<(String, ParamValue)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| SongGenError::invalid_parameter(s, "expected key=value"))?;
    let key = key.trim();
    let value = ParamValue::parse(value)
        .ok_or_else(|| SongGenError::invalid_parameter(key, format!("cannot parse '{}'", value)))?;
    Ok((key.to_string(), value))
}

/// Sampling and windowing parameters handed to the song model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Classifier-free guidance coefficient.
    pub cfg_coef: f32,
    /// Softmax temperature.
    pub temperature: f32,
    /// Top-k truncation (0 disables).
    pub top_k: usize,
    /// Nucleus truncation (0.0 disables).
    pub top_p: f32,
    /// Penalize tokens repeated within the record window.
    pub record_tokens: bool,
    /// Number of recent frames the repetition record covers.
    pub record_window: usize,
    /// Seconds the context window advances by when extending past `max_dur`.
    pub extend_stride: f32,
    /// Requested song duration in seconds.
    pub duration: f32,
}

impl GenerationParameters {
    /// Builds the default set for a model.
    pub fn defaults_for(config: &ModelConfig) -> Self {
        Self {
            duration: config.max_duration.min(MAX_DURATION_SEC),
            ..Self::default()
        }
    }

    fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "cfg_coef" => self.cfg_coef = value.as_float(name)?,
            "temperature" => self.temperature = value.as_float(name)?,
            "top_k" => self.top_k = value.as_count(name)?,
            "top_p" => self.top_p = value.as_float(name)?,
            "record_tokens" => self.record_tokens = value.as_bool(name)?,
            "record_window" => self.record_window = value.as_count(name)?,
            "extend_stride" => self.extend_stride = value.as_float(name)?,
            "duration" => self.duration = value.as_float(name)?,
            _ => return Err(SongGenError::unknown_parameter(name)),
        }
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.cfg_coef >= 0.0) {
            return Err(SongGenError::invalid_parameter("cfg_coef", "must be >= 0"));
        }
        if !(self.temperature > 0.0) {
            return Err(SongGenError::invalid_parameter("temperature", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(SongGenError::invalid_parameter("top_p", "must be within [0, 1]"));
        }
        if self.record_window == 0 {
            return Err(SongGenError::invalid_parameter("record_window", "must be > 0"));
        }
        if !(self.extend_stride > 0.0) {
            return Err(SongGenError::invalid_parameter("extend_stride", "must be > 0"));
        }
        if !(self.duration > 0.0 && self.duration <= MAX_DURATION_SEC) {
            return Err(SongGenError::invalid_parameter(
                "duration",
                format!("must be within (0, {}]", MAX_DURATION_SEC),
            ));
        }
        Ok(())
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            cfg_coef: 1.5,
            temperature: 1.0,
            top_k: 50,
            top_p: 0.0,
            record_tokens: true,
            record_window: 50,
            extend_stride: 5.0,
            duration: ModelConfig::default().max_duration,
        }
    }
}

/// Overlays `overrides` onto `defaults`, returning a new parameter set.
///
/// Any unknown key fails the whole merge, even if every other key is valid.
pub fn merge(defaults: &GenerationParameters, overrides: &ParamOverrides) -> Result<GenerationParameters> {
    if let Some(name) = overrides
        .keys()
        .find(|name| !PARAMETER_NAMES.contains(&name.as_str()))
    {
        return Err(SongGenError::unknown_parameter(name));
    }

    let mut effective = defaults.clone();
    for (name, value) in overrides {
        effective.set(name, value)?;
    }
    effective.validate()?;

    Ok(effective)
}
