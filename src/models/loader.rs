//! Model directory checks and configuration loading.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, SongGenError};
use crate::types::ModelConfig;

use super::codec::{CODEC_DECODER_FILE, PROMPT_ENCODER_FILE, SEPARATE_DECODER_FILE};
use super::lm::{LM_FILE, LM_HALF_FILE, TOKENIZER_FILE};

/// Required model files for the song model.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    TOKENIZER_FILE,
    LM_FILE,
    PROMPT_ENCODER_FILE,
    CODEC_DECODER_FILE,
    SEPARATE_DECODER_FILE,
];

/// Files used when present.
pub const OPTIONAL_MODEL_FILES: &[&str] = &[LM_HALF_FILE, "config.json"];

/// Checks if all required model files exist in the directory.
///
/// Returns Ok(()) if all files exist, or an error listing missing files.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .filter(|file| !model_dir.join(file).exists())
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SongGenError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Loads `config.json` from the model directory, or the defaults when absent.
pub fn load_model_config(model_dir: &Path) -> Result<ModelConfig> {
    let config_path = model_dir.join("config.json");

    let config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            SongGenError::model_load_failed(format!("Failed to read config.json: {}", e))
        })?;
        parse_model_config(&content)?
    } else {
        debug!("config.json not found, using default model config");
        ModelConfig::default()
    };

    if let Some(reason) = config.validate() {
        return Err(SongGenError::model_load_failed(format!(
            "Invalid config.json: {}",
            reason
        )));
    }

    Ok(config)
}

/// Parses a model config. Missing keys take their default values.
fn parse_model_config(content: &str) -> Result<ModelConfig> {
    let json: serde_json::Value = serde_json::from_str(content).map_err(|e| {
        SongGenError::model_load_failed(format!("Failed to parse config.json: {}", e))
    })?;

    let defaults = ModelConfig::default();
    let get_u32 = |key: &str, default: u32| -> Result<u32> {
        match json.get(key) {
            None => Ok(default),
            Some(v) => v.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(|| {
                SongGenError::model_load_failed(format!("config.json: '{}' must be an unsigned integer", key))
            }),
        }
    };

    let max_duration = match json.get("max_dur") {
        None => defaults.max_duration,
        Some(v) => v.as_f64().ok_or_else(|| {
            SongGenError::model_load_failed("config.json: 'max_dur' must be a number")
        })? as f32,
    };

    let pad_token_id = match json.get("pad_token_id") {
        None => defaults.pad_token_id,
        Some(v) => v.as_i64().ok_or_else(|| {
            SongGenError::model_load_failed("config.json: 'pad_token_id' must be an integer")
        })?,
    };

    Ok(ModelConfig {
        max_duration,
        sample_rate: get_u32("sample_rate", defaults.sample_rate)?,
        frame_rate: get_u32("frame_rate", defaults.frame_rate)?,
        codebooks: get_u32("codebooks", defaults.codebooks)?,
        vocab_size: get_u32("vocab_size", defaults.vocab_size)?,
        pad_token_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn required_files_list() {
        assert_eq!(REQUIRED_MODEL_FILES.len(), 5);
        assert!(REQUIRED_MODEL_FILES.contains(&"tokenizer.json"));
        assert!(REQUIRED_MODEL_FILES.contains(&"separate_decoder.onnx"));
        assert!(!REQUIRED_MODEL_FILES.contains(&"lm_fp16.onnx"));
    }

    #[test]
    fn missing_files_are_listed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();

        let err = check_models(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelNotFound);
        assert!(err.message.contains("lm.onnx"));
        assert!(!err.message.contains("tokenizer.json"));

        for file in REQUIRED_MODEL_FILES {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        assert!(check_models(dir.path()).is_ok());
    }

    #[test]
    fn absent_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_model_config(dir.path()).unwrap(), ModelConfig::default());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = parse_model_config(r#"{"max_dur": 30, "sample_rate": 24000}"#).unwrap();
        assert_eq!(config.max_duration, 30.0);
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.frame_rate, ModelConfig::default().frame_rate);
    }

    #[test]
    fn invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"codebooks": 4}"#).unwrap();
        let err = load_model_config(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelLoadFailed);

        std::fs::write(dir.path().join("config.json"), r#"{"sample_rate": "fast"}"#).unwrap();
        assert!(load_model_config(dir.path()).is_err());

        std::fs::write(dir.path().join("config.json"), "not json").unwrap();
        assert!(load_model_config(dir.path()).is_err());
    }
}
