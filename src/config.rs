//! Runtime configuration module.
//!
//! Contains the runtime configuration for songgen, including execution
//! device selection and path configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution device for ONNX inference.
///
/// Determines which hardware backend to use for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Automatically detect and use the best available device.
    /// Priority: CUDA > Metal (CoreML) > CPU
    #[default]
    Auto,

    /// Force CPU execution.
    Cpu,

    /// Use CUDA for NVIDIA GPU acceleration.
    Cuda,

    /// Use CoreML on Apple Silicon.
    Metal,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" => Some(Device::Cuda),
            "metal" | "coreml" => Some(Device::Metal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration.
///
/// Loaded from environment variables at startup and then overridden by
/// command-line arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongGenConfig {
    /// Directory containing the song model files.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Path to `separator.onnx`. Reference audio conditioning is
    /// unavailable without it.
    pub separator_path: Option<PathBuf>,

    /// Prompt bundle used when a request names a genre but no bundle.
    pub prompt_bundle: Option<PathBuf>,

    /// Directory for generated songs.
    /// If None, uses the platform-specific default location.
    pub output_path: Option<PathBuf>,

    /// Execution device for inference.
    pub device: Device,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    /// If None, uses ONNX Runtime's default (typically number of CPU cores).
    pub threads: Option<u32>,
}

impl SongGenConfig {
    /// Creates a new SongGenConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a SongGenConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `SONGGEN_MODEL_PATH` - Path to the song model directory
    /// - `SONGGEN_SEPARATOR_PATH` - Path to separator.onnx
    /// - `SONGGEN_PROMPT_BUNDLE` - Default prompt bundle
    /// - `SONGGEN_OUTPUT_PATH` - Output directory
    /// - `SONGGEN_DEVICE` - Device selection (auto, cpu, cuda, metal)
    /// - `SONGGEN_THREADS` - Number of threads for CPU execution
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SONGGEN_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("SONGGEN_SEPARATOR_PATH") {
            config.separator_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("SONGGEN_PROMPT_BUNDLE") {
            config.prompt_bundle = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("SONGGEN_OUTPUT_PATH") {
            config.output_path = Some(PathBuf::from(path));
        }

        if let Some(device_str) = lookup("SONGGEN_DEVICE") {
            if let Some(device) = Device::parse(&device_str) {
                config.device = device;
            }
        }

        if let Some(threads_str) = lookup("SONGGEN_THREADS") {
            if let Ok(threads) = threads_str.parse::<u32>() {
                if threads > 0 {
                    config.threads = Some(threads);
                }
            }
        }

        config
    }

    /// Returns the effective model path, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.model_path {
            path.clone()
        } else {
            default_model_path()
        }
    }

    /// Returns the effective output path, using platform defaults if not specified.
    pub fn effective_output_path(&self) -> PathBuf {
        if let Some(ref path) = self.output_path {
            path.clone()
        } else {
            default_output_path()
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        if let Some(ref path) = self.separator_path {
            if path.is_dir() {
                return Some(format!(
                    "separator path must be a file, got directory {}",
                    path.display()
                ));
            }
        }

        None
    }
}

/// Returns the platform-specific default model storage path.
///
/// - macOS: ~/Library/Caches/songgen/model
/// - Linux: ~/.cache/songgen/model
/// - Windows: C:\Users\<user>\AppData\Local\songgen\cache\model
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "songgen") {
        proj_dirs.cache_dir().join("model")
    } else {
        PathBuf::from("./model")
    }
}

/// Returns the platform-specific default output path.
///
/// - macOS: ~/Library/Application Support/songgen/songs
/// - Linux: ~/.local/share/songgen/songs
/// - Windows: C:\Users\<user>\AppData\Roaming\songgen\data\songs
fn default_output_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "songgen") {
        proj_dirs.data_dir().join("songs")
    } else {
        PathBuf::from("./songs")
    }
}
