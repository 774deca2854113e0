//! Error types for songgen.
//!
//! Every failure carries an [`ErrorCode`] so callers can tell a rejected
//! request apart from a conditioning or generation failure, and an
//! [`ErrorKind`] grouping codes into the categories a serving layer reacts to.

use std::fmt;

/// Broad failure category of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request rejected before any model work (bad lyrics, genre, parameter).
    Validation,
    /// Genre or language bucket absent from the prompt bundle.
    Lookup,
    /// Reference audio could not be separated into stems.
    Separation,
    /// Prompt bundle missing or malformed.
    BundleLoad,
    /// Token generation or audio synthesis failed.
    Generation,
    /// Request cancelled by the caller.
    Cancelled,
    /// Model files missing or unloadable.
    ModelLoad,
    /// Audio file could not be read or written.
    Audio,
}

/// Error codes identifying specific failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Lyrics are empty after trimming.
    InvalidLyrics,

    /// Genre label is not one of the known genres.
    InvalidGenre,

    /// Parameter override names a parameter that does not exist.
    UnknownParameter,

    /// Parameter override has the wrong type or is out of range.
    InvalidParameter,

    /// Genre/language bucket not present in the prompt bundle.
    PromptNotFound,

    /// Source separation of the reference audio failed.
    SeparationFailed,

    /// Prompt bundle could not be read or parsed.
    BundleLoadFailed,

    /// Token generation or synthesis raised an error.
    GenerationFailed,

    /// Request was cancelled between stages.
    Cancelled,

    /// Model files not found at expected path.
    ModelNotFound,

    /// Failed to load an ONNX model into memory.
    ModelLoadFailed,

    /// Audio decoding, resampling or WAV writing failed.
    AudioIoFailed,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidLyrics => "INVALID_LYRICS",
            ErrorCode::InvalidGenre => "INVALID_GENRE",
            ErrorCode::UnknownParameter => "UNKNOWN_PARAMETER",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::PromptNotFound => "PROMPT_NOT_FOUND",
            ErrorCode::SeparationFailed => "SEPARATION_FAILED",
            ErrorCode::BundleLoadFailed => "BUNDLE_LOAD_FAILED",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::AudioIoFailed => "AUDIO_IO_FAILED",
        }
    }

    /// Returns the failure category of this code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::InvalidLyrics
            | ErrorCode::InvalidGenre
            | ErrorCode::UnknownParameter
            | ErrorCode::InvalidParameter => ErrorKind::Validation,
            ErrorCode::PromptNotFound => ErrorKind::Lookup,
            ErrorCode::SeparationFailed => ErrorKind::Separation,
            ErrorCode::BundleLoadFailed => ErrorKind::BundleLoad,
            ErrorCode::GenerationFailed => ErrorKind::Generation,
            ErrorCode::Cancelled => ErrorKind::Cancelled,
            ErrorCode::ModelNotFound | ErrorCode::ModelLoadFailed => ErrorKind::ModelLoad,
            ErrorCode::AudioIoFailed => ErrorKind::Audio,
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidLyrics => "Lyrics must contain at least one non-whitespace character",
            ErrorCode::InvalidGenre => "Genre is not one of the supported genre labels",
            ErrorCode::UnknownParameter => "Parameter override names an unknown parameter",
            ErrorCode::InvalidParameter => "Parameter override has an invalid type or value",
            ErrorCode::PromptNotFound => "No precomputed prompt exists for this genre/language",
            ErrorCode::SeparationFailed => "Reference audio could not be separated into stems",
            ErrorCode::BundleLoadFailed => "Prompt bundle is missing or malformed",
            ErrorCode::GenerationFailed => "Song generation failed inside the model",
            ErrorCode::Cancelled => "Request was cancelled before it completed",
            ErrorCode::ModelNotFound => "ONNX model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load ONNX model into memory",
            ErrorCode::AudioIoFailed => "Audio file could not be read or written",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidLyrics => {
                "Provide lyrics with structure tags, e.g. '[verse]\\nhello world'"
            }
            ErrorCode::InvalidGenre => "Use one of the labels printed by 'songgen --list-genres'",
            ErrorCode::UnknownParameter => {
                "Valid parameters: cfg_coef, temperature, top_k, top_p, record_tokens, \
                 record_window, extend_stride, duration"
            }
            ErrorCode::InvalidParameter => {
                "Check the parameter's type (float, integer, boolean) and allowed range"
            }
            ErrorCode::PromptNotFound => {
                "Pick another genre, or regenerate the prompt bundle with this genre/language"
            }
            ErrorCode::SeparationFailed => {
                "Check that the reference audio is a readable wav/mp3/flac file \
                 and that the separator model is installed"
            }
            ErrorCode::BundleLoadFailed => {
                "Check the prompt bundle path (SONGGEN_PROMPT_BUNDLE) and that it is valid JSON"
            }
            ErrorCode::GenerationFailed => {
                "Try a shorter duration or regenerate with a different seed. \
                 If issue persists, try CPU-only mode with SONGGEN_DEVICE=cpu"
            }
            ErrorCode::Cancelled => "Submit the request again if the result is still needed",
            ErrorCode::ModelNotFound => {
                "Place the model files in the model directory (SONGGEN_MODEL_PATH)"
            }
            ErrorCode::ModelLoadFailed => {
                "Check available memory, verify model files are not corrupted, \
                 or re-export the models"
            }
            ErrorCode::AudioIoFailed => "Check file permissions and available disk space",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for songgen operations.
#[derive(Debug)]
pub struct SongGenError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SongGenError {
    /// Creates a new SongGenError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new SongGenError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Creates an INVALID_LYRICS error.
    pub fn empty_lyrics() -> Self {
        Self::new(ErrorCode::InvalidLyrics, "Lyrics cannot be empty")
    }

    /// Creates an INVALID_GENRE error.
    pub fn invalid_genre(label: &str) -> Self {
        Self::new(
            ErrorCode::InvalidGenre,
            format!("Unknown genre: '{}'", label),
        )
    }

    /// Creates an UNKNOWN_PARAMETER error.
    pub fn unknown_parameter(name: &str) -> Self {
        Self::new(
            ErrorCode::UnknownParameter,
            format!("Unknown generation parameter: '{}'", name),
        )
    }

    /// Creates an INVALID_PARAMETER error.
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid value for '{}': {}", name, reason.into()),
        )
    }

    /// Creates a PROMPT_NOT_FOUND error.
    pub fn prompt_not_found(bucket: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PromptNotFound,
            format!("No prompt tokens stored under {}", bucket.into()),
        )
    }

    /// Creates a SEPARATION_FAILED error.
    pub fn separation_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SeparationFailed,
            format!("Source separation failed: {}", reason.into()),
        )
    }

    /// Creates a BUNDLE_LOAD_FAILED error.
    pub fn bundle_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::BundleLoadFailed,
            format!("Failed to load prompt bundle: {}", reason.into()),
        )
    }

    /// Creates a GENERATION_FAILED error.
    pub fn generation_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GenerationFailed,
            format!("Generation failed: {}", reason.into()),
        )
    }

    /// Creates a CANCELLED error.
    pub fn cancelled(stage: &str) -> Self {
        Self::new(
            ErrorCode::Cancelled,
            format!("Request cancelled {}", stage),
        )
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates an AUDIO_IO_FAILED error.
    pub fn audio_io_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::AudioIoFailed,
            format!("Audio I/O failed: {}", reason.into()),
        )
    }
}

impl fmt::Display for SongGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for SongGenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using SongGenError.
pub type Result<T> = std::result::Result<T, SongGenError>;
