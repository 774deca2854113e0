//! GenerationRequest and the closed label sets it is built from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::params::ParamOverrides;

/// Genre labels understood by the prompt bundle.
///
/// `Auto` is the generic label: its prompts are bucketed by lyric language
/// instead of by style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Genre {
    #[default]
    Auto,
    Pop,
    #[serde(rename = "R&B")]
    RnB,
    Dance,
    Jazz,
    Rock,
    #[serde(rename = "Chinese Style")]
    ChineseStyle,
    #[serde(rename = "Chinese Tradition")]
    ChineseTradition,
    Metal,
    Reggae,
    #[serde(rename = "Chinese Opera")]
    ChineseOpera,
}

impl Genre {
    const ALL: [Genre; 11] = [
        Genre::Auto,
        Genre::Pop,
        Genre::RnB,
        Genre::Dance,
        Genre::Jazz,
        Genre::Rock,
        Genre::ChineseStyle,
        Genre::ChineseTradition,
        Genre::Metal,
        Genre::Reggae,
        Genre::ChineseOpera,
    ];

    /// Returns every supported genre, `Auto` first.
    pub fn all() -> &'static [Genre] {
        &Self::ALL
    }

    /// Returns the label used as the bundle key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Auto => "Auto",
            Genre::Pop => "Pop",
            Genre::RnB => "R&B",
            Genre::Dance => "Dance",
            Genre::Jazz => "Jazz",
            Genre::Rock => "Rock",
            Genre::ChineseStyle => "Chinese Style",
            Genre::ChineseTradition => "Chinese Tradition",
            Genre::Metal => "Metal",
            Genre::Reggae => "Reggae",
            Genre::ChineseOpera => "Chinese Opera",
        }
    }

    /// Parses a genre label, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|genre| genre.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Returns true for the generic, language-bucketed genre.
    pub fn is_generic(&self) -> bool {
        matches!(self, Genre::Auto)
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which inputs a request is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Lyrics plus a reference clip; falls back to the genre prompt when the
    /// clip is not available.
    LyricsAndAudio,
    /// Lyrics plus a precomputed genre prompt.
    #[default]
    LyricsAndGenre,
    /// Lyrics alone, no conditioning.
    LyricsOnly,
}

impl GenerationMode {
    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::LyricsAndAudio => "lyrics_and_audio",
            GenerationMode::LyricsAndGenre => "lyrics_and_genre",
            GenerationMode::LyricsOnly => "lyrics_only",
        }
    }

    /// Parses a mode from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "lyrics_and_audio" | "audio" => Some(GenerationMode::LyricsAndAudio),
            "lyrics_and_genre" | "genre" => Some(GenerationMode::LyricsAndGenre),
            "lyrics_only" | "lyrics" | "none" => Some(GenerationMode::LyricsOnly),
            _ => None,
        }
    }

    /// Returns true if the reference audio field is consulted.
    pub fn uses_reference_audio(&self) -> bool {
        matches!(self, GenerationMode::LyricsAndAudio)
    }

    /// Returns true if the genre and prompt bundle fields are consulted.
    pub fn uses_genre_prompt(&self) -> bool {
        !matches!(self, GenerationMode::LyricsOnly)
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape of the synthesized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Full mix only.
    #[default]
    Mixed,
    /// Full mix plus isolated vocal and accompaniment stems.
    Separate,
}

impl SynthesisMode {
    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisMode::Mixed => "mixed",
            SynthesisMode::Separate => "separate",
        }
    }
}

/// A request to generate one song.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationRequest {
    /// Song lyrics with structure tags. Must be non-empty after trimming.
    pub lyrics: String,

    /// Free-text style description.
    #[serde(default)]
    pub description: Option<String>,

    /// Reference clip to separate into conditioning stems.
    #[serde(default)]
    pub reference_audio: Option<PathBuf>,

    /// Raw genre label; parsed only when the mode consults it.
    #[serde(default)]
    pub genre: Option<String>,

    /// Precomputed prompt bundle.
    #[serde(default)]
    pub prompt_bundle: Option<PathBuf>,

    /// Which of the fields above are consulted.
    #[serde(default)]
    pub mode: GenerationMode,

    /// Per-call generation parameter overrides.
    #[serde(default)]
    pub overrides: ParamOverrides,

    /// Seed for the prompt draw and sampling. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Mixed output or separated stems.
    #[serde(default)]
    pub synthesis: SynthesisMode,
}

impl GenerationRequest {
    /// Creates a lyrics-only request.
    pub fn new(lyrics: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            mode: GenerationMode::LyricsOnly,
            ..Default::default()
        }
    }

    /// Conditions on a genre prompt drawn from `bundle`.
    pub fn with_genre(mut self, genre: impl Into<String>, bundle: impl Into<PathBuf>) -> Self {
        self.genre = Some(genre.into());
        self.prompt_bundle = Some(bundle.into());
        if self.mode == GenerationMode::LyricsOnly {
            self.mode = GenerationMode::LyricsAndGenre;
        }
        self
    }

    /// Conditions on stems separated from a reference clip.
    pub fn with_reference_audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_audio = Some(path.into());
        self.mode = GenerationMode::LyricsAndAudio;
        self
    }

    /// Sets the style description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns true if the lyrics carry any non-whitespace text.
    pub fn has_lyrics(&self) -> bool {
        !self.lyrics.trim().is_empty()
    }
}
