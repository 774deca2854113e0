//! Command-line interface for standalone song generation.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{Device, SongGenConfig};
use crate::types::{
    params::parse_override, GenerationMode, GenerationRequest, ParamOverrides, ParamValue,
    SynthesisMode,
};

/// songgen: lyrics-to-song generation
#[derive(Parser, Debug)]
#[command(name = "songgen")]
#[command(about = "Generate songs from lyrics with reference audio, genre prompt or no conditioning")]
#[command(version)]
pub struct Cli {
    /// Lyrics text with structure tags such as [verse] and [chorus]
    #[arg(short, long, conflicts_with = "lyrics_file")]
    pub lyrics: Option<String>,

    /// File to read the lyrics from
    #[arg(long)]
    pub lyrics_file: Option<PathBuf>,

    /// Free-text style description (gender, timbre, genre, mood, instruments, bpm)
    #[arg(short, long)]
    pub description: Option<String>,

    /// Reference audio clip to condition on
    #[arg(short, long)]
    pub audio: Option<PathBuf>,

    /// Genre of the prompt to draw from the prompt bundle
    #[arg(short, long)]
    pub genre: Option<String>,

    /// Prompt bundle JSON file (defaults to SONGGEN_PROMPT_BUNDLE)
    #[arg(long)]
    pub prompt_bundle: Option<PathBuf>,

    /// Generation mode: lyrics_and_audio, lyrics_and_genre or lyrics_only.
    /// Inferred from --audio and --genre when absent.
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<GenerationMode>,

    /// Also write separate vocal and accompaniment tracks
    #[arg(long)]
    pub separate: bool,

    /// Random seed for reproducible generation
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Generation parameter override, e.g. --param temperature=0.9 (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, ParamValue)>,

    /// Directory for the generated WAV files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory containing the song model files
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Path to separator.onnx, needed for reference audio
    #[arg(long)]
    pub separator_model: Option<PathBuf>,

    /// Execution device: auto, cpu, cuda or metal
    #[arg(long, value_parser = parse_device)]
    pub device: Option<Device>,

    /// Intra-op threads for ONNX Runtime
    #[arg(long)]
    pub threads: Option<u32>,

    /// List supported genres and exit
    #[arg(long)]
    pub list_genres: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns the lyrics from --lyrics or --lyrics-file.
    pub fn read_lyrics(&self) -> std::io::Result<Option<String>> {
        match (&self.lyrics, &self.lyrics_file) {
            (Some(lyrics), _) => Ok(Some(lyrics.clone())),
            (None, Some(path)) => std::fs::read_to_string(path).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Overlays command-line settings onto the environment configuration.
    pub fn apply_to(&self, config: &mut SongGenConfig) {
        if let Some(ref path) = self.model_dir {
            config.model_path = Some(path.clone());
        }
        if let Some(ref path) = self.separator_model {
            config.separator_path = Some(path.clone());
        }
        if let Some(ref path) = self.prompt_bundle {
            config.prompt_bundle = Some(path.clone());
        }
        if let Some(ref path) = self.output_dir {
            config.output_path = Some(path.clone());
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
    }

    /// Mode from --mode, otherwise the richest mode the arguments allow.
    pub fn effective_mode(&self) -> GenerationMode {
        self.mode.unwrap_or(if self.audio.is_some() {
            GenerationMode::LyricsAndAudio
        } else if self.genre.is_some() {
            GenerationMode::LyricsAndGenre
        } else {
            GenerationMode::LyricsOnly
        })
    }

    /// Builds the request for `lyrics`.
    ///
    /// `prompt_bundle` is the bundle used when a genre is given.
    pub fn to_request(&self, lyrics: String, prompt_bundle: Option<&Path>) -> GenerationRequest {
        let overrides: ParamOverrides = self.params.iter().cloned().collect();

        GenerationRequest {
            lyrics,
            description: self.description.clone(),
            reference_audio: self.audio.clone(),
            genre: self.genre.clone(),
            prompt_bundle: prompt_bundle.map(Path::to_path_buf),
            mode: self.effective_mode(),
            overrides,
            seed: self.seed,
            synthesis: if self.separate {
                SynthesisMode::Separate
            } else {
                SynthesisMode::Mixed
            },
        }
    }
}

fn parse_mode(s: &str) -> Result<GenerationMode, String> {
    GenerationMode::parse(s).ok_or_else(|| {
        format!(
            "unknown mode '{}' (expected lyrics_and_audio, lyrics_and_genre or lyrics_only)",
            s
        )
    })
}

fn parse_param(s: &str) -> Result<(String, ParamValue), String> {
    parse_override(s).map_err(|e| e.message)
}

fn parse_device(s: &str) -> Result<Device, String> {
    Device::parse(s).ok_or_else(|| format!("unknown device '{}' (expected auto, cpu, cuda or metal)", s))
}
