//! Generation pipeline for songs.
//!
//! Orchestrates conditioning selection, parameter merging, token generation
//! and synthesis for one request at a time per caller. The pipeline is shared
//! between threads; the model is locked per phase.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::audio::write_song;
use crate::conditioning::{ConditioningSelector, PromptStore};
use crate::error::{ErrorCode, Result, SongGenError};
use crate::models::{Precision, SongModel, SourceSeparator, TokenInput};
use crate::types::{
    compute_song_id, merge, GenerationParameters, GenerationRequest, SongRecord, SynthesizedAudio,
};

use super::cancel::CancelToken;

/// Description used when a request carries none.
pub const DEFAULT_DESCRIPTION: &str = ".";

/// Prefix added to every description.
pub const DESCRIPTION_PREFIX: &str = "[Musicality-very-high], ";

/// Pipeline stage reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Conditioning,
    Tokens,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Conditioning => "conditioning",
            Stage::Tokens => "tokens",
            Stage::Synthesis => "synthesis",
        }
    }
}

/// Result of one generation request.
#[derive(Debug, Clone)]
pub struct SongOutput {
    pub audio: SynthesizedAudio,
    /// Seed used for the prompt draw and sampling.
    pub seed: u64,
    pub song_id: String,
    /// Genre label, when a genre prompt was requested.
    pub genre: Option<String>,
    /// Conditioning actually applied.
    pub conditioning: &'static str,
    /// Effective parameters of the request.
    pub params: GenerationParameters,
    /// Wall time of the request in seconds.
    pub generation_time_sec: f32,
}

impl SongOutput {
    /// Writes the WAV files of the song into `dir`.
    pub fn write(&self, dir: &Path) -> Result<SongRecord> {
        let files = write_song(&self.audio, dir, &self.song_id)?;
        Ok(SongRecord {
            song_id: self.song_id.clone(),
            files,
            genre: self.genre.clone(),
            conditioning: self.conditioning.to_string(),
            seed: self.seed,
            duration_sec: self.audio.duration_sec(),
            sample_rate: self.audio.sample_rate,
            generation_time_sec: self.generation_time_sec,
            created_at: SystemTime::now(),
        })
    }
}

/// Song generation pipeline.
///
/// Holds the model behind a mutex, the conditioning collaborators and the
/// immutable default parameters.
pub struct SongPipeline<M, S, P> {
    model: Mutex<M>,
    selector: ConditioningSelector<S, P>,
    defaults: Arc<GenerationParameters>,
}

impl<M: SongModel, S: SourceSeparator, P: PromptStore> SongPipeline<M, S, P> {
    pub fn new(model: M, separator: S, store: P, defaults: GenerationParameters) -> Self {
        Self {
            model: Mutex::new(model),
            selector: ConditioningSelector::new(separator, store),
            defaults: Arc::new(defaults),
        }
    }

    /// Creates a pipeline whose default duration is the model's maximum.
    pub fn with_model_defaults(model: M, separator: S, store: P) -> Self {
        let defaults = GenerationParameters {
            duration: model.max_duration(),
            ..GenerationParameters::default()
        };
        Self::new(model, separator, store, defaults)
    }

    pub fn defaults(&self) -> &GenerationParameters {
        &self.defaults
    }

    pub fn selector(&self) -> &ConditioningSelector<S, P> {
        &self.selector
    }

    /// Generates one song.
    pub fn generate(&self, request: &GenerationRequest) -> Result<SongOutput> {
        self.generate_with(request, &CancelToken::new(), |_| {})
    }

    /// Generates one song, reporting each stage and honoring `cancel`.
    ///
    /// Cancellation is checked before conditioning, before token generation
    /// and before synthesis.
    pub fn generate_with<F>(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
        mut on_stage: F,
    ) -> Result<SongOutput>
    where
        F: FnMut(Stage),
    {
        let start = Instant::now();

        if !request.has_lyrics() {
            return Err(SongGenError::empty_lyrics());
        }

        let params = merge(&self.defaults, &request.overrides)?;
        debug!(
            cfg_coef = params.cfg_coef,
            temperature = params.temperature,
            top_k = params.top_k,
            top_p = params.top_p,
            record_tokens = params.record_tokens,
            record_window = params.record_window,
            extend_stride = params.extend_stride,
            duration = params.duration,
            "effective parameters"
        );

        let seed = request.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        cancel.check("before conditioning")?;
        on_stage(Stage::Conditioning);
        let stage_start = Instant::now();
        let conditioning = self.selector.select(request, &mut rng)?;
        info!(
            conditioning = conditioning.as_str(),
            elapsed_ms = stage_start.elapsed().as_millis() as u64,
            "conditioning ready"
        );

        cancel.check("before token generation")?;
        on_stage(Stage::Tokens);
        let stage_start = Instant::now();
        let lyrics = normalize_lyrics(&request.lyrics);
        let description = prefixed_description(request.description.as_deref());
        let input = TokenInput {
            lyrics: &lyrics,
            description: &description,
            conditioning: &conditioning,
            seed,
        };

        let tokens = {
            let mut model = self.lock_model();
            model.configure(&params).map_err(as_generation_failure)?;
            model
                .generate_tokens(&input, Precision::Half)
                .map_err(as_generation_failure)?
        };
        info!(
            frames = tokens.frames(),
            elapsed_ms = stage_start.elapsed().as_millis() as u64,
            "tokens generated"
        );

        // Dropping out here releases the tokens with the request.
        cancel.check("before synthesis")?;
        on_stage(Stage::Synthesis);
        let stage_start = Instant::now();
        let audio = {
            let mut model = self.lock_model();
            model.configure(&params).map_err(as_generation_failure)?;
            model
                .synthesize(
                    tokens,
                    conditioning.waveform_stems(),
                    request.synthesis,
                    Precision::Full,
                )
                .map_err(as_generation_failure)?
        };
        info!(
            duration_sec = audio.duration_sec(),
            mode = request.synthesis.as_str(),
            elapsed_ms = stage_start.elapsed().as_millis() as u64,
            "audio synthesized"
        );

        let genre = request
            .mode
            .uses_genre_prompt()
            .then(|| request.genre.clone())
            .flatten();
        let song_id = compute_song_id(&lyrics, genre.as_deref(), seed, params.duration);

        Ok(SongOutput {
            audio,
            seed,
            song_id,
            genre,
            conditioning: conditioning.as_str(),
            params,
            generation_time_sec: start.elapsed().as_secs_f32(),
        })
    }

    /// Locks the model, recovering from a panic in an earlier request.
    ///
    /// Each phase reconfigures the model, so no state of the failed request
    /// carries over.
    fn lock_model(&self) -> MutexGuard<'_, M> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collapses runs of whitespace to single spaces.
pub fn normalize_lyrics(lyrics: &str) -> String {
    lyrics.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prefixes the description, defaulting blank descriptions.
pub fn prefixed_description(description: Option<&str>) -> String {
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION);
    format!("{}{}", DESCRIPTION_PREFIX, description)
}

/// Reports model failures as `GENERATION_FAILED`, keeping the cause.
fn as_generation_failure(e: SongGenError) -> SongGenError {
    if e.code == ErrorCode::GenerationFailed {
        e
    } else {
        let message = e.message.clone();
        SongGenError::with_source(ErrorCode::GenerationFailed, message, e)
    }
}
