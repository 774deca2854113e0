//! Chooses and realizes the conditioning signal of a request.
//!
//! Exactly one of three sources feeds the model, in priority order:
//! separated stems of a reference clip, a genre prompt drawn from a bundle,
//! or nothing.

use std::path::PathBuf;

use ndarray::s;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{Result, SongGenError};
use crate::models::SourceSeparator;
use crate::types::{GenerationRequest, Genre, StemSet, TokenTensor, Waveform};

use super::language::{detect_language, Language};
use super::store::PromptStore;

/// Where the conditioning of a request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditioningSource {
    /// Separate this clip into stems.
    ReferenceAudio(PathBuf),
    /// Draw a precomputed prompt for `genre` from `bundle`.
    GenrePrompt { genre: Genre, bundle: PathBuf },
    /// Lyrics only.
    Unconditioned,
}

impl ConditioningSource {
    /// Maps a request onto its conditioning source.
    ///
    /// Only the fields the request's mode consults are read. A reference
    /// clip that does not exist on disk falls through to the genre prompt.
    /// The genre label is parsed only when a genre prompt is chosen.
    pub fn resolve(request: &GenerationRequest) -> Result<Self> {
        if request.mode.uses_reference_audio() {
            if let Some(path) = &request.reference_audio {
                if path.is_file() {
                    return Ok(ConditioningSource::ReferenceAudio(path.clone()));
                }
                warn!(path = %path.display(), "reference audio not found, ignoring");
            }
        }

        if request.mode.uses_genre_prompt() {
            if let (Some(label), Some(bundle)) = (&request.genre, &request.prompt_bundle) {
                let genre = Genre::parse(label).ok_or_else(|| SongGenError::invalid_genre(label))?;
                return Ok(ConditioningSource::GenrePrompt {
                    genre,
                    bundle: bundle.clone(),
                });
            }
        }

        Ok(ConditioningSource::Unconditioned)
    }

    /// Returns the label logged and recorded for this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditioningSource::ReferenceAudio(_) => "reference_audio",
            ConditioningSource::GenrePrompt { .. } => "genre_prompt",
            ConditioningSource::Unconditioned => "none",
        }
    }
}

/// The conditioning handed to the song model.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditioning {
    /// No conditioning.
    None,
    /// Waveform stems separated from a reference clip.
    Waveforms(StemSet<Waveform>),
    /// Token stems from a precomputed genre prompt.
    Tokens(StemSet<TokenTensor>),
}

impl Conditioning {
    /// True unless the conditioning is token-based.
    ///
    /// Synthesis only receives stems when this holds; token prompts are
    /// already embedded in the generated tokens.
    pub fn is_waveform(&self) -> bool {
        !matches!(self, Conditioning::Tokens(_))
    }

    pub fn waveform_stems(&self) -> Option<&StemSet<Waveform>> {
        match self {
            Conditioning::Waveforms(stems) => Some(stems),
            _ => None,
        }
    }

    pub fn token_stems(&self) -> Option<&StemSet<TokenTensor>> {
        match self {
            Conditioning::Tokens(stems) => Some(stems),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Conditioning::None => "none",
            Conditioning::Waveforms(_) => "reference_audio",
            Conditioning::Tokens(_) => "genre_prompt",
        }
    }
}

/// Realizes conditioning through the separator and prompt store.
pub struct ConditioningSelector<S, P> {
    separator: S,
    store: P,
}

impl<S: SourceSeparator, P: PromptStore> ConditioningSelector<S, P> {
    pub fn new(separator: S, store: P) -> Self {
        Self { separator, store }
    }

    /// Resolves and realizes the conditioning of `request`.
    ///
    /// `rng` drives the prompt draw, so a seeded generator gives the same
    /// prompt for the same request and bundle.
    pub fn select<R: Rng + ?Sized>(
        &self,
        request: &GenerationRequest,
        rng: &mut R,
    ) -> Result<Conditioning> {
        let source = ConditioningSource::resolve(request)?;
        self.realize(&source, &request.lyrics, rng)
    }

    /// Realizes an already resolved source.
    pub fn realize<R: Rng + ?Sized>(
        &self,
        source: &ConditioningSource,
        lyrics: &str,
        rng: &mut R,
    ) -> Result<Conditioning> {
        match source {
            ConditioningSource::ReferenceAudio(path) => {
                info!(path = %path.display(), "conditioning on reference audio");
                let stems = self.separator.separate(path)?;
                Ok(Conditioning::Waveforms(stems))
            }
            ConditioningSource::GenrePrompt { genre, bundle } => {
                let bundle_data = self.store.load_bundle(bundle)?;
                let language = genre.is_generic().then(|| detect_language(lyrics));
                let candidates = bundle_data.candidates(*genre, language)?;
                let index = rng.gen_range(0..candidates.len());

                info!(
                    genre = %genre,
                    language = language.as_ref().map(Language::as_str).unwrap_or("-"),
                    index,
                    candidates = candidates.len(),
                    "conditioning on genre prompt"
                );

                Ok(Conditioning::Tokens(split_channels(&candidates[index])))
            }
            ConditioningSource::Unconditioned => {
                debug!("no conditioning");
                Ok(Conditioning::None)
            }
        }
    }

    pub fn separator(&self) -> &S {
        &self.separator
    }

    pub fn store(&self) -> &P {
        &self.store
    }
}

/// Splits a `[1, 3, T]` prompt on the channel axis into prompt, vocal, bgm.
///
/// Each stem keeps its channel axis, so stems are `[1, 1, T]`. The bundle
/// loader guarantees at least three channels.
fn split_channels(tensor: &TokenTensor) -> StemSet<TokenTensor> {
    let channel = |i: usize| tensor.slice(s![.., i..i + 1, ..]).to_owned();
    StemSet::new(channel(0), channel(1), channel(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::GenerationMode;
    use ndarray::Array3;

    fn request_with(mode: GenerationMode) -> GenerationRequest {
        GenerationRequest {
            lyrics: "[verse]\nhello".to_string(),
            mode,
            ..Default::default()
        }
    }

    #[test]
    fn lyrics_only_ignores_every_other_field() {
        let mut request = request_with(GenerationMode::LyricsOnly);
        request.genre = Some("Not A Genre".to_string());
        request.prompt_bundle = Some(PathBuf::from("/nonexistent.json"));
        request.reference_audio = Some(PathBuf::from("/nonexistent.wav"));

        assert_eq!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::Unconditioned
        );
    }

    #[test]
    fn genre_mode_ignores_reference_audio() {
        let clip = tempfile::NamedTempFile::new().unwrap();
        let mut request = request_with(GenerationMode::LyricsAndGenre);
        request.reference_audio = Some(clip.path().to_path_buf());
        request.genre = Some("jazz".to_string());
        request.prompt_bundle = Some(PathBuf::from("/prompts.json"));

        assert_eq!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::GenrePrompt {
                genre: Genre::Jazz,
                bundle: PathBuf::from("/prompts.json"),
            }
        );
    }

    #[test]
    fn existing_reference_audio_wins() {
        let clip = tempfile::NamedTempFile::new().unwrap();
        let mut request = request_with(GenerationMode::LyricsAndAudio);
        request.reference_audio = Some(clip.path().to_path_buf());
        request.genre = Some("Pop".to_string());
        request.prompt_bundle = Some(PathBuf::from("/prompts.json"));

        assert_eq!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::ReferenceAudio(clip.path().to_path_buf())
        );
    }

    #[test]
    fn missing_reference_audio_falls_through() {
        let mut request = request_with(GenerationMode::LyricsAndAudio);
        request.reference_audio = Some(PathBuf::from("/nonexistent/ref.wav"));
        assert_eq!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::Unconditioned
        );

        request.genre = Some("Pop".to_string());
        request.prompt_bundle = Some(PathBuf::from("/prompts.json"));
        assert!(matches!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::GenrePrompt { genre: Genre::Pop, .. }
        ));
    }

    #[test]
    fn genre_without_bundle_is_unconditioned() {
        let mut request = request_with(GenerationMode::LyricsAndGenre);
        request.genre = Some("Pop".to_string());
        assert_eq!(
            ConditioningSource::resolve(&request).unwrap(),
            ConditioningSource::Unconditioned
        );
    }

    #[test]
    fn unknown_genre_is_rejected() {
        let mut request = request_with(GenerationMode::LyricsAndGenre);
        request.genre = Some("Polka".to_string());
        request.prompt_bundle = Some(PathBuf::from("/prompts.json"));

        let err = ConditioningSource::resolve(&request).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGenre);
    }

    #[test]
    fn split_keeps_channel_order() {
        let tensor = Array3::from_shape_fn((1, 3, 4), |(_, c, t)| (c * 10 + t) as i64);
        let stems = split_channels(&tensor);

        assert_eq!(stems.prompt.dim(), (1, 1, 4));
        assert_eq!(stems.prompt[[0, 0, 2]], 2);
        assert_eq!(stems.vocal[[0, 0, 2]], 12);
        assert_eq!(stems.bgm[[0, 0, 2]], 22);
    }

    #[test]
    fn is_waveform_flag() {
        assert!(Conditioning::None.is_waveform());
        let tokens = StemSet::new(
            Array3::zeros((1, 1, 2)),
            Array3::zeros((1, 1, 2)),
            Array3::zeros((1, 1, 2)),
        );
        assert!(!Conditioning::Tokens(tokens).is_waveform());
    }
}
