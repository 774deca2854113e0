//! Precomputed genre prompt bundles.
//!
//! A bundle is a JSON document keyed by genre label. The generic genre maps
//! to an object keyed by language tag; every other genre maps to a flat list.
//! Each leaf is a token tensor stored as `{"shape": [1, 3, T], "data": [...]}`:
//!
//! ```json
//! {
//!   "Auto": { "zh": [ {"shape": [1, 3, 2], "data": [1, 2, 3, 4, 5, 6]} ], "en": [] },
//!   "Pop":  [ {"shape": [1, 3, 2], "data": [1, 2, 3, 4, 5, 6]} ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SongGenError};
use crate::types::{Genre, TokenTensor};

use super::language::Language;

/// Channels a prompt tensor must carry: prompt, vocal, bgm.
pub const PROMPT_CHANNELS: usize = 3;

/// Tensor leaf as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<i64>,
}

/// Value stored under a genre key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Flat(Vec<RawTensor>),
    ByLanguage(BTreeMap<String, Vec<RawTensor>>),
}

/// Read-only lookup table of prompt token tensors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptBundle {
    genres: HashMap<String, Vec<TokenTensor>>,
    generic: HashMap<String, Vec<TokenTensor>>,
}

impl PromptBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses a bundle file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SongGenError::bundle_load_failed(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
            .map_err(|e| SongGenError::new(e.code, format!("{} ({})", e.message, path.display())))
    }

    /// Parses a bundle document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(text)
            .map_err(|e| SongGenError::bundle_load_failed(e.to_string()))?;

        let mut bundle = Self::new();
        for (label, entry) in raw {
            let genre = Genre::parse(&label);
            let generic = genre.is_some_and(|g| g.is_generic());
            match (generic, entry) {
                (true, RawEntry::ByLanguage(buckets)) => {
                    for (lang, tensors) in buckets {
                        let tensors = convert_all(&format!("{}/{}", label, lang), tensors)?;
                        bundle
                            .generic
                            .entry(lang.trim().to_lowercase())
                            .or_default()
                            .extend(tensors);
                    }
                }
                (false, RawEntry::Flat(tensors)) => {
                    let tensors = convert_all(&label, tensors)?;
                    // Known labels are keyed by their canonical spelling.
                    let key = genre.map_or(label, |g| g.as_str().to_string());
                    bundle.genres.entry(key).or_default().extend(tensors);
                }
                (true, RawEntry::Flat(_)) => {
                    return Err(SongGenError::bundle_load_failed(format!(
                        "'{}' must map language tags to prompt lists",
                        label
                    )));
                }
                (false, RawEntry::ByLanguage(_)) => {
                    return Err(SongGenError::bundle_load_failed(format!(
                        "'{}' must map to a prompt list",
                        label
                    )));
                }
            }
        }

        Ok(bundle)
    }

    /// Serializes the bundle back into its on-disk form.
    pub fn to_json_string(&self) -> Result<String> {
        let mut raw: BTreeMap<String, RawEntry> = self
            .genres
            .iter()
            .map(|(label, tensors)| (label.clone(), RawEntry::Flat(to_raw_all(tensors))))
            .collect();
        if !self.generic.is_empty() {
            let buckets = self
                .generic
                .iter()
                .map(|(lang, tensors)| (lang.clone(), to_raw_all(tensors)))
                .collect();
            raw.insert(Genre::Auto.as_str().to_string(), RawEntry::ByLanguage(buckets));
        }
        serde_json::to_string(&raw).map_err(|e| SongGenError::bundle_load_failed(e.to_string()))
    }

    /// Adds prompts for a specific genre.
    ///
    /// Tensors with fewer than three channels are rejected.
    pub fn insert_genre(&mut self, genre: Genre, tensors: Vec<TokenTensor>) -> Result<()> {
        check_channels(genre.as_str(), &tensors)?;
        self.genres.insert(genre.as_str().to_string(), tensors);
        Ok(())
    }

    /// Adds prompts for the generic genre under a language tag.
    pub fn insert_generic(&mut self, language: Language, tensors: Vec<TokenTensor>) -> Result<()> {
        check_channels(language.as_str(), &tensors)?;
        self.generic.insert(language.as_str().to_string(), tensors);
        Ok(())
    }

    /// Returns the candidate prompts for a genre.
    ///
    /// The generic genre is looked up by `language`; other genres ignore it.
    /// A missing or empty bucket fails with PROMPT_NOT_FOUND.
    pub fn candidates(&self, genre: Genre, language: Option<Language>) -> Result<&[TokenTensor]> {
        let (bucket, name) = if genre.is_generic() {
            let language = language.ok_or_else(|| {
                SongGenError::prompt_not_found(format!("'{}' without a language tag", genre))
            })?;
            (
                self.generic.get(language.as_str()),
                format!("'{}' / '{}'", genre, language),
            )
        } else {
            (self.genres.get(genre.as_str()), format!("'{}'", genre))
        };

        match bucket {
            Some(tensors) if !tensors.is_empty() => Ok(tensors.as_slice()),
            _ => Err(SongGenError::prompt_not_found(name)),
        }
    }

    /// Returns the genre labels that have at least one prompt.
    pub fn genres(&self) -> Vec<Genre> {
        Genre::all()
            .iter()
            .copied()
            .filter(|g| {
                if g.is_generic() {
                    self.generic.values().any(|t| !t.is_empty())
                } else {
                    self.genres.get(g.as_str()).is_some_and(|t| !t.is_empty())
                }
            })
            .collect()
    }
}

fn convert_all(bucket: &str, tensors: Vec<RawTensor>) -> Result<Vec<TokenTensor>> {
    let tensors = tensors
        .into_iter()
        .map(|raw| convert(bucket, raw))
        .collect::<Result<Vec<_>>>()?;
    check_channels(bucket, &tensors)?;
    Ok(tensors)
}

fn convert(bucket: &str, raw: RawTensor) -> Result<TokenTensor> {
    let dims: [usize; 3] = raw.shape.as_slice().try_into().map_err(|_| {
        SongGenError::bundle_load_failed(format!(
            "prompt in '{}' has rank {}, expected 3",
            bucket,
            raw.shape.len()
        ))
    })?;
    Array3::from_shape_vec((dims[0], dims[1], dims[2]), raw.data).map_err(|e| {
        SongGenError::bundle_load_failed(format!("prompt in '{}' has bad data: {}", bucket, e))
    })
}

fn check_channels(bucket: &str, tensors: &[TokenTensor]) -> Result<()> {
    match tensors.iter().find(|t| t.len_of(Axis(1)) < PROMPT_CHANNELS) {
        Some(t) => Err(SongGenError::bundle_load_failed(format!(
            "prompt in '{}' has {} channels, expected {}",
            bucket,
            t.len_of(Axis(1)),
            PROMPT_CHANNELS
        ))),
        None => Ok(()),
    }
}

fn to_raw_all(tensors: &[TokenTensor]) -> Vec<RawTensor> {
    tensors
        .iter()
        .map(|t| RawTensor {
            shape: t.shape().to_vec(),
            data: t.iter().copied().collect(),
        })
        .collect()
}
