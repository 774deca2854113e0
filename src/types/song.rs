//! SongRecord type describing a generated song written to disk.
//!
//! Songs are identified by a deterministic song_id computed from the inputs
//! that decide their content, so repeated requests map to the same files.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::SystemTime;

/// Metadata written next to the WAV files of a generated song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    /// SHA256 prefix of (lyrics + genre + seed + duration). 16 hex characters.
    pub song_id: String,

    /// WAV files written for this song, keyed by stem name.
    pub files: Vec<(String, PathBuf)>,

    /// Genre label used for conditioning, if any.
    pub genre: Option<String>,

    /// Conditioning actually applied ("reference_audio", "genre_prompt", "none").
    pub conditioning: String,

    /// Seed used for the prompt draw and sampling.
    pub seed: u64,

    /// Duration of the mix in seconds.
    pub duration_sec: f32,

    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Wall time of the whole request in seconds.
    pub generation_time_sec: f32,

    /// When the song was written.
    #[serde(with = "system_time_serde")]
    pub created_at: SystemTime,
}

impl SongRecord {
    /// Validates that the record meets its constraints.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.song_id.len() != 16 {
            return Some(format!(
                "Song ID must be 16 characters, got {}",
                self.song_id.len()
            ));
        }

        if !self.song_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some("Song ID must contain only hex characters".to_string());
        }

        if self.files.is_empty() {
            return Some("Song record lists no files".to_string());
        }

        None
    }
}

/// Computes a deterministic song ID from the generation inputs.
///
/// The ID is the first 16 hex characters of the SHA256 hash of
/// `{lyrics}:{genre}:{seed}:{duration_sec}`.
pub fn compute_song_id(lyrics: &str, genre: Option<&str>, seed: u64, duration_sec: f32) -> String {
    let input = format!(
        "{}:{}:{}:{}",
        lyrics,
        genre.unwrap_or(""),
        seed,
        duration_sec
    );
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Serializes SystemTime as a Unix timestamp.
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}
