//! Audio input and output.
//!
//! Decodes reference clips, resamples them, and writes generated songs as
//! WAV files.

pub mod decode;
pub mod resample;
pub mod wav;

// Re-export commonly used items
pub use decode::{read_audio, to_stereo};
pub use resample::resample;
pub use wav::{samples_to_duration, write_song, write_wav};
