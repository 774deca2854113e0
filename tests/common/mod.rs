//! Deterministic fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ndarray::{Array2, Array3};

use songgen::conditioning::{Conditioning, Language, PromptBundle, PromptStore};
use songgen::error::{Result, SongGenError};
use songgen::models::{Precision, SongModel, SourceSeparator, TokenInput};
use songgen::types::{
    GenerationParameters, Genre, StemSet, SynthesisMode, SynthesizedAudio, TokenSequence,
    TokenTensor, Waveform,
};

pub const FRAME_RATE: f32 = 5.0;
pub const SAMPLES_PER_FRAME: usize = 4;
pub const SAMPLE_RATE: u32 = 20;

/// Everything the fake model was asked to do.
#[derive(Debug, Default)]
pub struct ModelLog {
    pub configured: Vec<GenerationParameters>,
    pub generate_calls: usize,
    pub synthesize_calls: usize,
    pub lyrics: Vec<String>,
    pub descriptions: Vec<String>,
    pub conditioning: Vec<&'static str>,
    /// Prompt channel of token conditioning, flattened.
    pub token_prompts: Vec<Vec<i64>>,
    pub seeds: Vec<u64>,
    pub token_precision: Vec<Precision>,
    pub synth_precision: Vec<Precision>,
    /// Whether synthesis received stems.
    pub synth_stems: Vec<bool>,
}

impl ModelLog {
    pub fn model_calls(&self) -> usize {
        self.configured.len() + self.generate_calls + self.synthesize_calls
    }
}

/// Fake song model producing silent audio of the configured duration.
pub struct FakeModel {
    pub log: Arc<Mutex<ModelLog>>,
    params: Option<GenerationParameters>,
    fail_generate: bool,
    /// Number of upcoming synthesis calls that fail.
    fail_synthesis: Arc<AtomicUsize>,
    panic_once: Arc<AtomicBool>,
}

impl FakeModel {
    pub fn new() -> (Self, Arc<Mutex<ModelLog>>) {
        let log = Arc::new(Mutex::new(ModelLog::default()));
        let model = Self {
            log: Arc::clone(&log),
            params: None,
            fail_generate: false,
            fail_synthesis: Arc::new(AtomicUsize::new(0)),
            panic_once: Arc::new(AtomicBool::new(false)),
        };
        (model, log)
    }

    pub fn failing() -> (Self, Arc<Mutex<ModelLog>>) {
        let (mut model, log) = Self::new();
        model.fail_generate = true;
        (model, log)
    }

    /// A model whose first synthesis call fails.
    pub fn failing_synthesis_once() -> (Self, Arc<Mutex<ModelLog>>) {
        let (model, log) = Self::new();
        model.fail_synthesis.store(1, Ordering::SeqCst);
        (model, log)
    }

    /// A model whose first token generation panics.
    pub fn panicking_once() -> (Self, Arc<Mutex<ModelLog>>) {
        let (model, log) = Self::new();
        model.panic_once.store(true, Ordering::SeqCst);
        (model, log)
    }

    fn frames(&self) -> usize {
        let duration = self.params.as_ref().map(|p| p.duration).unwrap_or(1.0);
        (duration * FRAME_RATE).round() as usize
    }
}

impl SongModel for FakeModel {
    fn configure(&mut self, params: &GenerationParameters) -> Result<()> {
        self.log.lock().unwrap().configured.push(params.clone());
        self.params = Some(params.clone());
        Ok(())
    }

    fn generate_tokens(&mut self, input: &TokenInput<'_>, precision: Precision) -> Result<TokenSequence> {
        {
            let mut log = self.log.lock().unwrap();
            log.generate_calls += 1;
            log.lyrics.push(input.lyrics.to_string());
            log.descriptions.push(input.description.to_string());
            log.conditioning.push(input.conditioning.as_str());
            log.seeds.push(input.seed);
            log.token_precision.push(precision);
            if let Conditioning::Tokens(stems) = input.conditioning {
                log.token_prompts.push(stems.prompt.iter().copied().collect());
            }
        }

        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("model crashed");
        }
        if self.fail_generate {
            return Err(SongGenError::model_load_failed("weights missing"));
        }

        Ok(TokenSequence::new(Array3::zeros((1, 3, self.frames()))))
    }

    fn synthesize(
        &mut self,
        tokens: TokenSequence,
        stems: Option<&StemSet<Waveform>>,
        mode: SynthesisMode,
        precision: Precision,
    ) -> Result<SynthesizedAudio> {
        {
            let mut log = self.log.lock().unwrap();
            log.synthesize_calls += 1;
            log.synth_precision.push(precision);
            log.synth_stems.push(stems.is_some());
        }

        if self
            .fail_synthesis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SongGenError::audio_io_failed("decoder output missing"));
        }

        let samples = tokens.frames() * SAMPLES_PER_FRAME;
        let mut audio = SynthesizedAudio::mixed(Array2::zeros((2, samples)), SAMPLE_RATE);
        if mode == SynthesisMode::Separate {
            audio.vocal = Some(Array2::zeros((2, samples)));
            audio.bgm = Some(Array2::zeros((2, samples)));
        }
        Ok(audio)
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn max_duration(&self) -> f32 {
        4.0
    }
}

/// Fake separator returning fixed stems.
pub struct FakeSeparator {
    pub calls: Arc<AtomicUsize>,
    pub stems: StemSet<Waveform>,
    fail: bool,
}

impl FakeSeparator {
    pub fn new() -> Self {
        let wave = |value: f32| Waveform::new(Array2::from_elem((2, 8), value), 48000);
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            stems: StemSet::new(wave(0.5), wave(0.25), wave(0.125)),
            fail: false,
        }
    }

    /// A separator that rejects every clip.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl SourceSeparator for FakeSeparator {
    fn separate(&self, _path: &Path) -> Result<StemSet<Waveform>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SongGenError::separation_failed("unsupported codec"));
        }
        Ok(self.stems.clone())
    }
}

/// In-memory prompt store serving one bundle for every path.
pub struct MemoryStore {
    pub bundle: Arc<PromptBundle>,
    pub loads: Arc<AtomicUsize>,
    pub paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl MemoryStore {
    pub fn new(bundle: PromptBundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
            loads: Arc::new(AtomicUsize::new(0)),
            paths: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PromptStore for MemoryStore {
    fn load_bundle(&self, path: &Path) -> Result<Arc<PromptBundle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        Ok(Arc::clone(&self.bundle))
    }
}

/// A `[1, 3, frames]` prompt whose channels are `base`, `base + 1`, `base + 2`.
pub fn prompt_tensor(base: i64, frames: usize) -> TokenTensor {
    Array3::from_shape_fn((1, 3, frames), |(_, c, _)| base + c as i64)
}

/// Bundle with three Pop prompts and generic prompts for both languages.
pub fn sample_bundle() -> PromptBundle {
    let mut bundle = PromptBundle::new();
    bundle
        .insert_genre(
            Genre::Pop,
            vec![prompt_tensor(100, 4), prompt_tensor(200, 4), prompt_tensor(300, 4)],
        )
        .unwrap();
    bundle
        .insert_generic(Language::Zh, vec![prompt_tensor(10, 4), prompt_tensor(20, 4)])
        .unwrap();
    bundle
        .insert_generic(Language::En, vec![prompt_tensor(40, 4)])
        .unwrap();
    bundle
}

pub const ENGLISH_LYRICS: &str = "[verse]\nWalking down the empty street\n[chorus]\nCity lights";
pub const CHINESE_LYRICS: &str = "[verse]\n夜晚的城市灯火通明\n[chorus]\n我们一起唱";
