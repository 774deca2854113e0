//! Conditioning selection against in-memory and on-disk prompt bundles.

mod common;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use common::*;
use songgen::cache::CachedPromptStore;
use songgen::conditioning::{
    Conditioning, ConditioningSelector, FilePromptStore, Language, PromptBundle,
};
use songgen::error::{ErrorCode, ErrorKind};
use songgen::types::{GenerationMode, GenerationRequest};

fn selector(bundle: PromptBundle) -> ConditioningSelector<FakeSeparator, MemoryStore> {
    ConditioningSelector::new(FakeSeparator::new(), MemoryStore::new(bundle))
}

/// First frame of the prompt channel, identifying the drawn tensor.
fn drawn_base(conditioning: &Conditioning) -> i64 {
    let stems = conditioning.token_stems().expect("token conditioning");
    assert_eq!(stems.prompt.dim(), (1, 1, 4));
    assert_eq!(stems.vocal[[0, 0, 0]], stems.prompt[[0, 0, 0]] + 1);
    assert_eq!(stems.bgm[[0, 0, 0]], stems.prompt[[0, 0, 0]] + 2);
    stems.prompt[[0, 0, 0]]
}

#[test]
fn lyrics_only_yields_no_conditioning() {
    let selector = selector(sample_bundle());
    let conditioning = selector
        .select(&GenerationRequest::new(ENGLISH_LYRICS), &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap();

    assert_eq!(conditioning, Conditioning::None);
    assert!(conditioning.is_waveform());
    assert!(conditioning.waveform_stems().is_none());
    assert_eq!(selector.store().loads.load(Ordering::SeqCst), 0);
}

#[test]
fn separator_stems_pass_through_untouched() {
    let clip = tempfile::NamedTempFile::new().unwrap();
    let selector = selector(sample_bundle());
    let request = GenerationRequest::new(ENGLISH_LYRICS).with_reference_audio(clip.path());

    let conditioning = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap();

    assert!(conditioning.is_waveform());
    assert_eq!(conditioning.waveform_stems(), Some(&selector.separator().stems));
    assert_eq!(selector.store().loads.load(Ordering::SeqCst), 0);
}

#[test]
fn generic_genre_draws_from_language_bucket() {
    let selector = selector(sample_bundle());

    let zh = GenerationRequest::new(CHINESE_LYRICS).with_genre("Auto", "bundle.json");
    let en = GenerationRequest::new(ENGLISH_LYRICS).with_genre("auto", "bundle.json");

    for seed in 0..20 {
        let base = drawn_base(&selector.select(&zh, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap());
        assert!(base == 10 || base == 20, "drew {} for zh", base);

        let base = drawn_base(&selector.select(&en, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap());
        assert_eq!(base, 40);
    }
}

#[test]
fn seeded_draw_is_reproducible() {
    let selector = selector(sample_bundle());
    let request = GenerationRequest::new(CHINESE_LYRICS).with_genre("Auto", "bundle.json");

    for seed in [1u64, 7, 99] {
        let a = selector.select(&request, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let b = selector.select(&request, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn missing_language_bucket_is_a_lookup_failure() {
    let mut bundle = PromptBundle::new();
    bundle
        .insert_generic(Language::Zh, vec![prompt_tensor(10, 4)])
        .unwrap();
    let selector = selector(bundle);

    let request = GenerationRequest::new(ENGLISH_LYRICS).with_genre("Auto", "bundle.json");
    let err = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::PromptNotFound);
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn named_genre_ignores_lyric_language() {
    let selector = selector(sample_bundle());
    let mut seen = HashSet::new();

    for lyrics in [ENGLISH_LYRICS, CHINESE_LYRICS] {
        let request = GenerationRequest::new(lyrics).with_genre("Pop", "bundle.json");
        for seed in 0..64 {
            let conditioning = selector
                .select(&request, &mut ChaCha8Rng::seed_from_u64(seed))
                .unwrap();
            assert!(!conditioning.is_waveform());
            seen.insert(drawn_base(&conditioning));
        }
    }

    assert_eq!(seen, HashSet::from([100, 200, 300]));
}

#[test]
fn genre_missing_from_bundle_is_a_lookup_failure() {
    let selector = selector(sample_bundle());
    let request = GenerationRequest::new(ENGLISH_LYRICS).with_genre("Metal", "bundle.json");

    let err = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PromptNotFound);
}

#[test]
fn unknown_genre_is_a_validation_failure() {
    let selector = selector(sample_bundle());
    let request = GenerationRequest::new(ENGLISH_LYRICS).with_genre("Polka", "bundle.json");

    let err = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidGenre);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(selector.store().loads.load(Ordering::SeqCst), 0);
}

#[test]
fn genre_without_bundle_is_unconditioned() {
    let selector = selector(sample_bundle());
    let mut request = GenerationRequest::new(ENGLISH_LYRICS);
    request.mode = GenerationMode::LyricsAndGenre;
    request.genre = Some("Pop".to_string());

    let conditioning = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap();
    assert_eq!(conditioning, Conditioning::None);
}

#[test]
fn bundle_file_is_loaded_once_through_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, sample_bundle().to_json_string().unwrap()).unwrap();

    let store = Arc::new(CachedPromptStore::new(FilePromptStore::new()));
    let selector = ConditioningSelector::new(FakeSeparator::new(), Arc::clone(&store));
    let request = GenerationRequest::new(ENGLISH_LYRICS).with_genre("Pop", &path);

    for seed in 0..3 {
        let conditioning = selector
            .select(&request, &mut ChaCha8Rng::seed_from_u64(seed))
            .unwrap();
        assert!([100, 200, 300].contains(&drawn_base(&conditioning)));
    }
    assert_eq!(store.len(), 1);
    assert!(store.contains(&path));
}

#[test]
fn malformed_bundle_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, r#"{"Pop": {"en": []}}"#).unwrap();

    let selector = ConditioningSelector::new(FakeSeparator::new(), FilePromptStore::new());
    let request = GenerationRequest::new(ENGLISH_LYRICS).with_genre("Pop", &path);
    let err = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BundleLoadFailed);

    let request = GenerationRequest::new(ENGLISH_LYRICS)
        .with_genre("Pop", PathBuf::from("/nonexistent/bundle.json"));
    let err = selector
        .select(&request, &mut ChaCha8Rng::seed_from_u64(0))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BundleLoadFailed);
}
