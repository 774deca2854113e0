//! songgen: lyrics-to-song generation.
//!
//! Generates one song per invocation and writes its WAV files to the output
//! directory.

use anyhow::{anyhow, bail, Context};
use tracing::info;

use songgen::cache::CachedPromptStore;
use songgen::cli::Cli;
use songgen::conditioning::FilePromptStore;
use songgen::config::SongGenConfig;
use songgen::generation::{CancelToken, SongPipeline};
use songgen::models::{
    OnnxSeparator, OnnxSongModel, SessionOptions, SourceSeparator, UnavailableSeparator,
};
use songgen::types::{GenerationParameters, Genre};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse_args();

    if cli.list_genres {
        for genre in Genre::all() {
            println!("{}", genre);
        }
        return Ok(());
    }

    let lyrics = cli
        .read_lyrics()
        .context("failed to read lyrics")?
        .ok_or_else(|| anyhow!("no lyrics given, use --lyrics or --lyrics-file"))?;

    let mut config = SongGenConfig::from_env();
    cli.apply_to(&mut config);
    if let Some(reason) = config.validate() {
        bail!("invalid configuration: {}", reason);
    }

    let model_dir = config.effective_model_path();
    let output_dir = config.effective_output_path();
    info!(
        model_dir = %model_dir.display(),
        output_dir = %output_dir.display(),
        device = %config.device,
        "starting songgen"
    );

    let options = SessionOptions::from_config(&config);
    let model = OnnxSongModel::load(&model_dir, &options)?;
    let defaults = GenerationParameters::defaults_for(model.config());

    let separator: Box<dyn SourceSeparator> = match config.separator_path {
        Some(ref path) => Box::new(OnnxSeparator::load(path, &options)?),
        None => Box::new(UnavailableSeparator),
    };

    let store = CachedPromptStore::new(FilePromptStore::new());
    let pipeline = SongPipeline::new(model, separator, store, defaults);

    let request = cli.to_request(lyrics, config.prompt_bundle.as_deref());
    info!(mode = %request.mode, synthesis = request.synthesis.as_str(), "generating song");

    let output = pipeline.generate_with(&request, &CancelToken::new(), |stage| {
        info!(stage = stage.as_str(), "stage started");
    })?;

    let record = output.write(&output_dir)?;
    info!(
        song_id = %record.song_id,
        duration_sec = record.duration_sec,
        generation_time_sec = record.generation_time_sec,
        "song written"
    );

    println!("song_id: {}", record.song_id);
    println!("seed: {}", record.seed);
    for (stem, path) in &record.files {
        println!("{}: {}", stem, path.display());
    }

    Ok(())
}
