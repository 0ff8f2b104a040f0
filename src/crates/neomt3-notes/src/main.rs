use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use neomt3_core::{build_codec, types, vocabulary_from_codec, VocabularyConfig};
use neomt3_notes::{
    detokenize_segments, note_sequence_from_midi, tokenize_note_sequence, SegmentOptions,
    TokenizedSegment,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "midi-to-tokens")]
#[command(about = "Convert MIDI files to transcription model tokens and back", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    /// Vocabulary configuration JSON (defaults apply to missing fields)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Register drum events (otherwise drum notes are dropped on encode)
    #[arg(long, global = true)]
    drums: bool,

    /// Time resolution of shift events
    #[arg(long, global = true, default_value = "100", value_parser = clap::value_parser!(u32).range(1..))]
    steps_per_second: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a MIDI file into per-segment tokens
    Encode(EncodeArgs),
    /// Decode per-segment tokens into notes
    Decode(DecodeArgs),
    /// Print the vocabulary summary
    Vocab,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Path to the MIDI file
    midi: PathBuf,

    /// Output file path (default: `<midi-name>.tokens.json`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print output to stdout instead of file
    #[arg(long)]
    stdout: bool,

    /// Frame rate of the alignment grid
    #[arg(long, default_value = "125", value_parser = clap::value_parser!(u32).range(1..))]
    frames_per_second: u32,

    /// Frames per segment (default: one segment for the whole file)
    #[arg(long)]
    segment_frames: Option<usize>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Tokens JSON written by `encode`
    tokens: PathBuf,

    /// Output file path (default: `<tokens-name>.notes.json`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print output to stdout instead of file
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = load_config(cli.config.as_deref())?;
    config.include_drums |= cli.drums;
    match cli.command {
        Commands::Encode(args) => run_encode(args, &config, cli.steps_per_second),
        Commands::Decode(args) => run_decode(args, &config, cli.steps_per_second),
        Commands::Vocab => run_vocab(&config),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => LevelFilter::Info,
        (0, 1) => LevelFilter::Debug,
        (0, _) => LevelFilter::Trace,
        (1, _) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn load_config(path: Option<&Path>) -> Result<VocabularyConfig> {
    let Some(path) = path else {
        return Ok(VocabularyConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    VocabularyConfig::from_json(&json)
        .with_context(|| format!("Invalid vocabulary config: {}", path.display()))
}

fn run_encode(args: EncodeArgs, config: &VocabularyConfig, steps_per_second: u32) -> Result<()> {
    let codec = build_codec(config).context("Failed to build codec")?;

    info!("Processing MIDI file: {}", args.midi.display());
    let mut sequence = note_sequence_from_midi(&args.midi)
        .with_context(|| format!("Failed to load MIDI file: {}", args.midi.display()))?;
    if !codec.has_event_type(types::DRUM) {
        let dropped = sequence.remove_drums();
        if dropped > 0 {
            warn!(
                "Dropped {} drum notes; pass --drums to encode them",
                dropped
            );
        }
    }

    let options = SegmentOptions {
        steps_per_second,
        frames_per_second: args.frames_per_second,
        segment_frames: args.segment_frames,
    };
    let segments = tokenize_note_sequence(&sequence, config, &codec, &options)
        .context("Failed to tokenize notes")?;
    info!(
        "Encoded {} notes into {} segments",
        sequence.notes.len(),
        segments.len()
    );

    let output_path = args
        .output
        .unwrap_or_else(|| default_output(&args.midi, "tokens.json"));
    write_json(&segments, args.stdout, &output_path)
}

fn run_decode(args: DecodeArgs, config: &VocabularyConfig, steps_per_second: u32) -> Result<()> {
    let codec = build_codec(config).context("Failed to build codec")?;

    let json = fs::read_to_string(&args.tokens)
        .with_context(|| format!("Failed to read {}", args.tokens.display()))?;
    let segments: Vec<TokenizedSegment> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid tokens file: {}", args.tokens.display()))?;

    let (sequence, stats) = detokenize_segments(&segments, config, &codec, steps_per_second)
        .context("Failed to decode tokens")?;
    if stats.invalid_events > 0 || stats.dropped_events > 0 {
        warn!(
            "{} invalid and {} dropped events while decoding",
            stats.invalid_events, stats.dropped_events
        );
    }
    info!("Decoded {} notes", sequence.notes.len());

    let output_path = args
        .output
        .unwrap_or_else(|| default_output(&args.tokens, "notes.json"));
    write_json(&sequence, args.stdout, &output_path)
}

fn run_vocab(config: &VocabularyConfig) -> Result<()> {
    let codec = build_codec(config).context("Failed to build codec")?;
    let summary = vocabulary_from_codec(&codec);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn default_output(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    PathBuf::from(format!("{}.{}", stem, extension))
}

fn write_json<T: Serialize>(value: &T, stdout: bool, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if stdout {
        println!("{}", json);
    } else {
        fs::write(path, format!("{}\n", json))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Output saved to {}", path.display());
    }
    Ok(())
}
