use std::path::PathBuf;

use bpmscope_audio::{FixedTempoTracker, LoaderConfig, DEFAULT_SAMPLE_RATE};
use bpmscope_domain::{ExportFormat, JsonExporter, LogExporter, ShortAudioPolicy, TextExporter};
use bpmscope_tempo::{AnalysisSession, EstimatorConfig, SegmentTempoEstimator, DEFAULT_SEGMENT_SECONDS};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimate the tempo of an audio file segment by segment", long_about = None)]
struct Cli {
    /// Path to the WAV or MP3 file to analyze
    input: PathBuf,
    /// Length of each analysis segment in seconds
    #[arg(short, long, default_value_t = DEFAULT_SEGMENT_SECONDS)]
    segment_seconds: f64,
    /// Sample rate the audio is resampled to before analysis
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE, conflicts_with = "native_rate")]
    sample_rate: u32,
    /// Analyze at the file's own sample rate
    #[arg(long)]
    native_rate: bool,
    /// Analyze audio shorter than one segment as a single segment
    #[arg(long)]
    allow_short: bool,
    /// Print the results as JSON instead of log lines
    #[arg(long)]
    json: bool,
    /// Report this tempo for every segment instead of running the beat tracker
    #[arg(long, hide = true)]
    fixed_bpm: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let loader = LoaderConfig {
        target_sample_rate: (!cli.native_rate).then_some(cli.sample_rate),
    };
    let config = EstimatorConfig {
        segment_duration_seconds: cli.segment_seconds,
        short_audio: if cli.allow_short {
            ShortAudioPolicy::SingleSegment
        } else {
            ShortAudioPolicy::Reject
        },
        ..Default::default()
    };
    let estimator = match cli.fixed_bpm {
        Some(bpm) => SegmentTempoEstimator::with_tracker(config, Box::new(FixedTempoTracker { bpm })),
        None => SegmentTempoEstimator::new(config),
    };

    let mut session = AnalysisSession::new(loader, estimator);
    session.load(&cli.input)?;
    session.analyze()?;
    let log = session.tempo_log()?;

    let bytes = if cli.json {
        JsonExporter.export(&log, ExportFormat::Json)?
    } else {
        TextExporter.export(&log, ExportFormat::Text)?
    };
    print!("{}", String::from_utf8_lossy(&bytes));
    if cli.json {
        println!();
    }
    Ok(())
}
