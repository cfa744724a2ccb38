use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use citestyle::config::{DetectionOptions, OptionsFile, ScoringWeights};
use citestyle::parallel_processing::{process_citations, write_outcomes_jsonl, write_stats};
use citestyle::reader::{CitationReader, ReaderConfig};
use citestyle::{CitationStyleDetector, KnowledgeBase, PatternLibrary};

#[derive(Parser, Debug)]
#[command(name = "citestyle")]
#[command(about = "Detect the citation style of free-text references and extract their fields")]
#[command(version)]
struct Args {
    /// File with one citation per line, or `-` for stdin
    input: PathBuf,

    /// Comma-separated styles to evaluate (default: all)
    #[arg(long, value_delimiter = ',')]
    styles: Option<Vec<String>>,

    /// Weight of template pattern strength
    #[arg(long)]
    pattern_weight: Option<f64>,

    /// Weight of knowledge-base corroboration
    #[arg(long)]
    corroboration_weight: Option<f64>,

    /// Weight of structural validity
    #[arg(long)]
    validity_weight: Option<f64>,

    /// Flag candidates scoring below this as low-confidence
    #[arg(long)]
    min_confidence: Option<f64>,

    /// TOML options file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Knowledge base snapshot (JSON) replacing the built-in one
    #[arg(long)]
    knowledge_base: Option<PathBuf>,

    /// Pattern library snapshot (JSON) replacing the built-in one
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Worker threads for detection (default: number of CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Abort on the first rejected input line
    #[arg(long)]
    fail_fast: bool,

    /// Suppress console progress bar
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

/// Options file first, then command-line overrides, validated once
fn build_options(args: &Args) -> Result<DetectionOptions> {
    let mut options = match &args.config {
        Some(path) => OptionsFile::from_path(path)?.into_options()?,
        None => DetectionOptions::default(),
    };

    if let Some(names) = &args.styles {
        options = options.with_style_names(names)?;
    }
    if args.pattern_weight.is_some() || args.corroboration_weight.is_some() || args.validity_weight.is_some() {
        let current = options.scoring_weights;
        options.scoring_weights = ScoringWeights {
            pattern_weight: args.pattern_weight.unwrap_or(current.pattern_weight),
            corroboration_weight: args.corroboration_weight.unwrap_or(current.corroboration_weight),
            validity_weight: args.validity_weight.unwrap_or(current.validity_weight),
        };
    }
    if let Some(min_confidence) = args.min_confidence {
        options.min_confidence = min_confidence;
    }

    options.validate()?;
    Ok(options)
}

fn load_detector(args: &Args) -> Result<CitationStyleDetector> {
    let knowledge = match &args.knowledge_base {
        Some(path) => KnowledgeBase::from_json_file(path)
            .with_context(|| format!("Failed to load knowledge base {}", path.display()))?,
        None => KnowledgeBase::builtin()?,
    };
    let patterns = match &args.patterns {
        Some(path) => PatternLibrary::from_json_file(path)
            .with_context(|| format!("Failed to load pattern library {}", path.display()))?,
        None => PatternLibrary::builtin()?,
    };
    Ok(CitationStyleDetector::new(knowledge, patterns)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging on stderr keeps stdout clean for JSON Lines
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();

    info!("Starting citestyle");
    info!(?args, "Parsed CLI arguments");

    let options = build_options(&args)?;
    let workers = args.workers.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("Failed to configure worker pool")?;
    info!("Using {} worker threads", workers);

    let detector = Arc::new(load_detector(&args)?);

    let reader = CitationReader::new(ReaderConfig {
        fail_fast: args.fail_fast,
        buffer_size: 8192,
    });
    let (lines, read_stats) = reader.read_citations(&args.input).await?;
    if let Some(error) = read_stats.read_error {
        anyhow::bail!(error);
    }

    let progress = if args.no_progress {
        None
    } else {
        let bar = ProgressBar::new(lines.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} citations ({per_sec})")?,
        );
        Some(bar)
    };

    // WHY: detection is CPU-bound rayon work; keep it off the async runtime threads
    let fail_fast = args.fail_fast;
    let worker_progress = progress.clone();
    let (outcomes, stats) = tokio::task::spawn_blocking(move || {
        process_citations(&detector, lines, &options, fail_fast, worker_progress.as_ref())
    })
    .await
    .context("Detection task panicked")??;

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    write_outcomes_jsonl(tokio::io::stdout(), &outcomes).await?;

    if let Some(path) = &args.stats_out {
        write_stats(path, &stats).await?;
    }

    info!(
        "Detection complete: {} citations, {} detected, {} unknown, {} rejected",
        stats.citations, stats.detected, stats.unknown, stats.rejected
    );
    Ok(())
}
