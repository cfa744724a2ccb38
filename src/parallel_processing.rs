// WHY: batch driver shared by the binary and benchmarks; per-line input errors
// become outcomes so one bad line never sinks the batch

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::info;

use crate::citation_detector::{CitationStyleDetector, DetectionRecord, DetectionResult, StyleId};
use crate::config::DetectionOptions;
use crate::error::InputError;
use crate::reader::CitationLine;

/// Batch-level statistics written by `--stats-out`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BatchStats {
    /// Non-blank input lines, including rejected ones
    pub citations: u64,
    /// Citations whose best style is a real style
    pub detected: u64,
    pub unknown: u64,
    pub ambiguous: u64,
    /// Lines rejected at the input boundary
    pub rejected: u64,
    /// Best-style counts, `unknown` included
    pub per_style: BTreeMap<StyleId, u64>,
    pub elapsed_ms: u64,
    pub citations_per_sec: f64,
}

/// Result for one input line
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub line: usize,
    pub result: std::result::Result<DetectionResult, InputError>,
}

/// JSON Lines form of an outcome
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutcomeRecord {
    Detected {
        line: usize,
        #[serde(flatten)]
        record: DetectionRecord,
    },
    Rejected {
        line: usize,
        error: String,
    },
}

impl BatchOutcome {
    pub fn to_record(&self) -> OutcomeRecord {
        match &self.result {
            Ok(result) => OutcomeRecord::Detected {
                line: self.line,
                record: result.to_record(),
            },
            Err(e) => OutcomeRecord::Rejected {
                line: self.line,
                error: e.to_string(),
            },
        }
    }
}

/// Detect every line in parallel, keeping input order
pub fn process_citations(
    detector: &CitationStyleDetector,
    lines: Vec<CitationLine>,
    options: &DetectionOptions,
    fail_fast: bool,
    progress: Option<&ProgressBar>,
) -> Result<(Vec<BatchOutcome>, BatchStats)> {
    let start_time = Instant::now();
    options.validate().context("Invalid detection options")?;

    if fail_fast {
        if let Some(bad) = lines.iter().find(|l| l.input.is_err()) {
            if let Err(e) = &bad.input {
                anyhow::bail!("Rejected line {}: {}", bad.line_number, e);
            }
        }
    }

    let styles = options.requested_styles();
    let outcomes: Vec<BatchOutcome> = lines
        .into_par_iter()
        .map(|line| {
            let result = line
                .input
                .map(|raw| detector.detect_validated(&raw, options, &styles));
            if let Some(progress) = progress {
                progress.inc(1);
            }
            BatchOutcome {
                line: line.line_number,
                result,
            }
        })
        .collect();

    let stats = summarize(&outcomes, start_time.elapsed().as_millis() as u64);
    info!(
        "Processed {} citations: {} detected, {} unknown, {} ambiguous, {} rejected in {}ms ({:.0} citations/sec)",
        stats.citations,
        stats.detected,
        stats.unknown,
        stats.ambiguous,
        stats.rejected,
        stats.elapsed_ms,
        stats.citations_per_sec
    );
    Ok((outcomes, stats))
}

fn summarize(outcomes: &[BatchOutcome], elapsed_ms: u64) -> BatchStats {
    let mut stats = BatchStats {
        citations: outcomes.len() as u64,
        elapsed_ms,
        ..Default::default()
    };
    for outcome in outcomes {
        match &outcome.result {
            Ok(result) => {
                let best = result.best_style();
                if best.is_known() {
                    stats.detected += 1;
                } else {
                    stats.unknown += 1;
                }
                if result.is_ambiguous() {
                    stats.ambiguous += 1;
                }
                *stats.per_style.entry(best).or_default() += 1;
            }
            Err(_) => stats.rejected += 1,
        }
    }
    stats.citations_per_sec = if elapsed_ms > 0 {
        stats.citations as f64 / (elapsed_ms as f64 / 1000.0)
    } else {
        0.0
    };
    stats
}

/// Write one JSON object per outcome
pub async fn write_outcomes_jsonl<W: AsyncWrite + Unpin>(writer: W, outcomes: &[BatchOutcome]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for outcome in outcomes {
        let line = serde_json::to_string(&outcome.to_record())?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

pub async fn write_stats(path: &Path, stats: &BatchStats) -> Result<()> {
    let json = serde_json::to_vec_pretty(stats)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    info!("Wrote batch stats to {}", path.display());
    Ok(())
}
