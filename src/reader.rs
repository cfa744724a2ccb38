use anyhow::Result;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use crate::citation_detector::RawCitation;
use crate::error::InputError;

/// Path that selects standard input instead of a file
pub const STDIN_PATH: &str = "-";

/// Configuration for citation input reading
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            buffer_size: 8192, // WHY: 8KB is optimal for most filesystems and pipes
        }
    }
}

/// Statistics for one input read
#[derive(Debug, Clone)]
pub struct ReadStats {
    pub source: String,
    pub lines_read: u64,
    pub bytes_read: u64,
    /// Non-blank lines handed on as citations, including rejected ones
    pub citations: u64,
    pub rejected: u64,
    pub duration_ms: u64,
    pub read_error: Option<String>,
}

impl ReadStats {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            lines_read: 0,
            bytes_read: 0,
            citations: 0,
            rejected: 0,
            duration_ms: 0,
            read_error: None,
        }
    }
}

/// One input line: a citation or the reason it was rejected
#[derive(Debug, Clone, PartialEq)]
pub struct CitationLine {
    /// 1-based line number in the input
    pub line_number: usize,
    pub input: Result<RawCitation, InputError>,
}

/// Async reader yielding one citation per non-blank input line
pub struct CitationReader {
    config: ReaderConfig,
}

impl CitationReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read citations from a file, or from stdin when the path is `-`
    pub async fn read_citations<P: AsRef<Path>>(&self, path: P) -> Result<(Vec<CitationLine>, ReadStats)> {
        let path = path.as_ref();
        if path.as_os_str() == STDIN_PATH {
            return self.read_from(tokio::io::stdin(), "stdin").await;
        }

        let label = path.display().to_string();
        debug!("Starting async read of citations: {}", label);

        // WHY: early validation prevents partial processing and provides clear error context
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                let error_msg = format!("Failed to open file {label}: {e}");
                warn!("{}", error_msg);
                if self.config.fail_fast {
                    return Err(anyhow::anyhow!(error_msg));
                }
                let mut stats = ReadStats::new(&label);
                stats.read_error = Some(error_msg);
                return Ok((Vec::new(), stats));
            }
        };

        self.read_from(file, &label).await
    }

    /// Read newline-delimited citations from any async source
    pub async fn read_from<R: AsyncRead + Unpin>(
        &self,
        source: R,
        label: &str,
    ) -> Result<(Vec<CitationLine>, ReadStats)> {
        let start_time = std::time::Instant::now();
        let reader = BufReader::with_capacity(self.config.buffer_size, source);
        // WHY: split on raw bytes so one bad line is rejected without losing the rest
        let mut segments = reader.split(b'\n');
        let mut lines = Vec::new();
        let mut stats = ReadStats::new(label);

        loop {
            let segment = match segments.next_segment().await {
                Ok(Some(segment)) => segment,
                Ok(None) => break,
                Err(e) => {
                    let error_msg = format!("Read error in {label} at line {}: {e}", stats.lines_read + 1);
                    warn!("{}", error_msg);
                    if self.config.fail_fast {
                        return Err(anyhow::anyhow!(error_msg));
                    }
                    stats.read_error = Some(error_msg);
                    break;
                }
            };

            stats.lines_read += 1;
            stats.bytes_read += segment.len() as u64 + 1; // +1 for newline
            let line_number = stats.lines_read as usize;

            let bytes = segment.strip_suffix(b"\r").unwrap_or(segment.as_slice());
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            stats.citations += 1;
            let input = RawCitation::from_bytes(bytes).map(|raw| raw.with_source(label, line_number));
            if let Err(e) = &input {
                stats.rejected += 1;
                warn!("Rejected line {} of {}: {}", line_number, label, e);
                if self.config.fail_fast {
                    anyhow::bail!("Rejected line {line_number} of {label}: {e}");
                }
            }
            lines.push(CitationLine { line_number, input });
        }

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Read {}: {} lines, {} citations, {} rejected in {}ms",
            label, stats.lines_read, stats.citations, stats.rejected, stats.duration_ms
        );
        Ok((lines, stats))
    }
}
