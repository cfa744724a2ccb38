pub mod citation_detector;
pub mod config;
pub mod error;
pub mod parallel_processing;
pub mod reader;
pub mod snapshot;

// Re-export main types for convenient access
pub use citation_detector::{
    CandidateRecord, CitationForm, CitationStyleDetector, DetectionRecord, DetectionResult, FieldName, FieldSpan, KnowledgeBase,
    MatchKind, PatternLibrary, RawCitation, SourceMeta, StyleCandidate, StyleId,
};
pub use config::{DetectionOptions, OptionsFile, ScoringWeights};
pub use error::{ConfigurationError, DataSourceError, DetectError, InputError};
pub use snapshot::SharedSnapshot;

// Re-export batch utilities used by the binary and benchmarks
pub use parallel_processing::{process_citations, write_outcomes_jsonl, write_stats, BatchOutcome, BatchStats};
pub use reader::{CitationLine, CitationReader, ReadStats, ReaderConfig};
