// WHY: typed error taxonomy for the library surface; the binary and batch driver
// wrap these in anyhow for context

use std::path::PathBuf;
use thiserror::Error;

use crate::citation_detector::{FieldName, StyleId};

/// Input rejected at the boundary before any detection work
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("citation input is absent")]
    Absent,
    #[error("citation input is not valid UTF-8 (valid up to byte {valid_up_to})")]
    NotUtf8 { valid_up_to: usize },
}

/// Invalid detection options, raised before any detection work
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{name} must be within [0, 1], got {value}")]
    WeightOutOfRange { name: &'static str, value: f64 },
    #[error("scoring weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne { sum: f64 },
    #[error("unknown citation style: {0:?}")]
    UnknownStyle(String),
    #[error("style restriction is empty")]
    EmptyStyleSet,
    #[error("{name} must be within [0, 1], got {value}")]
    ValueOutOfRange { name: &'static str, value: f64 },
    #[error("invalid options file: {0}")]
    OptionsFile(String),
}

/// Reference data (knowledge base or pattern library) that could not be loaded
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template {template} has an invalid grammar: {message}")]
    InvalidPattern { template: String, message: String },
    #[error("template {template} captures unknown field {group:?}")]
    UnknownField { template: String, group: String },
    #[error("template {template} binds no fields")]
    NoBoundFields { template: String },
    #[error("template {template} targets the {style} pseudo-style")]
    TemplateForPseudoStyle { template: String, style: StyleId },
    #[error("pattern library is empty")]
    EmptyLibrary,
    #[error("knowledge record has an empty name")]
    EmptyName,
    #[error("duplicate rule set for {0}")]
    DuplicateRuleSet(StyleId),
    #[error("rule set declared for the {0} pseudo-style")]
    PseudoStyle(StyleId),
    #[error("marker {name:?} for {style} has an invalid pattern: {message}")]
    InvalidMarker {
        style: StyleId,
        name: String,
        message: String,
    },
    #[error("rule set for {style} requires no fields")]
    NoRequiredFields { style: StyleId },
    #[error("rule set for {style} repeats required field {field}")]
    DuplicateRequiredField { style: StyleId, field: FieldName },
}

/// Umbrella error for callers that do not care which stage failed
#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}
