// WHY: shared citation types live here so every pipeline stage (extract,
// validate, score) speaks the same vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, InputError};

pub mod abbreviations;
pub mod detector;
pub mod extractor;
pub mod knowledge_base;
pub mod normalization;
pub mod patterns;
pub mod scorer;
pub mod validator;

pub use abbreviations::AbbreviationChecker;
pub use detector::CitationStyleDetector;
pub use extractor::{EntityExtractor, ExtractedFields};
pub use knowledge_base::{KnowledgeBase, KnowledgeRecord, LookupHit, MatchQuality, RecordKind, StyleRuleSet};
pub use normalization::{normalize, normalize_into, NormalizedText};
pub use patterns::{PatternLibrary, Template, TemplateSpec};
pub use scorer::ConfidenceScorer;
pub use validator::{CheckKind, CheckOutcome, CheckStatus, Corroboration, StyleValidator, ValidityReport};

/// Citation styles in canonical tie-break order; `Unknown` is the fallback pseudo-style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StyleId {
    #[serde(rename = "APA", alias = "apa")]
    Apa,
    #[serde(rename = "MLA", alias = "mla")]
    Mla,
    #[serde(rename = "Chicago", alias = "chicago")]
    Chicago,
    #[serde(rename = "IEEE", alias = "ieee")]
    Ieee,
    #[serde(rename = "Harvard", alias = "harvard")]
    Harvard,
    #[serde(rename = "Vancouver", alias = "vancouver")]
    Vancouver,
    #[serde(rename = "CSE", alias = "cse")]
    Cse,
    #[serde(rename = "unknown")]
    Unknown,
}

impl StyleId {
    /// Every real style, in canonical order
    pub const KNOWN: [StyleId; 7] = [
        StyleId::Apa,
        StyleId::Mla,
        StyleId::Chicago,
        StyleId::Ieee,
        StyleId::Harvard,
        StyleId::Vancouver,
        StyleId::Cse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleId::Apa => "APA",
            StyleId::Mla => "MLA",
            StyleId::Chicago => "Chicago",
            StyleId::Ieee => "IEEE",
            StyleId::Harvard => "Harvard",
            StyleId::Vancouver => "Vancouver",
            StyleId::Cse => "CSE",
            StyleId::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StyleId::Unknown)
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleId {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StyleId::KNOWN
            .iter()
            .chain(std::iter::once(&StyleId::Unknown))
            .find(|style| style.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownStyle(s.to_string()))
    }
}

/// Bibliographic fields the extractor can recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Author,
    Year,
    Title,
    Venue,
    Publisher,
    Place,
    Volume,
    Issue,
    Pages,
    Doi,
    Url,
    /// Bracketed or parenthesised reference number of a numeric in-text citation
    Number,
}

impl FieldName {
    pub const ALL: [FieldName; 12] = [
        FieldName::Author,
        FieldName::Year,
        FieldName::Title,
        FieldName::Venue,
        FieldName::Publisher,
        FieldName::Place,
        FieldName::Volume,
        FieldName::Issue,
        FieldName::Pages,
        FieldName::Doi,
        FieldName::Url,
        FieldName::Number,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Author => "author",
            FieldName::Year => "year",
            FieldName::Title => "title",
            FieldName::Venue => "venue",
            FieldName::Publisher => "publisher",
            FieldName::Place => "place",
            FieldName::Volume => "volume",
            FieldName::Issue => "issue",
            FieldName::Pages => "pages",
            FieldName::Doi => "doi",
            FieldName::Url => "url",
            FieldName::Number => "number",
        }
    }

    /// Map a regex capture-group name to a field
    pub fn from_group_name(name: &str) -> Option<FieldName> {
        FieldName::ALL.iter().find(|field| field.as_str() == name).copied()
    }

    /// Identifiers are found by heuristics regardless of template coverage
    pub fn is_identifier(&self) -> bool {
        matches!(self, FieldName::Doi | FieldName::Url)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a citation is a reference-list entry or an in-text citation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationForm {
    #[default]
    Reference,
    InText,
}

/// How a field value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Full structural template for the style
    Exact,
    /// Partial template recognising only the citation lead
    Fuzzy,
    /// Style-independent fallback rule
    Heuristic,
}

impl MatchKind {
    /// Contribution of a field with this provenance to pattern strength
    pub fn strength(&self) -> f64 {
        match self {
            MatchKind::Exact => 1.0,
            MatchKind::Fuzzy => 0.75,
            MatchKind::Heuristic => 0.0,
        }
    }
}

/// One extracted field: value plus byte offsets into the normalized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpan {
    pub field: FieldName,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub kind: MatchKind,
    /// Priority of the producing template; heuristics use 0
    pub priority: u32,
    /// Template or heuristic name, for explanations
    pub source: String,
}

impl FieldSpan {
    pub fn overlaps(&self, other: &FieldSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Where a citation came from, when the caller knows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub document_id: String,
    pub position: usize,
}

/// Unprocessed citation string as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCitation {
    text: String,
    source: Option<SourceMeta>,
}

impl RawCitation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, document_id: impl Into<String>, position: usize) -> Self {
        self.source = Some(SourceMeta {
            document_id: document_id.into(),
            position,
        });
        self
    }

    /// Accept bytes from an untrusted boundary
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InputError> {
        std::str::from_utf8(bytes)
            .map(Self::new)
            .map_err(|e| InputError::NotUtf8 {
                valid_up_to: e.valid_up_to(),
            })
    }

    pub fn from_optional(text: Option<String>) -> Result<Self, InputError> {
        text.map(Self::new).ok_or(InputError::Absent)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&SourceMeta> {
        self.source.as_ref()
    }
}

impl From<&str> for RawCitation {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for RawCitation {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// One style interpretation of a citation
#[derive(Debug, Clone, PartialEq)]
pub struct StyleCandidate {
    style: StyleId,
    form: CitationForm,
    fields: Vec<FieldSpan>,
    bindable_fields: Vec<FieldName>,
    report: Option<ValidityReport>,
    valid: bool,
    confidence: f64,
    low_confidence: bool,
}

impl StyleCandidate {
    /// Unassessed candidate straight out of extraction
    pub fn from_extraction(style: StyleId, extracted: ExtractedFields) -> Self {
        let ExtractedFields {
            spans,
            bindable_fields,
            form,
        } = extracted;
        Self {
            style,
            form,
            fields: spans,
            bindable_fields,
            report: None,
            valid: false,
            confidence: 0.0,
            low_confidence: true,
        }
    }

    pub(crate) fn assessed(mut self, report: ValidityReport, confidence: f64, min_confidence: f64) -> Self {
        self.valid = report.structurally_valid;
        self.report = Some(report);
        self.confidence = confidence;
        self.low_confidence = confidence < min_confidence;
        self
    }

    pub fn style(&self) -> StyleId {
        self.style
    }

    /// Selected spans, one per field, ordered by field name
    /// Form recognised by the templates that matched; reference when none did
    pub fn form(&self) -> CitationForm {
        self.form
    }

    pub fn fields(&self) -> &[FieldSpan] {
        &self.fields
    }

    pub fn field(&self, name: FieldName) -> Option<&FieldSpan> {
        self.fields.iter().find(|span| span.field == name)
    }

    pub fn value(&self, name: FieldName) -> Option<&str> {
        self.field(name).map(|span| span.value.as_str())
    }

    /// Fields this style's templates are able to bind
    pub fn bindable_fields(&self) -> &[FieldName] {
        &self.bindable_fields
    }

    pub fn report(&self) -> Option<&ValidityReport> {
        self.report.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }

    pub fn to_record(&self) -> CandidateRecord {
        CandidateRecord {
            style: self.style,
            form: self.form,
            confidence: self.confidence,
            fields: self
                .fields
                .iter()
                .map(|span| (span.field, span.value.clone()))
                .collect(),
            valid: self.valid,
            low_confidence: self.low_confidence,
        }
    }
}

/// Final ranked outcome for one citation
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    source: Option<SourceMeta>,
    text: NormalizedText,
    candidates: Vec<StyleCandidate>,
    best_style: StyleId,
    ambiguous: bool,
}

impl DetectionResult {
    pub(crate) fn new(
        source: Option<SourceMeta>,
        text: NormalizedText,
        candidates: Vec<StyleCandidate>,
        best_style: StyleId,
        ambiguous: bool,
    ) -> Self {
        Self {
            source,
            text,
            candidates,
            best_style,
            ambiguous,
        }
    }

    pub fn source(&self) -> Option<&SourceMeta> {
        self.source.as_ref()
    }

    pub fn normalized_text(&self) -> &NormalizedText {
        &self.text
    }

    /// Candidates ordered by confidence descending, ties in canonical style order
    pub fn candidates(&self) -> &[StyleCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, style: StyleId) -> Option<&StyleCandidate> {
        self.candidates.iter().find(|c| c.style == style)
    }

    pub fn best_style(&self) -> StyleId {
        self.best_style
    }

    /// Candidate for the best style, `None` when the best style is unknown
    pub fn best_candidate(&self) -> Option<&StyleCandidate> {
        if self.best_style.is_known() {
            self.candidate(self.best_style)
        } else {
            None
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn to_record(&self) -> DetectionRecord {
        DetectionRecord {
            best_style: self.best_style,
            ambiguous: self.ambiguous,
            candidates: self.candidates.iter().map(StyleCandidate::to_record).collect(),
            source: self.source.clone(),
        }
    }
}

/// Plain serializable form of a [`DetectionResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub best_style: StyleId,
    pub ambiguous: bool,
    pub candidates: Vec<CandidateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub style: StyleId,
    #[serde(default)]
    pub form: CitationForm,
    pub confidence: f64,
    pub fields: BTreeMap<FieldName, String>,
    pub valid: bool,
    pub low_confidence: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_canonical_order() {
        let mut shuffled = vec![StyleId::Cse, StyleId::Harvard, StyleId::Apa, StyleId::Ieee];
        shuffled.sort();
        assert_eq!(shuffled, vec![StyleId::Apa, StyleId::Ieee, StyleId::Harvard, StyleId::Cse]);
        assert!(StyleId::Cse < StyleId::Unknown);
    }

    #[test]
    fn test_style_from_str() {
        assert_eq!("apa".parse::<StyleId>().unwrap(), StyleId::Apa);
        assert_eq!(" Vancouver ".parse::<StyleId>().unwrap(), StyleId::Vancouver);
        assert_eq!("UNKNOWN".parse::<StyleId>().unwrap(), StyleId::Unknown);
        assert!("turabian".parse::<StyleId>().is_err());
    }

    #[test]
    fn test_field_group_names() {
        for field in FieldName::ALL {
            assert_eq!(FieldName::from_group_name(field.as_str()), Some(field));
        }
        assert_eq!(FieldName::from_group_name("journal"), None);
    }

    #[test]
    fn test_raw_citation_boundary() {
        assert_eq!(RawCitation::from_optional(None), Err(InputError::Absent));
        assert_eq!(
            RawCitation::from_bytes(b"Smith \xFF"),
            Err(InputError::NotUtf8 { valid_up_to: 6 })
        );
        let raw = RawCitation::from_bytes(b"Smith, J.").unwrap().with_source("refs.txt", 3);
        assert_eq!(raw.text(), "Smith, J.");
        assert_eq!(raw.source().map(|s| s.position), Some(3));
    }

    #[test]
    fn test_record_serializes_with_wire_names() {
        let record = DetectionRecord {
            best_style: StyleId::Ieee,
            ambiguous: false,
            candidates: vec![CandidateRecord {
                style: StyleId::Ieee,
                form: CitationForm::Reference,
                confidence: 0.8,
                fields: [(FieldName::Year, "2020".to_string())].into_iter().collect(),
                valid: true,
                low_confidence: false,
            }],
            source: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["bestStyle"], "IEEE");
        assert_eq!(json["candidates"][0]["fields"]["year"], "2020");
        assert_eq!(json["candidates"][0]["lowConfidence"], false);
        assert_eq!(json["candidates"][0]["form"], "reference");
        assert!(json.get("source").is_none());

        let back: DetectionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
