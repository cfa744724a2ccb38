// WHY: the detector owns no configuration, only handles to the current reference
// data, so one instance serves concurrent callers with different options

use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use super::scorer::{self, ConfidenceScorer};
use super::{
    normalize, DetectionResult, EntityExtractor, KnowledgeBase, NormalizedText, PatternLibrary, RawCitation,
    StyleCandidate, StyleId, StyleValidator,
};
use crate::config::DetectionOptions;
use crate::error::{ConfigurationError, DataSourceError};
use crate::snapshot::SharedSnapshot;

/// Guards the ambiguity comparison against float noise in confidence sums
const MARGIN_EPSILON: f64 = 1e-9;

#[derive(Debug)]
pub struct CitationStyleDetector {
    knowledge: SharedSnapshot<KnowledgeBase>,
    patterns: SharedSnapshot<PatternLibrary>,
    extractor: EntityExtractor,
    validator: StyleValidator,
}

impl CitationStyleDetector {
    pub fn new(knowledge: KnowledgeBase, patterns: PatternLibrary) -> Result<Self, DataSourceError> {
        Ok(Self {
            knowledge: SharedSnapshot::new(knowledge),
            patterns: SharedSnapshot::new(patterns),
            extractor: EntityExtractor::new()?,
            validator: StyleValidator::new(),
        })
    }

    /// Detector over the reference data shipped with the crate
    pub fn with_builtin_data() -> Result<Self, DataSourceError> {
        Self::new(KnowledgeBase::builtin()?, PatternLibrary::builtin()?)
    }

    /// Handle for publishing a replacement knowledge base
    pub fn knowledge(&self) -> &SharedSnapshot<KnowledgeBase> {
        &self.knowledge
    }

    /// Handle for publishing a replacement pattern library
    pub fn patterns(&self) -> &SharedSnapshot<PatternLibrary> {
        &self.patterns
    }

    pub fn detect(&self, raw: &RawCitation, options: &DetectionOptions) -> Result<DetectionResult, ConfigurationError> {
        options.validate()?;
        let styles = options.requested_styles();
        Ok(self.detect_validated(raw, options, &styles))
    }

    pub fn detect_text(&self, text: &str, options: &DetectionOptions) -> Result<DetectionResult, ConfigurationError> {
        self.detect(&RawCitation::new(text), options)
    }

    /// Detect a batch in parallel; results keep input order
    pub fn detect_all(
        &self,
        raws: &[RawCitation],
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionResult>, ConfigurationError> {
        options.validate()?;
        let styles = options.requested_styles();
        Ok(raws
            .par_iter()
            .map(|raw| self.detect_validated(raw, options, &styles))
            .collect())
    }

    /// Detection with options already validated and styles resolved
    pub(crate) fn detect_validated(
        &self,
        raw: &RawCitation,
        options: &DetectionOptions,
        styles: &[StyleId],
    ) -> DetectionResult {
        // one consistent view of the reference data for the whole call
        let knowledge = self.knowledge.load();
        let patterns = self.patterns.load();
        let text = normalize(raw.text());
        let scorer = ConfidenceScorer::new(options.scoring_weights);

        let mut candidates: Vec<StyleCandidate> = styles
            .par_iter()
            .map(|&style| self.evaluate(style, &text, &knowledge, &patterns, &scorer, options.min_confidence))
            .collect();
        scorer::rank(&mut candidates);

        let best_style = match candidates.first() {
            Some(top) if top.is_valid() && top.confidence() >= options.validity_threshold => top.style(),
            _ => StyleId::Unknown,
        };
        let ambiguous = best_style.is_known()
            && match candidates.as_slice() {
                [first, second, ..] => first.confidence() - second.confidence() <= options.ambiguity_margin + MARGIN_EPSILON,
                _ => false,
            };

        DetectionResult::new(raw.source().cloned(), text, candidates, best_style, ambiguous)
    }

    fn evaluate(
        &self,
        style: StyleId,
        text: &NormalizedText,
        knowledge: &Arc<KnowledgeBase>,
        patterns: &Arc<PatternLibrary>,
        scorer: &ConfidenceScorer,
        min_confidence: f64,
    ) -> StyleCandidate {
        let extracted = self.extractor.extract(text, style, patterns, knowledge.rules_for(style));
        let candidate = StyleCandidate::from_extraction(style, extracted);
        let report = self.validator.validate(text, &candidate, knowledge);
        let confidence = scorer.score(&candidate, &report);
        debug!(
            "Evaluated {}: {} fields, {}/{} checks passed, confidence {:.3}",
            style,
            candidate.fields().len(),
            report.passed(),
            report.passed() + report.failed(),
            confidence
        );
        candidate.assessed(report, confidence, min_confidence)
    }
}
