// WHY: one weighted formula turns pattern strength, corroboration and validity
// into a comparable confidence; ranking must be total so results are reproducible

use std::cmp::Ordering;

use super::validator::ValidityReport;
use super::StyleCandidate;
use crate::config::ScoringWeights;

/// Multiplier applied to candidates missing required fields
pub const INVALID_PENALTY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScorer {
    weights: ScoringWeights,
}

impl ConfidenceScorer {
    /// Weights are expected to be validated already
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Confidence in [0, 1]; never NaN
    pub fn score(&self, candidate: &StyleCandidate, report: &ValidityReport) -> f64 {
        let raw = self.weights.pattern_weight * pattern_strength(candidate, report)
            + self.weights.corroboration_weight * report.corroboration.strength()
            + self.weights.validity_weight * report.pass_fraction();

        let penalized = if report.structurally_valid {
            raw
        } else {
            raw * INVALID_PENALTY
        };

        if penalized.is_nan() {
            0.0
        } else {
            penalized.clamp(0.0, 1.0)
        }
    }
}

/// Share of the style's template-bindable fields that templates actually bound,
/// weighted by match kind; heuristic fields contribute nothing
pub fn pattern_strength(candidate: &StyleCandidate, report: &ValidityReport) -> f64 {
    let bindable = candidate.bindable_fields();
    let total: f64 = candidate
        .fields()
        .iter()
        .filter(|span| bindable.contains(&span.field))
        .map(|span| span.kind.strength())
        .sum();

    let extracted_bindable = candidate
        .fields()
        .iter()
        .filter(|span| bindable.contains(&span.field))
        .count();
    let denominator = extracted_bindable.max(report.required_count);
    if denominator == 0 {
        0.0
    } else {
        (total / denominator as f64).min(1.0)
    }
}

/// Confidence descending, ties broken by canonical style order
pub fn rank(candidates: &mut [StyleCandidate]) {
    candidates.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.style().cmp(&b.style()))
    });
}
