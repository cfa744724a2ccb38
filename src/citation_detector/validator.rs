// WHY: a structured, explainable verdict per candidate; every check records its
// outcome so callers can see why a style won or lost

use serde::Serialize;

use super::knowledge_base::{GrammarRule, KnowledgeBase, LookupHit, MatchQuality};
use super::{CitationForm, FieldName, FieldSpan, NormalizedText, StyleCandidate, StyleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    RequiredFields,
    FieldOrder,
    Enclosed,
    FollowedBy,
    Marker,
    Corroboration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// Not applicable to this candidate; excluded from the pass fraction
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub detail: String,
}

/// Knowledge-base corroboration strength of a candidate's venue or publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Corroboration {
    None,
    Fuzzy,
    Exact,
}

impl Corroboration {
    pub fn strength(&self) -> f64 {
        match self {
            Corroboration::Exact => 1.0,
            Corroboration::Fuzzy => 0.5,
            Corroboration::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidityReport {
    pub style: StyleId,
    pub checks: Vec<CheckOutcome>,
    /// All required fields present (and at least one field extracted)
    pub structurally_valid: bool,
    pub corroboration: Corroboration,
    pub required_count: usize,
    pub missing_required: Vec<FieldName>,
}

impl ValidityReport {
    fn counted(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| c.kind != CheckKind::Corroboration)
    }

    pub fn passed(&self) -> usize {
        self.counted().filter(|c| c.status == CheckStatus::Passed).count()
    }

    pub fn failed(&self) -> usize {
        self.counted().filter(|c| c.status == CheckStatus::Failed).count()
    }

    /// Passed over evaluated structural checks; 0 when nothing was evaluated
    pub fn pass_fraction(&self) -> f64 {
        let passed = self.passed();
        let evaluated = passed + self.failed();
        if evaluated == 0 {
            0.0
        } else {
            passed as f64 / evaluated as f64
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Applies a style's rule set and knowledge-base corroboration to a candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleValidator;

impl StyleValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        text: &NormalizedText,
        candidate: &StyleCandidate,
        knowledge: &KnowledgeBase,
    ) -> ValidityReport {
        let rules = knowledge.rules_for(candidate.style());
        let required = rules.required_for(candidate.form());
        let mut checks = Vec::with_capacity(rules.rules().len() + 2);

        let missing_required: Vec<FieldName> = required
            .iter()
            .copied()
            .filter(|field| candidate.field(*field).is_none())
            .collect();
        let has_fields = !candidate.fields().is_empty();
        let structurally_valid = has_fields && missing_required.is_empty();
        checks.push(required_check(required.len(), &missing_required, has_fields));

        for compiled in rules.rules() {
            let rule = compiled.rule();
            let name = rule.label();
            let kind = kind_of(rule);

            // reference-list grammar says nothing about in-text citations
            if candidate.form() == CitationForm::InText {
                checks.push(outcome(name, kind, CheckStatus::Skipped, "in-text citation".to_string()));
                continue;
            }

            if let Some(when) = compiled.when() {
                if candidate.field(when).is_none() {
                    checks.push(outcome(name, kind, CheckStatus::Skipped, format!("no {when}")));
                    continue;
                }
            }

            let (status, detail) = match rule {
                GrammarRule::FieldOrder { fields } => check_order(candidate, fields),
                GrammarRule::Enclosed { field, open, close } => match candidate.field(*field) {
                    Some(span) => check_enclosed(text.as_str(), span, *open, *close),
                    None => (CheckStatus::Skipped, format!("no {field}")),
                },
                GrammarRule::FollowedBy { field, literal } => match candidate.field(*field) {
                    Some(span) => check_followed_by(text.as_str(), span, literal),
                    None => (CheckStatus::Skipped, format!("no {field}")),
                },
                GrammarRule::Marker { pattern, .. } => match compiled.marker() {
                    Some(regex) if regex.is_match(text.as_str()) => (CheckStatus::Passed, format!("found {pattern}")),
                    _ => (CheckStatus::Failed, format!("missing {pattern}")),
                },
            };
            checks.push(outcome(name, kind, status, detail));
        }

        let (corroboration, corroboration_check) = corroborate(candidate, knowledge);
        checks.push(corroboration_check);

        ValidityReport {
            style: candidate.style(),
            checks,
            structurally_valid,
            corroboration,
            required_count: required.len(),
            missing_required,
        }
    }
}

fn outcome(name: String, kind: CheckKind, status: CheckStatus, detail: String) -> CheckOutcome {
    CheckOutcome {
        name,
        kind,
        status,
        detail,
    }
}

fn kind_of(rule: &GrammarRule) -> CheckKind {
    match rule {
        GrammarRule::FieldOrder { .. } => CheckKind::FieldOrder,
        GrammarRule::Enclosed { .. } => CheckKind::Enclosed,
        GrammarRule::FollowedBy { .. } => CheckKind::FollowedBy,
        GrammarRule::Marker { .. } => CheckKind::Marker,
    }
}

fn required_check(required: usize, missing: &[FieldName], has_fields: bool) -> CheckOutcome {
    let (status, detail) = if !has_fields {
        (CheckStatus::Failed, "no fields extracted".to_string())
    } else if missing.is_empty() {
        (CheckStatus::Passed, format!("{required} required fields present"))
    } else {
        let names: Vec<&str> = missing.iter().map(FieldName::as_str).collect();
        (CheckStatus::Failed, format!("missing {}", names.join(", ")))
    };
    outcome("required_fields".to_string(), CheckKind::RequiredFields, status, detail)
}

fn check_order(candidate: &StyleCandidate, fields: &[FieldName]) -> (CheckStatus, String) {
    let present: Vec<&FieldSpan> = fields.iter().filter_map(|f| candidate.field(*f)).collect();
    if present.len() < 2 {
        return (CheckStatus::Skipped, "fewer than two ordered fields".to_string());
    }
    match present.windows(2).find(|pair| pair[0].start >= pair[1].start) {
        None => (CheckStatus::Passed, "fields in expected order".to_string()),
        Some(pair) => (
            CheckStatus::Failed,
            format!("{} appears after {}", pair[0].field, pair[1].field),
        ),
    }
}

fn check_enclosed(text: &str, span: &FieldSpan, open: char, close: char) -> (CheckStatus, String) {
    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].trim_start_matches([',', '.']).chars().next();
    if before == Some(open) && after == Some(close) {
        (CheckStatus::Passed, format!("{} enclosed in {open}{close}", span.field))
    } else {
        (CheckStatus::Failed, format!("{} not enclosed in {open}{close}", span.field))
    }
}

fn check_followed_by(text: &str, span: &FieldSpan, literal: &str) -> (CheckStatus, String) {
    if text[span.end..].starts_with(literal) {
        (CheckStatus::Passed, format!("{} followed by {literal:?}", span.field))
    } else {
        (CheckStatus::Failed, format!("{} not followed by {literal:?}", span.field))
    }
}

/// Venue via journal lookup (publisher lookup as fallback), publisher via
/// publisher lookup; the strongest hit wins and a miss is neutral
fn corroborate(candidate: &StyleCandidate, knowledge: &KnowledgeBase) -> (Corroboration, CheckOutcome) {
    let mut hits: Vec<LookupHit<'_>> = Vec::new();
    if let Some(venue) = candidate.value(FieldName::Venue) {
        if let Some(hit) = knowledge
            .lookup_journal(venue)
            .or_else(|| knowledge.lookup_publisher(venue))
        {
            hits.push(hit);
        }
    }
    if let Some(publisher) = candidate.value(FieldName::Publisher) {
        if let Some(hit) = knowledge.lookup_publisher(publisher) {
            hits.push(hit);
        }
    }

    let best = hits.into_iter().max_by(|a, b| {
        quality_rank(a.quality)
            .cmp(&quality_rank(b.quality))
            .then(a.similarity.total_cmp(&b.similarity))
    });

    let name = "corroboration".to_string();
    match best {
        Some(hit) => {
            let level = match hit.quality {
                MatchQuality::Exact => Corroboration::Exact,
                MatchQuality::Fuzzy => Corroboration::Fuzzy,
            };
            let detail = format!("{:?} match for {} ({:.2})", hit.quality, hit.record.canonical, hit.similarity);
            (level, outcome(name, CheckKind::Corroboration, CheckStatus::Passed, detail))
        }
        None => (
            Corroboration::None,
            outcome(
                name,
                CheckKind::Corroboration,
                CheckStatus::Skipped,
                "no known venue or publisher".to_string(),
            ),
        ),
    }
}

fn quality_rank(quality: MatchQuality) -> u8 {
    match quality {
        MatchQuality::Exact => 2,
        MatchQuality::Fuzzy => 1,
    }
}
