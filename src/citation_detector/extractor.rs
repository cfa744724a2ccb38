// WHY: templates give precise spans when a citation follows a style guide;
// heuristics keep required fields and identifiers recoverable when it does not

use regex_automata::{meta::Regex, Input};
use std::collections::BTreeMap;
use tracing::debug;

use super::knowledge_base::StyleRuleSet;
use super::patterns::PatternLibrary;
use super::{AbbreviationChecker, CitationForm, FieldName, FieldSpan, MatchKind, NormalizedText, StyleId};
use crate::error::DataSourceError;

/// Selected spans for one style attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    /// At most one span per field, ordered by field name
    pub spans: Vec<FieldSpan>,
    /// Fields the style's templates are able to bind
    pub bindable_fields: Vec<FieldName>,
    /// In-text only when no reference template matched
    pub form: CitationForm,
}

const AUTHOR_SURNAME_FIRST: &str = r"^(?P<author>\p{Lu}[\p{L}'\-]+,\s\p{Lu}(?:[\p{L}'\-]+|\.)(?:\s?\p{Lu}\.)*)";
const AUTHOR_INITIALS_FIRST: &str = r"^(?:\[\d+\]\s)?(?P<author>(?:\p{Lu}\.\s?)+\p{Lu}[\p{L}'\-]+)";
const AUTHOR_COMPACT: &str = r"^(?:\d+\.\s)?(?P<author>\p{Lu}[\p{L}'\-]+\s\p{Lu}{1,3})[,.]";
const YEAR: &str = r"(?:^|[\s(\[,.;:])(?P<year>(?:1[5-9]|20)\d{2})[a-z]?(?:$|[\s)\].,;:])";
const TITLE_DOUBLE_QUOTED: &str = r#""(?P<title>[^"]*[^",.])[,.]?""#;
const TITLE_SINGLE_QUOTED: &str = r"(?:^|\s)'(?P<title>[^']*[^',.])[,.]?'(?:$|[\s,.])";
const TITLE_AFTER_YEAR: &str = r"\(\d{4}[a-z]?\)[.,:]?\s";
const DOI: &str = r"(?i:doi:\s?|https?://(?:dx\.)?doi\.org/)?(?P<doi>10\.\d{4,9}/\S+)";
const URL: &str = r"(?P<url>(?:https?://|www\.)\S+)";

/// Compiled fallback rules plus template-driven extraction
#[derive(Debug)]
pub struct EntityExtractor {
    author: Vec<(&'static str, Regex)>,
    year: Regex,
    title_quoted: Vec<(&'static str, Regex)>,
    title_anchor: Regex,
    doi: Regex,
    url: Regex,
    abbreviations: AbbreviationChecker,
}

fn compile(name: &str, pattern: &str) -> Result<Regex, DataSourceError> {
    Regex::new(pattern).map_err(|e| DataSourceError::InvalidPattern {
        template: name.to_string(),
        message: e.to_string(),
    })
}

impl EntityExtractor {
    pub fn new() -> Result<Self, DataSourceError> {
        Ok(Self {
            author: vec![
                ("heuristic-author-surname-first", compile("heuristic-author-surname-first", AUTHOR_SURNAME_FIRST)?),
                ("heuristic-author-initials-first", compile("heuristic-author-initials-first", AUTHOR_INITIALS_FIRST)?),
                ("heuristic-author-compact", compile("heuristic-author-compact", AUTHOR_COMPACT)?),
            ],
            year: compile("heuristic-year", YEAR)?,
            title_quoted: vec![
                ("heuristic-title-double-quoted", compile("heuristic-title-double-quoted", TITLE_DOUBLE_QUOTED)?),
                ("heuristic-title-single-quoted", compile("heuristic-title-single-quoted", TITLE_SINGLE_QUOTED)?),
            ],
            title_anchor: compile("heuristic-title-after-year", TITLE_AFTER_YEAR)?,
            doi: compile("heuristic-doi", DOI)?,
            url: compile("heuristic-url", URL)?,
            abbreviations: AbbreviationChecker::new(),
        })
    }

    /// Extract fields for one style: templates first, then fallbacks for missing
    /// required fields and identifiers; in-text citations get no fallbacks
    pub fn extract(
        &self,
        text: &NormalizedText,
        style: StyleId,
        library: &PatternLibrary,
        rules: &StyleRuleSet,
    ) -> ExtractedFields {
        let haystack = text.as_str();
        let mut selected: BTreeMap<FieldName, FieldSpan> = BTreeMap::new();
        let mut matched_reference = false;
        let mut matched_in_text = false;

        for template in library.templates_for(style) {
            let Some(groups) = template.bind(haystack) else {
                continue;
            };
            debug!("Template {} matched with {} groups", template.name(), groups.len());
            match template.form() {
                CitationForm::Reference => matched_reference = true,
                CitationForm::InText => matched_in_text = true,
            }

            for group in groups {
                let Some(span) = make_span(
                    haystack,
                    group.field,
                    group.start,
                    group.end,
                    template.match_kind(),
                    template.priority(),
                    template.name(),
                ) else {
                    continue;
                };
                propose(&mut selected, span);
            }
        }

        let form = if matched_in_text && !matched_reference {
            CitationForm::InText
        } else {
            CitationForm::Reference
        };

        let fallbacks = match form {
            CitationForm::Reference => rules
                .required()
                .iter()
                .copied()
                .chain([FieldName::Doi, FieldName::Url])
                .collect::<Vec<_>>(),
            CitationForm::InText => Vec::new(),
        };
        for field in fallbacks {
            if selected.contains_key(&field) {
                continue;
            }
            if let Some(span) = self.heuristic(haystack, field) {
                selected.insert(field, span);
            }
        }

        ExtractedFields {
            spans: selected.into_values().collect(),
            bindable_fields: library.bound_fields(style).to_vec(),
            form,
        }
    }

    /// Style-independent fallback for a single field
    pub fn heuristic(&self, text: &str, field: FieldName) -> Option<FieldSpan> {
        match field {
            FieldName::Author => self
                .author
                .iter()
                .find_map(|(name, regex)| group_span(regex, text, field, name)),
            FieldName::Year => group_span(&self.year, text, field, "heuristic-year"),
            FieldName::Title => self
                .title_quoted
                .iter()
                .find_map(|(name, regex)| group_span(regex, text, field, name))
                .or_else(|| self.title_after_year(text)),
            FieldName::Doi => group_span(&self.doi, text, field, "heuristic-doi"),
            FieldName::Url => group_span(&self.url, text, field, "heuristic-url"),
            _ => None,
        }
    }

    /// Title running from a parenthesised year to the first period that does
    /// not close an abbreviation, period included
    fn title_after_year(&self, text: &str) -> Option<FieldSpan> {
        let anchor = self.title_anchor.find(Input::new(text))?;
        let start = anchor.end();
        let rest = &text[start..];

        let mut end = text.len();
        for (offset, _) in rest.match_indices('.') {
            let candidate_end = start + offset + 1;
            if !self.abbreviations.ends_with_abbreviation(&text[start..candidate_end]) {
                end = candidate_end;
                break;
            }
        }

        make_span(text, FieldName::Title, start, end, MatchKind::Heuristic, 0, "heuristic-title-after-year")
    }
}

fn group_span(regex: &Regex, text: &str, field: FieldName, source: &str) -> Option<FieldSpan> {
    let mut caps = regex.create_captures();
    regex.captures(Input::new(text), &mut caps);
    let span = caps.get_group_by_name(field.as_str())?;
    make_span(text, field, span.start, span.end, MatchKind::Heuristic, 0, source)
}

/// Keep the higher priority proposal; on equal priority the earlier start wins
fn propose(selected: &mut BTreeMap<FieldName, FieldSpan>, span: FieldSpan) {
    let keep_current = selected.get(&span.field).is_some_and(|current| {
        current.priority > span.priority || (current.priority == span.priority && current.start <= span.start)
    });
    if !keep_current {
        selected.insert(span.field, span);
    }
}

/// Build a span with whitespace (and trailing punctuation for identifiers) trimmed
fn make_span(
    text: &str,
    field: FieldName,
    start: usize,
    end: usize,
    kind: MatchKind,
    priority: u32,
    source: &str,
) -> Option<FieldSpan> {
    let raw = text.get(start..end)?;
    let leading = raw.len() - raw.trim_start().len();
    let mut value = raw.trim();
    if field.is_identifier() {
        value = value.trim_end_matches(['.', ',', ';', ')', ']']);
    }
    if value.is_empty() {
        return None;
    }

    let start = start + leading;
    Some(FieldSpan {
        field,
        value: value.to_string(),
        start,
        end: start + value.len(),
        kind,
        priority,
        source: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation_detector::{normalize, KnowledgeBase};
    use std::sync::OnceLock;

    struct Fixture {
        extractor: EntityExtractor,
        library: PatternLibrary,
        knowledge: KnowledgeBase,
    }

    static SHARED: OnceLock<Fixture> = OnceLock::new();

    fn fixture() -> &'static Fixture {
        SHARED.get_or_init(|| Fixture {
            extractor: EntityExtractor::new().unwrap(),
            library: PatternLibrary::builtin().unwrap(),
            knowledge: KnowledgeBase::builtin().unwrap(),
        })
    }

    fn extract(raw: &str, style: StyleId) -> (NormalizedText, ExtractedFields) {
        let fx = fixture();
        let text = normalize(raw);
        let fields = fx
            .extractor
            .extract(&text, style, &fx.library, fx.knowledge.rules_for(style));
        (text, fields)
    }

    fn value(fields: &ExtractedFields, field: FieldName) -> Option<&str> {
        fields.spans.iter().find(|s| s.field == field).map(|s| s.value.as_str())
    }

    #[test]
    fn test_apa_journal_extraction() {
        let (text, fields) = extract(
            "Smith, J. (2020). Climate models. Journal of Science, 12(3), 45-67.",
            StyleId::Apa,
        );
        assert_eq!(value(&fields, FieldName::Author), Some("Smith, J."));
        assert_eq!(value(&fields, FieldName::Year), Some("2020"));
        assert_eq!(value(&fields, FieldName::Title), Some("Climate models."));
        assert_eq!(value(&fields, FieldName::Venue), Some("Journal of Science"));
        assert_eq!(value(&fields, FieldName::Volume), Some("12"));
        assert_eq!(value(&fields, FieldName::Issue), Some("3"));
        assert_eq!(value(&fields, FieldName::Pages), Some("45-67"));

        for span in &fields.spans {
            assert_eq!(&text.as_str()[span.start..span.end], span.value);
            assert_eq!(span.kind, MatchKind::Exact);
            assert_eq!(span.source, "apa-journal", "{} came from {}", span.field, span.source);
        }
    }

    #[test]
    fn test_higher_priority_template_wins() {
        // apa-journal (100) and apa-lead (20) both bind author and year
        let (_, fields) = extract(
            "Smith, J. (2020). Climate models. Journal of Science, 12(3), 45-67.",
            StyleId::Apa,
        );
        let year = fields.spans.iter().find(|s| s.field == FieldName::Year).unwrap();
        assert_eq!(year.priority, 100);
    }

    #[test]
    fn test_propose_breaks_priority_ties_by_offset() {
        let span = |start: usize, priority: u32| FieldSpan {
            field: FieldName::Year,
            value: "2020".to_string(),
            start,
            end: start + 4,
            kind: MatchKind::Exact,
            priority,
            source: format!("t{start}"),
        };
        let mut selected = BTreeMap::new();
        propose(&mut selected, span(30, 50));
        propose(&mut selected, span(10, 50));
        propose(&mut selected, span(0, 40));
        assert_eq!(selected[&FieldName::Year].start, 10);

        propose(&mut selected, span(40, 90));
        assert_eq!(selected[&FieldName::Year].start, 40);
    }

    #[test]
    fn test_heuristics_fill_missing_required_fields() {
        let (_, fields) = extract("Smith, J. (2020), Climate models.", StyleId::Apa);
        let author = fields.spans.iter().find(|s| s.field == FieldName::Author).unwrap();
        assert_eq!(author.kind, MatchKind::Fuzzy);

        let title = fields.spans.iter().find(|s| s.field == FieldName::Title).unwrap();
        assert_eq!(title.kind, MatchKind::Heuristic);
        assert_eq!(title.value, "Climate models.");
        assert_eq!(title.priority, 0);
    }

    #[test]
    fn test_template_titles_keep_abbreviation_periods() {
        for (raw, title) in [
            (
                "Smith, J. (2020). Policy in the U.S. economy. Journal of Science, 12(3), 45-67.",
                "Policy in the U.S. economy.",
            ),
            ("Smith, J. (2020). Models vs. data. Journal of Science, 12(3), 45-67.", "Models vs. data."),
        ] {
            let (_, fields) = extract(raw, StyleId::Apa);
            assert_eq!(value(&fields, FieldName::Title), Some(title));
            assert_eq!(value(&fields, FieldName::Venue), Some("Journal of Science"));
            assert_eq!(value(&fields, FieldName::Pages), Some("45-67"));
            assert!(fields.spans.iter().all(|s| s.source == "apa-journal"));
        }
    }

    #[test]
    fn test_chapter_binds_book_title_and_publisher() {
        let (_, fields) = extract(
            "Smith, J. (2020). Climate chapter. In A. Doe (Ed.), Big book (pp. 45-67). Routledge.",
            StyleId::Apa,
        );
        assert_eq!(value(&fields, FieldName::Title), Some("Climate chapter."));
        assert_eq!(value(&fields, FieldName::Venue), Some("Big book"));
        assert_eq!(value(&fields, FieldName::Pages), Some("45-67"));
        assert_eq!(value(&fields, FieldName::Publisher), Some("Routledge"));
        assert_eq!(fields.form, CitationForm::Reference);

        for (i, span) in fields.spans.iter().enumerate() {
            assert_eq!(span.source, "apa-chapter");
            for other in &fields.spans[i + 1..] {
                assert!(!span.overlaps(other), "{} overlaps {}", span.field, other.field);
            }
        }
    }

    #[test]
    fn test_chapters_in_other_styles() {
        let cases = [
            (
                StyleId::Mla,
                "Smith, John. \"Climate Chapter.\" Big Book, edited by Ann Doe, Routledge, 2020, pp. 45-67.",
                "mla-chapter",
            ),
            (
                StyleId::Chicago,
                "Smith, John. \"Climate Chapter.\" In Big Book, edited by Ann Doe, 45-67. London: Routledge, 2020.",
                "chicago-chapter",
            ),
            (
                StyleId::Ieee,
                "J. Smith, \"Climate chapter,\" in Big Book, A. Doe, Ed. London: Routledge, 2020, pp. 45-67.",
                "ieee-chapter",
            ),
            (
                StyleId::Harvard,
                "Smith, J. (2020) 'Climate chapter', in Doe, A. (ed.) Big book. London: Routledge, pp. 45-67.",
                "harvard-chapter",
            ),
            (
                StyleId::Vancouver,
                "Smith J. Climate chapter. In: Doe A, editor. Big book. London: Routledge; 2020. p. 45-67.",
                "vancouver-chapter",
            ),
            (
                StyleId::Cse,
                "Smith J. 2020. Climate chapter. In: Doe A, editor. Big book. London: Routledge. p. 45-67.",
                "cse-chapter",
            ),
        ];
        for (style, raw, template) in cases {
            let (_, fields) = extract(raw, style);
            let publisher = fields.spans.iter().find(|s| s.field == FieldName::Publisher);
            assert_eq!(publisher.map(|s| s.value.as_str()), Some("Routledge"), "{style}");
            assert_eq!(publisher.map(|s| s.source.as_str()), Some(template), "{style}");
            assert_eq!(value(&fields, FieldName::Pages), Some("45-67"), "{style}");
        }
    }

    #[test]
    fn test_in_text_citations_skip_fallbacks() {
        let (_, fields) = extract("(Smith & Jones, 2020, p. 12)", StyleId::Apa);
        assert_eq!(fields.form, CitationForm::InText);
        assert_eq!(value(&fields, FieldName::Author), Some("Smith & Jones"));
        assert_eq!(value(&fields, FieldName::Year), Some("2020"));
        assert_eq!(value(&fields, FieldName::Pages), Some("12"));
        assert_eq!(value(&fields, FieldName::Title), None);
        assert!(fields.spans.iter().all(|s| s.kind == MatchKind::Fuzzy));

        // Harvard joins authors with "and", so this stays a reference attempt
        let (_, fields) = extract("(Smith & Jones, 2020, p. 12)", StyleId::Harvard);
        assert_eq!(fields.form, CitationForm::Reference);

        let (_, fields) = extract("[12, 14]", StyleId::Ieee);
        assert_eq!(fields.form, CitationForm::InText);
        assert_eq!(value(&fields, FieldName::Number), Some("12, 14"));
    }

    #[test]
    fn test_title_heuristic_skips_abbreviation_periods() {
        let fx = fixture();
        let span = fx
            .extractor
            .heuristic("Smith, J. (2020), Policy in the U.S. after Kyoto. Other text.", FieldName::Title)
            .unwrap();
        assert_eq!(span.value, "Policy in the U.S. after Kyoto.");
    }

    #[test]
    fn test_identifier_heuristics() {
        let (_, fields) = extract(
            "Smith, J. (2020). Climate models. Journal of Science, 12(3), 45-67. https://doi.org/10.1234/jos.2020.12.",
            StyleId::Apa,
        );
        assert_eq!(value(&fields, FieldName::Doi), Some("10.1234/jos.2020.12"));
        assert_eq!(value(&fields, FieldName::Url), Some("https://doi.org/10.1234/jos.2020.12"));
        let doi = fields.spans.iter().find(|s| s.field == FieldName::Doi).unwrap();
        assert_eq!(doi.kind, MatchKind::Heuristic);
    }

    #[test]
    fn test_year_heuristic_requires_boundaries() {
        let fx = fixture();
        assert!(fx.extractor.heuristic("Report 120200 pages", FieldName::Year).is_none());
        assert!(fx.extractor.heuristic("pp. 1999-2005", FieldName::Year).is_none());
        let span = fx.extractor.heuristic("Smith J. Models; 2019.", FieldName::Year).unwrap();
        assert_eq!(span.value, "2019");
    }

    #[test]
    fn test_nonsense_extracts_nothing() {
        for style in StyleId::KNOWN {
            let (_, fields) = extract("asdkjh aslkdj", style);
            assert!(fields.spans.is_empty(), "{style} extracted {:?}", fields.spans);
        }
    }

    #[test]
    fn test_unknown_style_has_no_template_fields() {
        let (_, fields) = extract("Smith, J. (2020). Climate models.", StyleId::Unknown);
        assert!(fields.bindable_fields.is_empty());
        assert!(fields.spans.iter().all(|s| s.kind == MatchKind::Heuristic));
    }
}
