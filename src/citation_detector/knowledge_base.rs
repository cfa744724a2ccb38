// WHY: read-only reference data (venues, publishers, per-style rules) built as a
// complete snapshot; detection never mutates it and updaters swap whole values

use regex_automata::meta::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use super::{CitationForm, FieldName, StyleId};
use crate::error::DataSourceError;

/// Minimum normalized Levenshtein similarity for a fuzzy hit
pub const FUZZY_THRESHOLD: f64 = 0.88;

/// Keys shorter than this never match fuzzily
pub const FUZZY_MIN_KEY_CHARS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Journal,
    Publisher,
}

/// Journal or publisher with its canonical name and known aliases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub kind: RecordKind,
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl KnowledgeRecord {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupHit<'a> {
    pub record: &'a KnowledgeRecord,
    pub quality: MatchQuality,
    pub similarity: f64,
}

/// Style-specific structural rule checked by the validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GrammarRule {
    /// Present listed fields appear in this order
    FieldOrder { fields: Vec<FieldName> },
    /// Field is wrapped by `open` and `close`, allowing one trailing `,` or `.` inside
    Enclosed { field: FieldName, open: char, close: char },
    /// Text right after the field starts with `literal`
    FollowedBy { field: FieldName, literal: String },
    /// Regex found anywhere in the citation
    Marker { name: String, pattern: String },
}

impl GrammarRule {
    pub fn label(&self) -> String {
        match self {
            GrammarRule::FieldOrder { .. } => "field_order".to_string(),
            GrammarRule::Enclosed { field, .. } => format!("enclosed:{field}"),
            GrammarRule::FollowedBy { field, .. } => format!("followed_by:{field}"),
            GrammarRule::Marker { name, .. } => format!("marker:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule is skipped unless this field was extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<FieldName>,
    #[serde(flatten)]
    pub rule: GrammarRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetSpec {
    pub style: StyleId,
    pub required: Vec<FieldName>,
    /// Fields an in-text citation of this style must carry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_text_required: Vec<FieldName>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    spec: RuleSpec,
    marker: Option<Regex>,
}

impl CompiledRule {
    pub fn when(&self) -> Option<FieldName> {
        self.spec.when
    }

    pub fn rule(&self) -> &GrammarRule {
        &self.spec.rule
    }

    pub fn marker(&self) -> Option<&Regex> {
        self.marker.as_ref()
    }
}

/// Required fields and grammar rules for one style
#[derive(Debug, Clone)]
pub struct StyleRuleSet {
    style: StyleId,
    required: Vec<FieldName>,
    in_text_required: Vec<FieldName>,
    rules: Vec<CompiledRule>,
}

impl StyleRuleSet {
    pub fn empty(style: StyleId) -> Self {
        Self {
            style,
            required: Vec::new(),
            in_text_required: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn compile(spec: RuleSetSpec) -> Result<Self, DataSourceError> {
        let style = spec.style;
        if !style.is_known() {
            return Err(DataSourceError::PseudoStyle(style));
        }
        if spec.required.is_empty() {
            return Err(DataSourceError::NoRequiredFields { style });
        }
        for list in [&spec.required, &spec.in_text_required] {
            for (i, field) in list.iter().enumerate() {
                if list[..i].contains(field) {
                    return Err(DataSourceError::DuplicateRequiredField { style, field: *field });
                }
            }
        }

        let mut rules = Vec::with_capacity(spec.rules.len());
        for rule_spec in spec.rules {
            let marker = match &rule_spec.rule {
                GrammarRule::Marker { name, pattern } => {
                    Some(Regex::new(pattern).map_err(|e| DataSourceError::InvalidMarker {
                        style,
                        name: name.clone(),
                        message: e.to_string(),
                    })?)
                }
                _ => None,
            };
            rules.push(CompiledRule { spec: rule_spec, marker });
        }

        Ok(Self {
            style,
            required: spec.required,
            in_text_required: spec.in_text_required,
            rules,
        })
    }

    pub fn style(&self) -> StyleId {
        self.style
    }

    pub fn required(&self) -> &[FieldName] {
        &self.required
    }

    pub fn in_text_required(&self) -> &[FieldName] {
        &self.in_text_required
    }

    /// Required fields for a citation of the given form
    pub fn required_for(&self, form: CitationForm) -> &[FieldName] {
        match form {
            CitationForm::Reference => &self.required,
            CitationForm::InText => &self.in_text_required,
        }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn to_spec(&self) -> RuleSetSpec {
        RuleSetSpec {
            style: self.style,
            required: self.required.clone(),
            in_text_required: self.in_text_required.clone(),
            rules: self.rules.iter().map(|r| r.spec.clone()).collect(),
        }
    }
}

/// On-disk form of a knowledge base
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub records: Vec<KnowledgeRecord>,
    #[serde(default)]
    pub rule_sets: Vec<RuleSetSpec>,
}

#[derive(Debug, Clone)]
struct LookupKey {
    record: usize,
    kind: RecordKind,
    key: String,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    records: Vec<KnowledgeRecord>,
    keys: Vec<LookupKey>,
    exact: HashMap<(RecordKind, String), usize>,
    rules: BTreeMap<StyleId, StyleRuleSet>,
    empty_rules: StyleRuleSet,
}

impl KnowledgeBase {
    pub fn from_snapshot(snapshot: KnowledgeSnapshot) -> Result<Self, DataSourceError> {
        let mut keys = Vec::new();
        let mut exact = HashMap::new();
        for (index, record) in snapshot.records.iter().enumerate() {
            for name in record.names() {
                let key = lookup_key(name);
                if key.is_empty() {
                    return Err(DataSourceError::EmptyName);
                }
                // first record claiming a key keeps it
                exact.entry((record.kind, key.clone())).or_insert(index);
                keys.push(LookupKey {
                    record: index,
                    kind: record.kind,
                    chars: key.chars().count(),
                    key,
                });
            }
        }

        let mut rules = BTreeMap::new();
        for spec in snapshot.rule_sets {
            let style = spec.style;
            if rules.contains_key(&style) {
                return Err(DataSourceError::DuplicateRuleSet(style));
            }
            rules.insert(style, StyleRuleSet::compile(spec)?);
        }

        debug!(
            "Built knowledge base: {} records, {} lookup keys, {} rule sets",
            snapshot.records.len(),
            keys.len(),
            rules.len()
        );
        Ok(Self {
            records: snapshot.records,
            keys,
            exact,
            rules,
            empty_rules: StyleRuleSet::empty(StyleId::Unknown),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, DataSourceError> {
        let snapshot: KnowledgeSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DataSourceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kb = Self::from_json_str(&json)?;
        info!("Loaded knowledge base from {}: {} records", path.display(), kb.records.len());
        Ok(kb)
    }

    pub fn builtin() -> Result<Self, DataSourceError> {
        Self::from_snapshot(builtin_snapshot())
    }

    pub fn to_snapshot(&self) -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            records: self.records.clone(),
            rule_sets: self.rules.values().map(StyleRuleSet::to_spec).collect(),
        }
    }

    pub fn records(&self) -> &[KnowledgeRecord] {
        &self.records
    }

    pub fn lookup_journal(&self, name: &str) -> Option<LookupHit<'_>> {
        self.lookup(RecordKind::Journal, name)
    }

    pub fn lookup_publisher(&self, name: &str) -> Option<LookupHit<'_>> {
        self.lookup(RecordKind::Publisher, name)
    }

    /// Rule set for a style; an empty set for the pseudo-style or styles without rules
    pub fn rules_for(&self, style: StyleId) -> &StyleRuleSet {
        self.rules.get(&style).unwrap_or(&self.empty_rules)
    }

    fn lookup(&self, kind: RecordKind, name: &str) -> Option<LookupHit<'_>> {
        let key = lookup_key(name);
        if key.is_empty() {
            return None;
        }

        if let Some(&index) = self.exact.get(&(kind, key.clone())) {
            return Some(LookupHit {
                record: &self.records[index],
                quality: MatchQuality::Exact,
                similarity: 1.0,
            });
        }

        if key.chars().count() < FUZZY_MIN_KEY_CHARS {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for candidate in self
            .keys
            .iter()
            .filter(|k| k.kind == kind && k.chars >= FUZZY_MIN_KEY_CHARS)
        {
            let similarity = strsim::normalized_levenshtein(&key, &candidate.key);
            if similarity >= FUZZY_THRESHOLD && best.map_or(true, |(_, b)| similarity > b) {
                best = Some((candidate.record, similarity));
            }
        }

        best.map(|(index, similarity)| LookupHit {
            record: &self.records[index],
            quality: MatchQuality::Fuzzy,
            similarity,
        })
    }
}

/// Case-, punctuation- and article-insensitive key used for venue lookups
pub fn lookup_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut prev_was_space = true;
    for ch in name.chars() {
        if ch == '&' {
            if !prev_was_space {
                key.push(' ');
            }
            key.push_str("and ");
            prev_was_space = true;
        } else if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
            prev_was_space = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '/') && !prev_was_space {
            key.push(' ');
            prev_was_space = true;
        }
    }
    let trimmed = key.trim_end();
    trimmed.strip_prefix("the ").unwrap_or(trimmed).to_string()
}

fn record(kind: RecordKind, canonical: &str, aliases: &[&str]) -> KnowledgeRecord {
    KnowledgeRecord {
        kind,
        canonical: canonical.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

fn rule(when: Option<FieldName>, rule: GrammarRule) -> RuleSpec {
    RuleSpec { when, rule }
}

fn order(fields: &[FieldName]) -> GrammarRule {
    GrammarRule::FieldOrder { fields: fields.to_vec() }
}

fn enclosed(field: FieldName, open: char, close: char) -> GrammarRule {
    GrammarRule::Enclosed { field, open, close }
}

fn followed_by(field: FieldName, literal: &str) -> GrammarRule {
    GrammarRule::FollowedBy {
        field,
        literal: literal.to_string(),
    }
}

fn marker(name: &str, pattern: &str) -> GrammarRule {
    GrammarRule::Marker {
        name: name.to_string(),
        pattern: pattern.to_string(),
    }
}

/// Reference data shipped with the crate
pub fn builtin_snapshot() -> KnowledgeSnapshot {
    use FieldName::*;
    use RecordKind::{Journal, Publisher as Press};

    let records = vec![
        record(Journal, "Nature", &[]),
        record(Journal, "Science", &[]),
        record(Journal, "Cell", &[]),
        record(Journal, "The Lancet", &["Lancet"]),
        record(Journal, "PLOS ONE", &["PLoS One"]),
        record(Journal, "Journal of the American Medical Association", &["JAMA"]),
        record(Journal, "New England Journal of Medicine", &["N Engl J Med", "NEJM"]),
        record(Journal, "British Medical Journal", &["BMJ"]),
        record(
            Journal,
            "Proceedings of the National Academy of Sciences",
            &["PNAS", "Proc Natl Acad Sci USA", "Proceedings of the National Academy of Sciences of the United States of America"],
        ),
        record(Journal, "Physical Review Letters", &["Phys. Rev. Lett.", "PRL"]),
        record(Journal, "Journal of Biological Chemistry", &["J Biol Chem", "JBC"]),
        record(
            Journal,
            "IEEE Transactions on Pattern Analysis and Machine Intelligence",
            &["IEEE Trans. Pattern Anal. Mach. Intell.", "TPAMI"],
        ),
        record(Journal, "Communications of the ACM", &["Commun. ACM", "CACM"]),
        record(Journal, "Journal of Personality and Social Psychology", &["J Pers Soc Psychol"]),
        record(Journal, "Psychological Review", &["Psychol Rev"]),
        record(Journal, "Annual Review of Psychology", &["Annu Rev Psychol"]),
        record(Journal, "American Economic Review", &["Am Econ Rev", "AER"]),
        record(Journal, "Journal of Political Economy", &["J Polit Econ"]),
        record(Journal, "Nature Climate Change", &["Nat Clim Chang"]),
        record(Journal, "Journal of Climate", &["J Clim"]),
        record(Press, "Oxford University Press", &["OUP", "Oxford Univ. Press"]),
        record(Press, "Cambridge University Press", &["CUP", "Cambridge Univ. Press"]),
        record(Press, "Harvard University Press", &[]),
        record(Press, "Yale University Press", &[]),
        record(Press, "Princeton University Press", &[]),
        record(Press, "Stanford University Press", &[]),
        record(Press, "MIT Press", &["The MIT Press"]),
        record(Press, "University of Chicago Press", &[]),
        record(Press, "Elsevier", &[]),
        record(Press, "Springer", &["Springer-Verlag", "Springer Nature"]),
        record(Press, "Wiley", &["John Wiley & Sons", "Wiley-Blackwell"]),
        record(Press, "Routledge", &[]),
        record(Press, "SAGE Publications", &["Sage"]),
        record(Press, "Taylor & Francis", &[]),
        record(Press, "IEEE Press", &[]),
        record(Press, "ACM Press", &[]),
        record(Press, "Penguin Books", &["Penguin"]),
        record(Press, "Academic Press", &[]),
    ];

    let page_prefix = marker("page_prefix", r"(?:^|\s)pp?\.\s\d");
    let volume_prefix = marker("volume_prefix", r"(?:^|\s)vol\.\s\d");
    let compact_initials = r"^(?:\d+\.\s)?\p{Lu}[\p{L}'\-]+\s\p{Lu}{1,3}[,.]";

    let rule_sets = vec![
        RuleSetSpec {
            style: StyleId::Apa,
            required: vec![Author, Year, Title],
            in_text_required: vec![Author, Year],
            rules: vec![
                rule(None, order(&[Author, Year, Title, Venue])),
                rule(None, enclosed(Year, '(', ')')),
                rule(None, followed_by(Year, ").")),
                rule(Some(Issue), marker("volume_issue", r"\d+\(\d+(?:-\d+)?\),\s")),
            ],
        },
        RuleSetSpec {
            style: StyleId::Mla,
            required: vec![Author, Title],
            in_text_required: vec![Author],
            rules: vec![
                rule(None, order(&[Author, Title, Venue, Year])),
                rule(None, followed_by(Author, ".")),
                rule(Some(Venue), enclosed(Title, '"', '"')),
                rule(Some(Volume), volume_prefix.clone()),
                rule(Some(Pages), page_prefix.clone()),
            ],
        },
        RuleSetSpec {
            style: StyleId::Chicago,
            required: vec![Author, Title, Year],
            in_text_required: vec![Author, Year],
            rules: vec![
                rule(None, order(&[Author, Title, Venue, Year])),
                rule(None, followed_by(Author, ".")),
                rule(Some(Venue), enclosed(Title, '"', '"')),
                rule(Some(Volume), enclosed(Year, '(', ')')),
                rule(Some(Publisher), marker("place_publisher", r"[^\s:]+:\s[^,]+,\s\d{4}")),
            ],
        },
        RuleSetSpec {
            style: StyleId::Ieee,
            required: vec![Author, Title],
            in_text_required: vec![Number],
            rules: vec![
                rule(None, order(&[Author, Title, Venue, Year])),
                rule(None, marker("initials_first", r"^(?:\[\d+\]\s)?\p{Lu}\.")),
                rule(Some(Venue), enclosed(Title, '"', '"')),
                rule(Some(Volume), volume_prefix),
                rule(Some(Pages), marker("page_prefix", r"(?:^|\s)pp\.\s\d")),
                rule(None, followed_by(Year, ".")),
            ],
        },
        RuleSetSpec {
            style: StyleId::Harvard,
            required: vec![Author, Year, Title],
            in_text_required: vec![Author, Year],
            rules: vec![
                rule(None, order(&[Author, Year, Title, Venue])),
                rule(None, enclosed(Year, '(', ')')),
                rule(None, followed_by(Year, ") ")),
                rule(Some(Venue), enclosed(Title, '\'', '\'')),
                rule(Some(Pages), page_prefix),
            ],
        },
        RuleSetSpec {
            style: StyleId::Vancouver,
            required: vec![Author, Title, Year],
            in_text_required: vec![Number],
            rules: vec![
                rule(None, order(&[Author, Title, Venue, Year])),
                rule(None, marker("initials_without_periods", compact_initials)),
                rule(Some(Volume), followed_by(Year, ";")),
                rule(Some(Pages), marker("volume_pages", r";\d+(?:\(\d+(?:-\d+)?\))?:\d+")),
            ],
        },
        RuleSetSpec {
            style: StyleId::Cse,
            required: vec![Author, Year, Title],
            in_text_required: vec![Author, Year],
            rules: vec![
                rule(None, order(&[Author, Year, Title, Venue])),
                rule(None, marker("initials_without_periods", compact_initials)),
                rule(None, followed_by(Year, ".")),
                rule(Some(Pages), marker("volume_pages", r"\.\s\d+(?:\(\d+(?:-\d+)?\))?:\d+")),
            ],
        },
    ];

    KnowledgeSnapshot { records, rule_sets }
}
