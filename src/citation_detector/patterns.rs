// WHY: per-style structural templates compiled once into an immutable library;
// fragments are composed with format! so each style's grammar reads like the
// style guide it encodes

use regex_automata::{meta::Regex, Input, PatternID};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::abbreviations::CITATION_ABBREVIATIONS;
use super::{CitationForm, FieldName, MatchKind, StyleId};
use crate::error::DataSourceError;

/// Serializable description of a template, as stored in pattern snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub style: StyleId,
    pub name: String,
    pub match_kind: MatchKind,
    pub priority: u32,
    #[serde(default)]
    pub form: CitationForm,
    /// Regex with named groups; each group name must be a field name
    pub grammar: String,
}

/// Compiled template
#[derive(Debug, Clone)]
pub struct Template {
    spec: TemplateSpec,
    regex: Regex,
    fields: Vec<FieldName>,
}

/// Byte range bound to a field by one template match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundGroup {
    pub field: FieldName,
    pub start: usize,
    pub end: usize,
}

impl Template {
    pub fn compile(spec: TemplateSpec) -> Result<Self, DataSourceError> {
        if !spec.style.is_known() {
            return Err(DataSourceError::TemplateForPseudoStyle {
                template: spec.name,
                style: spec.style,
            });
        }

        let regex = Regex::new(&spec.grammar).map_err(|e| DataSourceError::InvalidPattern {
            template: spec.name.clone(),
            message: e.to_string(),
        })?;

        let mut fields = Vec::new();
        for group in regex.group_info().pattern_names(PatternID::ZERO).flatten() {
            let field = FieldName::from_group_name(group).ok_or_else(|| DataSourceError::UnknownField {
                template: spec.name.clone(),
                group: group.to_string(),
            })?;
            fields.push(field);
        }
        if fields.is_empty() {
            return Err(DataSourceError::NoBoundFields { template: spec.name });
        }

        Ok(Self { spec, regex, fields })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn style(&self) -> StyleId {
        self.spec.style
    }

    pub fn match_kind(&self) -> MatchKind {
        self.spec.match_kind
    }

    pub fn priority(&self) -> u32 {
        self.spec.priority
    }

    pub fn form(&self) -> CitationForm {
        self.spec.form
    }

    pub fn spec(&self) -> &TemplateSpec {
        &self.spec
    }

    /// Fields this template's grammar can bind, in group order
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// Match against normalized text; `None` when the grammar does not match,
    /// otherwise the non-empty groups that participated
    pub fn bind(&self, text: &str) -> Option<Vec<BoundGroup>> {
        let mut caps = self.regex.create_captures();
        self.regex.captures(Input::new(text), &mut caps);
        if !caps.is_match() {
            return None;
        }

        let groups = self
            .fields
            .iter()
            .filter_map(|&field| {
                caps.get_group_by_name(field.as_str())
                    .filter(|span| span.start < span.end)
                    .map(|span| BoundGroup {
                        field,
                        start: span.start,
                        end: span.end,
                    })
            })
            .collect();
        Some(groups)
    }
}

/// Immutable, per-style ordered template collection
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    templates: BTreeMap<StyleId, Vec<Template>>,
    bound_fields: BTreeMap<StyleId, Vec<FieldName>>,
}

impl PatternLibrary {
    pub fn from_specs(specs: Vec<TemplateSpec>) -> Result<Self, DataSourceError> {
        if specs.is_empty() {
            return Err(DataSourceError::EmptyLibrary);
        }

        let mut templates: BTreeMap<StyleId, Vec<Template>> = BTreeMap::new();
        for spec in specs {
            let template = Template::compile(spec)?;
            templates.entry(template.style()).or_default().push(template);
        }

        let mut bound_fields = BTreeMap::new();
        for (style, list) in templates.iter_mut() {
            // stable: equal priorities keep declaration order
            list.sort_by(|a, b| b.priority().cmp(&a.priority()));

            let mut fields: Vec<FieldName> = list.iter().flat_map(|t| t.fields().iter().copied()).collect();
            fields.sort();
            fields.dedup();
            bound_fields.insert(*style, fields);
        }

        debug!(
            "Compiled pattern library: {} styles, {} templates",
            templates.len(),
            templates.values().map(Vec::len).sum::<usize>()
        );
        Ok(Self { templates, bound_fields })
    }

    pub fn from_json_str(json: &str) -> Result<Self, DataSourceError> {
        let specs: Vec<TemplateSpec> = serde_json::from_str(json)?;
        Self::from_specs(specs)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DataSourceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Library compiled from the built-in grammars for every known style
    pub fn builtin() -> Result<Self, DataSourceError> {
        Self::from_specs(builtin_specs())
    }

    /// Templates for a style, highest priority first; empty for styles without templates
    pub fn templates_for(&self, style: StyleId) -> &[Template] {
        self.templates.get(&style).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of fields the style's templates can bind
    pub fn bound_fields(&self, style: StyleId) -> &[FieldName] {
        self.bound_fields.get(&style).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn styles(&self) -> impl Iterator<Item = StyleId> + '_ {
        self.templates.keys().copied()
    }

    pub fn specs(&self) -> Vec<TemplateSpec> {
        self.templates
            .values()
            .flat_map(|list| list.iter().map(|t| t.spec().clone()))
            .collect()
    }
}

// Name and year fragments shared by the built-in grammars
const SURNAME: &str = r"(?:(?:van|von|de|da|del|der|di|du|le|la|dos)\s)?\p{Lu}[\p{L}'\-]+";
const INITIALS: &str = r"\p{Lu}\.(?:[\s\-]?\p{Lu}\.)*";
const GIVEN_NAMES: &str = r"\p{Lu}[\p{L}'\-]+(?:\s\p{Lu}[\p{L}'\-]*)*";
const FULL_NAME: &str = r"\p{Lu}[\p{L}'\-]+(?:\s\p{Lu}[\p{L}'\-]*)*\s\p{Lu}[\p{L}'\-]+";
const COMPACT_INITIALS: &str = r"\p{Lu}{1,3}";
const YEAR_GROUP: &str = r"(?P<year>\d{4})[a-z]?";
const PAGES: &str = r"\d+(?:-\d+)?";
const MONTH: &str = r"\p{L}{3,9}\.?";
const REFERENCE_NUMBERS: &str = r"(?P<number>\d+(?:(?:,\s?|-)\d+)*)";

/// One character of title text, where initials ("U.S.") and known
/// abbreviations ("vs.") may carry a period; `excluded` ends the text otherwise
fn abbreviated_text(excluded: &str) -> String {
    let abbreviations: Vec<String> = CITATION_ABBREVIATIONS
        .iter()
        .map(|abbreviation| abbreviation.replace('.', r"\."))
        .collect();
    format!(r"(?:\b\p{{Lu}}\.|\b(?i:{})|[^{excluded}])", abbreviations.join("|"))
}

fn spec(style: StyleId, name: &str, match_kind: MatchKind, priority: u32, grammar: String) -> TemplateSpec {
    TemplateSpec {
        style,
        name: name.to_string(),
        match_kind,
        priority,
        form: CitationForm::Reference,
        grammar,
    }
}

/// Whole-text in-text citation such as `(Smith, 2020)` or `[3]`
fn in_text(style: StyleId, name: &str, grammar: String) -> TemplateSpec {
    TemplateSpec {
        form: CitationForm::InText,
        ..spec(style, name, MatchKind::Fuzzy, 10, grammar)
    }
}

/// Built-in grammars: journal (100), book (90), chapter (85), web or note (80),
/// lead (20) and in-text (10)
pub fn builtin_specs() -> Vec<TemplateSpec> {
    use MatchKind::{Exact, Fuzzy};
    use StyleId::*;

    let apa_name = format!(r"{SURNAME},\s{INITIALS}");
    let apa_authors = format!(r"{apa_name}(?:,\s{apa_name})*(?:,?\s&\s{apa_name})?(?:,?\set\sal\.)?");
    let harvard_authors = format!(r"{apa_name}(?:,\s{apa_name})*(?:,?\s(?:and|&)\s{apa_name})?(?:\set\sal\.)?");
    let mla_authors = format!(r"{SURNAME},\s{GIVEN_NAMES}(?:,?\sand\s{FULL_NAME}|,\set\sal)?");
    let ieee_name = format!(r"{INITIALS}\s{SURNAME}");
    let ieee_authors = format!(r"{ieee_name}(?:,\s{ieee_name})*(?:,?\sand\s{ieee_name})?(?:\set\sal\.)?");
    let vancouver_name = format!(r"{SURNAME}\s{COMPACT_INITIALS}");
    let vancouver_authors = format!(r"{vancouver_name}(?:,\s{vancouver_name})*(?:,\set\sal)?");
    let cited_ampersand = format!(r"{SURNAME}(?:(?:,\s{SURNAME})*,?\s&\s{SURNAME}|\set\sal\.)?");
    let cited_and = format!(r"{SURNAME}(?:\sand\s{SURNAME}|\set\sal\.)?");

    let quoted_title = r#""(?P<title>[^"]*[^".,])[.,]?""#;
    let ieee_quoted_title = r#""(?P<title>[^"]*[^",]),?""#;
    // sentence titles end at the first period, question or exclamation mark
    let sentence = format!(r"{}+[.?!]", abbreviated_text(".?!"));
    // phrase titles run up to a period that is matched by the template
    let phrase = format!(r"{}+", abbreviated_text("."));
    let compact_sentence = format!(r"{phrase}[.?!]");

    vec![
        // APA: Author, A. A. (Year). Title. Journal, Vol(Issue), pages.
        spec(Apa, "apa-journal", Exact, 100, format!(
            r"^(?P<author>{apa_authors})\s\({YEAR_GROUP}\)\.\s(?P<title>{sentence})\s(?P<venue>[^,]+),\s(?P<volume>\d+)(?:\((?P<issue>[\d\-]+)\))?,\s(?P<pages>{PAGES})\."
        )),
        spec(Apa, "apa-book", Exact, 90, format!(
            r"^(?P<author>{apa_authors})\s\({YEAR_GROUP}\)\.\s(?P<title>{sentence})(?:\s\([^)]*\)\.)?\s(?P<publisher>[^.,\d]+)\.(?:\s(?:https?://|doi:)\S+)?$"
        )),
        spec(Apa, "apa-chapter", Exact, 85, format!(
            r"^(?P<author>{apa_authors})\s\({YEAR_GROUP}\)\.\s(?P<title>{sentence})\sIn\s[^()]+\s\(Eds?\.\),\s(?P<venue>[^(]*[^(\s])\s\(pp?\.\s(?P<pages>{PAGES})\)\.\s(?P<publisher>[^.]+)\."
        )),
        spec(Apa, "apa-web", Exact, 80, format!(
            r"^(?P<author>{apa_authors})\s\({YEAR_GROUP}(?:,\s[^)]+)?\)\.\s(?P<title>{sentence})\s(?:(?P<venue>[^.]+)\.\s)?(?:Retrieved\sfrom\s)?(?P<url>https?://\S+)"
        )),
        spec(Apa, "apa-lead", Fuzzy, 20, format!(
            r"^(?P<author>{apa_authors})\s\({YEAR_GROUP}\)"
        )),
        in_text(Apa, "apa-in-text", format!(
            r"^\((?P<author>{cited_ampersand}),\s{YEAR_GROUP}(?:,\spp?\.\s(?P<pages>{PAGES}))?\)\.?$"
        )),
        in_text(Apa, "apa-in-text-narrative", format!(
            r"^(?P<author>{cited_and})\s\({YEAR_GROUP}(?:,\spp?\.\s(?P<pages>{PAGES}))?\)\.?$"
        )),

        // MLA: Surname, Given. "Title." Journal, vol. N, no. N, Year, pp. X-Y.
        spec(Mla, "mla-journal", Exact, 100, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}\s(?P<venue>[^,]+),\svol\.\s(?P<volume>\d+),(?:\sno\.\s(?P<issue>\d+),)?\s{YEAR_GROUP},\spp?\.\s(?P<pages>{PAGES})\."
        )),
        spec(Mla, "mla-book", Exact, 90, format!(
            r"^(?P<author>{mla_authors})\.\s(?P<title>{phrase})\.\s(?P<publisher>[^,.:]+),\s{YEAR_GROUP}\."
        )),
        spec(Mla, "mla-chapter", Exact, 85, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}\s(?P<venue>[^,]+),\sedited\sby\s[^,]+,\s(?P<publisher>[^,]+),\s{YEAR_GROUP},\spp?\.\s(?P<pages>{PAGES})\."
        )),
        spec(Mla, "mla-web", Exact, 80, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}\s(?P<venue>[^,]+),\s(?:[^,]+,\s)?(?P<url>(?:https?://|www\.)[^\s,]*[^\s,.])"
        )),
        spec(Mla, "mla-lead", Fuzzy, 20, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}"
        )),
        in_text(Mla, "mla-in-text", format!(
            r"^\((?P<author>{cited_and})(?:\s(?P<pages>\d{{1,3}}(?:-\d{{1,4}})?))?\)\.?$"
        )),
        in_text(Mla, "mla-in-text-narrative", format!(
            r"^(?P<author>{cited_and})\s\((?P<pages>\d{{1,3}}(?:-\d{{1,4}})?)\)\.?$"
        )),

        // Chicago: Surname, Given. "Title." Journal Vol, no. N (Year): pages.
        spec(Chicago, "chicago-journal", Exact, 100, format!(
            r#"^(?P<author>{mla_authors})\.\s{quoted_title}\s(?P<venue>[^"\d]*[^"\d\s])\s(?P<volume>\d+)(?:,\sno\.\s(?P<issue>\d+))?\s\({YEAR_GROUP}\):\s(?P<pages>{PAGES})\."#
        )),
        spec(Chicago, "chicago-book", Exact, 90, format!(
            r"^(?P<author>{mla_authors})\.\s(?P<title>{phrase})\.\s(?P<place>[^:.,]+):\s(?P<publisher>[^,.]+),\s{YEAR_GROUP}\."
        )),
        spec(Chicago, "chicago-chapter", Exact, 85, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}\sIn\s(?P<venue>[^,]+),\sedited\sby\s[^,]+,\s(?P<pages>{PAGES})\.\s(?P<place>[^:.,]+):\s(?P<publisher>[^,]+),\s{YEAR_GROUP}\."
        )),
        spec(Chicago, "chicago-note", Exact, 80, format!(
            r"^\d+\.\s(?P<author>{FULL_NAME}),\s(?P<title>[^(]*[^(\s])\s\((?P<place>[^:]+):\s(?P<publisher>[^,]+),\s{YEAR_GROUP}\),\s(?P<pages>{PAGES})\."
        )),
        spec(Chicago, "chicago-lead", Fuzzy, 20, format!(
            r"^(?P<author>{mla_authors})\.\s{quoted_title}"
        )),
        in_text(Chicago, "chicago-in-text", format!(
            r"^\((?P<author>{cited_and})\s{YEAR_GROUP}(?:,\s(?P<pages>{PAGES}))?\)\.?$"
        )),
        in_text(Chicago, "chicago-in-text-narrative", format!(
            r"^(?P<author>{cited_and})\s\({YEAR_GROUP}(?:,\s(?P<pages>{PAGES}))?\)\.?$"
        )),

        // IEEE: [N] I. Surname, "Title," Journal, vol. N, no. N, pp. X-Y, Mon. Year.
        spec(Ieee, "ieee-journal", Exact, 100, format!(
            r"^(?:\[\d+\]\s)?(?P<author>{ieee_authors}),\s{ieee_quoted_title}\s(?P<venue>[^,]+),\svol\.\s(?P<volume>\d+),(?:\sno\.\s(?P<issue>\d+),)?\spp\.\s(?P<pages>{PAGES}),\s(?:{MONTH}\s)?{YEAR_GROUP}\."
        )),
        spec(Ieee, "ieee-book", Exact, 90, format!(
            r#"^(?:\[\d+\]\s)?(?P<author>{ieee_authors}),\s(?P<title>[^.,"]+)\.\s(?P<place>[^:.]+):\s(?P<publisher>[^,]+),\s{YEAR_GROUP}(?:,\spp\.\s(?P<pages>{PAGES}))?\."#
        )),
        spec(Ieee, "ieee-chapter", Exact, 85, format!(
            r"^(?:\[\d+\]\s)?(?P<author>{ieee_authors}),\s{ieee_quoted_title}\sin\s(?P<venue>[^,]+),\s[^,]+,\sEds?\.\s(?P<place>[^:]+):\s(?P<publisher>[^,]+),\s{YEAR_GROUP},\spp\.\s(?P<pages>{PAGES})\."
        )),
        spec(Ieee, "ieee-web", Exact, 80, format!(
            r"^(?:\[\d+\]\s)?(?:(?P<author>{ieee_authors}),\s)?{ieee_quoted_title}\s(?P<venue>[^,]+),\s(?:[^\[]*\s)?\[Online\]\.\sAvailable:\s(?P<url>https?://\S+)"
        )),
        spec(Ieee, "ieee-lead", Fuzzy, 20, format!(
            r"^(?:\[\d+\]\s)?(?P<author>{ieee_authors}),\s{ieee_quoted_title}"
        )),
        in_text(Ieee, "ieee-in-text", format!(r"^\[{REFERENCE_NUMBERS}\]\.?$")),

        // Harvard: Surname, I. (Year) 'Title', Journal, Vol(Issue), pp. X-Y.
        spec(Harvard, "harvard-journal", Exact, 100, format!(
            r"^(?P<author>{harvard_authors})\s\({YEAR_GROUP}\)\s'(?P<title>[^']+)',\s(?P<venue>[^,]+),\s(?P<volume>\d+)(?:\((?P<issue>[\d\-]+)\))?,\spp?\.\s(?P<pages>{PAGES})\."
        )),
        spec(Harvard, "harvard-book", Exact, 90, format!(
            r"^(?P<author>{harvard_authors})\s\({YEAR_GROUP}\)\s(?P<title>{phrase})\.(?:\s\d+(?:st|nd|rd|th)\sedn?\.)?\s(?P<place>[^:.,]+):\s(?P<publisher>[^.]+)\.$"
        )),
        spec(Harvard, "harvard-chapter", Exact, 85, format!(
            r"^(?P<author>{harvard_authors})\s\({YEAR_GROUP}\)\s'(?P<title>[^']+)',\sin\s[^()]+\s\(eds?\.?\)\s(?P<venue>{phrase})\.\s(?P<place>[^:.,]+):\s(?P<publisher>[^,]+),\spp?\.\s(?P<pages>{PAGES})\."
        )),
        spec(Harvard, "harvard-web", Exact, 80, format!(
            r"^(?P<author>{harvard_authors})\s\({YEAR_GROUP}\)\s(?P<title>[^\[]*[^\[\s])\s\[Online\]\.(?:\sAvailable\sat:\s(?P<url>\S+))?"
        )),
        spec(Harvard, "harvard-lead", Fuzzy, 20, format!(
            r"^(?P<author>{harvard_authors})\s\({YEAR_GROUP}\)"
        )),
        in_text(Harvard, "harvard-in-text", format!(
            r"^\((?P<author>{cited_and}),\s{YEAR_GROUP}(?::\s?(?P<pages>{PAGES}))?\)\.?$"
        )),
        in_text(Harvard, "harvard-in-text-narrative", format!(
            r"^(?P<author>{cited_and})\s\({YEAR_GROUP}(?::\s?(?P<pages>{PAGES}))?\)\.?$"
        )),

        // Vancouver: N. Surname AB, Surname CD. Title. Journal. Year;Vol(Issue):pages.
        spec(Vancouver, "vancouver-journal", Exact, 100, format!(
            r"^(?:\d+\.\s)?(?P<author>{vancouver_authors})\.\s(?P<title>{compact_sentence})\s(?P<venue>[^.]+)\.\s{YEAR_GROUP}(?:\s{MONTH}(?:\s\d+)?)?;(?P<volume>\d+)(?:\((?P<issue>[\d\-]+)\))?:(?P<pages>{PAGES})\."
        )),
        spec(Vancouver, "vancouver-book", Exact, 90, format!(
            r"^(?:\d+\.\s)?(?P<author>{vancouver_authors})\.\s(?P<title>{compact_sentence})(?:\s\d+(?:st|nd|rd|th)\sed\.)?\s(?P<place>[^:.;]+):\s(?P<publisher>[^;]+);\s{YEAR_GROUP}\.$"
        )),
        spec(Vancouver, "vancouver-chapter", Exact, 85, format!(
            r"^(?:\d+\.\s)?(?P<author>{vancouver_authors})\.\s(?P<title>{compact_sentence})\sIn:\s[^.]+,\seditors?\.\s(?P<venue>[^.]+)\.\s(?P<place>[^:.;]+):\s(?P<publisher>[^;]+);\s{YEAR_GROUP}\.\sp\.\s(?P<pages>{PAGES})\."
        )),
        spec(Vancouver, "vancouver-web", Exact, 80, format!(
            r"^(?:\d+\.\s)?(?P<author>{vancouver_authors})\.\s(?P<title>[^\[.]*[^\[.\s])\s\[Internet\]\.\s(?:(?P<publisher>[^;]+);\s)?{YEAR_GROUP}(?:\s\[[^\]]*\])?\.\sAvailable\sfrom:\s(?P<url>https?://\S+)"
        )),
        spec(Vancouver, "vancouver-lead", Fuzzy, 20, format!(
            r"^(?:\d+\.\s)?(?P<author>{vancouver_authors})\.\s(?P<title>{compact_sentence})"
        )),
        in_text(Vancouver, "vancouver-in-text", format!(r"^\({REFERENCE_NUMBERS}\)\.?$")),

        // CSE name-year: Surname AB. Year. Title. Journal. Vol(Issue):pages.
        spec(Cse, "cse-journal", Exact, 100, format!(
            r"^(?P<author>{vancouver_authors})\.\s{YEAR_GROUP}\.\s(?P<title>{compact_sentence})\s(?P<venue>[^.]+)\.\s(?P<volume>\d+)(?:\((?P<issue>[\d\-]+)\))?:(?P<pages>{PAGES})\."
        )),
        spec(Cse, "cse-book", Exact, 90, format!(
            r"^(?P<author>{vancouver_authors})\.\s{YEAR_GROUP}\.\s(?P<title>{compact_sentence})\s(?P<place>[^:.(]*[^:.(\s])(?:\s\([A-Z]+\))?:\s(?P<publisher>[^.]+)\.$"
        )),
        spec(Cse, "cse-chapter", Exact, 85, format!(
            r"^(?P<author>{vancouver_authors})\.\s{YEAR_GROUP}\.\s(?P<title>{compact_sentence})\sIn:\s[^.]+,\seditors?\.\s(?P<venue>[^.]+)\.\s(?P<place>[^:.]+):\s(?P<publisher>[^.]+)\.\sp\.\s(?P<pages>{PAGES})\."
        )),
        spec(Cse, "cse-lead", Fuzzy, 20, format!(
            r"^(?P<author>{vancouver_authors})\.\s{YEAR_GROUP}\."
        )),
        in_text(Cse, "cse-in-text", format!(
            r"^\((?P<author>{cited_and})\s{YEAR_GROUP}\)\.?$"
        )),
    ]
}
