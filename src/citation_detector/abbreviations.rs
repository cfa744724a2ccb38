// WHY: a period inside "U.S." or "Vol." is not the end of a citation title, so
// heuristic title spans consult this list before stopping

use std::collections::HashSet;

/// Abbreviations common in bibliographic titles and venue names
pub const CITATION_ABBREVIATIONS: &[&str] = &[
    "vol.", "no.", "pp.", "p.", "ed.", "eds.", "edn.", "rev.", "trans.", "ch.",
    "vs.", "e.g.", "i.e.", "etc.", "cf.", "al.", "st.", "dr.", "mr.", "mrs.", "ms.",
    "u.s.", "u.s.a.", "u.k.", "d.c.", "inc.", "ltd.", "co.", "corp.", "dept.",
    "univ.", "int.", "natl.", "proc.", "j.", "approx.", "fig.",
];

/// Lowercased HashSet lookup for O(1) abbreviation checks
#[derive(Debug, Clone)]
pub struct AbbreviationChecker {
    abbreviations: HashSet<&'static str>,
}

impl AbbreviationChecker {
    pub fn new() -> Self {
        Self {
            abbreviations: CITATION_ABBREVIATIONS.iter().copied().collect(),
        }
    }

    /// Check a single token such as `Vol.`; case-insensitive
    pub fn is_abbreviation(&self, word: &str) -> bool {
        let clean = word.trim_start_matches(['"', '\'', '(', '[']);
        if clean.is_empty() {
            return false;
        }
        // single capital initials ("J.") are abbreviations inside names
        let mut chars = clean.chars();
        if let (Some(first), Some('.'), None) = (chars.next(), chars.next(), chars.next()) {
            if first.is_uppercase() {
                return true;
            }
        }
        self.abbreviations.contains(clean.to_lowercase().as_str())
    }

    /// Check if text ends with an abbreviation whose period must not close a span
    pub fn ends_with_abbreviation(&self, text: &str) -> bool {
        text.split_whitespace()
            .last()
            .is_some_and(|last_word| self.is_abbreviation(last_word))
    }
}

impl Default for AbbreviationChecker {
    fn default() -> Self {
        Self::new()
    }
}
