// WHY: every downstream stage reads the same canonical text, so normalization
// runs exactly once per citation and must be idempotent

use serde::Serialize;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Citation text after glyph standardisation, NFC and whitespace collapse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize raw citation text into a new allocation
pub fn normalize(raw: &str) -> NormalizedText {
    let mut buffer = String::with_capacity(raw.len());
    normalize_into(raw, &mut buffer);
    NormalizedText(buffer)
}

/// Normalize into supplied buffer to avoid allocation in batch loops
pub fn normalize_into(raw: &str, buffer: &mut String) {
    buffer.clear();
    buffer.reserve(raw.len());

    // glyphs first: dropping zero-width characters can bring a base letter next
    // to a combining mark, which composition must still see
    let mut mapped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match standardize_glyph(ch) {
            Glyph::Keep => mapped.push(ch),
            Glyph::Replace(replacement) => mapped.push_str(replacement),
            Glyph::Drop => {}
        }
    }

    let mut prev_was_space = true; // suppresses leading whitespace
    for ch in mapped.nfc() {
        if ch.is_whitespace() {
            if !prev_was_space {
                buffer.push(' ');
                prev_was_space = true;
            }
        } else {
            buffer.push(ch);
            prev_was_space = false;
        }
    }

    if buffer.ends_with(' ') {
        buffer.pop();
    }
}

enum Glyph {
    Keep,
    Replace(&'static str),
    Drop,
}

fn standardize_glyph(ch: char) -> Glyph {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{2039}' | '\u{203A}' => {
            Glyph::Replace("'")
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => {
            Glyph::Replace("\"")
        }
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => {
            Glyph::Replace("-")
        }
        '\u{2026}' => Glyph::Replace("..."),
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => Glyph::Drop,
        _ => Glyph::Keep,
    }
}
