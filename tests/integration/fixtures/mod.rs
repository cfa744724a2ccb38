#![allow(dead_code)]

// Citations with known expected styles
// WHY: Scenario tests need deterministic inputs whose scores were worked out by hand

/// APA journal article; scores 0.8 for APA
pub const APA_JOURNAL: &str = "Smith, J. (2020). Climate models. Journal of Science, 12(3), 45-67.";

/// IEEE journal article; scores 0.8 for IEEE
pub const IEEE_JOURNAL: &str = "J. Smith, \"Climate models,\" Journal of Science, vol. 12, no. 3, pp. 45-67, 2020.";

/// MLA journal article
pub const MLA_JOURNAL: &str = "Smith, John. \"Climate Models.\" Journal of Science, vol. 12, no. 3, 2020, pp. 45-67.";

/// Chicago book with a publisher the knowledge base knows
pub const CHICAGO_BOOK: &str = "Smith, John. Climate Models. Chicago: University of Chicago Press, 2020.";

/// Vancouver journal article with a known journal abbreviation
pub const VANCOUVER_JOURNAL: &str = "Smith J, Jones AB. Climate models. J Clim. 2020;12(3):45-67.";

/// Not a citation at all
pub const NONSENSE: &str = "asdkjh aslkdj";

/// Comma after the year: APA and Harvard tie at 0.5
pub const APA_HARVARD_TIE: &str = "Smith, J. (2020), Climate models.";

/// Period after the year: APA 0.6 beats Harvard 0.5
pub const APA_PUNCTUATED: &str = "Smith, J. (2020). Climate models.";

/// APA book chapter; the publisher follows the page range
pub const APA_CHAPTER: &str = "Smith, J. (2020). Climate chapter. In A. Doe (Ed.), Big book (pp. 45-67). Routledge.";

/// APA journal article whose title contains initials
pub const APA_ABBREVIATED_TITLE: &str = "Smith, J. (2020). Policy in the U.S. economy. Journal of Science, 12(3), 45-67.";

/// Parenthetical author-date citation shared by APA and Harvard
pub const IN_TEXT_AUTHOR_DATE: &str = "(Smith, 2020)";

/// Ampersand and page locator are APA-only
pub const IN_TEXT_APA_PAGES: &str = "(Smith & Jones, 2020, p. 12)";

/// Bracketed reference number
pub const IN_TEXT_NUMERIC: &str = "[1]";
