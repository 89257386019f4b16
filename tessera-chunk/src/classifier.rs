//! Document style classification.
//!
//! The classifier scores raw text against three regex pattern families
//! (legal, technical, and structured markers) and folds the scores into a
//! single [`DocumentType`] tag that drives chunk configuration selection.
//! Classification is a pure function of its inputs: it never fails, never
//! mutates anything, and is recomputed per call rather than persisted.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How many words one normalized "density point" corresponds to.
const DENSITY_WINDOW_WORDS: f64 = 1000.0;

/// Bonus added to a family score when the filename hints at that family.
const FILENAME_HINT_BONUS: f64 = 2.0;

/// Classified document style, used to pick a chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Contracts, statutes, terms — dense article/section references.
    Legal,
    /// Specifications, standards, procedures.
    Technical,
    /// Long flowing paragraphs with little markup.
    Narrative,
    /// Lists, headings, and tables dominate.
    Structured,
    /// More than one family scored high.
    Mixed,
    /// Nothing scored decisively.
    Unknown,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            DocumentType::Legal => "legal",
            DocumentType::Technical => "technical",
            DocumentType::Narrative => "narrative",
            DocumentType::Structured => "structured",
            DocumentType::Mixed => "mixed",
            DocumentType::Unknown => "unknown",
        };
        f.write_str(tag)
    }
}

/// Regex patterns that mark legal prose.
const LEGAL_PATTERNS: &[&str] = &[
    r"(?i)\b(article|section|clause|chapter|annex)\s+\d+",
    r"(?i)\b(law|statute|decree|regulation|ordinance)\b",
    r"(?i)\b(contract|agreement|protocol|amendment)\b",
    r"(?i)\b(obligations|liability|warranty|indemnity)\b",
    r"(?i)\b(pursuant to|in accordance with|subject to)\b",
];

/// Regex patterns that mark technical prose.
const TECHNICAL_PATTERNS: &[&str] = &[
    r"(?i)\b(technical requirements|specification|standard)\b",
    r"(?i)\b(parameters|characteristics|tolerances)\b",
    r"(?i)\b(method|procedure|algorithm)\b",
    r"(?i)\b(system|device|equipment)\b",
    r"(?i)\b(ISO|IEC|ANSI|RFC)\s*\d+",
];

/// Line-anchored patterns that mark structured content.
const STRUCTURED_PATTERNS: &[&str] = &[
    r"(?m)^\s*\d+\.\s+",     // Numbered lists (e.g. 1. item)
    r"(?m)^\s*[a-z]\)\s+",   // Lettered lists (e.g. a) item)
    r"(?m)^\s*[-•*]\s+",     // Bullet points
    r"(?m)^\s*#{1,6}\s+",    // Markdown headings
    r"(?m)^\s*\|.*\|\s*$",   // Table rows
];

/// Filename fragments hinting at a legal document.
const LEGAL_FILENAME_HINTS: &[&str] = &["law", "contract", "agreement", "legal", "terms"];

/// Filename fragments hinting at a technical document.
const TECHNICAL_FILENAME_HINTS: &[&str] = &["tech", "spec", "standard", "manual"];

/// Classifies documents to determine the optimal chunking strategy.
///
/// # Example
///
/// ```
/// use tessera_chunk::{DocumentClassifier, DocumentType};
///
/// let classifier = DocumentClassifier::new();
/// let text = "# Notes\n\n- first item\n- second item\n- third item\n";
/// assert_eq!(classifier.classify(text, None), DocumentType::Structured);
/// ```
pub struct DocumentClassifier {
    legal: Vec<Regex>,
    technical: Vec<Regex>,
    structured: Vec<Regex>,
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentClassifier {
    /// Create a classifier with the built-in pattern families.
    ///
    /// # Panics
    ///
    /// Panics if any of the built-in patterns fail to compile, which would be
    /// a defect in this crate rather than a runtime condition.
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|&pattern| Regex::new(pattern).unwrap())
                .collect()
        };

        Self {
            legal: compile(LEGAL_PATTERNS),
            technical: compile(TECHNICAL_PATTERNS),
            structured: compile(STRUCTURED_PATTERNS),
        }
    }

    /// Classify document content, optionally using the filename as a hint.
    ///
    /// Match counts for each family are normalized by word count into a
    /// density score per [`DENSITY_WINDOW_WORDS`] words. A filename hint adds
    /// a fixed bonus to the legal or technical score. When more than one
    /// family scores above 1.0 the result is [`DocumentType::Mixed`];
    /// otherwise the highest family wins if it clears 0.5. Text with long
    /// paragraphs and no structure falls through to
    /// [`DocumentType::Narrative`], and everything else is
    /// [`DocumentType::Unknown`].
    pub fn classify(&self, content: &str, filename: Option<&str>) -> DocumentType {
        let word_count = content.split_whitespace().count();

        let mut legal_score = Self::density(&self.legal, content, word_count);
        let mut technical_score = Self::density(&self.technical, content, word_count);
        let structured_score = Self::density(&self.structured, content, word_count);

        if let Some(name) = filename {
            let name = name.to_lowercase();
            if LEGAL_FILENAME_HINTS.iter().any(|hint| name.contains(hint)) {
                legal_score += FILENAME_HINT_BONUS;
            } else if TECHNICAL_FILENAME_HINTS.iter().any(|hint| name.contains(hint)) {
                technical_score += FILENAME_HINT_BONUS;
            }
        }

        let scores = [
            (DocumentType::Legal, legal_score),
            (DocumentType::Technical, technical_score),
            (DocumentType::Structured, structured_score),
        ];

        let high = scores.iter().filter(|(_, score)| *score > 1.0).count();
        if high > 1 {
            return DocumentType::Mixed;
        }

        // First match wins on ties, so the ordering above is deterministic.
        let (best_type, best_score) = scores
            .iter()
            .fold((DocumentType::Unknown, 0.0_f64), |best, &(ty, score)| {
                if score > best.1 { (ty, score) } else { best }
            });
        if best_score > 0.5 {
            return best_type;
        }

        if Self::mean_paragraph_words(content) > 50.0 && structured_score < 0.1 {
            return DocumentType::Narrative;
        }

        DocumentType::Unknown
    }

    /// Pattern matches per [`DENSITY_WINDOW_WORDS`] words of content.
    fn density(patterns: &[Regex], content: &str, word_count: usize) -> f64 {
        if word_count == 0 {
            return 0.0;
        }
        let matches: usize = patterns
            .iter()
            .map(|pattern| pattern.find_iter(content).count())
            .sum();
        matches as f64 / word_count as f64 * DENSITY_WINDOW_WORDS
    }

    fn mean_paragraph_words(content: &str) -> f64 {
        let paragraphs: Vec<&str> = content.split("\n\n").collect();
        if paragraphs.is_empty() {
            return 0.0;
        }
        let total_words: usize = paragraphs
            .iter()
            .map(|paragraph| paragraph.split_whitespace().count())
            .sum();
        total_words as f64 / paragraphs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> DocumentClassifier {
        DocumentClassifier::new()
    }

    #[test]
    fn test_legal_density_classifies_as_legal() {
        // Five legal marker hits per ~100 words is far above the 0.5 density
        // threshold after normalization.
        let sentence = "Article 1 of the agreement defines the obligations of the \
                        parties pursuant to the applicable regulation. ";
        let text = sentence.repeat(10);
        assert_eq!(classifier().classify(&text, None), DocumentType::Legal);
    }

    #[test]
    fn test_structured_markers_classify_as_structured() {
        let text = "# Overview\n\n\
                    1. first point\n\
                    2. second point\n\
                    - a bullet\n\
                    - another bullet\n\
                    a) lettered item\n";
        assert_eq!(classifier().classify(text, None), DocumentType::Structured);
    }

    #[test]
    fn test_mixed_when_two_families_score_high() {
        let text = "# Section 1\n\
                    1. The contract terms follow Article 2 of the statute.\n\
                    2. Liability and warranty are defined in the agreement.\n\
                    - pursuant to clause 4 of the regulation\n\
                    - in accordance with the law\n";
        assert_eq!(classifier().classify(text, None), DocumentType::Mixed);
    }

    #[test]
    fn test_long_plain_paragraphs_are_narrative() {
        let paragraph = "The morning light crept slowly over the hills while the \
                         travellers packed their bags and talked quietly about the \
                         road ahead, each of them remembering the towns they had \
                         passed through and the people they had met along the way, \
                         wondering what the next valley would bring and whether the \
                         weather would hold long enough for them to make the crossing \
                         before dark fell over the ridge. ";
        let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        assert_eq!(classifier().classify(&text, None), DocumentType::Narrative);
    }

    #[test]
    fn test_filename_hint_bumps_score() {
        let text = "Some short plain text without any marker words in it.";
        assert_eq!(classifier().classify(text, None), DocumentType::Unknown);
        assert_eq!(
            classifier().classify(text, Some("service_contract.txt")),
            DocumentType::Legal
        );
        assert_eq!(
            classifier().classify(text, Some("pump_spec_rev3.txt")),
            DocumentType::Technical
        );
    }

    #[test]
    fn test_empty_content_is_unknown() {
        assert_eq!(classifier().classify("", None), DocumentType::Unknown);
        assert_eq!(classifier().classify("   \n\n  ", None), DocumentType::Unknown);
    }

    #[test]
    fn test_classification_never_panics_on_odd_input() {
        let classifier = classifier();
        classifier.classify("\u{FFFD}\u{0000}日本語のテキスト", None);
        classifier.classify("a", Some(""));
        classifier.classify(&"|".repeat(10_000), None);
    }
}
