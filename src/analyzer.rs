//! Rule-based general-purpose analyzer.
//!
//! ```text
//! [text]
//!    ├─ UAX #29 sentences ─→ Vec<Sentence>
//!    ├─ UAX #29 words     ─→ Vec<Token>      (whitespace dropped)
//!    └─ regex patterns    ─→ Vec<Entity>     (Organization, Money)
//! ```

use crate::analysis::{DocumentAnalysis, Entity, EntityLabel, Sentence, TextAnalyzer, Token};
use lazy_static::lazy_static;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

// =============================================================================
// REGEX PATTERNS (compiled once)
// =============================================================================

lazy_static! {
    // Organizations
    static ref ORG_PATTERNS: Vec<Regex> = vec![
        // Company suffixes: Acme Holdings Inc, ABC Corp
        Regex::new(r"\b([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*)*\s+(?:Inc|Corp|LLC|Ltd|LLP|Plc|PLC|Co|Company|Corporation|Group|Holdings|Partners|Industries|Bank|Capital|Ventures|International|Limited|Enterprises)\.?)\b").unwrap(),
        // The X Foundation/Trust
        Regex::new(r"\b(The\s+[A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)*\s+(?:Foundation|Trust|Fund|Association|Society))\b").unwrap(),
    ];

    // Money amounts
    static ref AMOUNT_PATTERNS: Vec<Regex> = vec![
        // $X million/billion
        Regex::new(r"(?:\$|USD|EUR|€|£|₹)\s*\d+(?:\.\d+)?\s*(?:million|billion|thousand|crore|lakhs?)\b").unwrap(),
        // X million dollars
        Regex::new(r"\b\d+(?:\.\d+)?\s*(?:million|billion|thousand|crore|lakhs?)\s*(?:dollars?|USD|euros?|EUR|pounds?|GBP|rupees?|INR)\b").unwrap(),
        // $1,234.56 or $1234.56
        Regex::new(r"(?:\$|USD|EUR|€|£|GBP|¥|JPY|₹|INR)\s*\d{1,3}(?:,\d{3})*(?:\.\d{2})?").unwrap(),
        // 1,234.56 USD
        Regex::new(r"\b\d{1,3}(?:,\d{3})*(?:\.\d{2})?\s*(?:USD|EUR|GBP|JPY|INR|dollars?|euros?|pounds?|rupees?)\b").unwrap(),
    ];
}

// =============================================================================
// ANALYZER
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAnalyzer;

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        RuleBasedAnalyzer
    }
}

impl TextAnalyzer for RuleBasedAnalyzer {
    fn name(&self) -> &str {
        "rule-based"
    }

    fn analyze(&self, text: &str) -> DocumentAnalysis {
        let sentences = split_sentences(text);
        let tokens = tokenize_with(text, &sentences);

        let mut generic_entities = extract_with_patterns(text, &ORG_PATTERNS, EntityLabel::Organization);
        generic_entities.extend(extract_with_patterns(text, &AMOUNT_PATTERNS, EntityLabel::Money));
        generic_entities.sort_by_key(|e| (e.start, e.end));

        DocumentAnalysis {
            sentences,
            tokens,
            generic_entities,
        }
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        word_tokens(text, |_| 0)
    }
}

fn split_sentences(text: &str) -> Vec<Sentence> {
    text.split_sentence_bound_indices()
        .filter(|(_, s)| !s.trim().is_empty())
        .enumerate()
        .map(|(id, (start, s))| Sentence {
            id,
            start,
            end: start + s.len(),
        })
        .collect()
}

fn tokenize_with(text: &str, sentences: &[Sentence]) -> Vec<Token> {
    // Tokens arrive in order, so the owning sentence only moves forward.
    let mut current = 0;
    word_tokens(text, |offset| {
        while current + 1 < sentences.len() && !sentences[current].contains(offset) {
            current += 1;
        }
        sentences.get(current).map(|s| s.id).unwrap_or(0)
    })
}

fn word_tokens(text: &str, mut sentence_of: impl FnMut(usize) -> usize) -> Vec<Token> {
    text.split_word_bound_indices()
        .filter(|(_, w)| !w.trim().is_empty())
        .map(|(start, w)| Token {
            start,
            end: start + w.len(),
            sentence_id: sentence_of(start),
        })
        .collect()
}

/// Run every pattern, keeping the first match for any overlapping span.
fn extract_with_patterns(text: &str, patterns: &[Regex], label: EntityLabel) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();

    for pattern in patterns {
        for m in pattern.find_iter(text) {
            let value = m.as_str().trim();
            if value.is_empty() || entities.iter().any(|e| e.overlaps(m.start(), m.end())) {
                continue;
            }
            entities.push(Entity {
                text: value.to_string(),
                label,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    entities
}
