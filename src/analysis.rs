//! Collaborator boundary.
//!
//! The engine does not segment or classify text itself. A [`TextAnalyzer`]
//! hands it sentences, tokens and generic entities; an optional
//! [`EntityRecognizer`] hands it domain entities (companies, terms, money).

use crate::error::RecognizerError;
use serde::{Deserialize, Serialize};

// =============================================================================
// DATA STRUCTURES
// =============================================================================

/// A sentence as a half-open byte range into the analysed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: usize,
    pub start: usize,
    pub end: usize,
}

impl Sentence {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub sentence_id: usize,
}

impl Token {
    pub fn text<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    /// Domain recognizer: the subject company.
    Company,
    /// Domain recognizer: a financial term.
    FinancialTerm,
    /// Either recognizer: a monetary amount.
    Money,
    /// Generic recognizer: any organization.
    Organization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Everything the general-purpose collaborator produces for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub sentences: Vec<Sentence>,
    pub tokens: Vec<Token>,
    pub generic_entities: Vec<Entity>,
}

impl DocumentAnalysis {
    /// Id of the sentence containing `offset`, if any.
    pub fn sentence_at(&self, offset: usize) -> Option<usize> {
        sentence_at(&self.sentences, offset)
    }
}

/// Binary search over sentences ordered by start offset.
pub fn sentence_at(sentences: &[Sentence], offset: usize) -> Option<usize> {
    let idx = sentences.partition_point(|s| s.start <= offset);
    if idx == 0 {
        return None;
    }
    let sentence = &sentences[idx - 1];
    sentence.contains(offset).then_some(sentence.id)
}

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// General-purpose text analysis: segmentation plus generic entities.
pub trait TextAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, text: &str) -> DocumentAnalysis;

    /// Tokenize a short string (used once per vocabulary term).
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// Specialized recognizer for domain entities.
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, text: &str) -> Result<Vec<Entity>, RecognizerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences() -> Vec<Sentence> {
        vec![
            Sentence { id: 0, start: 0, end: 10 },
            Sentence { id: 1, start: 10, end: 25 },
            Sentence { id: 2, start: 30, end: 40 },
        ]
    }

    #[test]
    fn test_sentence_lookup() {
        let s = sentences();
        assert_eq!(sentence_at(&s, 0), Some(0));
        assert_eq!(sentence_at(&s, 9), Some(0));
        assert_eq!(sentence_at(&s, 10), Some(1));
        assert_eq!(sentence_at(&s, 27), None);
        assert_eq!(sentence_at(&s, 39), Some(2));
        assert_eq!(sentence_at(&s, 40), None);
        assert_eq!(sentence_at(&[], 3), None);
    }

    #[test]
    fn test_entity_overlap() {
        let e = Entity {
            text: "$5".to_string(),
            label: EntityLabel::Money,
            start: 4,
            end: 6,
        };
        assert!(e.overlaps(5, 9));
        assert!(e.overlaps(0, 5));
        assert!(!e.overlaps(6, 9));
        assert!(!e.overlaps(0, 4));
    }
}
