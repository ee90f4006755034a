//! Term Occurrence Locator.
//!
//! Vocabulary terms are tokenized once. Documents are scanned longest term
//! first; every matched token is marked consumed so a shorter term can never
//! claim part of a longer match ("assets" inside "total assets").

use crate::analysis::{TextAnalyzer, Token};
use crate::config::canonical_term;
use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOccurrence {
    /// Canonical (lowercase) vocabulary term.
    pub term: String,
    pub start: usize,
    pub end: usize,
    pub sentence_id: usize,
}

#[derive(Debug, Clone)]
struct VocabularyTerm {
    canonical: String,
    tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TermVocabulary {
    terms: Vec<VocabularyTerm>,
    /// Indices into `terms`, longest first.
    match_order: Vec<usize>,
}

impl TermVocabulary {
    pub fn new(terms: &[String], analyzer: &dyn TextAnalyzer) -> Result<Self> {
        if terms.is_empty() {
            return Err(ExtractError::EmptyVocabulary);
        }

        let mut compiled: Vec<VocabularyTerm> = Vec::with_capacity(terms.len());
        for (idx, term) in terms.iter().enumerate() {
            let canonical = canonical_term(term);
            let tokens: Vec<String> = analyzer
                .tokenize(&canonical)
                .iter()
                .map(|t| t.text(&canonical).to_string())
                .collect();
            if tokens.is_empty() {
                return Err(ExtractError::BlankTerm(idx));
            }
            if compiled.iter().any(|t| t.canonical == canonical) {
                return Err(ExtractError::DuplicateTerm(canonical));
            }
            compiled.push(VocabularyTerm { canonical, tokens });
        }

        let mut match_order: Vec<usize> = (0..compiled.len()).collect();
        match_order.sort_by_key(|&i| {
            (
                Reverse(compiled[i].tokens.len()),
                Reverse(compiled[i].canonical.chars().count()),
            )
        });

        Ok(TermVocabulary {
            terms: compiled,
            match_order,
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical terms in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.canonical.as_str())
    }

    pub fn contains(&self, term: &str) -> bool {
        let canonical = canonical_term(term);
        self.terms.iter().any(|t| t.canonical == canonical)
    }

    /// All occurrences of vocabulary terms in `text`, ordered by start offset.
    pub fn locate(&self, text: &str, tokens: &[Token]) -> Vec<TermOccurrence> {
        let lowered: Vec<String> = tokens.iter().map(|t| t.text(text).to_lowercase()).collect();
        let mut consumed = vec![false; tokens.len()];
        let mut occurrences = Vec::new();

        for &idx in &self.match_order {
            let term = &self.terms[idx];
            let width = term.tokens.len();
            if width > tokens.len() {
                continue;
            }

            let mut pos = 0;
            while pos + width <= tokens.len() {
                let window = pos..pos + width;
                let sentence_id = tokens[pos].sentence_id;
                let is_match = consumed[window.clone()].iter().all(|c| !c)
                    && tokens[window.clone()]
                        .iter()
                        .all(|t| t.sentence_id == sentence_id)
                    && lowered[window.clone()]
                        .iter()
                        .zip(&term.tokens)
                        .all(|(have, want)| have == want);

                if is_match {
                    consumed[window.clone()].iter_mut().for_each(|c| *c = true);
                    occurrences.push(TermOccurrence {
                        term: term.canonical.clone(),
                        start: tokens[pos].start,
                        end: tokens[pos + width - 1].end,
                        sentence_id,
                    });
                    pos += width;
                } else {
                    pos += 1;
                }
            }
        }

        occurrences.sort_by_key(|o| o.start);
        occurrences
    }
}
