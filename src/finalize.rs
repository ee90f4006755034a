//! Resolution Finalizer.
//!
//! One value per vocabulary term, in vocabulary order. Unresolved terms are
//! `Not Available` when the term is followed anywhere later in the document by
//! a negation phrase ("not disclosed", ...), otherwise `Not Found`.

use crate::association::AssociationResult;
use crate::entity::UNKNOWN_COMPANY;
use crate::error::{ExtractError, Result};
use crate::terms::TermVocabulary;
use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

pub const NOT_FOUND: &str = "Not Found";
pub const NOT_AVAILABLE: &str = "Not Available";

// =============================================================================
// DATA STRUCTURES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermValue {
    Found(String),
    NotAvailable,
    NotFound,
}

impl TermValue {
    pub fn as_str(&self) -> &str {
        match self {
            TermValue::Found(value) => value,
            TermValue::NotAvailable => NOT_AVAILABLE,
            TermValue::NotFound => NOT_FOUND,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, TermValue::Found(_))
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TermValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Term -> value, in vocabulary order. Serialises as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinancialDetails(Vec<(String, TermValue)>);

impl FinancialDetails {
    pub fn get(&self, term: &str) -> Option<&TermValue> {
        self.0.iter().find(|(t, _)| t == term).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TermValue)> {
        self.0.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FinancialDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (term, value) in &self.0 {
            map.serialize_entry(term, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalRecord {
    pub company_name: String,
    pub financial_details: FinancialDetails,
}

impl FinalRecord {
    /// Record for input that could not be analysed at all.
    pub fn empty(vocabulary: &TermVocabulary) -> Self {
        FinalRecord {
            company_name: UNKNOWN_COMPANY.to_string(),
            financial_details: FinancialDetails(
                vocabulary
                    .iter()
                    .map(|term| (term.to_string(), TermValue::NotFound))
                    .collect(),
            ),
        }
    }
}

// =============================================================================
// FINALIZER
// =============================================================================

#[derive(Debug, Clone)]
pub struct Finalizer {
    /// One `term ... negation` pattern per vocabulary term, in order.
    negations: Vec<(String, Option<Regex>)>,
}

impl Finalizer {
    pub fn new(vocabulary: &TermVocabulary, phrases: &[String]) -> Result<Self> {
        let phrases = phrases
            .iter()
            .map(|p| flexible_words(p))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("|");

        let mut negations = Vec::with_capacity(vocabulary.len());
        for term in vocabulary.iter() {
            let regex = if phrases.is_empty() {
                None
            } else {
                let source = format!(r"(?i){}[\s\S]*?(?:{})", bounded(term), phrases);
                Some(Regex::new(&source).map_err(ExtractError::NegationPattern)?)
            };
            negations.push((term.to_string(), regex));
        }

        Ok(Finalizer { negations })
    }

    pub fn finalize(&self, text: &str, company_name: String, result: &AssociationResult) -> FinalRecord {
        let details = self
            .negations
            .iter()
            .map(|(term, negation)| {
                let value = match result.value(term) {
                    Some(value) => TermValue::Found(value.to_string()),
                    None if negation.as_ref().is_some_and(|re| re.is_match(text)) => {
                        TermValue::NotAvailable
                    }
                    None => TermValue::NotFound,
                };
                (term.clone(), value)
            })
            .collect();

        FinalRecord {
            company_name,
            financial_details: FinancialDetails(details),
        }
    }
}

/// Escaped words joined by `\s+`.
fn flexible_words(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// `flexible_words` with word boundaries on alphanumeric edges.
fn bounded(term: &str) -> String {
    let body = flexible_words(term);
    let lead = if term.starts_with(|c: char| c.is_alphanumeric()) { r"\b" } else { "" };
    let tail = if term.ends_with(|c: char| c.is_alphanumeric()) { r"\b" } else { "" };
    format!("{}{}{}", lead, body, tail)
}
