//! Engine configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! { "term_vocabulary": ["revenue", "net income"], "max_input_length": 200000 }
//! ```

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_MAX_INPUT_LENGTH: usize = 1_000_000;

pub const DEFAULT_TERMS: &[&str] = &[
    "revenue",
    "net income",
    "EBITDA",
    "EPS",
    "assets",
    "liabilities",
    "dividend",
    "profit",
    "cost",
    "cash flow",
    "expenses",
    "total assets",
    "total liabilities",
    "loss",
];

const DEFAULT_CURRENCY_MARKERS: &[&str] = &[
    "₹", "$", "€", "£", "¥", "₩", "₦", "Rs.", "Rs", "USD", "EUR", "GBP", "INR", "JPY",
];

const DEFAULT_SCALE_WORDS: &[&str] = &[
    "crore", "crores", "million", "millions", "billion", "billions", "lakh", "lakhs",
];

const DEFAULT_NEGATION_PHRASES: &[&str] = &["not found", "not available", "not disclosed"];

// Lead-ins for terms that tend to be phrased sparsely ("EBITDA stood at 4.2").
const DEFAULT_FALLBACK_PATTERNS: &[(&str, &str)] = &[
    ("ebitda", r"\bebitda\b"),
    ("eps", r"\b(?:eps|earnings\s+per\s+share)\b"),
    ("profit", r"\bprofits?\b"),
    ("expenses", r"\bexpenses\b"),
    ("cost", r"\bcosts?\b"),
    ("loss", r"\bloss(?:es)?\b"),
];

/// How stage D hands out generic money entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericMoneyPolicy {
    /// Each entity goes to at most one term.
    #[default]
    Consume,
    /// Every unresolved term gets the first entity (legacy behaviour).
    Reuse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoneyGrammarConfig {
    /// Currency symbols or 2-3 letter codes, matched case-insensitively.
    pub currency_markers: Vec<String>,
    pub scale_words: Vec<String>,
    /// Accept a trailing "per share" qualifier.
    pub per_share: bool,
}

impl Default for MoneyGrammarConfig {
    fn default() -> Self {
        MoneyGrammarConfig {
            currency_markers: to_strings(DEFAULT_CURRENCY_MARKERS),
            scale_words: to_strings(DEFAULT_SCALE_WORDS),
            per_share: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Financial terms, in output order.
    pub term_vocabulary: Vec<String>,
    pub money_grammar: MoneyGrammarConfig,
    /// Input is cut to this many characters before analysis.
    pub max_input_length: usize,
    /// Stage C lead-in regex per canonical (lowercase) term.
    pub fallback_patterns: BTreeMap<String, String>,
    pub negation_phrases: Vec<String>,
    /// Company names for the gazetteer recognizer. Empty disables it.
    pub known_companies: Vec<String>,
    pub generic_money_policy: GenericMoneyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            term_vocabulary: to_strings(DEFAULT_TERMS),
            money_grammar: MoneyGrammarConfig::default(),
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            fallback_patterns: DEFAULT_FALLBACK_PATTERNS
                .iter()
                .map(|(term, pattern)| (term.to_string(), pattern.to_string()))
                .collect(),
            negation_phrases: to_strings(DEFAULT_NEGATION_PHRASES),
            known_companies: Vec::new(),
            generic_money_policy: GenericMoneyPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Replace the vocabulary, keeping only fallback patterns for terms that
    /// are still in it.
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.term_vocabulary = terms.into_iter().map(Into::into).collect();
        let canonical: Vec<String> = self
            .term_vocabulary
            .iter()
            .map(|t| canonical_term(t))
            .collect();
        self.fallback_patterns
            .retain(|term, _| canonical.contains(&canonical_term(term)));
        self
    }

    pub fn with_known_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_companies = companies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_input_length(mut self, max_input_length: usize) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    pub fn with_generic_money_policy(mut self, policy: GenericMoneyPolicy) -> Self {
        self.generic_money_policy = policy;
        self
    }

    /// Checks that do not need compiled patterns. Pattern validity is checked
    /// when the engine compiles them.
    pub fn validate(&self) -> Result<()> {
        if self.term_vocabulary.is_empty() {
            return Err(ExtractError::EmptyVocabulary);
        }
        let mut seen = Vec::with_capacity(self.term_vocabulary.len());
        for (idx, term) in self.term_vocabulary.iter().enumerate() {
            let canonical = canonical_term(term);
            if canonical.is_empty() {
                return Err(ExtractError::BlankTerm(idx));
            }
            if seen.contains(&canonical) {
                return Err(ExtractError::DuplicateTerm(canonical));
            }
            seen.push(canonical);
        }
        if self.max_input_length == 0 {
            return Err(ExtractError::ZeroInputLength);
        }
        for term in self.fallback_patterns.keys() {
            if !seen.contains(&canonical_term(term)) {
                return Err(ExtractError::UnknownFallbackTerm(term.clone()));
            }
        }
        Ok(())
    }
}

/// Lowercase, trimmed, single-spaced.
pub fn canonical_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.term_vocabulary.len(), DEFAULT_TERMS.len());
        assert_eq!(config.max_input_length, 1_000_000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "max_input_length": 500, "generic_money_policy": "reuse" }"#,
        )
        .unwrap();
        assert_eq!(config.max_input_length, 500);
        assert_eq!(config.generic_money_policy, GenericMoneyPolicy::Reuse);
        assert_eq!(config.money_grammar, MoneyGrammarConfig::default());
        assert!(config.fallback_patterns.contains_key("ebitda"));
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn test_with_terms_prunes_fallbacks() {
        let config = EngineConfig::default().with_terms(["Revenue", "EBITDA"]);
        assert_eq!(config.term_vocabulary, vec!["Revenue", "EBITDA"]);
        assert_eq!(config.fallback_patterns.len(), 1);
        assert!(config.fallback_patterns.contains_key("ebitda"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fallback_term_rejected() {
        let mut config = EngineConfig::default().with_terms(["revenue"]);
        config
            .fallback_patterns
            .insert("goodwill".to_string(), r"\bgoodwill\b".to_string());
        assert!(matches!(
            config.validate(),
            Err(ExtractError::UnknownFallbackTerm(t)) if t == "goodwill"
        ));
    }

    #[test]
    fn test_vocabulary_checks() {
        let empty = EngineConfig::default().with_terms(Vec::<String>::new());
        assert!(matches!(empty.validate(), Err(ExtractError::EmptyVocabulary)));

        let blank = EngineConfig::default().with_terms(["revenue", "  "]);
        assert!(matches!(blank.validate(), Err(ExtractError::BlankTerm(1))));

        let dup = EngineConfig::default().with_terms(["Net Income", "net  income"]);
        assert!(matches!(
            dup.validate(),
            Err(ExtractError::DuplicateTerm(t)) if t == "net income"
        ));

        let zero = EngineConfig::default().with_max_input_length(0);
        assert!(matches!(zero.validate(), Err(ExtractError::ZeroInputLength)));
    }

    #[test]
    fn test_canonical_term() {
        assert_eq!(canonical_term("  Net   Income "), "net income");
        assert_eq!(canonical_term("EBITDA"), "ebitda");
    }
}
