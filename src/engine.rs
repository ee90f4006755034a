//! Engine facade.
//!
//! ```text
//! [text] ─ truncate ─┬─ TextAnalyzer ──→ sentences, tokens, generic entities
//!                    ├─ EntityRecognizer (optional) ──→ domain entities
//!                    ├─ MoneyGrammar ──→ money expressions
//!                    └─ TermVocabulary ──→ term occurrences
//!                              ↓
//!                    Associator (A → B → C → D)
//!                              ↓
//!                    Finalizer ──→ FinalRecord
//! ```
//!
//! An [`Engine`] is compiled once from an [`EngineConfig`] and is immutable
//! afterwards, so one instance can serve any number of threads.

use crate::analysis::{DocumentAnalysis, Entity, EntityRecognizer, TextAnalyzer};
use crate::analyzer::RuleBasedAnalyzer;
use crate::association::{Association, AssociationInput, Associator, FallbackTable, Stage};
use crate::config::EngineConfig;
use crate::entity::resolve_company;
use crate::error::Result;
use crate::finalize::{FinalRecord, Finalizer};
use crate::gazetteer::GazetteerRecognizer;
use crate::money::{MoneyExpression, MoneyGrammar};
use crate::terms::TermVocabulary;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// DATA STRUCTURES
// =============================================================================

/// Where a term's value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub term: String,
    pub value: String,
    pub stage: Stage,
    pub start: usize,
    pub end: usize,
}

/// A [`FinalRecord`] plus how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub record: FinalRecord,
    /// Resolved terms only, in vocabulary order.
    pub provenance: Vec<Provenance>,
    /// Input was longer than `max_input_length` and was cut.
    pub truncated: bool,
    /// Set when the domain recognizer failed and the generic chain was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct Engine {
    config: EngineConfig,
    vocabulary: TermVocabulary,
    grammar: MoneyGrammar,
    fallbacks: FallbackTable,
    finalizer: Finalizer,
    analyzer: Arc<dyn TextAnalyzer>,
    recognizer: Option<Arc<dyn EntityRecognizer>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("terms", &self.vocabulary.len())
            .field("analyzer", &self.analyzer.name())
            .field("recognizer", &self.recognizer_name())
            .finish()
    }
}

impl Engine {
    /// Compile `config` with the built-in collaborators.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            analyzer: None,
            recognizer: RecognizerChoice::FromConfig,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &TermVocabulary {
        &self.vocabulary
    }

    pub fn analyzer_name(&self) -> &str {
        self.analyzer.name()
    }

    pub fn recognizer_name(&self) -> Option<&str> {
        self.recognizer.as_deref().map(|r| r.name())
    }

    pub fn extract(&self, text: &str) -> FinalRecord {
        self.extract_detailed(text).record
    }

    /// Non-UTF-8 input yields the empty record.
    pub fn extract_bytes(&self, bytes: &[u8]) -> FinalRecord {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.extract(text),
            Err(err) => {
                debug!(valid_up_to = err.valid_up_to(), "input is not UTF-8");
                FinalRecord::empty(&self.vocabulary)
            }
        }
    }

    pub fn extract_detailed(&self, text: &str) -> Extraction {
        let (text, truncated) = truncate_chars(text, self.config.max_input_length);
        if text.trim().is_empty() {
            return Extraction {
                record: FinalRecord::empty(&self.vocabulary),
                provenance: Vec::new(),
                truncated,
                degraded: None,
            };
        }

        let analysis = self.analyzer.analyze(text);
        let (domain, degraded) = match self.recognizer.as_deref().map(|r| r.recognize(text)) {
            Some(Ok(entities)) => (Some(entities), None),
            Some(Err(err)) => (None, Some(err.to_string())),
            None => (None, None),
        };

        let mut extraction = self.extract_from_analysis(text, &analysis, domain.as_deref());
        extraction.truncated = truncated;
        extraction.degraded = degraded;
        extraction
    }

    /// Run the pipeline on collaborator products the caller already has.
    /// `analysis` and `domain_entities` must refer to `text` as given; no
    /// truncation happens here.
    pub fn extract_from_analysis(
        &self,
        text: &str,
        analysis: &DocumentAnalysis,
        domain_entities: Option<&[Entity]>,
    ) -> Extraction {
        let money: Vec<MoneyExpression> = self.grammar.locate(text).collect();
        let occurrences = self.vocabulary.locate(text, &analysis.tokens);

        let input = AssociationInput {
            text,
            sentences: &analysis.sentences,
            occurrences: &occurrences,
            money: &money,
            generic_entities: &analysis.generic_entities,
        };
        let associator = Associator::new(
            &self.vocabulary,
            &self.fallbacks,
            self.config.generic_money_policy,
        );
        let result = associator.run(&input);

        let company = resolve_company(domain_entities, &analysis.generic_entities);
        let record = self.finalizer.finalize(text, company, &result);

        let provenance = self
            .vocabulary
            .iter()
            .filter_map(|term| result.get(term).map(|a| provenance(term, a)))
            .collect::<Vec<_>>();

        debug!(
            sentences = analysis.sentences.len(),
            occurrences = occurrences.len(),
            money = money.len(),
            resolved = provenance.len(),
            "extraction finished"
        );

        Extraction {
            record,
            provenance,
            truncated: false,
            degraded: None,
        }
    }

    /// Extract every document in parallel. Output order follows input order.
    pub fn extract_batch<S>(&self, documents: &[S]) -> Vec<FinalRecord>
    where
        S: AsRef<str> + Sync,
    {
        documents
            .par_iter()
            .map(|doc| self.extract(doc.as_ref()))
            .collect()
    }
}

fn provenance(term: &str, association: &Association) -> Provenance {
    Provenance {
        term: term.to_string(),
        value: association.value.clone(),
        stage: association.stage,
        start: association.start,
        end: association.end,
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

// =============================================================================
// BUILDER
// =============================================================================

enum RecognizerChoice {
    /// Gazetteer when `known_companies` is non-empty.
    FromConfig,
    Custom(Arc<dyn EntityRecognizer>),
    Disabled,
}

pub struct EngineBuilder {
    config: EngineConfig,
    analyzer: Option<Arc<dyn TextAnalyzer>>,
    recognizer: RecognizerChoice,
}

impl EngineBuilder {
    pub fn with_analyzer(mut self, analyzer: Arc<dyn TextAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.recognizer = RecognizerChoice::Custom(recognizer);
        self
    }

    pub fn without_recognizer(mut self) -> Self {
        self.recognizer = RecognizerChoice::Disabled;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        config.validate()?;

        let analyzer: Arc<dyn TextAnalyzer> = match self.analyzer {
            Some(analyzer) => analyzer,
            None => Arc::new(RuleBasedAnalyzer::new()),
        };
        let vocabulary = TermVocabulary::new(&config.term_vocabulary, analyzer.as_ref())?;
        let grammar = MoneyGrammar::compile(&config.money_grammar)?;
        let fallbacks = FallbackTable::compile(&config.fallback_patterns, &vocabulary, &grammar)?;
        let finalizer = Finalizer::new(&vocabulary, &config.negation_phrases)?;

        let recognizer: Option<Arc<dyn EntityRecognizer>> = match self.recognizer {
            RecognizerChoice::FromConfig if config.known_companies.is_empty() => None,
            RecognizerChoice::FromConfig => {
                let gazetteer = GazetteerRecognizer::new(&config.known_companies)?;
                Some(Arc::new(gazetteer))
            }
            RecognizerChoice::Custom(recognizer) => Some(recognizer),
            RecognizerChoice::Disabled => None,
        };

        debug!(
            terms = vocabulary.len(),
            fallbacks = fallbacks.len(),
            analyzer = analyzer.name(),
            recognizer = recognizer.as_deref().map(|r| r.name()).unwrap_or("none"),
            "engine compiled"
        );

        Ok(Engine {
            config,
            vocabulary,
            grammar,
            fallbacks,
            finalizer,
            analyzer,
            recognizer,
        })
    }
}
