//! fin-extract - Financial fact extraction engine
//!
//! Pairs financial terms ("revenue", "EBITDA", "total assets") found in prose
//! with the monetary values that refer to them.
//!
//! Architecture:
//! ```text
//! [Document]
//!       ↓
//! ┌──────────────────────────────────────────────┐
//! │  TextAnalyzer     → sentences, tokens, ORGs  │
//! │  EntityRecognizer → COMPANY (gazetteer)      │
//! │  MoneyGrammar     → Vec<MoneyExpression>     │
//! │  TermVocabulary   → Vec<TermOccurrence>      │
//! └──────────────────────────────────────────────┘
//!       ↓
//! ┌──────────────────────────────────────────────┐
//! │  A sentence → B nearest → C pattern → D NER  │  first value wins
//! └──────────────────────────────────────────────┘
//!       ↓ finalize (Not Found / Not Available)
//! [FinalRecord JSON]
//! ```
//!
//! Batches run in parallel (rayon) against one shared [`Engine`].

pub mod analysis;
pub mod analyzer;
pub mod association;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod finalize;
pub mod gazetteer;
pub mod money;
pub mod report;
pub mod terms;

pub use analysis::{DocumentAnalysis, Entity, EntityLabel, EntityRecognizer, Sentence, TextAnalyzer, Token};
pub use analyzer::RuleBasedAnalyzer;
pub use association::{Association, AssociationInput, AssociationResult, Associator, FallbackTable, Stage};
pub use config::{EngineConfig, GenericMoneyPolicy, MoneyGrammarConfig};
pub use engine::{Engine, EngineBuilder, Extraction, Provenance};
pub use entity::{resolve_company, UNKNOWN_COMPANY};
pub use error::{ExtractError, RecognizerError, Result};
pub use finalize::{FinalRecord, FinancialDetails, Finalizer, TermValue, NOT_AVAILABLE, NOT_FOUND};
pub use gazetteer::GazetteerRecognizer;
pub use money::{MoneyExpression, MoneyGrammar};
pub use report::{to_csv_string, to_csv_string_with_labels, write_csv, write_csv_with_labels};
pub use terms::{TermOccurrence, TermVocabulary};
