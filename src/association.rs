//! Association Engine.
//!
//! Pairs term occurrences with money expressions through a fallback chain:
//!
//! ```text
//! A  Sentence       first unclaimed money expression in the same sentence
//! B  Nearest        closest money expression anywhere (|Δ start|, then earliest)
//! C  Pattern        term-specific lead-in, then the next money (marked first, never a year)
//! D  GenericEntity  next unconsumed MONEY entity from the generic recognizer
//! ```
//!
//! Every stage skips terms that already have a value, so the first assignment
//! made for a term is final regardless of the order stages run in.

use crate::analysis::{sentence_at, Entity, EntityLabel, Sentence};
use crate::config::{canonical_term, GenericMoneyPolicy};
use crate::error::{ExtractError, Result};
use crate::money::{MoneyExpression, MoneyGrammar};
use crate::terms::{TermOccurrence, TermVocabulary};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

// =============================================================================
// DATA STRUCTURES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sentence,
    Nearest,
    Pattern,
    GenericEntity,
}

impl Stage {
    /// The default chain, strictest first.
    pub const CHAIN: [Stage; 4] = [
        Stage::Sentence,
        Stage::Nearest,
        Stage::Pattern,
        Stage::GenericEntity,
    ];
}

/// A value chosen for a term, with the span it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub stage: Stage,
}

impl Association {
    fn from_money(money: &MoneyExpression, stage: Stage) -> Self {
        Association {
            value: money.literal.clone(),
            start: money.start,
            end: money.end,
            stage,
        }
    }

    fn from_entity(entity: &Entity, stage: Stage) -> Self {
        Association {
            value: entity.text.clone(),
            start: entity.start,
            end: entity.end,
            stage,
        }
    }
}

/// Canonical term -> association. Write-once per term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationResult {
    values: HashMap<String, Association>,
}

impl AssociationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `association` for `term` unless the term already has a value.
    /// Blank values are never stored. Returns whether it was recorded.
    pub fn assign(&mut self, term: &str, association: Association) -> bool {
        if association.value.trim().is_empty() {
            return false;
        }
        match self.values.entry(term.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(association);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, term: &str) -> Option<&Association> {
        self.values.get(term)
    }

    pub fn value(&self, term: &str) -> Option<&str> {
        self.get(term).map(|a| a.value.as_str())
    }

    pub fn is_resolved(&self, term: &str) -> bool {
        self.values.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn overlaps_assigned(&self, start: usize, end: usize) -> bool {
        self.values.values().any(|a| a.start < end && start < a.end)
    }
}

// =============================================================================
// FALLBACK TABLE (stage C)
// =============================================================================

#[derive(Debug, Clone)]
struct FallbackPattern {
    term: String,
    lead: Regex,
}

impl FallbackPattern {
    /// Value following the first lead-in. Preference, from the end of the
    /// lead-in onwards:
    ///
    /// 1. marked money in the lead-in's sentence
    /// 2. bare figure (never a year) in the lead-in's sentence
    /// 3. marked money anywhere later
    /// 4. bare figure anywhere later
    fn search(
        &self,
        text: &str,
        sentences: &[Sentence],
        grammar: &MoneyGrammar,
    ) -> Option<MoneyExpression> {
        let lead = self.lead.find(text)?;
        let limit = sentence_at(sentences, lead.start())
            .and_then(|id| sentences.iter().find(|s| s.id == id))
            .map_or(text.len(), |s| s.end);

        let marked = grammar.find_marked_at(text, lead.end());
        let bare = grammar.find_bare_figure_at(text, lead.end());

        marked
            .clone()
            .filter(|m| m.start < limit)
            .or_else(|| bare.clone().filter(|m| m.start < limit))
            .or(marked)
            .or(bare)
    }
}

/// Declarative `term -> lead-in` table, searched with the money grammar.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    /// In vocabulary order.
    patterns: Vec<FallbackPattern>,
    grammar: MoneyGrammar,
}

impl FallbackTable {
    pub fn compile(
        leads: &BTreeMap<String, String>,
        vocabulary: &TermVocabulary,
        grammar: &MoneyGrammar,
    ) -> Result<Self> {
        let mut by_term: HashMap<String, &str> = HashMap::new();
        for (term, lead) in leads {
            if !vocabulary.contains(term) {
                return Err(ExtractError::UnknownFallbackTerm(term.clone()));
            }
            by_term.insert(canonical_term(term), lead.as_str());
        }

        let mut patterns = Vec::with_capacity(by_term.len());
        for term in vocabulary.iter() {
            let Some(lead) = by_term.get(term) else {
                continue;
            };
            let lead = Regex::new(&format!("(?i)(?:{})", lead)).map_err(|source| {
                ExtractError::FallbackPattern {
                    term: term.to_string(),
                    source,
                }
            })?;
            patterns.push(FallbackPattern {
                term: term.to_string(),
                lead,
            });
        }

        Ok(FallbackTable {
            patterns,
            grammar: grammar.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.term.as_str())
    }
}

// =============================================================================
// ASSOCIATOR
// =============================================================================

/// Per-document inputs. `occurrences` and `money` must be ordered by start
/// offset; `sentences` by start offset with non-overlapping ranges.
#[derive(Debug, Clone, Copy)]
pub struct AssociationInput<'a> {
    pub text: &'a str,
    pub sentences: &'a [Sentence],
    pub occurrences: &'a [TermOccurrence],
    pub money: &'a [MoneyExpression],
    pub generic_entities: &'a [Entity],
}

pub struct Associator<'c> {
    vocabulary: &'c TermVocabulary,
    fallbacks: &'c FallbackTable,
    policy: GenericMoneyPolicy,
}

impl<'c> Associator<'c> {
    pub fn new(
        vocabulary: &'c TermVocabulary,
        fallbacks: &'c FallbackTable,
        policy: GenericMoneyPolicy,
    ) -> Self {
        Associator {
            vocabulary,
            fallbacks,
            policy,
        }
    }

    /// Run the default chain.
    pub fn run(&self, input: &AssociationInput<'_>) -> AssociationResult {
        self.run_stages(input, &Stage::CHAIN)
    }

    pub fn run_stages(&self, input: &AssociationInput<'_>, stages: &[Stage]) -> AssociationResult {
        let mut result = AssociationResult::new();
        for &stage in stages {
            let assigned = self.apply(stage, input, &mut result);
            trace!(?stage, assigned, "association stage finished");
        }
        result
    }

    /// Run one stage against `result`. Returns how many terms it resolved.
    pub fn apply(
        &self,
        stage: Stage,
        input: &AssociationInput<'_>,
        result: &mut AssociationResult,
    ) -> usize {
        match stage {
            Stage::Sentence => self.sentence_scoped(input, result),
            Stage::Nearest => self.nearest(input, result),
            Stage::Pattern => self.pattern(input, result),
            Stage::GenericEntity => self.generic_entity(input, result),
        }
    }

    fn sentence_scoped(&self, input: &AssociationInput<'_>, result: &mut AssociationResult) -> usize {
        let mut by_sentence: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, money) in input.money.iter().enumerate() {
            if let Some(id) = sentence_at(input.sentences, money.start) {
                by_sentence.entry(id).or_default().push(idx);
            }
        }

        let mut claimed = vec![false; input.money.len()];
        let mut assigned = 0;
        for occurrence in input.occurrences {
            if result.is_resolved(&occurrence.term) {
                continue;
            }
            let Some(candidates) = by_sentence.get(&occurrence.sentence_id) else {
                continue;
            };
            if let Some(&idx) = candidates.iter().find(|&&idx| !claimed[idx]) {
                claimed[idx] = true;
                let association = Association::from_money(&input.money[idx], Stage::Sentence);
                if result.assign(&occurrence.term, association) {
                    assigned += 1;
                }
            }
        }
        assigned
    }

    fn nearest(&self, input: &AssociationInput<'_>, result: &mut AssociationResult) -> usize {
        let mut assigned = 0;
        for occurrence in input.occurrences {
            if result.is_resolved(&occurrence.term) {
                continue;
            }
            let closest = input
                .money
                .iter()
                .min_by_key(|m| (m.start.abs_diff(occurrence.start), m.start));
            if let Some(money) = closest {
                if result.assign(&occurrence.term, Association::from_money(money, Stage::Nearest)) {
                    assigned += 1;
                }
            }
        }
        assigned
    }

    fn pattern(&self, input: &AssociationInput<'_>, result: &mut AssociationResult) -> usize {
        let mut assigned = 0;
        for pattern in &self.fallbacks.patterns {
            if result.is_resolved(&pattern.term) {
                continue;
            }
            let Some(money) = pattern.search(input.text, input.sentences, &self.fallbacks.grammar)
            else {
                continue;
            };
            let association = Association::from_money(&money, Stage::Pattern);
            if result.assign(&pattern.term, association) {
                assigned += 1;
            }
        }
        assigned
    }

    fn generic_entity(&self, input: &AssociationInput<'_>, result: &mut AssociationResult) -> usize {
        let mut money: Vec<&Entity> = input
            .generic_entities
            .iter()
            .filter(|e| e.label == EntityLabel::Money)
            .collect();
        money.sort_by_key(|e| e.start);
        if money.is_empty() {
            return 0;
        }

        let mentioned: HashSet<&str> = input.occurrences.iter().map(|o| o.term.as_str()).collect();
        let mut consumed = vec![false; money.len()];
        let mut assigned = 0;

        for term in self.vocabulary.iter() {
            if !mentioned.contains(term) || result.is_resolved(term) {
                continue;
            }
            let pick = match self.policy {
                GenericMoneyPolicy::Reuse => Some(0),
                GenericMoneyPolicy::Consume => (0..money.len())
                    .find(|&i| !consumed[i] && !result.overlaps_assigned(money[i].start, money[i].end)),
            };
            let Some(idx) = pick else {
                break;
            };
            if result.assign(term, Association::from_entity(money[idx], Stage::GenericEntity)) {
                assigned += 1;
                if self.policy == GenericMoneyPolicy::Consume {
                    consumed[idx] = true;
                }
            }
        }
        assigned
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::analysis::{DocumentAnalysis, TextAnalyzer};
    use crate::analyzer::RuleBasedAnalyzer;
    use crate::config::EngineConfig;
    use proptest::prelude::*;

    const TERMS: &[&str] = &["revenue", "net income", "profit", "ebitda", "loss"];

    fn arb_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(TERMS).prop_map(str::to_string),
            prop::sample::select(vec![
                "$5 million",
                "₹120 crore",
                "€3.5 billion",
                "Rs. 40 lakhs",
                "12.40",
                "7 million dollars",
            ])
            .prop_map(str::to_string),
            prop::sample::select(vec!["was", "rose to", "and", "the", "stood at", "after"])
                .prop_map(str::to_string),
        ]
    }

    fn arb_prose() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::collection::vec(arb_fragment(), 1..8), 1..5).prop_map(
            |sentences| {
                sentences
                    .into_iter()
                    .map(|words| {
                        let mut s = words.join(" ");
                        s.push('.');
                        s
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            },
        )
    }

    /// Sentence scope picks "$1 million"; distance and generic entities pick
    /// "$8 million".
    fn arb_conflict() -> impl Strategy<Value = String> {
        (2usize..8).prop_map(|k| {
            format!("$8 million came first. Revenue{} was $1 million.", ", as noted".repeat(k))
        })
    }

    fn arb_document() -> impl Strategy<Value = String> {
        prop_oneof![3 => arb_prose(), 1 => arb_conflict()]
    }

    fn arb_stage_order() -> impl Strategy<Value = Vec<Stage>> {
        Just(Stage::CHAIN.to_vec()).prop_shuffle()
    }

    struct Prepared {
        text: String,
        analysis: DocumentAnalysis,
        money: Vec<MoneyExpression>,
        occurrences: Vec<TermOccurrence>,
        vocabulary: TermVocabulary,
        fallbacks: FallbackTable,
    }

    impl Prepared {
        fn new(text: &str) -> Self {
            let config = EngineConfig::default().with_terms(TERMS.iter().copied());
            let analyzer = RuleBasedAnalyzer::new();
            let grammar = MoneyGrammar::compile(&config.money_grammar).unwrap();
            let vocabulary = TermVocabulary::new(&config.term_vocabulary, &analyzer).unwrap();
            let fallbacks =
                FallbackTable::compile(&config.fallback_patterns, &vocabulary, &grammar).unwrap();
            let analysis = analyzer.analyze(text);
            let money = grammar.locate(text).collect();
            let occurrences = vocabulary.locate(text, &analysis.tokens);
            Prepared {
                text: text.to_string(),
                analysis,
                money,
                occurrences,
                vocabulary,
                fallbacks,
            }
        }

        fn input(&self) -> AssociationInput<'_> {
            AssociationInput {
                text: &self.text,
                sentences: &self.analysis.sentences,
                occurrences: &self.occurrences,
                money: &self.money,
                generic_entities: &self.analysis.generic_entities,
            }
        }

        fn associator(&self) -> Associator<'_> {
            Associator::new(&self.vocabulary, &self.fallbacks, GenericMoneyPolicy::Consume)
        }
    }

    proptest! {
        /// A value assigned by an earlier stage of any order survives every
        /// later stage, and the first stage behaves exactly as it does alone.
        #[test]
        fn first_assignment_persists(text in arb_document(), order in arb_stage_order()) {
            let doc = Prepared::new(&text);
            let input = doc.input();
            let associator = doc.associator();
            let full = associator.run_stages(&input, &order);

            for end in 1..=order.len() {
                let prefix = associator.run_stages(&input, &order[..end]);
                for term in doc.vocabulary.iter() {
                    if let Some(assoc) = prefix.get(term) {
                        prop_assert_eq!(full.get(term), Some(assoc), "term {} after {:?}", term, &order[..end]);
                    }
                }
            }

            let alone = associator.run_stages(&input, &order[..1]);
            for term in doc.vocabulary.iter() {
                if let Some(assoc) = alone.get(term) {
                    prop_assert_eq!(full.get(term), Some(assoc));
                    prop_assert_eq!(assoc.stage, order[0]);
                }
            }
        }

        /// Stages that disagree on a term: the first one in the order decides.
        #[test]
        fn first_stage_decides_conflicts(text in arb_conflict(), order in arb_stage_order()) {
            let doc = Prepared::new(&text);
            let input = doc.input();
            let associator = doc.associator();

            let by_sentence = associator.run_stages(&input, &[Stage::Sentence]);
            let by_distance = associator.run_stages(&input, &[Stage::Nearest]);
            prop_assert_eq!(by_sentence.value("revenue"), Some("$1 million"));
            prop_assert_eq!(by_distance.value("revenue"), Some("$8 million"));

            let first = order
                .iter()
                .copied()
                .find(|&stage| associator.run_stages(&input, &[stage]).get("revenue").is_some());
            prop_assert!(first.is_some());
            let first = first.unwrap_or(Stage::Sentence);
            let expected = associator.run_stages(&input, &[first]);

            let full = associator.run_stages(&input, &order);
            prop_assert_eq!(full.get("revenue"), expected.get("revenue"));
            prop_assert_eq!(full.get("revenue").map(|a| a.stage), Some(first));
        }

        #[test]
        fn chain_is_deterministic(text in arb_document()) {
            let doc = Prepared::new(&text);
            let input = doc.input();
            let associator = doc.associator();
            prop_assert_eq!(associator.run(&input), associator.run(&input));
        }
    }
}
