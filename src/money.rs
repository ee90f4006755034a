//! Money Expression Locator.
//!
//! ```text
//! money := marker \s? number (\s? scale)? (\s+ per share)?
//! ```
//!
//! The grammar is compiled from [`MoneyGrammarConfig`]. Matches are opaque
//! strings: nothing here converts crore/million/billion into numbers.

use crate::config::MoneyGrammarConfig;
use crate::error::{ExtractError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Digits with optional thousands groups and an optional decimal fraction.
/// Groups are `,\d+` so Indian grouping ("1,00,000") stays one number, and a
/// trailing comma is never swallowed.
const NUMBER: &str = r"\d+(?:,\d+)*(?:\.\d+)?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyExpression {
    pub start: usize,
    pub end: usize,
    pub literal: String,
}

impl MoneyExpression {
    /// Four digits in 1900..=2099 with no marker, scale or fraction.
    pub fn is_bare_year(&self) -> bool {
        self.literal.len() == 4
            && self.literal.bytes().all(|b| b.is_ascii_digit())
            && matches!(self.literal.parse::<u16>(), Ok(1900..=2099))
    }

    fn from_match(m: regex::Match<'_>) -> Self {
        MoneyExpression {
            start: m.start(),
            end: m.end(),
            literal: m.as_str().to_string(),
        }
    }
}

/// Compiled money grammar.
#[derive(Debug, Clone)]
pub struct MoneyGrammar {
    marked: Regex,
    bare: Regex,
}

impl MoneyGrammar {
    pub fn compile(config: &MoneyGrammarConfig) -> Result<Self> {
        let markers = alternation(&config.currency_markers);
        if markers.is_empty() {
            return Err(ExtractError::NoCurrencyMarkers);
        }

        let mut core = NUMBER.to_string();
        let scales = alternation(&config.scale_words);
        if !scales.is_empty() {
            core.push_str(&format!(r"(?:\s?(?:{})\b)?", scales));
        }
        if config.per_share {
            core.push_str(r"(?:\s+per\s+share\b)?");
        }

        let marked_source = format!(r"(?:{})\s?{}", markers, core);
        let bare_source = format!(r"(?:(?:{})\s?|\b){}", markers, core);

        let marked = Regex::new(&format!("(?i){}", marked_source))
            .map_err(ExtractError::MoneyGrammar)?;
        let bare =
            Regex::new(&format!("(?i){}", bare_source)).map_err(ExtractError::MoneyGrammar)?;

        Ok(MoneyGrammar { marked, bare })
    }

    /// Lazily locate every marked money expression, in start-offset order.
    pub fn locate<'r, 't>(&'r self, text: &'t str) -> MoneyExpressions<'r, 't> {
        MoneyExpressions {
            matches: self.marked.find_iter(text),
        }
    }

    /// First expression in `text` where the currency marker is optional.
    pub fn find_bare(&self, text: &str) -> Option<MoneyExpression> {
        self.bare.find(text).map(MoneyExpression::from_match)
    }

    /// First marked expression starting at or after byte `start`.
    pub fn find_marked_at(&self, text: &str, start: usize) -> Option<MoneyExpression> {
        self.marked.find_at(text, start).map(MoneyExpression::from_match)
    }

    /// First marker-optional figure starting at or after byte `start` that is
    /// not a bare year ("FY 2023").
    pub fn find_bare_figure_at(&self, text: &str, start: usize) -> Option<MoneyExpression> {
        let mut at = start;
        while let Some(m) = self.bare.find_at(text, at) {
            let expression = MoneyExpression::from_match(m);
            if !expression.is_bare_year() {
                return Some(expression);
            }
            at = m.end();
        }
        None
    }
}

/// Iterator returned by [`MoneyGrammar::locate`].
pub struct MoneyExpressions<'r, 't> {
    matches: regex::Matches<'r, 't>,
}

impl Iterator for MoneyExpressions<'_, '_> {
    type Item = MoneyExpression;

    fn next(&mut self) -> Option<Self::Item> {
        self.matches.next().map(MoneyExpression::from_match)
    }
}

/// Escaped alternation, longest alternative first. Alternatives starting with
/// a letter or digit must begin on a word boundary ("Rs" must not fire inside
/// "hours 5"). Internal whitespace matches any run of whitespace.
fn alternation(words: &[String]) -> String {
    let mut words: Vec<&str> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));

    words
        .iter()
        .map(|w| {
            let escaped = w
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            if w.starts_with(|c: char| c.is_alphanumeric()) {
                format!(r"\b{}", escaped)
            } else {
                escaped
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}
