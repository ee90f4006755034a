//! Company gazetteer acting as the specialized recognizer.
//!
//! Known company names are matched as whole words, case-insensitively, longest
//! name first. Matches carry the gazetteer's own spelling.

use crate::analysis::{Entity, EntityLabel, EntityRecognizer};
use crate::error::{ExtractError, RecognizerError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;

pub struct GazetteerRecognizer {
    pattern: Regex,
    /// Lowercased name -> canonical spelling.
    canonical: HashMap<String, String>,
}

impl GazetteerRecognizer {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical = HashMap::new();
        let mut names_sorted: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                continue;
            }
            let key = name.to_lowercase();
            if !canonical.contains_key(&key) {
                canonical.insert(key, name.clone());
                names_sorted.push(name);
            }
        }
        if names_sorted.is_empty() {
            return Err(ExtractError::Gazetteer("no company names given".to_string()));
        }
        names_sorted.sort_by_key(|n| std::cmp::Reverse(n.chars().count()));

        let alternation = names_sorted
            .iter()
            .map(|n| {
                let body = n
                    .split(' ')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+");
                let lead = if n.starts_with(|c: char| c.is_alphanumeric()) { r"\b" } else { "" };
                let tail = if n.ends_with(|c: char| c.is_alphanumeric()) { r"\b" } else { "" };
                format!("{}{}{}", lead, body, tail)
            })
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!("(?i)(?:{})", alternation))
            .map_err(|e| ExtractError::Gazetteer(e.to_string()))?;

        Ok(GazetteerRecognizer { pattern, canonical })
    }

    /// Load names from the `column` of a CSV with a header row. Blank cells
    /// are skipped.
    pub fn from_csv_reader<R: Read>(reader: R, column: &str) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let idx = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(column))
            .ok_or_else(|| ExtractError::Gazetteer(format!("no '{}' column", column)))?;

        let mut names = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if let Some(name) = record.get(idx) {
                names.push(name.to_string());
            }
        }
        Self::new(names)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn recognize(&self, text: &str) -> std::result::Result<Vec<Entity>, RecognizerError> {
        Ok(self
            .pattern
            .find_iter(text)
            .map(|m| {
                let key = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
                let name = self
                    .canonical
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| m.as_str().to_string());
                Entity {
                    text: name,
                    label: EntityLabel::Company,
                    start: m.start(),
                    end: m.end(),
                }
            })
            .collect())
    }
}
