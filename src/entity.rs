//! Entity Resolver: picks the document's subject company.

use crate::analysis::{Entity, EntityLabel};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Resolve the company name.
///
/// 1. first `Company` from the domain recognizer, if it ran
/// 2. first `Organization` from the generic recognizer
/// 3. [`UNKNOWN_COMPANY`]
pub fn resolve_company(domain: Option<&[Entity]>, generic: &[Entity]) -> String {
    domain
        .and_then(|entities| first_with_label(entities, EntityLabel::Company))
        .or_else(|| first_with_label(generic, EntityLabel::Organization))
        .unwrap_or(UNKNOWN_COMPANY)
        .to_string()
}

fn first_with_label(entities: &[Entity], label: EntityLabel) -> Option<&str> {
    entities
        .iter()
        .filter(|e| e.label == label && !e.text.trim().is_empty())
        .min_by_key(|e| e.start)
        .map(|e| e.text.trim())
}
