//! CSV export of final records.
//!
//! ```text
//! document,company_name,revenue,net income,...
//! 1,ABC Corp,"$9,845 crore","$1,941 crore",...
//! ```
//!
//! `document` is the label the caller gave the record (usually its file
//! name), or its 1-based position in the batch.

use crate::error::{ExtractError, Result};
use crate::finalize::{FinalRecord, NOT_FOUND};
use crate::terms::TermVocabulary;
use std::io::Write;

/// Write `records` labelled by batch position.
pub fn write_csv<W: Write>(
    vocabulary: &TermVocabulary,
    records: &[FinalRecord],
    writer: W,
) -> Result<()> {
    let labels: Vec<String> = (1..=records.len()).map(|n| n.to_string()).collect();
    write_csv_with_labels(vocabulary, records, &labels, writer)
}

/// Write `records` with one caller-supplied label per record.
pub fn write_csv_with_labels<W: Write, L: AsRef<str>>(
    vocabulary: &TermVocabulary,
    records: &[FinalRecord],
    labels: &[L],
    writer: W,
) -> Result<()> {
    if labels.len() != records.len() {
        return Err(ExtractError::LabelCount {
            labels: labels.len(),
            records: records.len(),
        });
    }

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["document", "company_name"];
    header.extend(vocabulary.iter());
    csv_writer.write_record(&header)?;

    for (label, record) in labels.iter().zip(records) {
        let mut row = Vec::with_capacity(vocabulary.len() + 2);
        row.push(label.as_ref());
        row.push(record.company_name.as_str());
        for term in vocabulary.iter() {
            let value = record
                .financial_details
                .get(term)
                .map(|v| v.as_str())
                .unwrap_or(NOT_FOUND);
            row.push(value);
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn to_csv_string(vocabulary: &TermVocabulary, records: &[FinalRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(vocabulary, records, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn to_csv_string_with_labels<L: AsRef<str>>(
    vocabulary: &TermVocabulary,
    records: &[FinalRecord],
    labels: &[L],
) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv_with_labels(vocabulary, records, labels, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
