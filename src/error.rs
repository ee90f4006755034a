use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("term vocabulary is empty")]
    EmptyVocabulary,

    #[error("vocabulary term #{0} is blank")]
    BlankTerm(usize),

    #[error("duplicate vocabulary term: {0}")]
    DuplicateTerm(String),

    #[error("max_input_length must be greater than zero")]
    ZeroInputLength,

    #[error("money grammar needs at least one currency marker")]
    NoCurrencyMarkers,

    #[error("invalid money grammar: {0}")]
    MoneyGrammar(#[source] regex::Error),

    #[error("fallback pattern given for '{0}', which is not a vocabulary term")]
    UnknownFallbackTerm(String),

    #[error("invalid fallback pattern for '{term}': {source}")]
    FallbackPattern {
        term: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid negation phrases: {0}")]
    NegationPattern(#[source] regex::Error),

    #[error("invalid company gazetteer: {0}")]
    Gazetteer(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{labels} document labels for {records} records")]
    LabelCount { labels: usize, records: usize },
}

/// Failure reported by a specialized entity recognizer.
///
/// The engine never surfaces this to its caller as an error; it degrades to
/// the generic recognizer and reports the notice in the detailed result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    #[error("recognizer '{0}' is not loaded")]
    Unavailable(String),

    #[error("recognizer '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
