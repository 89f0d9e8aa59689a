use std::fmt;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),

    #[error("transport error on {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("transport error on {url}: unexpected status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("form not found: {selector} on {url}")]
    FormNotFound { selector: String, url: String },

    #[error("ambiguous form: {selector} matched {count} forms on {url}")]
    AmbiguousForm {
        selector: String,
        url: String,
        count: usize,
    },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("unexpected page structure on {url}: {details}")]
    UnexpectedPage { url: String, details: String },

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("iban lookup failed for account {account_number}: {source}")]
    Enrichment {
        account_number: String,
        #[source]
        source: Box<ScrapeError>,
    },

    #[error("could not normalize {kind} from {raw:?}")]
    Normalization { kind: ValueKind, raw: String },

    #[error("statement row for account {account_number} rejected ({row}): {source}")]
    StatementRow {
        account_number: String,
        row: String,
        #[source]
        source: Box<ScrapeError>,
    },

    #[error("statement fetch failed for account {account_number}: {source}")]
    Statement {
        account_number: String,
        #[source]
        source: Box<ScrapeError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Amount,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Amount => write!(f, "amount"),
            ValueKind::Date => write!(f, "date"),
        }
    }
}

impl ScrapeError {
    pub fn amount(raw: &str) -> Self {
        return ScrapeError::Normalization {
            kind: ValueKind::Amount,
            raw: raw.to_owned(),
        };
    }

    pub fn date(raw: &str) -> Self {
        return ScrapeError::Normalization {
            kind: ValueKind::Date,
            raw: raw.to_owned(),
        };
    }

    /// True for the failures that describe a single account rather than the
    /// whole session.
    pub fn is_per_account(&self) -> bool {
        matches!(
            self,
            ScrapeError::Enrichment { .. }
                | ScrapeError::Statement { .. }
                | ScrapeError::StatementRow { .. }
        )
    }
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
