use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty date pattern")]
    Empty,
    #[error("invalid date pattern '{0}'")]
    Invalid(String),
}

/// Turns a timestamp into the folder prefix of an uploaded object.
pub trait FolderPattern: std::fmt::Debug + Send + Sync {
    fn convert(&self, ts: DateTime<Utc>) -> String;
}

/// strftime-based pattern evaluated in UTC, e.g. `logs/%Y/%m/%d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFolderPattern {
    pattern: String,
}

impl DateFolderPattern {
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        validate_strftime(&pattern)?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl FolderPattern for DateFolderPattern {
    fn convert(&self, ts: DateTime<Utc>) -> String {
        ts.format(&self.pattern)
            .to_string()
            .trim_matches('/')
            .to_string()
    }
}

/// Reject empty patterns and patterns chrono cannot format.
pub fn validate_strftime(pattern: &str) -> Result<(), PatternError> {
    if pattern.trim().is_empty() {
        return Err(PatternError::Empty);
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(PatternError::Invalid(pattern.to_string()));
    }
    Ok(())
}
