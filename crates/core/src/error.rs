use crate::domain::Source;
use std::fmt;

/// A required configuration value is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
}

impl ConfigError {
    pub fn missing(variable: &'static str) -> Self {
        Self { variable }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is required", self.variable)
    }
}

impl std::error::Error for ConfigError {}

/// The payload was fetched but the expected structure could not be pulled out of it.
#[derive(Debug, Clone)]
pub struct ExtractionError {
    pub source: Source,
    pub stage: &'static str,
    pub detail: String,
}

impl ExtractionError {
    pub fn new(source: Source, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            source,
            stage,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extraction error (source={}, stage={}): {}",
            self.source, self.stage, self.detail
        )
    }
}

impl std::error::Error for ExtractionError {}
