// ABOUTME: Custom error types for the comparison engine
// ABOUTME: Configuration problems are fatal to a job; network failures are recorded as data instead

use std::fmt;

#[derive(Debug)]
pub enum ComparatorError {
    Config(String),
    Fetch(String),
    Io(String),
    Parse(String),
}

impl ComparatorError {
    pub fn config(msg: impl Into<String>) -> Self {
        ComparatorError::Config(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ComparatorError::Config(_))
    }
}

impl fmt::Display for ComparatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComparatorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ComparatorError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            ComparatorError::Io(msg) => write!(f, "I/O error: {}", msg),
            ComparatorError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ComparatorError {}

impl From<std::io::Error> for ComparatorError {
    fn from(err: std::io::Error) -> Self {
        ComparatorError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ComparatorError {
    fn from(err: toml::de::Error) -> Self {
        ComparatorError::Parse(err.to_string())
    }
}
