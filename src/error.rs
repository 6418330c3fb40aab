//! Unified error hierarchy for skillscore
//!
//! Each subsystem owns a focused error type; [`SkillScoreError`] wraps them
//! for callers that cross subsystem boundaries and adds severity and
//! user-facing messages for the CLI.

use std::path::PathBuf;
use thiserror::Error;

use crate::formulas::FormulaError;
use crate::scoring::ScoringError;

/// Top-level error type for all skillscore operations
#[derive(Debug, Error)]
pub enum SkillScoreError {
    /// Formula parsing and validation errors
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Score calculation errors
    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    /// Batch import and export errors
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Batch CSV import and export errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// A required column is absent from the header
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// A cell could not be parsed
    #[error("Invalid value on line {line} in column {column}: {value:?}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },

    /// Malformed CSV
    #[error("CSV error: {reason}")]
    Csv { reason: String },

    /// Writing results failed
    #[error("Export failed to {path}: {reason}")]
    ExportFailed { path: PathBuf, reason: String },
}

impl From<csv::Error> for BatchError {
    fn from(err: csv::Error) -> Self {
        BatchError::Csv {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for skillscore operations
pub type Result<T> = std::result::Result<T, SkillScoreError>;

impl SkillScoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, SkillScoreError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SkillScoreError::Formula(_) => ErrorSeverity::Warning,
            SkillScoreError::Scoring(ScoringError::InvalidFormula(_))
            | SkillScoreError::Scoring(ScoringError::FormulaEvaluationFailed(_))
            | SkillScoreError::Scoring(ScoringError::InvalidStats(_)) => {
                ErrorSeverity::Warning
            }
            SkillScoreError::Batch(BatchError::InvalidValue { .. }) => ErrorSeverity::Warning,
            SkillScoreError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SkillScoreError::Formula(err) => format!("The formula was rejected: {}", err),
            SkillScoreError::Scoring(ScoringError::ConfigRequired) => {
                "No scoring configuration was found. Run `skillscore config --init` to create one."
                    .to_string()
            }
            SkillScoreError::Scoring(ScoringError::UnknownAlgorithm(tag)) => format!(
                "Unknown scoring algorithm '{}'. Use one of: weighted_average, peak_value, custom_formula, ascendancy.",
                tag
            ),
            SkillScoreError::Scoring(ScoringError::CustomFormulaRequired) => {
                "The custom_formula algorithm needs a `formula` entry in the [scoring] section."
                    .to_string()
            }
            SkillScoreError::Batch(BatchError::MissingColumn { column }) => {
                format!("The input file has no '{}' column.", column)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}
