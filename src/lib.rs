// Library interface for skillscore
// The CLI and integration tests both go through these modules

pub mod batch;
pub mod config;
pub mod error;
pub mod formulas;
pub mod logging;
pub mod models;
pub mod scoring;

// Re-export commonly used types for convenience
pub use models::*;
pub use formulas::{Expression, FormulaError, FormulaValidator, ValidationResult, Value};
pub use scoring::config::{ConfigLoader, ConfigTemplates, ScoringSection};
pub use scoring::{
    Algorithm, FormulaTestResult, ScoreCalculator, ScoreResult, ScoringConfig, ScoringError,
};
pub use batch::{BatchConfig, BatchScorer, BatchSummary, CsvStatsReader};
pub use error::{Result, SkillScoreError};
pub use logging::{LogConfig, LogFormat, LogLevel};
