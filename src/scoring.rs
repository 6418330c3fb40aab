//! Internal rating calculation
//!
//! Turns a competitor's per-category statistics into a single integer score
//! under one of four policies:
//!
//! - **Weighted average** of eligible category ratings, renormalized by the
//!   weights actually used
//! - **Peak value**: the best eligible category rating
//! - **Custom formula** authored by an operator and run in the formula sandbox
//! - **Ascendancy**: a current/peak blend of the `twos` and `threes` ratings,
//!   weighted by each category's share of all games played
//!
//! Insufficient data never fails: a competitor with no eligible category scores
//! `0`. Errors are reserved for unusable configurations, rejected formulas and
//! ratings that cannot produce a score (NaN, infinite or out of range).

pub mod config;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::formulas::validator::bindings_for;
use crate::formulas::FormulaValidator;
use crate::models::{Category, PerCategory, PerCategoryStats};

/// Default weight of the current rating in the ascendancy blend
pub const DEFAULT_CURRENT_WEIGHT: f64 = 0.25;
/// Default weight of the peak rating in the ascendancy blend
pub const DEFAULT_PEAK_WEIGHT: f64 = 0.75;

/// Scoring calculation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Scoring configuration is required")]
    ConfigRequired,

    #[error("Unknown scoring algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Custom formula algorithm requires a formula")]
    CustomFormulaRequired,

    #[error("Invalid formula: {0}")]
    InvalidFormula(String),

    #[error("Formula evaluation failed: {0}")]
    FormulaEvaluationFailed(String),

    #[error("Invalid weight for {name}: {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("Invalid statistics: {0}")]
    InvalidStats(String),
}

/// Scoring algorithm identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    WeightedAverage,
    PeakValue,
    CustomFormula,
    Ascendancy,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::WeightedAverage,
        Algorithm::PeakValue,
        Algorithm::CustomFormula,
        Algorithm::Ascendancy,
    ];

    /// Canonical configuration tag
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::WeightedAverage => "weighted_average",
            Algorithm::PeakValue => "peak_value",
            Algorithm::CustomFormula => "custom_formula",
            Algorithm::Ascendancy => "ascendancy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Algorithm::WeightedAverage => "Weighted average of eligible category ratings",
            Algorithm::PeakValue => "Highest eligible category rating",
            Algorithm::CustomFormula => "Operator-defined formula",
            Algorithm::Ascendancy => "Current/peak blend of twos and threes weighted by games share",
        }
    }

    /// Resolve a configuration tag.
    ///
    /// Matching ignores case, `_` and `-`, so `weighted_average`,
    /// `weightedAverage` and `WEIGHTED-AVERAGE` are the same tag.
    pub fn from_tag(tag: &str) -> Result<Algorithm, ScoringError> {
        let normalized: String = tag
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "weightedaverage" | "weighted" => Ok(Algorithm::WeightedAverage),
            "peakvalue" | "peak" => Ok(Algorithm::PeakValue),
            "customformula" | "custom" | "formula" => Ok(Algorithm::CustomFormula),
            "ascendancy" => Ok(Algorithm::Ascendancy),
            _ => Err(ScoringError::UnknownAlgorithm(tag.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A scoring policy and its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringConfig {
    WeightedAverage {
        weights: PerCategory<f64>,
        min_games_played: PerCategory<u32>,
    },
    PeakValue {
        min_games_played: PerCategory<u32>,
    },
    CustomFormula {
        formula: String,
    },
    Ascendancy {
        current_weight: f64,
        peak_weight: f64,
    },
}

impl ScoringConfig {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ScoringConfig::WeightedAverage { .. } => Algorithm::WeightedAverage,
            ScoringConfig::PeakValue { .. } => Algorithm::PeakValue,
            ScoringConfig::CustomFormula { .. } => Algorithm::CustomFormula,
            ScoringConfig::Ascendancy { .. } => Algorithm::Ascendancy,
        }
    }

    /// Check the parameters of this policy.
    ///
    /// Weights must be finite and non-negative, and a custom formula must
    /// not be blank. The formula itself is checked by [`ScoreCalculator::check_config`].
    pub fn validate(&self) -> Result<(), ScoringError> {
        let check_weight = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ScoringError::InvalidWeight {
                    name: name.to_string(),
                    value,
                })
            }
        };

        match self {
            ScoringConfig::WeightedAverage { weights, .. } => weights
                .iter()
                .try_for_each(|(category, weight)| check_weight(category.rating_variable(), *weight)),
            ScoringConfig::PeakValue { .. } => Ok(()),
            ScoringConfig::CustomFormula { formula } => {
                if formula.trim().is_empty() {
                    Err(ScoringError::CustomFormulaRequired)
                } else {
                    Ok(())
                }
            }
            ScoringConfig::Ascendancy {
                current_weight,
                peak_weight,
            } => {
                check_weight("current_weight", *current_weight)?;
                check_weight("peak_weight", *peak_weight)
            }
        }
    }

    /// Weighted average with no games-played thresholds
    pub fn weighted_average(weights: PerCategory<f64>) -> Self {
        ScoringConfig::WeightedAverage {
            weights,
            min_games_played: PerCategory::default(),
        }
    }

    /// Peak value with no games-played thresholds
    pub fn peak_value() -> Self {
        ScoringConfig::PeakValue {
            min_games_played: PerCategory::default(),
        }
    }

    pub fn custom_formula(formula: impl Into<String>) -> Self {
        ScoringConfig::CustomFormula {
            formula: formula.into(),
        }
    }

    /// Ascendancy with the default 0.25 / 0.75 current/peak weights
    pub fn ascendancy() -> Self {
        ScoringConfig::Ascendancy {
            current_weight: DEFAULT_CURRENT_WEIGHT,
            peak_weight: DEFAULT_PEAK_WEIGHT,
        }
    }
}

/// A calculated score and how it was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Rounded score
    pub score: i64,
    /// Value before rounding
    pub raw_score: f64,
    pub algorithm: Algorithm,
    /// Categories that contributed to the score
    pub eligible_categories: Vec<Category>,
}

impl ScoreResult {
    /// `None` when the raw score is not finite or does not fit in an `i64`
    fn from_raw(
        raw_score: f64,
        algorithm: Algorithm,
        eligible_categories: Vec<Category>,
    ) -> Option<Self> {
        Some(Self {
            score: round_score(raw_score)?,
            raw_score,
            algorithm,
            eligible_categories,
        })
    }

    /// Statistical scores are built from ratings alone, so an unusable raw
    /// score means the ratings themselves were unusable.
    fn from_ratings(
        raw_score: f64,
        algorithm: Algorithm,
        eligible_categories: Vec<Category>,
    ) -> Result<Self, ScoringError> {
        Self::from_raw(raw_score, algorithm, eligible_categories).ok_or_else(|| {
            warn!(%algorithm, raw_score, "Ratings produced an unusable score");
            ScoringError::InvalidStats(format!(
                "{} produced an unusable score from the ratings: {}",
                algorithm, raw_score
            ))
        })
    }

    fn zero(algorithm: Algorithm) -> Self {
        Self {
            score: 0,
            raw_score: 0.0,
            algorithm,
            eligible_categories: Vec::new(),
        }
    }
}

/// Outcome of trying a formula against sample data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaTestResult {
    pub result: i64,
    pub used_data: PerCategoryStats,
    pub valid: bool,
    pub error: Option<String>,
}

/// Round to the nearest integer, ties away from zero.
///
/// `None` for NaN, infinities and values outside the `i64` range.
fn round_score(value: f64) -> Option<i64> {
    let rounded = value.round();
    // i64::MAX as f64 rounds up to 2^63, which itself is out of range
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn is_eligible(games_played: Option<u32>, threshold: u32) -> bool {
    games_played.unwrap_or(0) >= threshold
}

/// Core score calculation engine
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Calculate a competitor's score under `config`
    pub fn calculate(
        stats: &PerCategoryStats,
        config: Option<&ScoringConfig>,
    ) -> Result<i64, ScoringError> {
        Self::calculate_detailed(stats, config).map(|result| result.score)
    }

    /// Calculate a score along with the categories that produced it
    pub fn calculate_detailed(
        stats: &PerCategoryStats,
        config: Option<&ScoringConfig>,
    ) -> Result<ScoreResult, ScoringError> {
        let config = config.ok_or(ScoringError::ConfigRequired)?;
        config.validate()?;

        let result = match config {
            ScoringConfig::WeightedAverage {
                weights,
                min_games_played,
            } => Self::weighted_average(stats, weights, min_games_played)?,
            ScoringConfig::PeakValue { min_games_played } => {
                Self::peak_value(stats, min_games_played)?
            }
            ScoringConfig::CustomFormula { formula } => Self::custom_formula(stats, formula)?,
            ScoringConfig::Ascendancy {
                current_weight,
                peak_weight,
            } => Self::ascendancy(stats, *current_weight, *peak_weight)?,
        };

        debug!(
            algorithm = %result.algorithm,
            score = result.score,
            raw_score = result.raw_score,
            eligible = result.eligible_categories.len(),
            "Score calculated"
        );
        Ok(result)
    }

    /// Check that a configuration can produce scores, without scoring anyone
    pub fn check_config(config: Option<&ScoringConfig>) -> Result<(), ScoringError> {
        let config = config.ok_or(ScoringError::ConfigRequired)?;
        config.validate()?;
        match config {
            ScoringConfig::CustomFormula { formula } => {
                FormulaValidator::check(formula)
                    .map(|_| ())
                    .map_err(|e| ScoringError::InvalidFormula(e.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Weighted average of eligible ratings.
    ///
    /// A category counts when it has a rating, meets its games-played
    /// threshold and carries a positive weight. The sum is divided by the
    /// total weight of counted categories only.
    pub fn weighted_average(
        stats: &PerCategoryStats,
        weights: &PerCategory<f64>,
        min_games_played: &PerCategory<u32>,
    ) -> Result<ScoreResult, ScoringError> {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut eligible = Vec::new();

        for (category, stat) in stats.iter() {
            let weight = *weights.get(category);
            let Some(rating) = stat.rating else {
                continue;
            };
            if weight <= 0.0 || !is_eligible(stat.games_played, *min_games_played.get(category)) {
                continue;
            }
            weighted_sum += weight * rating;
            total_weight += weight;
            eligible.push(category);
        }

        if total_weight == 0.0 {
            return Ok(ScoreResult::zero(Algorithm::WeightedAverage));
        }

        ScoreResult::from_ratings(weighted_sum / total_weight, Algorithm::WeightedAverage, eligible)
    }

    /// Highest rating among categories meeting their games-played threshold
    pub fn peak_value(
        stats: &PerCategoryStats,
        min_games_played: &PerCategory<u32>,
    ) -> Result<ScoreResult, ScoringError> {
        let mut best: Option<(Category, f64)> = None;
        let mut eligible = Vec::new();

        for (category, stat) in stats.iter() {
            let Some(rating) = stat.rating else {
                continue;
            };
            if !is_eligible(stat.games_played, *min_games_played.get(category)) {
                continue;
            }
            eligible.push(category);
            if !rating.is_finite() {
                // NaN never wins a comparison, so it has to be caught here
                return ScoreResult::from_ratings(rating, Algorithm::PeakValue, eligible);
            }
            if best.map_or(true, |(_, current)| rating > current) {
                best = Some((category, rating));
            }
        }

        match best {
            Some((_, rating)) => ScoreResult::from_ratings(rating, Algorithm::PeakValue, eligible),
            None => Ok(ScoreResult::zero(Algorithm::PeakValue)),
        }
    }

    /// Evaluate an operator formula against the competitor's stats
    pub fn custom_formula(stats: &PerCategoryStats, formula: &str) -> Result<ScoreResult, ScoringError> {
        let ast = FormulaValidator::check(formula)
            .map_err(|e| ScoringError::InvalidFormula(e.to_string()))?;

        let value = ast
            .evaluate(&bindings_for(stats))
            .map_err(|e| ScoringError::FormulaEvaluationFailed(e.to_string()))?;

        let raw = value.as_finite_number().ok_or_else(|| {
            warn!(%value, "Custom formula produced a non-finite result");
            ScoringError::FormulaEvaluationFailed(format!(
                "Formula produced a non-finite result: {}",
                value
            ))
        })?;

        let eligible = stats
            .iter()
            .filter(|(_, s)| s.rating.is_some())
            .map(|(c, _)| c)
            .collect();
        ScoreResult::from_raw(raw, Algorithm::CustomFormula, eligible).ok_or_else(|| {
            warn!(raw, "Custom formula result is out of the score range");
            ScoringError::FormulaEvaluationFailed(format!(
                "Formula result is out of the score range: {}",
                raw
            ))
        })
    }

    /// Blend current and peak ratings of `twos` and `threes`, weighted by
    /// each category's share of all games played.
    ///
    /// `ones` and `fours` games count toward the total but their ratings
    /// never enter the score. A missing peak falls back to the current
    /// rating; a missing current rating counts as zero.
    pub fn ascendancy(
        stats: &PerCategoryStats,
        current_weight: f64,
        peak_weight: f64,
    ) -> Result<ScoreResult, ScoringError> {
        let blend = |category: Category| {
            let stat = stats.get(category);
            let current = stat.rating.unwrap_or(0.0);
            let peak = stat.peak_rating.unwrap_or(current);
            let weight_sum = current_weight + peak_weight;
            if weight_sum == 0.0 {
                0.0
            } else {
                (current * current_weight + peak * peak_weight) / weight_sum
            }
        };

        let score2 = blend(Category::Twos);
        let score3 = blend(Category::Threes);

        let total_games = stats.total_games() as f64;
        let share = |category: Category| {
            if total_games > 0.0 {
                f64::from(stats.get(category).games_or_zero()) / total_games
            } else {
                0.0
            }
        };
        let pct2 = share(Category::Twos);
        let pct3 = share(Category::Threes);

        if pct2 + pct3 == 0.0 {
            return Ok(ScoreResult::zero(Algorithm::Ascendancy));
        }

        let eligible = [(Category::Twos, pct2), (Category::Threes, pct3)]
            .into_iter()
            .filter(|(_, pct)| *pct > 0.0)
            .map(|(c, _)| c)
            .collect();

        ScoreResult::from_ratings(
            (score2 * pct2 + score3 * pct3) / (pct2 + pct3),
            Algorithm::Ascendancy,
            eligible,
        )
    }

    /// Try a formula against sample data without failing.
    ///
    /// Uses `sample_data` when given, otherwise [`PerCategoryStats::sample`].
    /// Any problem is reported through `valid` / `error` with a result of `0`.
    pub fn test_formula(formula: &str, sample_data: Option<&PerCategoryStats>) -> FormulaTestResult {
        let used_data = sample_data.cloned().unwrap_or_else(PerCategoryStats::sample);

        let validation = FormulaValidator::validate(formula);
        if !validation.valid {
            return FormulaTestResult {
                result: 0,
                used_data,
                valid: false,
                error: validation.error,
            };
        }

        let config = ScoringConfig::custom_formula(formula);
        match Self::calculate(&used_data, Some(&config)) {
            Ok(result) => FormulaTestResult {
                result,
                used_data,
                valid: true,
                error: None,
            },
            Err(err) => FormulaTestResult {
                result: 0,
                used_data,
                valid: false,
                error: Some(err.to_string()),
            },
        }
    }
}
