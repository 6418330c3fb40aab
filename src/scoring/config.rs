//! TOML configuration for the scoring engine
//!
//! Scoring policies are stored as a flat `[scoring]` table keyed by an
//! `algorithm` tag, so operators can switch policies without touching code:
//!
//! ```toml
//! [scoring]
//! algorithm = "weighted_average"
//!
//! [scoring.weights]
//! ones = 0.1
//! twos = 0.3
//! threes = 0.5
//! fours = 0.1
//!
//! [scoring.min_games_played]
//! ones = 100
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{Algorithm, ScoringConfig, ScoringError, DEFAULT_CURRENT_WEIGHT, DEFAULT_PEAK_WEIGHT};
use crate::error::{Result, SkillScoreError};
use crate::models::PerCategory;

/// Weighted-average formula equivalent to the default weighted template
pub const DEFAULT_CUSTOM_FORMULA: &str = "(ones*0.1+twos*0.3+threes*0.5+fours*0.1)";

/// Serializable configuration format for TOML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringSection>,
}

/// Raw `[scoring]` table as written by operators.
///
/// Every field is optional here; [`ScoringSection::to_config`] decides what
/// the chosen algorithm actually requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringSection {
    /// Algorithm tag: weighted_average, peak_value, custom_formula or ascendancy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,

    /// Expression used by the custom formula algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_weight: Option<f64>,

    /// Per-category weights; missing categories weigh zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<PerCategory<f64>>,

    /// Per-category games-played thresholds; missing categories have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_games_played: Option<PerCategory<u32>>,
}

impl ScoringSection {
    /// Turn the raw table into a typed scoring configuration
    pub fn to_config(&self) -> std::result::Result<ScoringConfig, ScoringError> {
        let tag = self
            .algorithm
            .as_deref()
            .filter(|tag| !tag.trim().is_empty())
            .ok_or(ScoringError::ConfigRequired)?;

        let config = match Algorithm::from_tag(tag)? {
            Algorithm::WeightedAverage => ScoringConfig::WeightedAverage {
                weights: self.weights.clone().unwrap_or_default(),
                min_games_played: self.min_games_played.clone().unwrap_or_default(),
            },
            Algorithm::PeakValue => ScoringConfig::PeakValue {
                min_games_played: self.min_games_played.clone().unwrap_or_default(),
            },
            Algorithm::CustomFormula => {
                let formula = self
                    .formula
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .ok_or(ScoringError::CustomFormulaRequired)?;
                ScoringConfig::CustomFormula {
                    formula: formula.to_string(),
                }
            }
            Algorithm::Ascendancy => ScoringConfig::Ascendancy {
                current_weight: self.current_weight.unwrap_or(DEFAULT_CURRENT_WEIGHT),
                peak_weight: self.peak_weight.unwrap_or(DEFAULT_PEAK_WEIGHT),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

impl From<&ScoringConfig> for ScoringSection {
    fn from(config: &ScoringConfig) -> Self {
        let mut section = ScoringSection {
            algorithm: Some(config.algorithm().tag().to_string()),
            ..Default::default()
        };

        match config {
            ScoringConfig::WeightedAverage {
                weights,
                min_games_played,
            } => {
                section.weights = Some(weights.clone());
                section.min_games_played = Some(min_games_played.clone());
            }
            ScoringConfig::PeakValue { min_games_played } => {
                section.min_games_played = Some(min_games_played.clone());
            }
            ScoringConfig::CustomFormula { formula } => {
                section.formula = Some(formula.clone());
            }
            ScoringConfig::Ascendancy {
                current_weight,
                peak_weight,
            } => {
                section.current_weight = Some(*current_weight);
                section.peak_weight = Some(*peak_weight);
            }
        }

        section
    }
}

/// Configuration loader for TOML files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a scoring configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ScoringConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SkillScoreError::Configuration(format!(
                "Failed to read config file {:?}: {}",
                path, e
            ))
        })?;

        Self::load_from_string(&content)
    }

    /// Load a scoring configuration from a TOML string
    pub fn load_from_string(content: &str) -> Result<ScoringConfig> {
        let toml_config: TomlConfig = toml::from_str(content)
            .map_err(|e| SkillScoreError::Configuration(format!("Invalid TOML syntax: {}", e)))?;

        Ok(Self::build_config(toml_config.scoring.as_ref())?)
    }

    /// Build a typed configuration from an optional `[scoring]` table
    pub fn build_config(
        section: Option<&ScoringSection>,
    ) -> std::result::Result<ScoringConfig, ScoringError> {
        section.ok_or(ScoringError::ConfigRequired)?.to_config()
    }

    /// Export a scoring configuration to a TOML string
    pub fn export_to_string(config: &ScoringConfig) -> Result<String> {
        let toml_config = TomlConfig {
            scoring: Some(ScoringSection::from(config)),
        };
        toml::to_string_pretty(&toml_config).map_err(|e| {
            SkillScoreError::Configuration(format!("Failed to serialize config: {}", e))
        })
    }

    /// Export a scoring configuration to a TOML file
    pub fn export_to_file<P: AsRef<Path>>(config: &ScoringConfig, path: P) -> Result<()> {
        let content = Self::export_to_string(config)?;
        fs::write(&path, content).map_err(|e| {
            SkillScoreError::Configuration(format!("Failed to write config file: {}", e))
        })?;
        Ok(())
    }
}

/// Pre-built configurations, one per algorithm
pub struct ConfigTemplates;

impl ConfigTemplates {
    pub fn for_algorithm(algorithm: Algorithm) -> ScoringConfig {
        match algorithm {
            Algorithm::WeightedAverage => Self::weighted_average(),
            Algorithm::PeakValue => Self::peak_value(),
            Algorithm::CustomFormula => Self::custom_formula(),
            Algorithm::Ascendancy => Self::ascendancy(),
        }
    }

    /// Weights 0.1 / 0.3 / 0.5 / 0.1 with no games-played thresholds
    pub fn weighted_average() -> ScoringConfig {
        ScoringConfig::weighted_average(PerCategory::new(0.1, 0.3, 0.5, 0.1))
    }

    pub fn peak_value() -> ScoringConfig {
        ScoringConfig::peak_value()
    }

    /// Custom formula reproducing the weighted-average template
    pub fn custom_formula() -> ScoringConfig {
        ScoringConfig::custom_formula(DEFAULT_CUSTOM_FORMULA)
    }

    pub fn ascendancy() -> ScoringConfig {
        ScoringConfig::ascendancy()
    }

    /// Template as TOML string for the weighted average
    pub fn weighted_average_toml() -> &'static str {
        r#"
[scoring]
algorithm = "weighted_average"

[scoring.weights]
ones = 0.1
twos = 0.3
threes = 0.5
fours = 0.1

# Categories below their threshold are left out and the remaining
# weights are renormalized
[scoring.min_games_played]
ones = 0
twos = 0
threes = 0
fours = 0
"#
    }

    /// Template as TOML string for ascendancy
    pub fn ascendancy_toml() -> &'static str {
        r#"
[scoring]
algorithm = "ascendancy"
current_weight = 0.25
peak_weight = 0.75
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PerCategoryStats;
    use crate::scoring::ScoreCalculator;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_weighted_average() {
        let config = ConfigLoader::load_from_string(ConfigTemplates::weighted_average_toml()).unwrap();
        assert_eq!(config, ConfigTemplates::weighted_average());
    }

    #[test]
    fn test_load_with_partial_tables() {
        let toml_str = r#"
[scoring]
algorithm = "weightedAverage"

[scoring.weights]
twos = 1.0

[scoring.min_games_played]
twos = 10
"#;
        let config = ConfigLoader::load_from_string(toml_str).unwrap();
        assert_eq!(
            config,
            ScoringConfig::WeightedAverage {
                weights: PerCategory::new(0.0, 1.0, 0.0, 0.0),
                min_games_played: PerCategory::new(0, 10, 0, 0),
            }
        );
    }

    #[test]
    fn test_load_ascendancy_defaults() {
        let config = ConfigLoader::load_from_string("[scoring]\nalgorithm = \"ascendancy\"\n").unwrap();
        assert_eq!(config, ScoringConfig::ascendancy());
        assert_eq!(
            ConfigLoader::load_from_string(ConfigTemplates::ascendancy_toml()).unwrap(),
            ConfigTemplates::ascendancy()
        );
    }

    #[test]
    fn test_missing_section_or_algorithm_requires_config() {
        for toml_str in ["", "[scoring]\n", "[scoring]\nalgorithm = \"  \"\n"] {
            let err = ConfigLoader::load_from_string(toml_str).unwrap_err();
            assert!(
                matches!(err, SkillScoreError::Scoring(ScoringError::ConfigRequired)),
                "unexpected error for {:?}: {:?}",
                toml_str,
                err
            );
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = ConfigLoader::load_from_string("[scoring]\nalgorithm = \"glicko\"\n").unwrap_err();
        assert!(matches!(
            err,
            SkillScoreError::Scoring(ScoringError::UnknownAlgorithm(ref tag)) if tag == "glicko"
        ));
    }

    #[test]
    fn test_custom_formula_required() {
        for toml_str in [
            "[scoring]\nalgorithm = \"custom_formula\"\n",
            "[scoring]\nalgorithm = \"custom_formula\"\nformula = \"   \"\n",
        ] {
            let err = ConfigLoader::build_config(
                toml::from_str::<TomlConfig>(toml_str).unwrap().scoring.as_ref(),
            )
            .unwrap_err();
            assert_eq!(err, ScoringError::CustomFormulaRequired);
        }
    }

    #[test]
    fn test_non_finite_or_negative_weights_are_rejected() {
        let cases = [
            ("[scoring]\nalgorithm = \"weighted_average\"\n[scoring.weights]\nones = nan\ntwos = 0.5\n", "ones"),
            ("[scoring]\nalgorithm = \"weighted_average\"\n[scoring.weights]\nthrees = inf\n", "threes"),
            ("[scoring]\nalgorithm = \"weighted_average\"\n[scoring.weights]\nfours = -0.5\n", "fours"),
            ("[scoring]\nalgorithm = \"ascendancy\"\ncurrent_weight = -inf\n", "current_weight"),
            ("[scoring]\nalgorithm = \"ascendancy\"\npeak_weight = nan\n", "peak_weight"),
        ];
        for (toml_str, field) in cases {
            let err = ConfigLoader::load_from_string(toml_str).unwrap_err();
            assert!(
                matches!(
                    err,
                    SkillScoreError::Scoring(ScoringError::InvalidWeight { ref name, .. }) if name == field
                ),
                "unexpected error for {:?}: {:?}",
                toml_str,
                err
            );
        }
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConfigLoader::load_from_string("[scoring\nalgorithm = 1").unwrap_err();
        assert!(matches!(err, SkillScoreError::Configuration(_)));
    }

    #[test]
    fn test_export_and_reload() {
        for algorithm in Algorithm::ALL {
            let original = ConfigTemplates::for_algorithm(algorithm);
            let toml_str = ConfigLoader::export_to_string(&original).unwrap();
            assert!(toml_str.contains("[scoring]"));
            assert!(toml_str.contains(algorithm.tag()));
            let reloaded = ConfigLoader::load_from_string(&toml_str).unwrap();
            assert_eq!(original, reloaded);
        }
    }

    #[test]
    fn test_export_to_file() {
        let file = NamedTempFile::new().unwrap();
        let config = ConfigTemplates::custom_formula();
        ConfigLoader::export_to_file(&config, file.path()).unwrap();
        assert_eq!(ConfigLoader::load_from_file(file.path()).unwrap(), config);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/skillscore.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_custom_template_matches_weighted_template() {
        let stats = PerCategoryStats::sample();
        let weighted = ScoreCalculator::calculate(&stats, Some(&ConfigTemplates::weighted_average()));
        let custom = ScoreCalculator::calculate(&stats, Some(&ConfigTemplates::custom_formula()));
        assert_eq!(weighted, custom);
        assert_eq!(custom, Ok(1440));
    }
}
