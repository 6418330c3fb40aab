//! Integration tests for score calculation
//!
//! Realistic competitor profiles scored through the public API, with
//! configurations built both in code and from TOML.

use approx::assert_relative_eq;
use proptest::prelude::*;
use skillscore::{
    Algorithm, CategoryStats, ConfigLoader, ConfigTemplates, PerCategory, PerCategoryStats,
    ScoreCalculator, ScoringConfig, ScoringError, SkillScoreError,
};

fn specialist() -> PerCategoryStats {
    // Plays almost only threes, dabbles in ones
    let mut stats = PerCategoryStats::default();
    stats.ones = CategoryStats::new(Some(1100.0), Some(12), None);
    stats.threes = CategoryStats::new(Some(1750.0), Some(640), Some(1830.0));
    stats
}

fn all_rounder() -> PerCategoryStats {
    PerCategoryStats::sample()
}

#[test]
fn test_weighted_average_with_thresholds_from_toml() {
    let toml_str = r#"
[scoring]
algorithm = "weighted_average"

[scoring.weights]
ones = 0.1
twos = 0.3
threes = 0.5
fours = 0.1

[scoring.min_games_played]
ones = 200
twos = 50
threes = 50
fours = 50
"#;
    let config = ConfigLoader::load_from_string(toml_str).unwrap();

    // ones (150 games) is excluded and the remaining weights renormalized:
    // (0.3*1400 + 0.5*1600 + 0.1*1000) / 0.9 = 1466.67
    let result = ScoreCalculator::calculate_detailed(&all_rounder(), Some(&config)).unwrap();
    assert_eq!(result.score, 1467);
    assert_relative_eq!(result.raw_score, 1466.666_666_666_7, epsilon = 1e-6);
}

#[test]
fn test_specialist_under_every_template() {
    let stats = specialist();
    let mut scores = Vec::new();
    for algorithm in Algorithm::ALL {
        let config = ConfigTemplates::for_algorithm(algorithm);
        let score = ScoreCalculator::calculate(&stats, Some(&config)).unwrap();
        scores.push((algorithm, score));
    }

    // weighted: (0.1*1100 + 0.5*1750) / 0.6
    assert_eq!(scores[0], (Algorithm::WeightedAverage, 1642));
    assert_eq!(scores[1], (Algorithm::PeakValue, 1750));
    // custom template treats missing ratings as 0: 0.1*1100 + 0.5*1750
    assert_eq!(scores[2], (Algorithm::CustomFormula, 985));
    // ascendancy: only threes carries games, blend 0.25*1750 + 0.75*1830
    assert_eq!(scores[3], (Algorithm::Ascendancy, 1810));
}

#[test]
fn test_peak_value_respects_thresholds() {
    let config = ScoringConfig::PeakValue {
        min_games_played: PerCategory::new(0, 0, 1000, 0),
    };
    assert_eq!(ScoreCalculator::calculate(&all_rounder(), Some(&config)), Ok(1400));
}

#[test]
fn test_new_competitor_scores_zero() {
    let newcomer = PerCategoryStats::default();
    for algorithm in [Algorithm::WeightedAverage, Algorithm::PeakValue, Algorithm::Ascendancy] {
        let config = ConfigTemplates::for_algorithm(algorithm);
        assert_eq!(
            ScoreCalculator::calculate(&newcomer, Some(&config)),
            Ok(0),
            "{} should score a newcomer as 0",
            algorithm
        );
    }
}

#[test]
fn test_ascendancy_share_of_games() {
    let mut stats = PerCategoryStats::default();
    stats.ones.games_played = Some(100);
    stats.twos = CategoryStats::new(Some(1400.0), Some(300), None);
    stats.threes = CategoryStats::new(Some(1600.0), Some(500), None);
    stats.fours.games_played = Some(100);

    let config = ConfigLoader::load_from_string(ConfigTemplates::ascendancy_toml()).unwrap();
    assert_eq!(ScoreCalculator::calculate(&stats, Some(&config)), Ok(1525));
}

#[test]
fn test_custom_formula_from_toml() {
    let toml_str = r#"
[scoring]
algorithm = "custom"
formula = "twosGames > threesGames ? twos : threes"
"#;
    let config = ConfigLoader::load_from_string(toml_str).unwrap();
    assert_eq!(ScoreCalculator::calculate(&all_rounder(), Some(&config)), Ok(1600));
    assert_eq!(ScoreCalculator::calculate(&specialist(), Some(&config)), Ok(1750));
}

#[test]
fn test_custom_formula_injection_is_refused_at_calculation() {
    for formula in [r#"eval("x")"#, r#"require("fs")"#, r#"import("m")"#] {
        let config = ScoringConfig::custom_formula(formula);
        let err = ScoreCalculator::calculate(&all_rounder(), Some(&config)).unwrap_err();
        assert!(
            matches!(err, ScoringError::InvalidFormula(_)),
            "{} gave {:?}",
            formula,
            err
        );
    }
}

#[test]
fn test_configuration_errors() {
    assert_eq!(
        ScoreCalculator::calculate(&all_rounder(), None),
        Err(ScoringError::ConfigRequired)
    );

    let err = ConfigLoader::load_from_string("[scoring]\nalgorithm = \"elo\"\n").unwrap_err();
    assert!(matches!(
        err,
        SkillScoreError::Scoring(ScoringError::UnknownAlgorithm(ref tag)) if tag == "elo"
    ));

    let err = ConfigLoader::load_from_string("[scoring]\nalgorithm = \"custom_formula\"\n")
        .unwrap_err();
    assert!(matches!(
        err,
        SkillScoreError::Scoring(ScoringError::CustomFormulaRequired)
    ));
}

#[test]
fn test_formula_testing_with_and_without_data() {
    let default_run = ScoreCalculator::test_formula("(ones*0.1+twos*0.3+threes*0.5+fours*0.1)", None);
    assert!(default_run.valid);
    assert_eq!(default_run.result, 1440);

    let specialist_run = ScoreCalculator::test_formula("threes", Some(&specialist()));
    assert!(specialist_run.valid);
    assert_eq!(specialist_run.result, 1750);
    assert_eq!(specialist_run.used_data, specialist());

    let json = serde_json::to_value(&specialist_run).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["result"], 1750);
    assert_eq!(json["used_data"]["threes"]["peak_rating"], 1830.0);
}

proptest! {
    #[test]
    fn test_scores_are_deterministic(
        ratings in prop::array::uniform4(500.0f64..2500.0),
        games in prop::array::uniform4(0u32..1000),
    ) {
        let stats = PerCategoryStats::from_ratings(ratings, games);
        for algorithm in Algorithm::ALL {
            let config = ConfigTemplates::for_algorithm(algorithm);
            prop_assert_eq!(
                ScoreCalculator::calculate(&stats, Some(&config)),
                ScoreCalculator::calculate(&stats, Some(&config))
            );
        }
    }

    #[test]
    fn test_score_is_rounded_raw_score(
        ratings in prop::array::uniform4(500.0f64..2500.0),
        games in prop::array::uniform4(0u32..1000),
    ) {
        let stats = PerCategoryStats::from_ratings(ratings, games);
        for algorithm in Algorithm::ALL {
            let config = ConfigTemplates::for_algorithm(algorithm);
            let result = ScoreCalculator::calculate_detailed(&stats, Some(&config)).unwrap();
            prop_assert_eq!(result.score, result.raw_score.round() as i64);
        }
    }

    #[test]
    fn test_ascendancy_bounded_by_team_ratings(
        twos in 500.0f64..2500.0,
        threes in 500.0f64..2500.0,
        games in prop::array::uniform4(1u32..1000),
    ) {
        let stats = PerCategoryStats::from_ratings([0.0, twos, threes, 0.0], games);
        let result = ScoreCalculator::ascendancy(&stats, 0.25, 0.75).unwrap();
        prop_assert!(result.raw_score >= twos.min(threes) - 1e-6);
        prop_assert!(result.raw_score <= twos.max(threes) + 1e-6);
    }
}
