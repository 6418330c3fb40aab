//! Acceptance gates for operator-authored formulas
//!
//! A formula is accepted only if it parses, references nothing outside
//! [`VARIABLE_NAMESPACE`], and produces a finite number when evaluated
//! against [`sample_bindings`].

use serde::Serialize;
use tracing::{debug, warn};

use super::ast::Expression;
use super::evaluator::Bindings;
use super::{is_allowed_variable, FormulaError, FormulaResult, VARIABLE_NAMESPACE};
use crate::models::PerCategoryStats;

/// Outcome of validating a formula
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub ast: Option<Expression>,
}

impl ValidationResult {
    fn accepted(ast: Expression) -> Self {
        Self {
            valid: true,
            error: None,
            ast: Some(ast),
        }
    }

    fn rejected(error: &FormulaError) -> Self {
        Self {
            valid: false,
            error: Some(error.to_string()),
            ast: None,
        }
    }
}

/// Build the binding map a formula sees for the given stats.
///
/// Missing ratings and game counts are bound to zero; `totalGames` is the sum
/// of all four game counts.
pub fn bindings_for(stats: &PerCategoryStats) -> Bindings {
    let mut bindings = Bindings::with_capacity(VARIABLE_NAMESPACE.len());
    for (category, stat) in stats.iter() {
        bindings.insert(
            category.rating_variable().to_string(),
            stat.rating.unwrap_or(0.0),
        );
        bindings.insert(
            category.games_variable().to_string(),
            f64::from(stat.games_or_zero()),
        );
    }
    bindings.insert("totalGames".to_string(), stats.total_games() as f64);
    bindings
}

/// The fixed bindings every formula is test-evaluated against
pub fn sample_bindings() -> Bindings {
    bindings_for(&PerCategoryStats::sample())
}

/// Formula validation engine
pub struct FormulaValidator;

impl FormulaValidator {
    /// Validate a formula, never failing: problems are reported in the result
    pub fn validate(formula: &str) -> ValidationResult {
        match Self::check(formula) {
            Ok(ast) => ValidationResult::accepted(ast),
            Err(err) => {
                warn!(error = %err, "Formula rejected");
                ValidationResult::rejected(&err)
            }
        }
    }

    /// Validate a formula that may be absent; `None` is treated as empty
    pub fn validate_optional(formula: Option<&str>) -> ValidationResult {
        Self::validate(formula.unwrap_or(""))
    }

    /// Run every acceptance gate and return the parsed expression
    pub fn check(formula: &str) -> FormulaResult<Expression> {
        if formula.trim().is_empty() {
            return Err(FormulaError::EmptyFormula);
        }
        debug!(formula, "Validating formula");

        let ast = Expression::parse(formula)?;

        let disallowed: Vec<String> = ast
            .free_variables()
            .into_iter()
            .filter(|name| !is_allowed_variable(name))
            .collect();
        if !disallowed.is_empty() {
            return Err(FormulaError::DisallowedVariables { names: disallowed });
        }

        let sample = ast.evaluate(&sample_bindings())?;
        if sample.as_finite_number().is_none() {
            debug!(%sample, "Sample evaluation produced a non-finite or non-numeric value");
            return Err(FormulaError::NonFiniteResult);
        }

        Ok(ast)
    }
}
