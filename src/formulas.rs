//! Sandboxed formula engine for custom scoring policies
//!
//! Operators can describe a scoring policy as an arithmetic formula over a
//! competitor's per-category ratings and game counts. Formulas come from
//! untrusted input, so they are handled by a purpose-built expression language
//! rather than a general evaluator: the grammar has literals, variables,
//! arithmetic, comparison and logical operators, a ternary conditional and a
//! fixed set of math functions. Nothing else can be expressed.
//!
//! # Architecture
//!
//! - **lexer**: turns formula text into positioned tokens
//! - **parser**: recursive-descent parser producing an [`Expression`]
//! - **ast**: the closed [`Expr`] tree, [`Function`] table and runtime [`Value`]
//! - **evaluator**: tree-walking evaluation against a variable binding map
//! - **validator**: the allowlist and sample-evaluation gates used before a
//!   formula is accepted for scoring
//!
//! # Example
//!
//! ```rust,ignore
//! use skillscore::formulas::{Expression, FormulaValidator};
//!
//! let expr = Expression::parse("max(twos, threes) * 0.9")?;
//! assert!(expr.free_variables().contains("twos"));
//!
//! let verdict = FormulaValidator::validate("ones * 0.5 + twos * 0.5");
//! assert!(verdict.valid);
//! ```

pub mod ast;
pub mod evaluator;
mod lexer;
pub mod parser;
pub mod validator;

use thiserror::Error;

pub use ast::{BinaryOp, Expr, Expression, Function, UnaryOp, Value};
pub use evaluator::Bindings;
pub use validator::{FormulaValidator, ValidationResult};

/// Identifiers a custom scoring formula may reference
pub const VARIABLE_NAMESPACE: [&str; 9] = [
    "ones",
    "twos",
    "threes",
    "fours",
    "onesGames",
    "twosGames",
    "threesGames",
    "foursGames",
    "totalGames",
];

/// Check whether `name` belongs to the scoring variable namespace
pub fn is_allowed_variable(name: &str) -> bool {
    VARIABLE_NAMESPACE.contains(&name)
}

/// Formula engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Formula cannot be empty")]
    EmptyFormula,

    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error(
        "Disallowed variables: {}. Allowed: {}",
        .names.join(", "),
        VARIABLE_NAMESPACE.join(", ")
    )]
    DisallowedVariables { names: Vec<String> },

    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Formula must evaluate to a finite number")]
    NonFiniteResult,
}

impl FormulaError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            position,
            message: message.into(),
        }
    }
}

pub type FormulaResult<T> = Result<T, FormulaError>;
