//! Expression tree for parsed formulas

use std::collections::BTreeSet;
use std::fmt;

use super::evaluator::{self, Bindings};
use super::parser;
use super::FormulaResult;

/// Runtime value produced while evaluating a formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
}

impl Value {
    /// Numeric view of the value; booleans count as 1 and 0
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
        }
    }

    /// Truthiness: non-zero, non-NaN numbers are true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    /// The value as a finite number, or `None` for booleans, NaN and infinities
    pub fn as_finite_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

/// Number of arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// The closed set of callable functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Min,
    Max,
    Sqrt,
    Pow,
    Round,
    Floor,
    Ceil,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

impl Function {
    pub const ALL: [Function; 17] = [
        Function::Abs,
        Function::Min,
        Function::Max,
        Function::Sqrt,
        Function::Pow,
        Function::Round,
        Function::Floor,
        Function::Ceil,
        Function::Exp,
        Function::Log,
        Function::Log10,
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Asin,
        Function::Acos,
        Function::Atan,
    ];

    /// Resolve a function by its formula name
    pub fn from_name(name: &str) -> Option<Function> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sqrt => "sqrt",
            Function::Pow => "pow",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Function::Min | Function::Max => Arity::AtLeast(1),
            Function::Pow => Arity::Exactly(2),
            _ => Arity::Exactly(1),
        }
    }

    /// Apply to already-checked arguments.
    ///
    /// Out-of-domain inputs produce NaN or infinities instead of failing.
    pub(crate) fn apply(&self, args: &[f64]) -> f64 {
        let x = args.first().copied().unwrap_or(f64::NAN);
        match self {
            Function::Abs => x.abs(),
            Function::Min => args.iter().copied().fold(f64::INFINITY, nan_min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, nan_max),
            Function::Sqrt => x.sqrt(),
            Function::Pow => x.powf(args.get(1).copied().unwrap_or(f64::NAN)),
            Function::Round => x.round(),
            Function::Floor => x.floor(),
            Function::Ceil => x.ceil(),
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Log10 => x.log10(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
        }
    }
}

// f64::min/max silently drop NaN; a NaN argument must poison the result.
fn nan_min(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() {
        f64::NAN
    } else {
        acc.min(x)
    }
}

fn nan_max(acc: f64, x: f64) -> f64 {
    if acc.is_nan() || x.is_nan() {
        f64::NAN
    } else {
        acc.max(x)
    }
}

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                out.insert(name.as_str());
            }
            Expr::Unary { operand, .. } => operand.collect_variables(out),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_variables(out);
                then_branch.collect_variables(out);
                else_branch.collect_variables(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }
}

/// A parsed formula.
///
/// Immutable once built; evaluating it never mutates it, so one
/// `Expression` can be shared across threads and evaluated repeatedly.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn new(root: Expr) -> Self {
        Self { root }
    }

    /// Parse formula text into an expression tree
    pub fn parse(formula: &str) -> FormulaResult<Self> {
        parser::parse(formula).map(Self::new)
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Names of every variable the formula references, deduplicated.
    ///
    /// Function names are never included.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.root.collect_variables(&mut names);
        names.into_iter().map(str::to_string).collect()
    }

    /// Evaluate against a set of variable bindings
    pub fn evaluate(&self, bindings: &Bindings) -> FormulaResult<Value> {
        evaluator::evaluate(&self.root, bindings)
    }
}
