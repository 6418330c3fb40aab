//! Tree-walking evaluation of formula expressions
//!
//! Evaluation is purely numeric. Division or modulo by zero and functions
//! called outside their real domain produce NaN or infinities; only
//! structural problems (an unbound variable, a call with the wrong number of
//! arguments) are reported as errors. Callers decide what to do with
//! non-finite results.

use approx::relative_eq;
use std::collections::HashMap;

use super::ast::{BinaryOp, Expr, UnaryOp, Value};
use super::{FormulaError, FormulaResult};

/// Variable name to value mapping used during evaluation
pub type Bindings = HashMap<String, f64>;

/// Relative tolerance for `==` and `!=`
const EQ_RELATIVE_TOLERANCE: f64 = 1e-12;
/// Absolute tolerance for `==` and `!=` near zero
const EQ_ABSOLUTE_TOLERANCE: f64 = 1e-15;

/// Evaluate an expression tree against `bindings`
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> FormulaResult<Value> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),

        Expr::Variable(name) => bindings
            .get(name)
            .map(|v| Value::Number(*v))
            .ok_or_else(|| FormulaError::UnboundVariable(name.clone())),

        Expr::Unary { op, operand } => {
            let value = evaluate(operand, bindings)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-value.as_number()),
                UnaryOp::Plus => Value::Number(value.as_number()),
                UnaryOp::Not => Value::Boolean(!value.is_truthy()),
            })
        }

        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, bindings)?;
            let rhs = evaluate(right, bindings)?;
            Ok(apply_binary(*op, lhs, rhs))
        }

        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, bindings)?.is_truthy() {
                evaluate(then_branch, bindings)
            } else {
                evaluate(else_branch, bindings)
            }
        }

        Expr::Call { function, args } => {
            if !function.arity().accepts(args.len()) {
                return Err(FormulaError::ArityMismatch {
                    function: function.name().to_string(),
                    expected: function.arity().to_string(),
                    actual: args.len(),
                });
            }
            let values = args
                .iter()
                .map(|arg| evaluate(arg, bindings).map(|v| v.as_number()))
                .collect::<FormulaResult<Vec<f64>>>()?;
            Ok(Value::Number(function.apply(&values)))
        }
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    let (a, b) = (lhs.as_number(), rhs.as_number());
    match op {
        BinaryOp::Add => Value::Number(a + b),
        BinaryOp::Sub => Value::Number(a - b),
        BinaryOp::Mul => Value::Number(a * b),
        BinaryOp::Div => Value::Number(a / b),
        BinaryOp::Mod => Value::Number(floored_mod(a, b)),
        BinaryOp::Pow => Value::Number(a.powf(b)),
        BinaryOp::Eq => Value::Boolean(nearly_equal(a, b)),
        BinaryOp::NotEq => Value::Boolean(!nearly_equal(a, b)),
        BinaryOp::Less => Value::Boolean(a < b),
        BinaryOp::LessEq => Value::Boolean(a <= b),
        BinaryOp::Greater => Value::Boolean(a > b),
        BinaryOp::GreaterEq => Value::Boolean(a >= b),
        BinaryOp::And => Value::Boolean(lhs.is_truthy() && rhs.is_truthy()),
        BinaryOp::Or => Value::Boolean(lhs.is_truthy() || rhs.is_truthy()),
    }
}

/// Modulo whose result takes the sign of the divisor; NaN when `b` is zero
fn floored_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return f64::NAN;
    }
    a - b * (a / b).floor()
}

fn nearly_equal(a: f64, b: f64) -> bool {
    relative_eq!(
        a,
        b,
        epsilon = EQ_ABSOLUTE_TOLERANCE,
        max_relative = EQ_RELATIVE_TOLERANCE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::Expression;
    use approx::assert_relative_eq;

    fn make_vars(pairs: &[(&str, f64)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn eval(formula: &str, vars: &Bindings) -> FormulaResult<Value> {
        Expression::parse(formula).unwrap().evaluate(vars)
    }

    fn eval_num(formula: &str, vars: &Bindings) -> f64 {
        eval(formula, vars).unwrap().as_number()
    }

    #[test]
    fn test_basic_arithmetic() {
        let vars = make_vars(&[("a", 10.0), ("b", 4.0)]);
        assert_eq!(eval_num("a + b", &vars), 14.0);
        assert_eq!(eval_num("a - b", &vars), 6.0);
        assert_eq!(eval_num("a * b", &vars), 40.0);
        assert_eq!(eval_num("a / b", &vars), 2.5);
        assert_eq!(eval_num("a % b", &vars), 2.0);
        assert_eq!(eval_num("b ^ 2", &vars), 16.0);
        assert_eq!(eval_num("-a + +b", &vars), -6.0);
    }

    #[test]
    fn test_weighted_formula() {
        let vars = make_vars(&[
            ("ones", 1200.0),
            ("twos", 1400.0),
            ("threes", 1600.0),
            ("fours", 1000.0),
        ]);
        let result = eval_num("(ones*0.1+twos*0.3+threes*0.5+fours*0.1)", &vars);
        assert_relative_eq!(result, 1440.0, epsilon = 1e-9);
    }

    #[test]
    fn test_modulo_takes_divisor_sign() {
        let vars = Bindings::new();
        assert_eq!(eval_num("-5 % 3", &vars), 1.0);
        assert_eq!(eval_num("5 % -3", &vars), -1.0);
    }

    #[test]
    fn test_division_and_modulo_by_zero_are_non_finite() {
        let vars = make_vars(&[("a", 10.0), ("z", 0.0)]);
        assert_eq!(eval_num("a / z", &vars), f64::INFINITY);
        assert!(eval_num("z / z", &vars).is_nan());
        assert!(eval_num("a % z", &vars).is_nan());
    }

    #[test]
    fn test_domain_errors_do_not_raise() {
        let vars = make_vars(&[("a", -4.0)]);
        assert!(eval_num("sqrt(a)", &vars).is_nan());
        assert!(eval_num("log(a)", &vars).is_nan());
        assert_eq!(eval_num("log(0)", &vars), f64::NEG_INFINITY);
        assert!(eval_num("acos(a)", &vars).is_nan());
    }

    #[test]
    fn test_comparisons_yield_booleans() {
        let vars = make_vars(&[("a", 3.0), ("b", 5.0)]);
        assert_eq!(eval("a < b", &vars).unwrap(), Value::Boolean(true));
        assert_eq!(eval("a >= b", &vars).unwrap(), Value::Boolean(false));
        assert_eq!(eval("0.1 + 0.2 == 0.3", &vars).unwrap(), Value::Boolean(true));
        assert_eq!(eval("a != b", &vars).unwrap(), Value::Boolean(true));
        assert_eq!(eval("a ≤ 3", &vars).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_logical_operators() {
        let vars = make_vars(&[("a", 0.0), ("b", 2.0)]);
        assert_eq!(eval("a or b", &vars).unwrap(), Value::Boolean(true));
        assert_eq!(eval("a and b", &vars).unwrap(), Value::Boolean(false));
        assert_eq!(eval("not a", &vars).unwrap(), Value::Boolean(true));
        assert_eq!(eval("not (b > 1)", &vars).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_booleans_coerce_in_arithmetic() {
        let vars = make_vars(&[("a", 3.0)]);
        assert_eq!(eval("(a > 1) + 1", &vars).unwrap(), Value::Number(2.0));
        assert_eq!(eval("(a > 5) * 100", &vars).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_conditional_only_evaluates_taken_branch() {
        let vars = make_vars(&[("twosGames", 12.0), ("twos", 1400.0)]);
        // `missing` is never evaluated because the condition selects the other branch
        assert_eq!(
            eval("twosGames > 10 ? twos : missing", &vars).unwrap(),
            Value::Number(1400.0)
        );
        assert_eq!(
            eval("twosGames > 20 ? twos : missing", &vars),
            Err(FormulaError::UnboundVariable("missing".to_string()))
        );
    }

    #[test]
    fn test_functions() {
        let vars = make_vars(&[("a", 2.0), ("b", -7.5)]);
        assert_eq!(eval_num("abs(b)", &vars), 7.5);
        assert_eq!(eval_num("min(a, b, 0)", &vars), -7.5);
        assert_eq!(eval_num("max(a)", &vars), 2.0);
        assert_eq!(eval_num("pow(a, 10)", &vars), 1024.0);
        assert_eq!(eval_num("round(b)", &vars), -8.0);
        assert_eq!(eval_num("floor(b)", &vars), -8.0);
        assert_eq!(eval_num("ceil(b)", &vars), -7.0);
        assert_relative_eq!(eval_num("log10(1000)", &vars), 3.0, epsilon = 1e-12);
        assert_relative_eq!(eval_num("exp(log(a))", &vars), 2.0, epsilon = 1e-12);
        assert_relative_eq!(eval_num("sin(0) + cos(0)", &vars), 1.0, epsilon = 1e-12);
        assert_relative_eq!(eval_num("atan(1) * 4", &vars), std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_unbound_variable() {
        let vars = make_vars(&[("a", 1.0)]);
        assert_eq!(
            eval("a + b", &vars),
            Err(FormulaError::UnboundVariable("b".to_string()))
        );
    }

    #[test]
    fn test_hand_built_call_with_wrong_arity() {
        let expr = Expr::Call {
            function: crate::formulas::Function::Sqrt,
            args: vec![],
        };
        assert!(matches!(
            evaluate(&expr, &Bindings::new()),
            Err(FormulaError::ArityMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let expr = Expression::parse("max(ones, twos) / 2").unwrap();
        let vars = make_vars(&[("ones", 1200.0), ("twos", 1400.0)]);
        let first = expr.evaluate(&vars).unwrap();
        let second = expr.evaluate(&vars).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Value::Number(700.0));
    }
}
