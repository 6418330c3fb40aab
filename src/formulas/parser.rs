//! Recursive-descent parser for scoring formulas
//!
//! Precedence, loosest to tightest:
//!
//! | level | operators |
//! |---|---|
//! | conditional | `c ? a : b` (right-associative) |
//! | logical or | `or` |
//! | logical and | `and` |
//! | comparison | `== != < <= > >=` |
//! | additive | `+ -` |
//! | multiplicative | `* / %` |
//! | unary | `- + not` |
//! | power | `^` (right-associative) |
//! | primary | numbers, variables, calls, `( ... )` |

use tracing::trace;

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};
use super::{FormulaError, FormulaResult};

/// Deepest nesting of sub-expressions accepted
///
/// Every grouping, unary operator and chained binary operator adds a level, so
/// this bounds both parser recursion and the depth of the resulting tree.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parse formula text into an expression tree
pub fn parse(formula: &str) -> FormulaResult<Expr> {
    let tokens = tokenize(formula)?;
    trace!(tokens = tokens.len(), "Tokenized formula");

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_conditional()?;

    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(FormulaError::syntax(
            trailing.position,
            format!("Unexpected {}", trailing.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always appends Eof, so the last token is a safe fallback
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> FormulaResult<Token> {
        let token = self.peek().clone();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(FormulaError::syntax(
                token.position,
                format!(
                    "Expected {} {}, found {}",
                    kind.describe(),
                    context,
                    token.kind.describe()
                ),
            ))
        }
    }

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(FormulaError::syntax(
                self.peek().position,
                format!("Expression nested deeper than {} levels", MAX_NESTING_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_conditional(&mut self) -> FormulaResult<Expr> {
        self.enter()?;
        let condition = self.parse_or()?;
        let expr = if self.eat(&TokenKind::Question) {
            let then_branch = self.parse_conditional()?;
            self.expect(TokenKind::Colon, "in conditional expression")?;
            let else_branch = self.parse_conditional()?;
            Expr::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }
        } else {
            condition
        };
        self.leave();
        Ok(expr)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.enter()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let base = self.depth;
        let mut left = self.parse_comparison()?;
        while self.eat(&TokenKind::And) {
            self.enter()?;
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let base = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let base = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.depth = base;
                    return Ok(left);
                }
            };
            self.advance();
            self.enter()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let base = self.parse_primary()?;
        if self.eat(&TokenKind::Caret) {
            self.enter()?;
            // the exponent may carry its own sign: 2 ^ -1
            let exponent = self.parse_unary()?;
            self.leave();
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.parse_call(name, token.position)
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(TokenKind::RParen, "to close '('")?;
                Ok(inner)
            }
            TokenKind::Eof => Err(FormulaError::syntax(
                token.position,
                "Unexpected end of formula",
            )),
            other => Err(FormulaError::syntax(
                token.position,
                format!("Unexpected {}", other.describe()),
            )),
        }
    }

    fn parse_call(&mut self, name: String, position: usize) -> FormulaResult<Expr> {
        let function = Function::from_name(&name).ok_or(FormulaError::UnknownFunction(name))?;
        self.expect(TokenKind::LParen, "after function name")?;

        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.parse_conditional()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen, "to close argument list")?;
                break;
            }
        }

        if !function.arity().accepts(args.len()) {
            trace!(position, function = function.name(), "Arity mismatch");
            return Err(FormulaError::ArityMismatch {
                function: function.name().to_string(),
                expected: function.arity().to_string(),
                actual: args.len(),
            });
        }

        Ok(Expr::Call { function, args })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
