//! Tokenizer for formula text

use super::{FormulaError, FormulaResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    Not,
    Question,
    Colon,
    Comma,
    LParen,
    RParen,
    Eof,
}

impl TokenKind {
    /// Short description used in syntax error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Percent => "'%'".to_string(),
            TokenKind::Caret => "'^'".to_string(),
            TokenKind::Eq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Less => "'<'".to_string(),
            TokenKind::LessEq => "'<='".to_string(),
            TokenKind::Greater => "'>'".to_string(),
            TokenKind::GreaterEq => "'>='".to_string(),
            TokenKind::And => "'and'".to_string(),
            TokenKind::Or => "'or'".to_string(),
            TokenKind::Not => "'not'".to_string(),
            TokenKind::Question => "'?'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Eof => "end of formula".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Character offset of the token's first character
    pub position: usize,
}

/// Split `source` into tokens, always terminated by `TokenKind::Eof`
pub(crate) fn tokenize(source: &str) -> FormulaResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())) {
            let (value, next) = scan_number(&chars, i)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position: start,
            });
            i = next;
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let kind = match word.as_str() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                _ => TokenKind::Ident(word),
            };
            tokens.push(Token {
                kind,
                position: start,
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (kind, width) = match (ch, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LessEq, 2),
            ('>', Some('=')) => (TokenKind::GreaterEq, 2),
            ('=', _) => {
                return Err(FormulaError::syntax(
                    start,
                    "Assignment is not supported, use '==' to compare",
                ))
            }
            ('≠', _) => (TokenKind::NotEq, 1),
            ('≤', _) => (TokenKind::LessEq, 1),
            ('≥', _) => (TokenKind::GreaterEq, 1),
            ('<', _) => (TokenKind::Less, 1),
            ('>', _) => (TokenKind::Greater, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('^', _) => (TokenKind::Caret, 1),
            ('?', _) => (TokenKind::Question, 1),
            (':', _) => (TokenKind::Colon, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (other, _) => {
                return Err(FormulaError::syntax(
                    start,
                    format!("Unexpected character '{}'", other),
                ))
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: chars.len(),
    });
    Ok(tokens)
}

/// Scan a decimal literal with optional fraction and exponent
fn scan_number(chars: &[char], start: usize) -> FormulaResult<(f64, usize)> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    let text: String = chars[start..i].iter().collect();
    let value = text
        .parse::<f64>()
        .map_err(|_| FormulaError::syntax(start, format!("Invalid number '{}'", text)))?;

    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_' || chars[i] == '.') {
        return Err(FormulaError::syntax(
            i,
            format!("Unexpected character '{}' after number", chars[i]),
        ));
    }

    Ok((value, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            kinds("ones*0.1 + 2"),
            vec![
                TokenKind::Ident("ones".to_string()),
                TokenKind::Star,
                TokenKind::Number(0.1),
                TokenKind::Plus,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Number(1000.0));
        assert_eq!(kinds("2.5E-1")[0], TokenKind::Number(0.25));
        assert!(tokenize("1.2.3").is_err());
        assert!(tokenize("12abc").is_err());
    }

    #[test]
    fn test_tokenize_comparisons_and_keywords() {
        assert_eq!(
            kinds("a <= b and not c ≠ d"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::LessEq,
                TokenKind::Ident("b".to_string()),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Ident("c".to_string()),
                TokenKind::NotEq,
                TokenKind::Ident("d".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = tokenize("  ab + 1").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 5);
        assert_eq!(tokens[3].position, 8);
    }

    #[test]
    fn test_rejects_strings_and_assignment() {
        match tokenize("eval(\"x\")") {
            Err(FormulaError::Syntax { position, .. }) => assert_eq!(position, 5),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(tokenize("x = 5").is_err());
        assert!(tokenize("a; b").is_err());
        assert!(tokenize("[1, 2]").is_err());
    }
}
