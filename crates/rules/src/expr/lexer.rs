//! Tokenizer for the expression language.

use super::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    Null,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Not,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Eof,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> ExprError {
    ExprError::Syntax {
        offset,
        message: message.into(),
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while let Some(&(offset, c)) = chars.get(i) {
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '.' if !peek(i + 1).is_some_and(|n| n.is_ascii_digit()) => (Token::Dot, 1),
            '?' => (Token::Question, 1),
            ':' => (Token::Colon, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '!' if peek(i + 1) == Some('=') => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '=' if peek(i + 1) == Some('=') => (Token::Eq, 2),
            '<' if peek(i + 1) == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if peek(i + 1) == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if peek(i + 1) == Some('&') => (Token::And, 2),
            '|' if peek(i + 1) == Some('|') => (Token::Or, 2),
            '"' | '\'' => {
                let (value, consumed) = lex_string(&chars, i, c)?;
                tokens.push(Spanned {
                    token: Token::Str(value),
                    offset,
                });
                i += consumed;
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let (token, consumed) = lex_number(&chars, i)?;
                tokens.push(Spanned { token, offset });
                i += consumed;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while peek(i).is_some_and(|n| n.is_alphanumeric() || n == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let token = match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                };
                tokens.push(Spanned { token, offset });
                continue;
            }
            other => return Err(syntax(offset, format!("unexpected character '{}'", other))),
        };

        tokens.push(Spanned { token, offset });
        i += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the value and chars consumed.
fn lex_string(chars: &[(usize, char)], start: usize, quote: char) -> Result<(String, usize), ExprError> {
    let offset = chars[start].0;
    let mut value = String::new();
    let mut i = start + 1;

    loop {
        let Some(&(_, c)) = chars.get(i) else {
            return Err(syntax(offset, "unterminated string literal"));
        };
        i += 1;
        match c {
            c if c == quote => return Ok((value, i - start)),
            '\\' => {
                let Some(&(esc_offset, esc)) = chars.get(i) else {
                    return Err(syntax(offset, "unterminated string literal"));
                };
                i += 1;
                value.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    '\'' => '\'',
                    other => return Err(syntax(esc_offset, format!("unknown escape '\\{}'", other))),
                });
            }
            c => value.push(c),
        }
    }
}

fn lex_number(chars: &[(usize, char)], start: usize) -> Result<(Token, usize), ExprError> {
    let offset = chars[start].0;
    let mut i = start;
    let mut is_float = false;

    while let Some(&(_, c)) = chars.get(i) {
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.' && !is_float && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit()) {
            is_float = true;
            i += 1;
        } else {
            break;
        }
    }

    let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| syntax(offset, format!("invalid number '{}': {}", text, e)))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| syntax(offset, format!("invalid number '{}': {}", text, e)))?
    };
    Ok((token, i - start))
}
