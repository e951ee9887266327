//! Restricted arithmetic evaluator for the calculator tool.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "%") unary)*
//! unary   := ("+" | "-") unary | power
//! power   := primary ("**" unary)?
//! primary := NUMBER | "(" expr ")"
//! ```
//!
//! Only numeric literals are accepted. Any identifier, call, attribute access
//! or other punctuation is rejected before anything is evaluated.

use std::fmt;

/// Largest float magnitude still rendered in positional form with `.0`.
const PLAIN_FLOAT_LIMIT: f64 = 1e16;
/// Deepest nesting of parentheses, signs and `**` the parser descends into.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    Empty,
    UnexpectedChar { ch: char, pos: usize },
    Name { name: String, pos: usize },
    BadNumber(String),
    UnexpectedToken { found: String, pos: usize },
    UnexpectedEnd,
    DivisionByZero,
    ModuloByZero,
    Overflow,
    TooDeep,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty expression"),
            Self::UnexpectedChar { ch, pos } => {
                write!(f, "unsupported character '{ch}' at position {pos}")
            }
            Self::Name { name, pos } => {
                write!(f, "unsupported expression: name '{name}' at position {pos}")
            }
            Self::BadNumber(raw) => write!(f, "bad number '{raw}'"),
            Self::UnexpectedToken { found, pos } => {
                write!(f, "unexpected '{found}' at position {pos}")
            }
            Self::UnexpectedEnd => write!(f, "unexpected end of expression"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::Overflow => write!(f, "numeric result out of range"),
            Self::TooDeep => write!(f, "expression nested too deeply"),
        }
    }
}

impl std::error::Error for ExprError {}

/// Evaluated value. Integers stay integers until an operation needs a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(value) => value == 0,
            Self::Float(value) => value == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) if value.fract() == 0.0 && value.abs() < PLAIN_FLOAT_LIMIT => {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Parse and evaluate `source`.
pub fn evaluate(source: &str) -> Result<Number, ExprError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(ExprError::UnexpectedToken {
            found: token.kind.to_string(),
            pos: token.pos,
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(Number),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Pow => f.write_str("**"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let pos = i;
        let kind = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let (number, next) = lex_number(&chars, i)?;
                i = next;
                tokens.push(Token {
                    kind: TokenKind::Number(number),
                    pos,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let name: String = chars[i..]
                    .iter()
                    .take_while(|c| c.is_alphanumeric() || **c == '_')
                    .collect();
                return Err(ExprError::Name { name, pos });
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                TokenKind::Pow
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            other => return Err(ExprError::UnexpectedChar { ch: other, pos }),
        };
        i += 1;
        tokens.push(Token { kind, pos });
    }
    Ok(tokens)
}

fn lex_number(chars: &[char], start: usize) -> Result<(Number, usize), ExprError> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let raw: String = chars[start..i].iter().collect();
    let number = if is_float {
        raw.parse::<f64>()
            .map(Number::Float)
            .map_err(|_| ExprError::BadNumber(raw.clone()))?
    } else {
        // Integer literals too large for i64 degrade to floats.
        match raw.parse::<i64>() {
            Ok(value) => Number::Int(value),
            Err(_) => raw
                .parse::<f64>()
                .map(Number::Float)
                .map_err(|_| ExprError::BadNumber(raw.clone()))?,
        }
    };
    Ok((number, i))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|token| &token.kind == kind) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expr(&mut self) -> Result<Number, ExprError> {
        let mut value = self.term()?;
        loop {
            if self.eat(&TokenKind::Plus) {
                value = add(value, self.term()?)?;
            } else if self.eat(&TokenKind::Minus) {
                value = sub(value, self.term()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<Number, ExprError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&TokenKind::Star) {
                value = mul(value, self.unary()?)?;
            } else if self.eat(&TokenKind::Slash) {
                value = div(value, self.unary()?)?;
            } else if self.eat(&TokenKind::Percent) {
                value = modulo(value, self.unary()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    /// Every level of nesting passes through here, so the depth is counted once.
    fn unary(&mut self) -> Result<Number, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<Number, ExprError> {
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        if self.eat(&TokenKind::Minus) {
            return neg(self.unary()?);
        }
        self.power()
    }

    fn power(&mut self) -> Result<Number, ExprError> {
        let base = self.primary()?;
        if self.eat(&TokenKind::Pow) {
            // Right-associative: the exponent may itself contain `**`.
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Number, ExprError> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(ExprError::UnexpectedEnd);
        };
        self.pos += 1;
        match token.kind {
            TokenKind::Number(value) => Ok(value),
            TokenKind::LParen => {
                let value = self.expr()?;
                if self.eat(&TokenKind::RParen) {
                    return Ok(value);
                }
                match self.peek() {
                    Some(next) => Err(ExprError::UnexpectedToken {
                        found: next.kind.to_string(),
                        pos: next.pos,
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                pos: token.pos,
            }),
        }
    }
}

fn finite(value: f64) -> Result<Number, ExprError> {
    if value.is_finite() {
        Ok(Number::Float(value))
    } else {
        Err(ExprError::Overflow)
    }
}

fn add(lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => a
            .checked_add(b)
            .map(Number::Int)
            .ok_or(ExprError::Overflow),
        _ => finite(lhs.as_f64() + rhs.as_f64()),
    }
}

fn sub(lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => a
            .checked_sub(b)
            .map(Number::Int)
            .ok_or(ExprError::Overflow),
        _ => finite(lhs.as_f64() - rhs.as_f64()),
    }
}

fn mul(lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => a
            .checked_mul(b)
            .map(Number::Int)
            .ok_or(ExprError::Overflow),
        _ => finite(lhs.as_f64() * rhs.as_f64()),
    }
}

fn div(lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    if rhs.is_zero() {
        return Err(ExprError::DivisionByZero);
    }
    finite(lhs.as_f64() / rhs.as_f64())
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    if rhs.is_zero() {
        return Err(ExprError::ModuloByZero);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let rem = a.checked_rem(b).ok_or(ExprError::Overflow)?;
            if rem != 0 && ((rem < 0) != (b < 0)) {
                Ok(Number::Int(rem + b))
            } else {
                Ok(Number::Int(rem))
            }
        }
        _ => {
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            let rem = a % b;
            if rem != 0.0 && ((rem < 0.0) != (b < 0.0)) {
                finite(rem + b)
            } else {
                finite(rem)
            }
        }
    }
}

fn neg(value: Number) -> Result<Number, ExprError> {
    match value {
        Number::Int(a) => a.checked_neg().map(Number::Int).ok_or(ExprError::Overflow),
        Number::Float(a) => Ok(Number::Float(-a)),
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number, ExprError> {
    match (base, exponent) {
        (Number::Int(a), Number::Int(b)) if b >= 0 => {
            let exp = u32::try_from(b).map_err(|_| ExprError::Overflow)?;
            a.checked_pow(exp).map(Number::Int).ok_or(ExprError::Overflow)
        }
        _ => {
            if base.is_zero() && exponent.as_f64() < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            finite(base.as_f64().powf(exponent.as_f64()))
        }
    }
}
