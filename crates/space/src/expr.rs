//! Arithmetic and boolean expressions over tuning parameters.
//!
//! Restriction and grid-divisor strings are evaluated against a
//! configuration's bindings by a small recursive-descent evaluator over a
//! fixed grammar, never by a general-purpose evaluator:
//!
//! ```text
//! expr    ::= or
//! or      ::= and { "||" and }
//! and     ::= cmp { "&&" cmp }
//! cmp     ::= add [ ("==" | "!=" | "<" | ">" | "<=" | ">=") add ]
//! add     ::= mul { ("+" | "-") mul }
//! mul     ::= unary { ("*" | "/") unary }
//! unary   ::= "-" unary | atom
//! atom    ::= number | identifier | "true" | "false" | "(" expr ")"
//! ```
//!
//! Identifiers resolve to the configuration's parameter values; arithmetic
//! is carried out in `f64` and `/` is real-valued division.

use crate::params::{Configuration, ParamValue};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),
    #[error("expected a {expected} operand, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("division by zero")]
    DivisionByZero,
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
}

impl Value {
    fn as_num(&self) -> Result<f64, ExprError> {
        match self {
            Value::Num(v) => Ok(*v),
            Value::Bool(_) => Err(ExprError::TypeMismatch {
                expected: "numeric",
                found: self.to_string(),
            }),
        }
    }

    fn as_bool(&self) -> Result<bool, ExprError> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::Num(_) => Err(ExprError::TypeMismatch {
                expected: "boolean",
                found: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            c if c.is_whitespace() => pos += 1,
            c if c.is_ascii_digit() => {
                let start = pos;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos < chars.len() && chars[pos] == '.' {
                    pos += 1;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
                let literal: String = chars[start..pos].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedToken(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len()
                    && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_')
                {
                    pos += 1;
                }
                tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            }
            '+' => {
                tokens.push(Token::Plus);
                pos += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                pos += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                pos += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                pos += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            '=' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                pos += 2;
            }
            '!' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                pos += 2;
            }
            '<' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                pos += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                pos += 1;
            }
            '>' if chars.get(pos + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                pos += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                pos += 1;
            }
            '&' if chars.get(pos + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                pos += 2;
            }
            '|' if chars.get(pos + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                pos += 2;
            }
            ch => return Err(ExprError::UnexpectedChar { ch, pos }),
        }
    }

    Ok(tokens)
}

struct Evaluator<'a> {
    tokens: Vec<Token>,
    pos: usize,
    config: &'a Configuration,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Result<Token, ExprError> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token.ok_or(ExprError::UnexpectedEnd)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Value, ExprError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Value::Bool(lhs.as_bool()? || rhs.as_bool()?);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Value, ExprError> {
        let mut lhs = self.cmp()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.cmp()?;
            lhs = Value::Bool(lhs.as_bool()? && rhs.as_bool()?);
        }
        Ok(lhs)
    }

    fn cmp(&mut self) -> Result<Value, ExprError> {
        let lhs = self.add()?;
        let op = match self.peek() {
            Some(
                op @ (Token::EqEq
                | Token::NotEq
                | Token::Lt
                | Token::Gt
                | Token::Le
                | Token::Ge),
            ) => op.clone(),
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.add()?;

        // Equality works on matching kinds; ordering needs numbers.
        let result = match (op, lhs, rhs) {
            (Token::EqEq, Value::Bool(a), Value::Bool(b)) => a == b,
            (Token::NotEq, Value::Bool(a), Value::Bool(b)) => a != b,
            (Token::EqEq, a, b) => a.as_num()? == b.as_num()?,
            (Token::NotEq, a, b) => a.as_num()? != b.as_num()?,
            (Token::Lt, a, b) => a.as_num()? < b.as_num()?,
            (Token::Gt, a, b) => a.as_num()? > b.as_num()?,
            (Token::Le, a, b) => a.as_num()? <= b.as_num()?,
            (Token::Ge, a, b) => a.as_num()? >= b.as_num()?,
            _ => unreachable!("comparison operator checked above"),
        };
        Ok(Value::Bool(result))
    }

    fn add(&mut self) -> Result<Value, ExprError> {
        let mut lhs = self.mul()?;
        loop {
            if self.eat(&Token::Plus) {
                let rhs = self.mul()?;
                lhs = Value::Num(lhs.as_num()? + rhs.as_num()?);
            } else if self.eat(&Token::Minus) {
                let rhs = self.mul()?;
                lhs = Value::Num(lhs.as_num()? - rhs.as_num()?);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn mul(&mut self) -> Result<Value, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                let rhs = self.unary()?;
                lhs = Value::Num(lhs.as_num()? * rhs.as_num()?);
            } else if self.eat(&Token::Slash) {
                let rhs = self.unary()?;
                let divisor = rhs.as_num()?;
                if divisor == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                lhs = Value::Num(lhs.as_num()? / divisor);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        if self.eat(&Token::Minus) {
            let value = self.unary()?;
            return Ok(Value::Num(-value.as_num()?));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Value, ExprError> {
        match self.bump()? {
            Token::Number(v) => Ok(Value::Num(v)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => match self.config.get(&name) {
                    Some(ParamValue::Int(v)) => Ok(Value::Num(v as f64)),
                    Some(ParamValue::Float(v)) => Ok(Value::Num(v)),
                    Some(ParamValue::Bool(v)) => Ok(Value::Bool(v)),
                    None => Err(ExprError::UnknownParameter(name)),
                },
            },
            Token::LParen => {
                let value = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExprError::UnexpectedEnd);
                }
                Ok(value)
            }
            token => Err(ExprError::UnexpectedToken(token.to_string())),
        }
    }
}

/// Evaluate `input` against the configuration's bindings.
pub fn evaluate(input: &str, config: &Configuration) -> Result<Value, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::UnexpectedEnd);
    }
    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        config,
    };
    let value = evaluator.expr()?;
    if let Some(trailing) = evaluator.peek() {
        return Err(ExprError::UnexpectedToken(trailing.to_string()));
    }
    Ok(value)
}

/// Evaluate an expression that must produce a boolean (restrictions).
pub fn evaluate_bool(input: &str, config: &Configuration) -> Result<bool, ExprError> {
    evaluate(input, config)?.as_bool()
}

/// Evaluate an expression that must produce a number (grid divisors).
pub fn evaluate_number(input: &str, config: &Configuration) -> Result<f64, ExprError> {
    evaluate(input, config)?.as_num()
}
