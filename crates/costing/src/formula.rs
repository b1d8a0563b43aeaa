//! Cost formula evaluation.
//!
//! Formulas are a restricted arithmetic language: numbers, `+ - * /`,
//! parentheses and whitespace. Evaluation goes tokenize → parse into an
//! [`Expr`] tree (recursive descent) → evaluate, and reports every failure as
//! a [`FormulaError`] value instead of panicking.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | '(' expr ')'
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parenthesis and unary-minus nesting accepted before a formula is rejected.
pub const MAX_NESTING: usize = 64;

/// Tokens accepted in one formula. Operator chains build a tree as deep as
/// the chain is long, so length is bounded as well as nesting.
pub const MAX_TOKENS: usize = 1024;

/// Why a formula could not be evaluated. Positions are zero-based character
/// offsets into the formula.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormulaError {
    #[error("invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("unbalanced parenthesis at position {position}")]
    UnbalancedParenthesis { position: usize },

    #[error("empty parentheses at position {position}")]
    EmptyParentheses { position: usize },

    #[error("unexpected end of formula: an operand is missing")]
    UnexpectedEnd,

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("formula is nested too deeply (limit {})", MAX_NESTING)]
    TooDeep,

    #[error("formula is too long (limit {} numbers and operators)", MAX_TOKENS)]
    TooLong,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

/// Parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate the tree with f64 arithmetic.
    pub fn eval(&self) -> Result<f64, FormulaError> {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Negate(inner) => -inner.eval()?,
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval()?;
                let r = rhs.eval()?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return Err(FormulaError::DivisionByZero);
                        }
                        l / r
                    }
                }
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

impl core::fmt::Display for Expr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Negate(inner) => write!(f, "(-{inner})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_digit() || ch.is_whitespace() || matches!(ch, '.' | '+' | '-' | '*' | '/' | '(' | ')')
}

/// Input filter applied when a user commits a formula.
///
/// Drops characters outside the formula alphabet and collapses runs of `*`
/// into a single `*` (so `5**3` becomes `5*3`).
pub fn normalize_formula(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars().filter(|c| is_allowed(*c)) {
        if ch == '*' && out.ends_with('*') {
            continue;
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Op(BinaryOp),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

impl Token {
    fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Op(op) => op.symbol().to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
        }
    }
}

fn tokenize(formula: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = formula.chars().collect();

    if let Some((position, ch)) = chars.iter().enumerate().find(|(_, c)| !is_allowed(**c)) {
        return Err(FormulaError::InvalidCharacter { ch: *ch, position });
    }

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong);
        }
        let ch = chars[i];
        let kind = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Number(parse_number(&text, start)?),
                    position: start,
                });
                continue;
            }
            '+' => TokenKind::Op(BinaryOp::Add),
            '-' => TokenKind::Op(BinaryOp::Sub),
            '*' => TokenKind::Op(BinaryOp::Mul),
            '/' => TokenKind::Op(BinaryOp::Div),
            '(' => TokenKind::LParen,
            _ => TokenKind::RParen,
        };
        tokens.push(Token { kind, position: i });
        i += 1;
    }

    if tokens.len() > MAX_TOKENS {
        return Err(FormulaError::TooLong);
    }
    Ok(tokens)
}

fn parse_number(text: &str, position: usize) -> Result<f64, FormulaError> {
    let invalid = || FormulaError::InvalidNumber {
        text: text.to_string(),
        position,
    };

    if text.matches('.').count() > 1 || !text.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(invalid()),
    }
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

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_op(&self, wanted: &[BinaryOp]) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) if wanted.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek_op(&[BinaryOp::Add, BinaryOp::Sub]) {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_op(&[BinaryOp::Mul, BinaryOp::Div]) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.peek_op(&[BinaryOp::Sub]).is_some() {
            self.pos += 1;
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.next().ok_or(FormulaError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::LParen => {
                if matches!(self.peek(), Some(Token { kind: TokenKind::RParen, .. })) {
                    return Err(FormulaError::EmptyParentheses {
                        position: token.position,
                    });
                }
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        found: other.describe(),
                        position: other.position,
                    }),
                    None => Err(FormulaError::UnbalancedParenthesis {
                        position: token.position,
                    }),
                }
            }
            _ => Err(FormulaError::UnexpectedToken {
                found: token.describe(),
                position: token.position,
            }),
        }
    }
}

/// Parse a formula into an expression tree. `Ok(None)` for an empty
/// (or whitespace-only) formula.
pub fn parse(formula: &str) -> Result<Option<Expr>, FormulaError> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;

    if let Some(extra) = parser.next() {
        return Err(match extra.kind {
            TokenKind::RParen => FormulaError::UnbalancedParenthesis {
                position: extra.position,
            },
            _ => FormulaError::UnexpectedToken {
                found: extra.describe(),
                position: extra.position,
            },
        });
    }

    Ok(Some(expr))
}

/// Evaluate a formula.
///
/// - `Ok(Some(value))`: valid formula.
/// - `Ok(None)`: empty formula ("no formula yet", not an error).
/// - `Err(e)`: syntax or arithmetic failure; `e.to_string()` is the message
///   shown next to the row.
pub fn evaluate(formula: &str) -> Result<Option<f64>, FormulaError> {
    match parse(formula)? {
        Some(expr) => expr.eval().map(Some),
        None => Ok(None),
    }
}

/// Outcome of evaluating a formula, in the shape rows and UIs consume.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Empty,
    Valid(f64),
    Invalid(FormulaError),
}

impl Evaluation {
    pub fn of(formula: &str) -> Self {
        match evaluate(formula) {
            Ok(Some(value)) => Evaluation::Valid(value),
            Ok(None) => Evaluation::Empty,
            Err(e) => Evaluation::Invalid(e),
        }
    }

    /// Empty formulas count as valid.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Evaluation::Invalid(_))
    }

    pub fn result(&self) -> Option<f64> {
        match self {
            Evaluation::Valid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FormulaError> {
        match self {
            Evaluation::Invalid(e) => Some(e),
            _ => None,
        }
    }

    /// Contribution to aggregation: empty and invalid formulas cost 0.
    pub fn cost(&self) -> f64 {
        self.result().unwrap_or(0.0)
    }
}
