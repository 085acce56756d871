//! Dice formulas.
//!
//! Corruption costs travel as symbolic formulas (`"1d4 + 3"`,
//! `"(1d4 + 2) * (0.5)"`) and are evaluated exactly once, wrapped in
//! `ceil()`. This module parses that small arithmetic language and
//! evaluates it, either with real dice or deterministically.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for formula parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Empty formula")]
    Empty,
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Formula '{0}' contains dice and has no fixed value")]
    NonDeterministic(String),
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }

    /// Parse a hit-die denomination such as `"d8"`.
    pub fn from_denomination(denomination: &str) -> Option<DieType> {
        let sides = denomination.trim().strip_prefix(['d', 'D'])?;
        sides.parse().ok().and_then(DieType::from_sides)
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

impl FromStr for DieType {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DieType::from_denomination(s).ok_or_else(|| DiceError::InvalidNotation(s.to_string()))
    }
}

// ============================================================================
// Formula AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Ceil,
    Floor,
    Round,
    Abs,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        match name {
            "ceil" => Some(Func::Ceil),
            "floor" => Some(Func::Floor),
            "round" => Some(Func::Round),
            "abs" => Some(Func::Abs),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            _ => None,
        }
    }

    fn arity(&self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Dice { count: u32, die_type: DieType },
    Neg(Box<Node>),
    Binary {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call { func: Func, args: Vec<Node> },
}

impl Node {
    fn has_dice(&self) -> bool {
        match self {
            Node::Number(_) => false,
            Node::Dice { .. } => true,
            Node::Neg(inner) => inner.has_dice(),
            Node::Binary { lhs, rhs, .. } => lhs.has_dice() || rhs.has_dice(),
            Node::Call { args, .. } => args.iter().any(Node::has_dice),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Dice(u32, DieType),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

/// Most dice a single `NdM` term may roll.
const MAX_DICE: u32 = 1000;

fn tokenize(source: &str) -> Result<Vec<Token>, DiceError> {
    let chars: Vec<char> = source.chars().collect();
    let invalid = || DiceError::InvalidNotation(source.to_string());
    let mut tokens = Vec::new();
    let mut i = 0;

    let read_digits = |mut j: usize| {
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        j
    };

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                let mut end = read_digits(i);
                if end < chars.len() && chars[end] == '.' {
                    end = read_digits(end + 1);
                }
                let literal: String = chars[start..end].iter().collect();

                // `NdM` dice term
                if end + 1 < chars.len() && chars[end] == 'd' && chars[end + 1].is_ascii_digit() {
                    let count: u32 = literal.parse().map_err(|_| invalid())?;
                    if count > MAX_DICE {
                        return Err(invalid());
                    }
                    let sides_end = read_digits(end + 1);
                    let sides: u32 = chars[end + 1..sides_end]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| invalid())?;
                    let die_type =
                        DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;
                    tokens.push(Token::Dice(count, die_type));
                    i = sides_end;
                } else {
                    let value: f64 = literal.parse().map_err(|_| invalid())?;
                    tokens.push(Token::Num(value));
                    i = end;
                }
            }
            c if c.is_ascii_alphabetic() => {
                // A bare `dM` is one die.
                if c == 'd' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    let sides_end = read_digits(i + 1);
                    let sides: u32 = chars[i + 1..sides_end]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| invalid())?;
                    let die_type =
                        DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;
                    tokens.push(Token::Dice(1, die_type));
                    i = sides_end;
                    continue;
                }
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(invalid()),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn invalid(&self) -> DiceError {
        DiceError::InvalidNotation(self.source.to_string())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), DiceError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            _ => Err(self.invalid()),
        }
    }

    fn expr(&mut self) -> Result<Node, DiceError> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.term()?;
            node = Node::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Node, DiceError> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Node, DiceError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Node, DiceError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(Node::Number(value)),
            Some(Token::Dice(count, die_type)) => Ok(Node::Dice { count, die_type }),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                let func = Func::lookup(&name).ok_or(DiceError::UnknownFunction(name.clone()))?;
                self.expect(Token::LParen)?;
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.expect(Token::RParen)?;
                if args.len() != func.arity() {
                    return Err(DiceError::Arity {
                        name,
                        expected: func.arity(),
                        found: args.len(),
                    });
                }
                Ok(Node::Call { func, args })
            }
            _ => Err(self.invalid()),
        }
    }
}

// ============================================================================
// Formula
// ============================================================================

/// A parsed formula, e.g. `ceil((1d4 + 3) * (0.5))`.
#[derive(Debug, Clone)]
pub struct Formula {
    root: Node,
    original: String,
}

impl Formula {
    /// Parse a formula string.
    pub fn parse(source: &str) -> Result<Self, DiceError> {
        let normalized = source.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DiceError::Empty);
        }

        let tokens = tokenize(&normalized)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            source: &normalized,
        };
        let root = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.invalid());
        }

        Ok(Formula {
            root,
            original: normalized,
        })
    }

    /// True when the formula contains no dice terms.
    pub fn is_deterministic(&self) -> bool {
        !self.root.has_dice()
    }

    /// Evaluate a formula without dice. Fails if any dice term is present.
    pub fn evaluate_deterministic(&self) -> Result<f64, DiceError> {
        let original = &self.original;
        eval(&self.root, original, &mut |_, _| {
            Err(DiceError::NonDeterministic(original.clone()))
        })
    }

    /// Roll the formula with the thread-local RNG.
    pub fn roll(&self) -> Result<RollResult, DiceError> {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> Result<RollResult, DiceError> {
        self.roll_with(|die_type| rng.gen_range(1..=die_type.sides()))
    }

    /// Evaluate using a caller-supplied face for every die rolled.
    pub fn roll_with(&self, mut face: impl FnMut(DieType) -> u32) -> Result<RollResult, DiceError> {
        let mut component_results = Vec::new();
        let total = eval(&self.root, &self.original, &mut |count, die_type| {
            let rolls: Vec<u32> = (0..count)
                .map(|_| face(die_type).clamp(1, die_type.sides()))
                .collect();
            let subtotal: u32 = rolls.iter().sum();
            component_results.push(ComponentResult {
                die_type,
                rolls,
                subtotal,
            });
            Ok(subtotal as f64)
        })?;

        Ok(RollResult {
            formula: self.original.clone(),
            component_results,
            total,
        })
    }
}

fn eval(
    node: &Node,
    source: &str,
    dice: &mut dyn FnMut(u32, DieType) -> Result<f64, DiceError>,
) -> Result<f64, DiceError> {
    match node {
        Node::Number(value) => Ok(*value),
        Node::Dice { count, die_type } => dice(*count, *die_type),
        Node::Neg(inner) => Ok(-eval(inner, source, dice)?),
        Node::Binary { op, lhs, rhs } => {
            let a = eval(lhs, source, dice)?;
            let b = eval(rhs, source, dice)?;
            match op {
                BinOp::Add => Ok(a + b),
                BinOp::Sub => Ok(a - b),
                BinOp::Mul => Ok(a * b),
                BinOp::Div if b == 0.0 => Err(DiceError::DivisionByZero(source.to_string())),
                BinOp::Div => Ok(a / b),
            }
        }
        Node::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, source, dice))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match func {
                Func::Ceil => values[0].ceil(),
                Func::Floor => values[0].floor(),
                Func::Round => values[0].round(),
                Func::Abs => values[0].abs(),
                Func::Min => values[0].min(values[1]),
                Func::Max => values[0].max(values[1]),
            })
        }
    }
}

impl FromStr for Formula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of evaluating a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub formula: String,
    pub component_results: Vec<ComponentResult>,
    pub total: f64,
}

impl RollResult {
    /// Integer total, rounded to the nearest whole number.
    pub fn integer_total(&self) -> i32 {
        self.total.round() as i32
    }

    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        self.component_results
            .iter()
            .map(|c| {
                format!(
                    "[{}]",
                    c.rolls
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.formula, self.total)
    }
}

/// Convenience function to roll a formula string.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    Formula::parse(notation)?.roll()
}

/// Evaluate a formula that must not contain dice.
pub fn simplify(notation: &str) -> Result<f64, DiceError> {
    Formula::parse(notation)?.evaluate_deterministic()
}
