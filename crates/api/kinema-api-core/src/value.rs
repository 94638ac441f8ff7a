//! Value: runtime instances of everything the engine can animate.
//! All numeric types use f64; CSS parsing lives outside this crate, so values
//! arrive already split into tokens.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// Latest values of an element keyed by property name.
pub type ValueMap = HashMap<String, Value>;

/// Coarse kind of a value, used for quick dispatch and unit-type checks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Unit(Unit),
    Color,
    Complex,
    Keyword,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Px,
    Percent,
    Deg,
    Vw,
    Vh,
    Em,
    Rem,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Px => "px",
            Unit::Percent => "%",
            Unit::Deg => "deg",
            Unit::Vw => "vw",
            Unit::Vh => "vh",
            Unit::Em => "em",
            Unit::Rem => "rem",
        }
    }
}

/// One piece of a complex value such as a box shadow or a filter chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Token {
    Number(f64),
    Unit(f64, Unit),
    Color(Rgba),
    /// Literal text between animatable parts (function names, separators).
    Text(String),
}

impl Token {
    fn same_shape(&self, other: &Token) -> bool {
        match (self, other) {
            (Token::Number(_), Token::Number(_)) => true,
            (Token::Unit(_, a), Token::Unit(_, b)) => a == b,
            (Token::Number(_), Token::Unit(..)) | (Token::Unit(..), Token::Number(_)) => true,
            (Token::Color(_), Token::Color(_)) => true,
            (Token::Text(a), Token::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// A tokenized multi-part value, e.g. `0px 4px 10px rgba(0, 0, 0, 0.5)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Complex {
    pub tokens: Vec<Token>,
}

impl Complex {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Two complex values can be mixed token by token when their templates agree.
    pub fn same_template(&self, other: &Complex) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(other.tokens.iter())
                .all(|(a, b)| a.same_shape(b))
    }

    /// Number of animatable (non-text) tokens.
    pub fn animatable_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !matches!(t, Token::Text(_)))
            .count()
    }

    /// Same template with numbers zeroed and colors made transparent.
    pub fn zeroed(&self) -> Complex {
        let tokens = self
            .tokens
            .iter()
            .map(|t| match t {
                Token::Number(_) => Token::Number(0.0),
                Token::Unit(_, u) => Token::Unit(0.0, *u),
                Token::Color(c) => Token::Color(c.transparent()),
                Token::Text(s) => Token::Text(s.clone()),
            })
            .collect();
        Complex { tokens }
    }

    pub fn is_zero(&self) -> bool {
        self.tokens.iter().all(|t| match t {
            Token::Number(n) | Token::Unit(n, _) => *n == 0.0,
            Token::Color(c) => c.alpha == 0.0,
            Token::Text(_) => true,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Unitless scalar (opacity, scale, progress).
    Number(f64),

    /// Scalar with a CSS unit.
    Unit(f64, Unit),

    /// RGBA color.
    Color(Rgba),

    /// Tokenized multi-part value.
    Complex(Complex),

    /// Symbolic value: `none`, `auto`, `var(--name)`, `visible`, ...
    Keyword(String),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Unit(_, u) => ValueKind::Unit(*u),
            Value::Color(_) => ValueKind::Color,
            Value::Complex(_) => ValueKind::Complex,
            Value::Keyword(_) => ValueKind::Keyword,
        }
    }

    pub fn px(v: f64) -> Self {
        Value::Unit(v, Unit::Px)
    }

    pub fn percent(v: f64) -> Self {
        Value::Unit(v, Unit::Percent)
    }

    pub fn keyword(s: impl Into<String>) -> Self {
        Value::Keyword(s.into())
    }

    pub fn none() -> Self {
        Value::Keyword("none".to_string())
    }

    /// Scalar payload of numbers and unit values.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) | Value::Unit(n, _) => Some(*n),
            _ => None,
        }
    }

    /// Replace the scalar payload while keeping the unit.
    pub fn with_number(&self, n: f64) -> Value {
        match self {
            Value::Unit(_, u) => Value::Unit(n, *u),
            _ => Value::Number(n),
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Value::Keyword(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Parse a value from its JSON representation.
    pub fn from_json_str(s: &str) -> Result<Value, ValueError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<Rgba> for Value {
    fn from(c: Rgba) -> Self {
        Value::Color(c)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Unit(n, u) => write!(f, "{n}{}", u.suffix()),
            Token::Color(c) => write!(f, "{c}"),
            Token::Text(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Unit(n, u) => write!(f, "{n}{}", u.suffix()),
            Value::Color(c) => write!(f, "{c}"),
            Value::Complex(c) => {
                for t in &c.tokens {
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            Value::Keyword(s) => f.write_str(s),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValueError {
    #[error("invalid value JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow(x: f64, alpha: f64) -> Complex {
        Complex::new(vec![
            Token::Unit(x, Unit::Px),
            Token::Text(" ".into()),
            Token::Unit(4.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Color(Rgba::new(0.0, 0.0, 0.0, alpha)),
        ])
    }

    #[test]
    fn templates_compare_by_shape() {
        assert!(shadow(1.0, 0.5).same_template(&shadow(10.0, 1.0)));
        let other = Complex::new(vec![Token::Unit(1.0, Unit::Px)]);
        assert!(!shadow(1.0, 0.5).same_template(&other));
    }

    #[test]
    fn zeroed_keeps_template() {
        let z = shadow(3.0, 0.5).zeroed();
        assert!(z.is_zero());
        assert!(z.same_template(&shadow(3.0, 0.5)));
        assert_eq!(z.animatable_count(), 3);
    }

    #[test]
    fn display_and_json() {
        assert_eq!(Value::px(12.5).to_string(), "12.5px");
        assert_eq!(Value::Complex(shadow(2.0, 1.0)).to_string(), "2px 4px rgba(0, 0, 0, 1)");
        let v = Value::from_json_str(r#"{"type":"Number","data":0.5}"#).unwrap();
        assert_eq!(v, Value::Number(0.5));
    }
}
