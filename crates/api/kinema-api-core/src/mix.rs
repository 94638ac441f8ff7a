//! Mixing utilities for Value types.
//! - numbers and unit values: precise lerp (exact at both endpoints)
//! - colors: squared-space channel mixing
//! - complex values: token-wise when templates match
//! - everything else: immediate switch at progress > 0

use crate::color::mix_color;
use crate::value::{Complex, Token};
use crate::Value;

/// Boxed mixer between two fixed endpoints.
pub type Mixer = Box<dyn Fn(f64) -> Value>;

/// Linear interpolation written so `p == 0` yields `from` and `p == 1` yields
/// `to` bit-for-bit.
#[inline]
pub fn mix_number(from: f64, to: f64, p: f64) -> f64 {
    from * (1.0 - p) + to * p
}

fn mix_immediate(from: &Value, to: &Value, p: f64) -> Value {
    if p > 0.0 {
        to.clone()
    } else {
        from.clone()
    }
}

/// `visibility` stays visible for the whole transition if either end is.
fn mix_visibility(from: &str, to: &str, p: f64) -> Option<Value> {
    let is_vis = |s: &str| s == "visible" || s == "hidden";
    if !is_vis(from) || !is_vis(to) || from == to {
        return None;
    }
    let visible = from == "visible" || to == "visible";
    if visible && p > 0.0 && p < 1.0 {
        return Some(Value::Keyword("visible".into()));
    }
    Some(Value::Keyword(if p >= 1.0 { to } else { from }.to_string()))
}

fn mix_token(a: &Token, b: &Token, p: f64) -> Token {
    match (a, b) {
        (Token::Number(x), Token::Number(y)) => Token::Number(mix_number(*x, *y, p)),
        (Token::Unit(x, u), Token::Unit(y, _)) => Token::Unit(mix_number(*x, *y, p), *u),
        (Token::Number(x), Token::Unit(y, u)) | (Token::Unit(x, u), Token::Number(y)) => {
            Token::Unit(mix_number(*x, *y, p), *u)
        }
        (Token::Color(x), Token::Color(y)) => Token::Color(mix_color(x, y, p)),
        _ => {
            if p > 0.0 {
                b.clone()
            } else {
                a.clone()
            }
        }
    }
}

fn mix_complex(a: &Complex, b: &Complex, p: f64) -> Option<Complex> {
    if !a.same_template(b) {
        return None;
    }
    let tokens = a
        .tokens
        .iter()
        .zip(b.tokens.iter())
        .map(|(x, y)| mix_token(x, y, p))
        .collect();
    Some(Complex { tokens })
}

/// Whether two values can be interpolated continuously.
pub fn can_mix(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => true,
        (Value::Unit(_, ua), Value::Unit(_, ub)) => ua == ub,
        (Value::Number(_), Value::Unit(..)) | (Value::Unit(..), Value::Number(_)) => true,
        (Value::Color(_), Value::Color(_)) => true,
        (Value::Complex(x), Value::Complex(y)) => x.same_template(y),
        _ => false,
    }
}

/// Mix `from` towards `to` at progress `p`.
pub fn mix(from: &Value, to: &Value, p: f64) -> Value {
    match (from, to) {
        (Value::Number(a), Value::Number(b)) => Value::Number(mix_number(*a, *b, p)),
        (Value::Unit(a, ua), Value::Unit(b, ub)) if ua == ub => {
            Value::Unit(mix_number(*a, *b, p), *ua)
        }
        (Value::Number(a), Value::Unit(b, u)) | (Value::Unit(a, u), Value::Number(b)) => {
            Value::Unit(mix_number(*a, *b, p), *u)
        }
        (Value::Color(a), Value::Color(b)) => Value::Color(mix_color(a, b, p)),
        (Value::Complex(a), Value::Complex(b)) => match mix_complex(a, b, p) {
            Some(c) => Value::Complex(c),
            None => mix_immediate(from, to, p),
        },
        (Value::Keyword(a), Value::Keyword(b)) => {
            mix_visibility(a, b, p).unwrap_or_else(|| mix_immediate(from, to, p))
        }
        _ => mix_immediate(from, to, p),
    }
}

/// Build a reusable mixer between two endpoints.
pub fn mixer(from: Value, to: Value) -> Mixer {
    Box::new(move |p| mix(&from, &to, p))
}
