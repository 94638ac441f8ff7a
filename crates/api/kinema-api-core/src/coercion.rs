//! Type tests and conversions between Value shapes.

use crate::value::Complex;
use crate::Value;

/// Numbers and unit values can carry velocity.
#[inline]
pub fn is_numeric_like(v: &Value) -> bool {
    matches!(v, Value::Number(_) | Value::Unit(..))
}

/// `var(--name)` or `var(--name, fallback)`.
pub fn is_css_variable(v: &Value) -> bool {
    v.as_keyword()
        .map(|s| s.trim_start().starts_with("var(--"))
        .unwrap_or(false)
}

/// Extract the custom property name and optional fallback from a `var()` keyword.
pub fn parse_css_variable(v: &Value) -> Option<(String, Option<String>)> {
    let s = v.as_keyword()?.trim();
    let inner = s.strip_prefix("var(")?.strip_suffix(')')?;
    let mut parts = inner.splitn(2, ',');
    let name = parts.next()?.trim();
    if !name.starts_with("--") {
        return None;
    }
    let fallback = parts.next().map(|f| f.trim().to_string());
    Some((name.to_string(), fallback))
}

/// Values that stand for "nothing here": `none`, `"0"`, zero numbers and
/// zero complex values.
pub fn is_none_like(v: &Value) -> bool {
    match v {
        Value::Number(n) => *n == 0.0,
        Value::Keyword(s) => {
            let s = s.trim();
            s == "none" || s == "0" || is_zero_value_string(s)
        }
        Value::Complex(c) => c.is_zero(),
        _ => false,
    }
}

/// Strings like `0px`, `0%` or `0deg`.
pub fn is_zero_value_string(s: &str) -> bool {
    let digits: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    !digits.is_empty()
        && digits.parse::<f64>().map(|n| n == 0.0).unwrap_or(false)
        && s[digits.len()..].chars().all(|c| c.is_ascii_alphabetic() || c == '%')
}

/// Whether this value can be interpolated at all.
pub fn is_animatable(v: &Value) -> bool {
    match v {
        Value::Number(_) | Value::Unit(..) | Value::Color(_) => true,
        Value::Complex(c) => c.animatable_count() > 0,
        Value::Keyword(s) => s == "0" || is_zero_value_string(s),
    }
}

/// Zero-equivalent of `template`: numbers to 0, colors to transparent,
/// complex values keep their template with zeroed parts.
pub fn zero_equivalent(template: &Value) -> Option<Value> {
    match template {
        Value::Number(_) => Some(Value::Number(0.0)),
        Value::Unit(_, u) => Some(Value::Unit(0.0, *u)),
        Value::Color(c) => Some(Value::Color(c.transparent())),
        Value::Complex(c) => Some(Value::Complex(c.zeroed())),
        Value::Keyword(_) => None,
    }
}

/// Coerce a zero keyword (`"0"`, `"0px"`) into a number.
pub fn keyword_to_number(v: &Value) -> Option<f64> {
    let s = v.as_keyword()?.trim();
    if s == "0" || is_zero_value_string(s) {
        return Some(0.0);
    }
    s.parse::<f64>().ok()
}

/// An empty complex value, used where a template is required but none exists.
pub fn empty_complex() -> Value {
    Value::Complex(Complex::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rgba, Unit};

    #[test]
    fn none_like_detection() {
        assert!(is_none_like(&Value::none()));
        assert!(is_none_like(&Value::keyword("0")));
        assert!(is_none_like(&Value::keyword("0px")));
        assert!(is_none_like(&Value::Number(0.0)));
        assert!(!is_none_like(&Value::px(0.0)));
        assert!(!is_none_like(&Value::keyword("auto")));
    }

    #[test]
    fn css_variables() {
        let v = Value::keyword("var(--accent, red)");
        assert!(is_css_variable(&v));
        let (name, fallback) = parse_css_variable(&v).unwrap();
        assert_eq!(name, "--accent");
        assert_eq!(fallback.as_deref(), Some("red"));
        assert!(parse_css_variable(&Value::keyword("var(accent)")).is_none());
    }

    #[test]
    fn zero_equivalents() {
        assert_eq!(
            zero_equivalent(&Value::Unit(3.0, Unit::Deg)),
            Some(Value::Unit(0.0, Unit::Deg))
        );
        assert_eq!(
            zero_equivalent(&Value::Color(Rgba::new(10.0, 20.0, 30.0, 1.0))),
            Some(Value::Color(Rgba::new(10.0, 20.0, 30.0, 0.0)))
        );
        assert_eq!(zero_equivalent(&Value::none()), None);
    }
}
