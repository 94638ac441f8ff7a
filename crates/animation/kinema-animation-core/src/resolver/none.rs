//! Turning "none" keyframes into something that can be interpolated.

use kinema_api_core::coercion::{is_none_like, zero_equivalent};
use kinema_api_core::Value;

/// Indexes of keyframes that stand for "nothing".
pub fn none_keyframe_indexes(keyframes: &[Option<Value>]) -> Vec<usize> {
    keyframes
        .iter()
        .enumerate()
        .filter(|(_, k)| k.as_ref().map(is_none_like).unwrap_or(true))
        .map(|(i, _)| i)
        .collect()
}

/// Replace none keyframes with the zero-equivalent of the first animatable
/// keyframe. Without such a template the keyframes are left alone and the
/// animation will cut instead of tween.
pub fn make_none_keyframes_animatable(keyframes: &mut [Option<Value>], indexes: &[usize]) {
    let template = keyframes.iter().flatten().find(|k| match k {
        Value::Number(_) => false,
        Value::Keyword(_) => false,
        other => !is_none_like(other),
    });
    let Some(zero) = template.and_then(zero_equivalent) else {
        return;
    };
    for &i in indexes {
        if let Some(slot) = keyframes.get_mut(i) {
            *slot = Some(zero.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinema_api_core::{Complex, Rgba, Token, Unit};

    fn shadow() -> Value {
        Value::Complex(Complex::new(vec![
            Token::Unit(2.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Unit(4.0, Unit::Px),
            Token::Text(" ".into()),
            Token::Color(Rgba::new(0.0, 0.0, 0.0, 0.5)),
        ]))
    }

    #[test]
    fn none_takes_template_shape() {
        let mut frames = vec![Some(Value::none()), Some(shadow())];
        let idx = none_keyframe_indexes(&frames);
        assert_eq!(idx, vec![0]);
        make_none_keyframes_animatable(&mut frames, &idx);
        match &frames[0] {
            Some(Value::Complex(c)) => {
                assert!(c.same_template(match &shadow() {
                    Value::Complex(s) => s,
                    _ => unreachable!(),
                }));
                assert!(c.is_zero());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn without_template_nothing_changes() {
        let mut frames = vec![Some(Value::none()), Some(Value::keyword("auto"))];
        make_none_keyframes_animatable(&mut frames, &[0]);
        assert_eq!(frames[0], Some(Value::none()));
    }
}
