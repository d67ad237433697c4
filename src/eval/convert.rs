//! Value to literal node conversion.

use crate::{
    ast::Expr,
    eval::{ConversionError, Value},
};

/// Containers must have fewer elements than this to be turned into literals.
pub const MAX_LEN: usize = 256;

/// Converts an evaluated value into a literal expression.
///
/// Scalars map directly. Lists, tuples, sets and mappings map element-wise
/// and recursively, and only if each container holds fewer than `max_len`
/// elements. Strings are not capped.
///
/// # Errors
///
/// Returns a [`ConversionError`] for values without a literal spelling, for
/// oversized containers and for non-finite floats.
pub fn to_node(value: &Value, max_len: usize) -> Result<Expr, ConversionError> {
    let check = |len: usize| {
        if len < max_len {
            Ok(())
        } else {
            Err(ConversionError::TooLarge { len, max: max_len })
        }
    };
    let convert_all = |items: &[Value]| -> Result<Vec<Expr>, ConversionError> {
        check(items.len())?;
        items.iter().map(|v| to_node(v, max_len)).collect()
    };

    Ok(match value {
        Value::Int(v) => Expr::int(*v),
        Value::Float(v) if v.is_finite() => Expr::float(*v),
        Value::Complex { re, im } if re.is_finite() && im.is_finite() => Expr::complex(*re, *im),
        Value::Float(_) | Value::Complex { .. } => return Err(ConversionError::NonFinite),
        Value::Bool(b) => Expr::bool(*b),
        Value::Str(s) => Expr::str(s.clone()),
        Value::List(items) => Expr::list(convert_all(items)?),
        Value::Tuple(items) => Expr::tuple(convert_all(items)?),
        Value::Set(items) => Expr::set(convert_all(items)?),
        Value::Dict(pairs) => {
            check(pairs.len())?;
            let mut converted = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                converted.push((to_node(k, max_len)?, to_node(v, max_len)?));
            }
            Expr::dict(converted)
        }
        Value::Iter(_) | Value::None => {
            return Err(ConversionError::Unsupported(value.kind_name()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(to_node(&Value::Int(-4), MAX_LEN).unwrap().to_string(), "-4");
        assert_eq!(
            to_node(&Value::Float(0.5), MAX_LEN).unwrap().to_string(),
            "0.5"
        );
        assert_eq!(
            to_node(&Value::Bool(true), MAX_LEN).unwrap().to_string(),
            "True"
        );
        assert_eq!(
            to_node(&Value::Str("a'b".into()), MAX_LEN)
                .unwrap()
                .to_string(),
            "'a\\'b'"
        );
    }

    #[test]
    fn test_size_cap_is_strict() {
        let below = Value::List((0..255).map(Value::Int).collect());
        assert!(to_node(&below, MAX_LEN).is_ok());

        let at = Value::List((0..256).map(Value::Int).collect());
        assert_eq!(
            to_node(&at, MAX_LEN),
            Err(ConversionError::TooLarge { len: 256, max: 256 })
        );

        // the cap applies to nested containers too
        let nested = Value::Tuple(vec![Value::Set((0..300).map(Value::Int).collect())]);
        assert!(matches!(
            to_node(&nested, MAX_LEN),
            Err(ConversionError::TooLarge { len: 300, .. })
        ));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            to_node(&Value::Float(f64::INFINITY), MAX_LEN),
            Err(ConversionError::NonFinite)
        );
        assert_eq!(
            to_node(&Value::Complex { re: 0.0, im: f64::NAN }, MAX_LEN),
            Err(ConversionError::NonFinite)
        );
        assert!(matches!(
            to_node(&Value::Iter(vec![]), MAX_LEN),
            Err(ConversionError::Unsupported(_))
        ));
        assert!(matches!(
            to_node(&Value::None, MAX_LEN),
            Err(ConversionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_containers_become_literal_values() {
        let value = Value::Dict(vec![(
            Value::Str("k".into()),
            Value::List(vec![Value::Int(1), Value::Int(2)]),
        )]);
        let node = to_node(&value, MAX_LEN).unwrap();
        assert!(node.is_literal_value());
        assert_eq!(node.to_string(), "{'k': [1, 2]}");
    }
}
