//! Runtime values produced by the evaluator.

use std::{cmp::Ordering, fmt};

use crate::{
    ast::{complex_repr, float_repr, str_repr},
    eval::{EvalError, EvalLimits, EvalResult},
};

/// A compile-time value.
///
/// Sets and mappings keep their elements in first-insertion order, so
/// converting them back into literal nodes is deterministic. `PartialEq` is
/// structural; use [`Value::py_eq`] for language equality, which also equates
/// numbers of different kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// Complex number
    Complex {
        /// Real part
        re: f64,
        /// Imaginary part
        im: f64,
    },
    /// `True` / `False`
    Bool(bool),
    /// Text string
    Str(String),
    /// Mutable sequence
    List(Vec<Value>),
    /// Immutable sequence
    Tuple(Vec<Value>),
    /// Unordered unique elements, kept in insertion order
    Set(Vec<Value>),
    /// Key/value mapping, kept in insertion order
    Dict(Vec<(Value, Value)>),
    /// A one-shot iterator such as a generator or `xrange` result
    Iter(Vec<Value>),
    /// `None`
    None,
}

impl Value {
    /// Name of the value's kind, as used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex { .. } => "complex",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Iter(_) => "iterator",
            Value::None => "NoneType",
        }
    }

    /// Truth value testing.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Complex { re, im } => *re != 0.0 || *im != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) | Value::Iter(items) => {
                !items.is_empty()
            }
            Value::Dict(pairs) => !pairs.is_empty(),
            Value::None => false,
        }
    }

    /// Integer view of ints and booleans.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Float view of any real number.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            other => other.as_int().map(|v| v as f64),
        }
    }

    /// Complex view of any number.
    #[must_use]
    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match self {
            Value::Complex { re, im } => Some((*re, *im)),
            other => other.as_float().map(|re| (re, 0.0)),
        }
    }

    /// Returns `true` for ints, floats, complex numbers and booleans.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Float(_) | Value::Complex { .. } | Value::Bool(_)
        )
    }

    /// Returns `true` if the value may be a set element or mapping key.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) | Value::Set(_) | Value::Dict(_) | Value::Iter(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    /// Iterates the value, producing its elements.
    ///
    /// Strings yield one-character strings, mappings yield their keys.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Type`] for non-iterable values.
    pub fn items(&self) -> EvalResult<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) | Value::Iter(items) => {
                Ok(items.clone())
            }
            Value::Dict(pairs) => Ok(pairs.iter().map(|(k, _)| k.clone()).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(EvalError::Type(format!(
                "'{}' object is not iterable",
                other.kind_name()
            ))),
        }
    }

    /// Builds a set from elements, dropping duplicates but keeping the first
    /// occurrence's position.
    ///
    /// # Errors
    ///
    /// Fails on unhashable elements or when the set exceeds the hashed cap.
    pub fn set_from(items: Vec<Value>, limits: &EvalLimits) -> EvalResult<Value> {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !item.is_hashable() {
                return Err(EvalError::Type(format!(
                    "unhashable type: '{}'",
                    item.kind_name()
                )));
            }
            if !out.iter().any(|seen| seen.py_eq(&item)) {
                out.push(item);
                limits.check_hashed(out.len())?;
            }
        }
        Ok(Value::Set(out))
    }

    /// Builds a mapping from pairs. A repeated key keeps its first position
    /// and takes the last value.
    ///
    /// # Errors
    ///
    /// Fails on unhashable keys or when the mapping exceeds the hashed cap.
    pub fn dict_from(pairs: Vec<(Value, Value)>, limits: &EvalLimits) -> EvalResult<Value> {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (key, value) in pairs {
            if !key.is_hashable() {
                return Err(EvalError::Type(format!(
                    "unhashable type: '{}'",
                    key.kind_name()
                )));
            }
            match out.iter_mut().find(|(seen, _)| seen.py_eq(&key)) {
                Some(slot) => slot.1 = value,
                None => {
                    out.push((key, value));
                    limits.check_hashed(out.len())?;
                }
            }
        }
        Ok(Value::Dict(out))
    }

    /// Language equality: numbers compare by value across kinds, sets and
    /// mappings ignore order, a list never equals a tuple.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn py_eq(&self, other: &Value) -> bool {
        if self.is_number() && other.is_number() {
            return match (self.as_int(), other.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_complex(), other.as_complex()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            };
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.py_eq(y)))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter()
                            .find(|(k2, _)| k.py_eq(k2))
                            .is_some_and(|(_, v2)| v.py_eq(v2))
                    })
            }
            (Value::None, Value::None) => true,
            _ => false,
        }
    }

    /// Language ordering for `<`, `<=`, `>`, `>=`, `min`, `max` and `sorted`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Type`] for unorderable pairs (complex numbers,
    /// mixed kinds) and [`EvalError::Unsupported`] for NaN, whose comparisons
    /// do not form an ordering.
    pub fn py_cmp(&self, other: &Value) -> EvalResult<Ordering> {
        match (self, other) {
            (a, b) if a.as_int().is_some() && b.as_int().is_some() => {
                Ok(a.as_int().cmp(&b.as_int()))
            }
            (Value::Complex { .. }, _) | (_, Value::Complex { .. }) => Err(EvalError::Type(
                "complex numbers are not orderable".to_string(),
            )),
            (a, b) if a.is_number() && b.is_number() => {
                match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => x
                        .partial_cmp(&y)
                        .ok_or_else(|| EvalError::Unsupported("comparison with nan".to_string())),
                    _ => Err(EvalError::Type("unorderable numbers".to_string())),
                }
            }
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.py_eq(y) {
                        return x.py_cmp(y);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (a, b) => Err(EvalError::Type(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.kind_name(),
                b.kind_name()
            ))),
        }
    }

    /// Text produced by `str(value)`.
    #[must_use]
    pub fn to_py_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Text produced by `repr(value)`.
    #[must_use]
    pub fn repr(&self) -> String {
        fn join(items: &[Value]) -> String {
            items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
        }

        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => float_repr(*v),
            Value::Complex { re, im } => complex_repr(*re, *im),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Str(s) => str_repr(s),
            Value::List(items) => format!("[{}]", join(items)),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join(items)),
            Value::Set(items) if items.is_empty() => "set()".to_string(),
            Value::Set(items) => format!("{{{}}}", join(items)),
            Value::Dict(pairs) => {
                let body: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", body.join(", "))
            }
            Value::Iter(_) => "<iterator>".to_string(),
            Value::None => "None".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_crosses_kinds() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(Value::Complex { re: 2.0, im: 0.0 }.py_eq(&Value::Int(2)));
        assert!(!Value::List(vec![Value::Int(1)]).py_eq(&Value::Tuple(vec![Value::Int(1)])));
        assert!(Value::Set(vec![Value::Int(1), Value::Int(2)])
            .py_eq(&Value::Set(vec![Value::Int(2), Value::Int(1)])));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            Value::Int(1).py_cmp(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Int(2)])
                .py_cmp(&Value::Tuple(vec![Value::Int(1)]))
                .unwrap(),
            Ordering::Greater
        );
        assert!(Value::Str("a".into()).py_cmp(&Value::Int(1)).is_err());
        assert!(Value::Float(f64::NAN).py_cmp(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_set_and_dict_keep_first_position() {
        let limits = EvalLimits::default();
        let set = Value::set_from(
            vec![Value::Int(3), Value::Int(1), Value::Float(3.0)],
            &limits,
        )
        .unwrap();
        assert_eq!(set, Value::Set(vec![Value::Int(3), Value::Int(1)]));

        let dict = Value::dict_from(
            vec![
                (Value::Str("a".into()), Value::Int(1)),
                (Value::Str("b".into()), Value::Int(2)),
                (Value::Str("a".into()), Value::Int(3)),
            ],
            &limits,
        )
        .unwrap();
        assert_eq!(dict.repr(), "{'a': 3, 'b': 2}");

        assert!(Value::set_from(vec![Value::List(vec![])], &limits).is_err());
    }

    #[test]
    fn test_hashed_cap() {
        let limits = EvalLimits {
            max_hashed: 2,
            ..EvalLimits::default()
        };
        let items = (0..3).map(Value::Int).collect();
        assert_eq!(
            Value::set_from(items, &limits),
            Err(EvalError::ContainerTooLarge(3))
        );
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(
            Value::List(vec![Value::Str("x".into()), Value::Float(2.0)]).repr(),
            "['x', 2.0]"
        );
        assert_eq!(Value::Str("x".into()).to_py_str(), "x");
        assert_eq!(Value::Set(vec![]).repr(), "set()");
        assert!(!Value::None.is_truthy());
    }
}
