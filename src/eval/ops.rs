//! Operator semantics.
//!
//! Integers are 64-bit and every integer operation is checked: leaving the
//! range is an [`EvalError::Overflow`], never a wrapped result. Booleans take
//! part in arithmetic as `0` and `1`.

use crate::{
    ast::{BinOp, CmpOp, UnaryOp},
    eval::{EvalError, EvalLimits, EvalResult, Value},
};

/// Numeric operand after promotion to a common kind.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
}

/// Promotes two numbers to their common kind.
fn promote(a: &Value, b: &Value) -> Option<(Num, Num)> {
    if !a.is_number() || !b.is_number() {
        return None;
    }
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Some((Num::Int(x), Num::Int(y)));
    }
    if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
        return Some((Num::Float(x), Num::Float(y)));
    }
    let (ar, ai) = a.as_complex()?;
    let (br, bi) = b.as_complex()?;
    Some((Num::Complex(ar, ai), Num::Complex(br, bi)))
}

fn type_error(op: BinOp, a: &Value, b: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.kind_name(),
        b.kind_name()
    ))
}

fn float_result(value: f64) -> EvalResult<Value> {
    if value.is_infinite() {
        Err(EvalError::Overflow)
    } else {
        Ok(Value::Float(value))
    }
}

/// Floor division and modulo on integers, following the sign of the divisor.
fn int_divmod(a: i64, b: i64) -> EvalResult<(i64, i64)> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let mut q = a.checked_div(b).ok_or(EvalError::Overflow)?;
    let mut r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        q -= 1;
        r += b;
    }
    Ok((q, r))
}

fn float_divmod(a: f64, b: f64) -> EvalResult<(f64, f64)> {
    if b == 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    let mut r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r += b;
    }
    let q = ((a - r) / b).round();
    Ok((q, r))
}

/// Floor quotient and remainder of two real numbers, as `divmod` returns them.
pub(crate) fn divmod(a: &Value, b: &Value) -> EvalResult<(Value, Value)> {
    match promote(a, b) {
        Some((Num::Int(x), Num::Int(y))) => {
            let (q, r) = int_divmod(x, y)?;
            Ok((Value::Int(q), Value::Int(r)))
        }
        Some((Num::Float(x), Num::Float(y))) => {
            let (q, r) = float_divmod(x, y)?;
            Ok((Value::Float(q), Value::Float(r)))
        }
        _ => Err(type_error(BinOp::FloorDiv, a, b)),
    }
}

fn int_pow(base: i64, exp: i64) -> EvalResult<Value> {
    if exp < 0 {
        #[allow(clippy::cast_precision_loss)]
        let (b, e) = (base as f64, exp as f64);
        if base == 0 {
            return Err(EvalError::ZeroDivision);
        }
        return float_result(b.powf(e));
    }
    match base {
        0 | 1 => Ok(Value::Int(if exp == 0 { 1 } else { base })),
        -1 => Ok(Value::Int(if exp % 2 == 0 { 1 } else { -1 })),
        _ => {
            let exp = u32::try_from(exp).map_err(|_| EvalError::Overflow)?;
            base.checked_pow(exp)
                .map(Value::Int)
                .ok_or(EvalError::Overflow)
        }
    }
}

fn repeat(items: &[Value], count: i64, limits: &EvalLimits) -> EvalResult<Vec<Value>> {
    let count = usize::try_from(count.max(0)).map_err(|_| EvalError::Overflow)?;
    let total = items
        .len()
        .checked_mul(count)
        .ok_or(EvalError::Overflow)?;
    limits.check_items(total)?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn concat(a: &[Value], b: &[Value], limits: &EvalLimits) -> EvalResult<Vec<Value>> {
    limits.check_items(a.len() + b.len())?;
    let mut out = a.to_vec();
    out.extend(b.iter().cloned());
    Ok(out)
}

fn set_op(op: BinOp, a: &[Value], b: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    let contains = |items: &[Value], x: &Value| items.iter().any(|y| y.py_eq(x));
    let items: Vec<Value> = match op {
        BinOp::BitOr => a.iter().chain(b).cloned().collect(),
        BinOp::BitAnd => a.iter().filter(|x| contains(b, x)).cloned().collect(),
        BinOp::Sub => a.iter().filter(|x| !contains(b, x)).cloned().collect(),
        BinOp::BitXor => a
            .iter()
            .filter(|x| !contains(b, x))
            .chain(b.iter().filter(|x| !contains(a, x)))
            .cloned()
            .collect(),
        _ => {
            return Err(EvalError::Type(format!(
                "unsupported operand type(s) for {}: 'set' and 'set'",
                op.symbol()
            )))
        }
    };
    Value::set_from(items, limits)
}

fn complex_div(a: (f64, f64), b: (f64, f64)) -> EvalResult<Value> {
    let denom = b.0 * b.0 + b.1 * b.1;
    if denom == 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    Ok(Value::Complex {
        re: (a.0 * b.0 + a.1 * b.1) / denom,
        im: (a.1 * b.0 - a.0 * b.1) / denom,
    })
}

fn shift(op: BinOp, a: i64, b: i64) -> EvalResult<Value> {
    if b < 0 {
        return Err(EvalError::Value("negative shift count".to_string()));
    }
    match op {
        BinOp::LShift => {
            if a == 0 {
                return Ok(Value::Int(0));
            }
            let s = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
            let shifted = a.checked_shl(s).ok_or(EvalError::Overflow)?;
            if shifted >> s == a {
                Ok(Value::Int(shifted))
            } else {
                Err(EvalError::Overflow)
            }
        }
        _ => match u32::try_from(b) {
            Ok(s) if s < 64 => Ok(Value::Int(a >> s)),
            _ => Ok(Value::Int(if a < 0 { -1 } else { 0 })),
        },
    }
}

/// Applies a binary operator.
///
/// # Errors
///
/// Returns the [`EvalError`] the operation raises: type mismatches, division
/// by zero, integer overflow, or containers past the evaluation cap.
#[allow(clippy::too_many_lines)]
pub fn binary(op: BinOp, a: &Value, b: &Value, limits: &EvalLimits) -> EvalResult<Value> {
    // Sequence and set operators first, numbers below.
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            limits.check_items(x.len() + y.len())?;
            return Ok(Value::Str(format!("{x}{y}")));
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => return Ok(Value::List(concat(x, y, limits)?)),
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            return Ok(Value::Tuple(concat(x, y, limits)?))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = usize::try_from(n.as_int().unwrap_or(0).max(0))
                .map_err(|_| EvalError::Overflow)?;
            limits.check_items(s.len().checked_mul(count).ok_or(EvalError::Overflow)?)?;
            return Ok(Value::Str(s.repeat(count)));
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            return Ok(Value::List(repeat(items, n.as_int().unwrap_or(0), limits)?))
        }
        (BinOp::Mul, Value::Tuple(items), n) | (BinOp::Mul, n, Value::Tuple(items))
            if n.as_int().is_some() =>
        {
            return Ok(Value::Tuple(repeat(items, n.as_int().unwrap_or(0), limits)?))
        }
        (_, Value::Set(x), Value::Set(y)) => return set_op(op, x, y, limits),
        (BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor, Value::Bool(x), Value::Bool(y)) => {
            return Ok(Value::Bool(match op {
                BinOp::BitAnd => *x & *y,
                BinOp::BitOr => *x | *y,
                _ => *x ^ *y,
            }))
        }
        _ => {}
    }

    let Some(operands) = promote(a, b) else {
        return Err(type_error(op, a, b));
    };

    match (op, operands) {
        (BinOp::Add, (Num::Int(x), Num::Int(y))) => {
            x.checked_add(y).map(Value::Int).ok_or(EvalError::Overflow)
        }
        (BinOp::Sub, (Num::Int(x), Num::Int(y))) => {
            x.checked_sub(y).map(Value::Int).ok_or(EvalError::Overflow)
        }
        (BinOp::Mul, (Num::Int(x), Num::Int(y))) => {
            x.checked_mul(y).map(Value::Int).ok_or(EvalError::Overflow)
        }
        #[allow(clippy::cast_precision_loss)]
        (BinOp::Div, (Num::Int(x), Num::Int(y))) => {
            if y == 0 {
                Err(EvalError::ZeroDivision)
            } else {
                float_result(x as f64 / y as f64)
            }
        }
        (BinOp::FloorDiv, (Num::Int(x), Num::Int(y))) => Ok(Value::Int(int_divmod(x, y)?.0)),
        (BinOp::Mod, (Num::Int(x), Num::Int(y))) => Ok(Value::Int(int_divmod(x, y)?.1)),
        (BinOp::Pow, (Num::Int(x), Num::Int(y))) => int_pow(x, y),
        (BinOp::LShift | BinOp::RShift, (Num::Int(x), Num::Int(y))) => shift(op, x, y),
        (BinOp::BitAnd, (Num::Int(x), Num::Int(y))) => Ok(Value::Int(x & y)),
        (BinOp::BitOr, (Num::Int(x), Num::Int(y))) => Ok(Value::Int(x | y)),
        (BinOp::BitXor, (Num::Int(x), Num::Int(y))) => Ok(Value::Int(x ^ y)),

        (BinOp::Add, (Num::Float(x), Num::Float(y))) => float_result(x + y),
        (BinOp::Sub, (Num::Float(x), Num::Float(y))) => float_result(x - y),
        (BinOp::Mul, (Num::Float(x), Num::Float(y))) => float_result(x * y),
        (BinOp::Div, (Num::Float(x), Num::Float(y))) => {
            if y == 0.0 {
                Err(EvalError::ZeroDivision)
            } else {
                float_result(x / y)
            }
        }
        (BinOp::FloorDiv, (Num::Float(x), Num::Float(y))) => {
            Ok(Value::Float(float_divmod(x, y)?.0))
        }
        (BinOp::Mod, (Num::Float(x), Num::Float(y))) => Ok(Value::Float(float_divmod(x, y)?.1)),
        (BinOp::Pow, (Num::Float(x), Num::Float(y))) => {
            if x == 0.0 && y < 0.0 {
                Err(EvalError::ZeroDivision)
            } else if x < 0.0 && y.fract() != 0.0 {
                Err(EvalError::Unsupported(
                    "fractional power of a negative number".to_string(),
                ))
            } else {
                float_result(x.powf(y))
            }
        }

        (BinOp::Add, (Num::Complex(ar, ai), Num::Complex(br, bi))) => Ok(Value::Complex {
            re: ar + br,
            im: ai + bi,
        }),
        (BinOp::Sub, (Num::Complex(ar, ai), Num::Complex(br, bi))) => Ok(Value::Complex {
            re: ar - br,
            im: ai - bi,
        }),
        (BinOp::Mul, (Num::Complex(ar, ai), Num::Complex(br, bi))) => Ok(Value::Complex {
            re: ar * br - ai * bi,
            im: ar * bi + ai * br,
        }),
        (BinOp::Div, (Num::Complex(ar, ai), Num::Complex(br, bi))) => {
            complex_div((ar, ai), (br, bi))
        }

        _ => Err(type_error(op, a, b)),
    }
}

/// Applies a unary operator.
///
/// # Errors
///
/// Returns [`EvalError::Type`] for operands of the wrong kind and
/// [`EvalError::Overflow`] for `-i64::MIN`.
pub fn unary(op: UnaryOp, v: &Value) -> EvalResult<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, v) if v.as_int().is_some() => v
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or(EvalError::Overflow),
        (UnaryOp::Pos, v) if v.as_int().is_some() => Ok(Value::Int(v.as_int().unwrap_or(0))),
        (UnaryOp::Invert, v) if v.as_int().is_some() => Ok(Value::Int(!v.as_int().unwrap_or(0))),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Pos, Value::Float(x)) => Ok(Value::Float(*x)),
        (UnaryOp::Neg, Value::Complex { re, im }) => Ok(Value::Complex { re: -re, im: -im }),
        (UnaryOp::Pos, Value::Complex { re, im }) => Ok(Value::Complex { re: *re, im: *im }),
        (op, v) => Err(EvalError::Type(format!(
            "bad operand type for unary {}: '{}'",
            op.symbol().trim(),
            v.kind_name()
        ))),
    }
}

/// Membership test used by `in` and `not in`.
fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(EvalError::Type(format!(
            "'in <string>' requires string as left operand, not {}",
            other.kind_name()
        ))),
        (Value::Dict(pairs), item) => Ok(pairs.iter().any(|(k, _)| k.py_eq(item))),
        (container, item) => Ok(container.items()?.iter().any(|x| x.py_eq(item))),
    }
}

/// Applies a single comparison operator.
///
/// # Errors
///
/// Returns [`EvalError::Type`] for unorderable operands and
/// [`EvalError::Unsupported`] for identity tests on values whose identity is
/// not known at compile time.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> EvalResult<bool> {
    use std::cmp::Ordering;

    match op {
        CmpOp::Eq => Ok(a.py_eq(b)),
        CmpOp::NotEq => Ok(!a.py_eq(b)),
        CmpOp::Lt => Ok(a.py_cmp(b)? == Ordering::Less),
        CmpOp::LtE => Ok(a.py_cmp(b)? != Ordering::Greater),
        CmpOp::Gt => Ok(a.py_cmp(b)? == Ordering::Greater),
        CmpOp::GtE => Ok(a.py_cmp(b)? != Ordering::Less),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => contains(b, a).map(|found| !found),
        CmpOp::Is | CmpOp::IsNot => {
            let same = match (a, b) {
                (Value::None, Value::None) => true,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::None | Value::Bool(_), _) | (_, Value::None | Value::Bool(_)) => false,
                _ => {
                    return Err(EvalError::Unsupported(
                        "identity of a computed value".to_string(),
                    ))
                }
            };
            Ok(if op == CmpOp::Is { same } else { !same })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, a: Value, b: Value) -> EvalResult<Value> {
        binary(op, &a, &b, &EvalLimits::default())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(BinOp::Add, Value::Int(1), Value::Int(3)), Ok(Value::Int(4)));
        assert_eq!(bin(BinOp::FloorDiv, Value::Int(7), Value::Int(-2)), Ok(Value::Int(-4)));
        assert_eq!(bin(BinOp::Mod, Value::Int(-7), Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(bin(BinOp::Mod, Value::Int(7), Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(bin(BinOp::Div, Value::Int(7), Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(bin(BinOp::Pow, Value::Int(2), Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(bin(BinOp::Pow, Value::Int(2), Value::Int(-1)), Ok(Value::Float(0.5)));
        assert_eq!(bin(BinOp::Add, Value::Bool(true), Value::Bool(true)), Ok(Value::Int(2)));
    }

    #[test]
    fn test_integer_errors() {
        assert_eq!(
            bin(BinOp::Add, Value::Int(i64::MAX), Value::Int(1)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            bin(BinOp::Pow, Value::Int(10), Value::Int(40)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            bin(BinOp::Mod, Value::Int(1), Value::Int(0)),
            Err(EvalError::ZeroDivision)
        );
        assert_eq!(
            bin(BinOp::LShift, Value::Int(1), Value::Int(70)),
            Err(EvalError::Overflow)
        );
        assert_eq!(bin(BinOp::RShift, Value::Int(-8), Value::Int(70)), Ok(Value::Int(-1)));
        assert_eq!(unary(UnaryOp::Neg, &Value::Int(i64::MIN)), Err(EvalError::Overflow));
    }

    #[test]
    fn test_float_and_complex() {
        assert_eq!(bin(BinOp::Mod, Value::Float(-1.0), Value::Float(3.0)), Ok(Value::Float(2.0)));
        assert_eq!(bin(BinOp::FloorDiv, Value::Float(7.5), Value::Int(2)), Ok(Value::Float(3.0)));
        assert_eq!(
            bin(
                BinOp::Mul,
                Value::Complex { re: 0.0, im: 1.0 },
                Value::Complex { re: 0.0, im: 1.0 }
            ),
            Ok(Value::Complex { re: -1.0, im: 0.0 })
        );
        assert_eq!(
            bin(BinOp::Mul, Value::Float(1e300), Value::Float(1e300)),
            Err(EvalError::Overflow)
        );
    }

    #[test]
    fn test_sequences() {
        let list = Value::List(vec![Value::Int(1)]);
        assert_eq!(
            bin(BinOp::Mul, list.clone(), Value::Int(3)),
            Ok(Value::List(vec![Value::Int(1); 3]))
        );
        assert_eq!(
            bin(BinOp::Mul, Value::Int(-2), list.clone()),
            Ok(Value::List(vec![]))
        );
        assert_eq!(
            bin(BinOp::Add, Value::Str("ab".into()), Value::Str("c".into())),
            Ok(Value::Str("abc".into()))
        );
        assert!(bin(BinOp::Add, list, Value::Tuple(vec![])).is_err());

        let limits = EvalLimits {
            max_items: 10,
            ..EvalLimits::default()
        };
        assert_eq!(
            binary(BinOp::Mul, &Value::List(vec![Value::Int(0)]), &Value::Int(11), &limits),
            Err(EvalError::ContainerTooLarge(11))
        );
    }

    #[test]
    fn test_sets() {
        let a = Value::Set(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Set(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(
            bin(BinOp::BitOr, a.clone(), b.clone()),
            Ok(Value::Set(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(bin(BinOp::BitAnd, a.clone(), b.clone()), Ok(Value::Set(vec![Value::Int(2)])));
        assert_eq!(bin(BinOp::Sub, a, b), Ok(Value::Set(vec![Value::Int(1)])));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(compare(CmpOp::Eq, &Value::Int(1), &Value::Float(1.0)), Ok(true));
        assert_eq!(compare(CmpOp::Lt, &Value::Int(1), &Value::Int(2)), Ok(true));
        assert_eq!(
            compare(CmpOp::In, &Value::Int(2), &Value::List(vec![Value::Int(2)])),
            Ok(true)
        );
        assert_eq!(
            compare(CmpOp::NotIn, &Value::Str("z".into()), &Value::Str("abc".into())),
            Ok(true)
        );
        assert_eq!(compare(CmpOp::Is, &Value::None, &Value::None), Ok(true));
        assert!(compare(CmpOp::Is, &Value::List(vec![]), &Value::List(vec![])).is_err());
        assert!(compare(CmpOp::Lt, &Value::Str("a".into()), &Value::Int(1)).is_err());
    }
}
