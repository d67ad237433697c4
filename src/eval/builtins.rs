//! The builtin module table.
//!
//! The evaluator never reaches ambient state: every name it can call or read
//! outside the module being optimized comes from a [`ModuleTable`]. The
//! standard table provides `__builtin__`, `math` and `operator`, all of whose
//! entries are pure.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::{
    ast::{BinOp, CmpOp, UnaryOp, BUILTIN_MODULE},
    eval::{ops, EvalError, EvalLimits, EvalResult, Value},
};

/// Signature of a builtin function.
pub type BuiltinFn = fn(&[Value], &EvalLimits) -> EvalResult<Value>;

/// One entry of a module.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A pure callable
    Function(BuiltinFn),
    /// A constant such as `math.pi`
    Constant(Value),
}

/// Maps module names to their pure functions and constants.
///
/// # Examples
///
/// ```rust
/// use midend::eval::{Entry, ModuleTable};
///
/// let table = ModuleTable::standard();
/// assert!(table.has_module("math"));
/// assert!(matches!(table.lookup("math", "pi"), Some(Entry::Constant(_))));
/// assert!(table.is_builtin("len"));
/// assert!(!table.is_builtin("print"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    modules: FxHashMap<String, FxHashMap<String, Entry>>,
}

impl ModuleTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table with `__builtin__`, `math` and `operator`.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        register_builtins(&mut table);
        register_math(&mut table);
        register_operator(&mut table);
        table
    }

    /// Adds or replaces an entry.
    pub fn register(&mut self, module: &str, name: &str, entry: Entry) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string(), entry);
    }

    /// Looks up `module.name`.
    #[must_use]
    pub fn lookup(&self, module: &str, name: &str) -> Option<&Entry> {
        self.modules.get(module)?.get(name)
    }

    /// Returns `true` if the table provides the module.
    #[must_use]
    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Returns `true` if `name` is a function of the builtin namespace.
    #[must_use]
    pub fn is_builtin(&self, name: &str) -> bool {
        matches!(
            self.lookup(BUILTIN_MODULE, name),
            Some(Entry::Function(_))
        )
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::Type(format!(
            "{name}() takes {min} to {max} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, v: &Value) -> EvalResult<i64> {
    v.as_int().ok_or_else(|| {
        EvalError::Type(format!(
            "{name}() expected an integer, got '{}'",
            v.kind_name()
        ))
    })
}

fn float_arg(name: &str, v: &Value) -> EvalResult<f64> {
    v.as_float().ok_or_else(|| {
        EvalError::Type(format!(
            "{name}() expected a real number, got '{}'",
            v.kind_name()
        ))
    })
}

/// Converts a float to an int the way `int()` truncates.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_int(value: f64) -> EvalResult<i64> {
    if !value.is_finite() {
        return Err(EvalError::Value(
            "cannot convert non-finite float to integer".to_string(),
        ));
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(EvalError::Overflow);
    }
    Ok(truncated as i64)
}

fn sorted_values(mut items: Vec<Value>) -> EvalResult<Vec<Value>> {
    let mut failure = None;
    items.sort_by(|a, b| match a.py_cmp(b) {
        Ok(order) => order,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(items),
    }
}

fn range_items(name: &str, args: &[Value], limits: &EvalLimits) -> EvalResult<Vec<Value>> {
    arity(name, args, 1, 3)?;
    let (start, stop, step) = match args {
        [stop] => (0, int_arg(name, stop)?, 1),
        [start, stop] => (int_arg(name, start)?, int_arg(name, stop)?, 1),
        [start, stop, step] => (
            int_arg(name, start)?,
            int_arg(name, stop)?,
            int_arg(name, step)?,
        ),
        _ => return Err(EvalError::Type(format!("{name}() takes 1 to 3 arguments"))),
    };
    if step == 0 {
        return Err(EvalError::Value(format!("{name}() arg 3 must not be zero")));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let count = if span <= 0 {
        0
    } else {
        let step = i128::from(step).abs();
        (span + step - 1) / step
    };
    let count = usize::try_from(count).map_err(|_| EvalError::ContainerTooLarge(usize::MAX))?;
    limits.check_items(count)?;
    let mut out = Vec::with_capacity(count);
    let mut current = i128::from(start);
    for _ in 0..count {
        let value = i64::try_from(current).map_err(|_| EvalError::Overflow)?;
        out.push(Value::Int(value));
        current += i128::from(step);
    }
    Ok(out)
}

/// Arguments of `max`/`min`: one iterable, or several values.
fn extremum(name: &str, args: &[Value], wanted: Ordering) -> EvalResult<Value> {
    let items = match args {
        [] => return Err(EvalError::Type(format!("{name} expected at least 1 argument"))),
        [single] => single.items()?,
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                if item.py_cmp(&current)? == wanted {
                    item
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| EvalError::Value(format!("{name}() arg is an empty sequence")))
}

fn b_abs(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("abs", args, 1, 1)?;
    match &args[0] {
        Value::Float(v) => Ok(Value::Float(v.abs())),
        Value::Complex { re, im } => Ok(Value::Float(re.hypot(*im))),
        v => int_arg("abs", v)?
            .checked_abs()
            .map(Value::Int)
            .ok_or(EvalError::Overflow),
    }
}

fn b_all(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("all", args, 1, 1)?;
    Ok(Value::Bool(args[0].items()?.iter().all(Value::is_truthy)))
}

fn b_any(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("any", args, 1, 1)?;
    Ok(Value::Bool(args[0].items()?.iter().any(Value::is_truthy)))
}

fn b_bool(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn b_complex(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("complex", args, 0, 2)?;
    let re = args.first().map_or(Ok(0.0), |v| float_arg("complex", v))?;
    let im = args.get(1).map_or(Ok(0.0), |v| float_arg("complex", v))?;
    Ok(Value::Complex { re, im })
}

fn b_divmod(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("divmod", args, 2, 2)?;
    let (q, r) = ops::divmod(&args[0], &args[1])?;
    Ok(Value::Tuple(vec![q, r]))
}

fn b_enumerate(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("enumerate", args, 1, 2)?;
    let start = args.get(1).map_or(Ok(0), |v| int_arg("enumerate", v))?;
    let mut out = Vec::new();
    for (i, item) in args[0].items()?.into_iter().enumerate() {
        let offset = i64::try_from(i).map_err(|_| EvalError::Overflow)?;
        let index = start.checked_add(offset).ok_or(EvalError::Overflow)?;
        out.push(Value::Tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::Iter(out))
}

fn b_float(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("float", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => {
            s.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| EvalError::Value(format!("could not convert string to float: {s:?}")))
        }
        Some(v) => float_arg("float", v).map(Value::Float),
    }
}

fn b_int(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("int", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Float(v)) => float_to_int(*v).map(Value::Int),
        Some(Value::Str(s)) => {
            let text: String = s.trim().chars().filter(|c| *c != '_').collect();
            text.parse::<i64>().map(Value::Int).map_err(|_| {
                EvalError::Value(format!("invalid literal for int() with base 10: {s:?}"))
            })
        }
        Some(v) => int_arg("int", v).map(Value::Int),
    }
}

fn b_len(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("len", args, 1, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => items.len(),
        Value::Dict(pairs) => pairs.len(),
        other => {
            return Err(EvalError::Type(format!(
                "object of type '{}' has no len()",
                other.kind_name()
            )))
        }
    };
    i64::try_from(len).map(Value::Int).map_err(|_| EvalError::Overflow)
}

fn b_list(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("list", args, 0, 1)?;
    Ok(Value::List(match args.first() {
        Some(v) => v.items()?,
        None => Vec::new(),
    }))
}

fn b_max(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    extremum("max", args, Ordering::Greater)
}

fn b_min(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    extremum("min", args, Ordering::Less)
}

fn b_pow(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    arity("pow", args, 2, 3)?;
    match args {
        [base, exp, modulus] => {
            let (base, mut exp, modulus) = (
                int_arg("pow", base)?,
                int_arg("pow", exp)?,
                int_arg("pow", modulus)?,
            );
            if modulus == 0 {
                return Err(EvalError::Value("pow() 3rd argument cannot be 0".to_string()));
            }
            if exp < 0 {
                return Err(EvalError::Unsupported("modular inverse".to_string()));
            }
            let m = i128::from(modulus);
            let mut acc: i128 = 1;
            let mut b = i128::from(base).rem_euclid(m);
            while exp > 0 {
                if exp & 1 == 1 {
                    acc = (acc * b).rem_euclid(m);
                }
                b = (b * b).rem_euclid(m);
                exp >>= 1;
            }
            // Result takes the sign of the modulus.
            if acc != 0 && modulus < 0 {
                acc += m;
            }
            i64::try_from(acc).map(Value::Int).map_err(|_| EvalError::Overflow)
        }
        [base, exp] => ops::binary(BinOp::Pow, base, exp, limits),
        _ => Err(EvalError::Type("pow() takes 2 or 3 arguments".to_string())),
    }
}

fn b_pow2(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    arity("pow2", args, 1, 1)?;
    ops::binary(BinOp::Mul, &args[0], &args[0], limits)
}

fn b_range(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    range_items("range", args, limits).map(Value::List)
}

fn b_xrange(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    range_items("xrange", args, limits).map(Value::Iter)
}

fn b_reversed(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("reversed", args, 1, 1)?;
    match &args[0] {
        Value::List(items) | Value::Tuple(items) => {
            Ok(Value::Iter(items.iter().rev().cloned().collect()))
        }
        Value::Str(s) => Ok(Value::Iter(
            s.chars().rev().map(|c| Value::Str(c.to_string())).collect(),
        )),
        other => Err(EvalError::Type(format!(
            "'{}' object is not reversible",
            other.kind_name()
        ))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn b_round(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("round", args, 1, 2)?;
    let digits = args.get(1).map(|v| int_arg("round", v)).transpose()?;
    match (&args[0], digits) {
        (Value::Float(v), None) => float_to_int(v.round_ties_even()).map(Value::Int),
        (Value::Float(v), Some(n)) => {
            let n = i32::try_from(n).map_err(|_| EvalError::Overflow)?;
            let scale = 10f64.powi(n);
            Ok(Value::Float((v * scale).round_ties_even() / scale))
        }
        (v, None) => int_arg("round", v).map(Value::Int),
        (v, Some(n)) if n >= 0 => int_arg("round", v).map(Value::Int),
        (v, Some(n)) => {
            let value = int_arg("round", v)?;
            let exp = u32::try_from(-n).map_err(|_| EvalError::Overflow)?;
            let Some(unit) = 10i64.checked_pow(exp) else {
                return Ok(Value::Int(0));
            };
            let rounded = ((value as f64) / (unit as f64)).round_ties_even() as i64;
            rounded
                .checked_mul(unit)
                .map(Value::Int)
                .ok_or(EvalError::Overflow)
        }
    }
}

fn b_set(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    arity("set", args, 0, 1)?;
    let items = match args.first() {
        Some(v) => v.items()?,
        None => Vec::new(),
    };
    Value::set_from(items, limits)
}

fn b_sorted(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("sorted", args, 1, 1)?;
    sorted_values(args[0].items()?).map(Value::List)
}

fn b_str(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("str", args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_py_str).unwrap_or_default()))
}

fn b_sum(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    arity("sum", args, 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(EvalError::Type("sum() can't sum strings".to_string()));
    }
    for item in args[0].items()? {
        total = ops::binary(BinOp::Add, &total, &item, limits)?;
    }
    Ok(total)
}

fn b_tuple(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("tuple", args, 0, 1)?;
    Ok(Value::Tuple(match args.first() {
        Some(v) => v.items()?,
        None => Vec::new(),
    }))
}

fn b_zip(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    let columns = args
        .iter()
        .map(Value::items)
        .collect::<EvalResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let out = (0..rows)
        .map(|i| Value::Tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::Iter(out))
}

fn register_builtins(table: &mut ModuleTable) {
    let functions: [(&str, BuiltinFn); 25] = [
        ("abs", b_abs),
        ("all", b_all),
        ("any", b_any),
        ("bool", b_bool),
        ("complex", b_complex),
        ("divmod", b_divmod),
        ("enumerate", b_enumerate),
        ("float", b_float),
        ("int", b_int),
        ("len", b_len),
        ("list", b_list),
        ("max", b_max),
        ("min", b_min),
        ("pow", b_pow),
        ("pow2", b_pow2),
        ("range", b_range),
        ("reversed", b_reversed),
        ("round", b_round),
        ("set", b_set),
        ("sorted", b_sorted),
        ("str", b_str),
        ("sum", b_sum),
        ("tuple", b_tuple),
        ("xrange", b_xrange),
        ("zip", b_zip),
    ];
    for (name, f) in functions {
        table.register(BUILTIN_MODULE, name, Entry::Function(f));
    }
}

/// Result of a real math function, rejecting values that leave the domain.
fn math_result(value: f64, input_finite: bool) -> EvalResult<Value> {
    if value.is_nan() && input_finite {
        Err(EvalError::Value("math domain error".to_string()))
    } else if value.is_infinite() && input_finite {
        Err(EvalError::Overflow)
    } else {
        Ok(Value::Float(value))
    }
}

macro_rules! math_unary {
    ($fn_name:ident, $name:literal, |$x:ident| $body:expr) => {
        fn $fn_name(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
            arity($name, args, 1, 1)?;
            let $x = float_arg($name, &args[0])?;
            math_result($body, $x.is_finite())
        }
    };
}

math_unary!(m_sqrt, "sqrt", |x| x.sqrt());
math_unary!(m_fabs, "fabs", |x| x.abs());
math_unary!(m_exp, "exp", |x| x.exp());
math_unary!(m_log2, "log2", |x| if x > 0.0 { x.log2() } else { f64::NAN });
math_unary!(m_log10, "log10", |x| if x > 0.0 { x.log10() } else { f64::NAN });
math_unary!(m_sin, "sin", |x| x.sin());
math_unary!(m_cos, "cos", |x| x.cos());
math_unary!(m_tan, "tan", |x| x.tan());
math_unary!(m_atan, "atan", |x| x.atan());
math_unary!(m_degrees, "degrees", |x| x.to_degrees());
math_unary!(m_radians, "radians", |x| x.to_radians());

fn m_log(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("log", args, 1, 2)?;
    let x = float_arg("log", &args[0])?;
    let base = args.get(1).map(|v| float_arg("log", v)).transpose()?;
    if x <= 0.0 || base.is_some_and(|b| b <= 0.0 || b == 1.0) {
        return Err(EvalError::Value("math domain error".to_string()));
    }
    math_result(
        base.map_or_else(|| x.ln(), |b| x.ln() / b.ln()),
        x.is_finite(),
    )
}

fn m_atan2(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("atan2", args, 2, 2)?;
    let (y, x) = (float_arg("atan2", &args[0])?, float_arg("atan2", &args[1])?);
    Ok(Value::Float(y.atan2(x)))
}

fn m_hypot(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    arity("hypot", args, 2, 2)?;
    let (x, y) = (float_arg("hypot", &args[0])?, float_arg("hypot", &args[1])?);
    math_result(x.hypot(y), x.is_finite() && y.is_finite())
}

fn integral(name: &str, args: &[Value], round: fn(f64) -> f64) -> EvalResult<Value> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Float(v) => float_to_int(round(*v)).map(Value::Int),
        v => int_arg(name, v).map(Value::Int),
    }
}

fn m_floor(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    integral("floor", args, f64::floor)
}

fn m_ceil(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    integral("ceil", args, f64::ceil)
}

fn m_trunc(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
    integral("trunc", args, f64::trunc)
}

fn register_math(table: &mut ModuleTable) {
    let constants = [
        ("pi", std::f64::consts::PI),
        ("e", std::f64::consts::E),
        ("tau", std::f64::consts::TAU),
        ("inf", f64::INFINITY),
    ];
    for (name, value) in constants {
        table.register("math", name, Entry::Constant(Value::Float(value)));
    }

    let functions: [(&str, BuiltinFn); 17] = [
        ("sqrt", m_sqrt),
        ("floor", m_floor),
        ("ceil", m_ceil),
        ("trunc", m_trunc),
        ("fabs", m_fabs),
        ("exp", m_exp),
        ("log", m_log),
        ("log2", m_log2),
        ("log10", m_log10),
        ("sin", m_sin),
        ("cos", m_cos),
        ("tan", m_tan),
        ("atan", m_atan),
        ("atan2", m_atan2),
        ("hypot", m_hypot),
        ("degrees", m_degrees),
        ("radians", m_radians),
    ];
    for (name, f) in functions {
        table.register("math", name, Entry::Function(f));
    }
}

macro_rules! operator_binary {
    ($fn_name:ident, $name:literal, $op:expr) => {
        fn $fn_name(args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
            arity($name, args, 2, 2)?;
            ops::binary($op, &args[0], &args[1], limits)
        }
    };
}

macro_rules! operator_compare {
    ($fn_name:ident, $name:literal, $op:expr) => {
        fn $fn_name(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
            arity($name, args, 2, 2)?;
            ops::compare($op, &args[0], &args[1]).map(Value::Bool)
        }
    };
}

macro_rules! operator_unary {
    ($fn_name:ident, $name:literal, $op:expr) => {
        fn $fn_name(args: &[Value], _: &EvalLimits) -> EvalResult<Value> {
            arity($name, args, 1, 1)?;
            ops::unary($op, &args[0])
        }
    };
}

operator_binary!(o_add, "add", BinOp::Add);
operator_binary!(o_sub, "sub", BinOp::Sub);
operator_binary!(o_mul, "mul", BinOp::Mul);
operator_binary!(o_truediv, "truediv", BinOp::Div);
operator_binary!(o_floordiv, "floordiv", BinOp::FloorDiv);
operator_binary!(o_mod, "mod", BinOp::Mod);
operator_binary!(o_pow, "pow", BinOp::Pow);
operator_binary!(o_and, "and_", BinOp::BitAnd);
operator_binary!(o_or, "or_", BinOp::BitOr);
operator_binary!(o_xor, "xor", BinOp::BitXor);
operator_compare!(o_eq, "eq", CmpOp::Eq);
operator_compare!(o_ne, "ne", CmpOp::NotEq);
operator_compare!(o_lt, "lt", CmpOp::Lt);
operator_compare!(o_le, "le", CmpOp::LtE);
operator_compare!(o_gt, "gt", CmpOp::Gt);
operator_compare!(o_ge, "ge", CmpOp::GtE);
operator_unary!(o_neg, "neg", UnaryOp::Neg);
operator_unary!(o_pos, "pos", UnaryOp::Pos);
operator_unary!(o_not, "not_", UnaryOp::Not);

fn register_operator(table: &mut ModuleTable) {
    let functions: [(&str, BuiltinFn); 19] = [
        ("add", o_add),
        ("sub", o_sub),
        ("mul", o_mul),
        ("truediv", o_truediv),
        ("floordiv", o_floordiv),
        ("mod", o_mod),
        ("pow", o_pow),
        ("neg", o_neg),
        ("pos", o_pos),
        ("not_", o_not),
        ("eq", o_eq),
        ("ne", o_ne),
        ("lt", o_lt),
        ("le", o_le),
        ("gt", o_gt),
        ("ge", o_ge),
        ("and_", o_and),
        ("or_", o_or),
        ("xor", o_xor),
    ];
    for (name, f) in functions {
        table.register("operator", name, Entry::Function(f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: &str, name: &str, args: &[Value]) -> EvalResult<Value> {
        let table = ModuleTable::standard();
        match table.lookup(module, name) {
            Some(Entry::Function(f)) => f(args, &EvalLimits::default()),
            other => panic!("{module}.{name} is not a function: {other:?}"),
        }
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_range() {
        assert_eq!(
            call(BUILTIN_MODULE, "range", &ints(&[3])),
            Ok(Value::List(ints(&[0, 1, 2])))
        );
        assert_eq!(
            call(BUILTIN_MODULE, "range", &ints(&[10, 0, -3])),
            Ok(Value::List(ints(&[10, 7, 4, 1])))
        );
        assert_eq!(
            call(BUILTIN_MODULE, "xrange", &ints(&[2])),
            Ok(Value::Iter(ints(&[0, 1])))
        );
        assert!(call(BUILTIN_MODULE, "range", &ints(&[0, 5, 0])).is_err());
        assert_eq!(
            call(BUILTIN_MODULE, "range", &ints(&[1_000_000])),
            Err(EvalError::ContainerTooLarge(1_000_000))
        );
    }

    #[test]
    fn test_reductions() {
        let items = Value::List(ints(&[3, 1, 2]));
        assert_eq!(call(BUILTIN_MODULE, "sum", &[items.clone()]), Ok(Value::Int(6)));
        assert_eq!(call(BUILTIN_MODULE, "max", &[items.clone()]), Ok(Value::Int(3)));
        assert_eq!(call(BUILTIN_MODULE, "min", &ints(&[4, -1, 9])), Ok(Value::Int(-1)));
        assert_eq!(
            call(BUILTIN_MODULE, "sorted", &[items]),
            Ok(Value::List(ints(&[1, 2, 3])))
        );
        assert!(call(BUILTIN_MODULE, "max", &[Value::List(vec![])]).is_err());
        assert!(call(
            BUILTIN_MODULE,
            "sorted",
            &[Value::List(vec![Value::Int(1), Value::Str("a".into())])]
        )
        .is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call(BUILTIN_MODULE, "int", &[Value::Float(-2.7)]), Ok(Value::Int(-2)));
        assert_eq!(call(BUILTIN_MODULE, "int", &[Value::Str(" 42 ".into())]), Ok(Value::Int(42)));
        assert_eq!(call(BUILTIN_MODULE, "float", &[Value::Int(2)]), Ok(Value::Float(2.0)));
        assert_eq!(call(BUILTIN_MODULE, "round", &[Value::Float(2.5)]), Ok(Value::Int(2)));
        assert_eq!(call(BUILTIN_MODULE, "round", &[Value::Float(3.5)]), Ok(Value::Int(4)));
        assert_eq!(
            call(BUILTIN_MODULE, "str", &[Value::List(ints(&[1]))]),
            Ok(Value::Str("[1]".into()))
        );
        assert_eq!(call(BUILTIN_MODULE, "len", &[Value::Str("héllo".into())]), Ok(Value::Int(5)));
        assert!(call(BUILTIN_MODULE, "int", &[Value::Float(f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_pow_variants() {
        assert_eq!(call(BUILTIN_MODULE, "pow", &ints(&[3, 4, 5])), Ok(Value::Int(1)));
        assert_eq!(call(BUILTIN_MODULE, "pow", &ints(&[2, 3, -3])), Ok(Value::Int(-1)));
        assert_eq!(call(BUILTIN_MODULE, "pow2", &[Value::Float(1.5)]), Ok(Value::Float(2.25)));
    }

    #[test]
    fn test_math_and_operator() {
        assert_eq!(call("math", "sqrt", &[Value::Int(16)]), Ok(Value::Float(4.0)));
        assert_eq!(call("math", "floor", &[Value::Float(-1.5)]), Ok(Value::Int(-2)));
        assert!(call("math", "sqrt", &[Value::Int(-1)]).is_err());
        assert!(call("math", "log", &[Value::Int(0)]).is_err());
        assert_eq!(call("operator", "add", &ints(&[2, 5])), Ok(Value::Int(7)));
        assert_eq!(call("operator", "lt", &ints(&[2, 5])), Ok(Value::Bool(true)));
        assert_eq!(call("operator", "neg", &ints(&[2])), Ok(Value::Int(-2)));
    }

    #[test]
    fn test_iterator_producers() {
        let zipped = call(
            BUILTIN_MODULE,
            "zip",
            &[Value::List(ints(&[1, 2, 3])), Value::Str("ab".into())],
        )
        .unwrap();
        assert_eq!(
            zipped,
            Value::Iter(vec![
                Value::Tuple(vec![Value::Int(1), Value::Str("a".into())]),
                Value::Tuple(vec![Value::Int(2), Value::Str("b".into())]),
            ])
        );
        let listed = call(BUILTIN_MODULE, "list", &[zipped]).unwrap();
        assert!(matches!(listed, Value::List(ref items) if items.len() == 2));
    }

    #[test]
    fn test_table_shape() {
        let table = ModuleTable::standard();
        assert!(table.has_module(BUILTIN_MODULE));
        assert!(table.has_module("operator"));
        assert!(!table.has_module("os"));
        assert!(table.lookup("math", "tau").is_some());
        assert!(table.lookup(BUILTIN_MODULE, "print").is_none());
    }
}
