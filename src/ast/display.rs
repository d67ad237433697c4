//! Python-like source rendering of the tree.
//!
//! Nested operator expressions are always parenthesized, so the output never
//! depends on precedence tables: `(a + b) * c`, `-(x)`.

use std::fmt::{self, Write};

use crate::ast::{Comprehension, Expr, ExprKind, Literal, Module, Stmt, StmtKind};

const INDENT: &str = "    ";

/// Python `repr` of a float: `2.0`, `0.1`, `1e+16`, `inf`.
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn complex_part(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        float_repr(value)
    }
}

/// Python `repr` of a complex number: `(1+2j)`, `2j`.
pub(crate) fn complex_repr(re: f64, im: f64) -> String {
    if re == 0.0 && re.is_sign_positive() {
        format!("{}j", complex_part(im))
    } else {
        let sign = if im >= 0.0 || im.is_nan() { "+" } else { "" };
        format!("({}{sign}{}j)", complex_part(re), complex_part(im))
    }
}

/// Python `repr` of a string, single-quoted.
pub(crate) fn str_repr(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => f.write_str(&float_repr(*v)),
            Literal::Complex { re, im } => f.write_str(&complex_repr(*re, *im)),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Str(s) => f.write_str(&str_repr(s)),
        }
    }
}

/// Compound expressions get parentheses when they appear as an operand.
fn is_compound(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::BinOp { .. }
            | ExprKind::UnaryOp { .. }
            | ExprKind::BoolOp { .. }
            | ExprKind::Compare { .. }
            | ExprKind::Yield(_)
    )
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if is_compound(expr) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

fn write_generators(f: &mut fmt::Formatter<'_>, generators: &[Comprehension]) -> fmt::Result {
    for generator in generators {
        write!(f, " for {} in ", generator.target)?;
        write_operand(f, &generator.iter)?;
        for cond in &generator.ifs {
            f.write_str(" if ")?;
            write_operand(f, cond)?;
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Name(name) => f.write_str(name),
            ExprKind::Attribute { value, attr } => {
                write_operand(f, value)?;
                write!(f, ".{attr}")
            }
            ExprKind::BinOp { left, op, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            ExprKind::UnaryOp { op, operand } => {
                f.write_str(op.symbol())?;
                write_operand(f, operand)
            }
            ExprKind::BoolOp { op, values } => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    write_operand(f, value)?;
                }
                Ok(())
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                write_operand(f, left)?;
                for (op, right) in ops.iter().zip(comparators) {
                    write!(f, " {} ", op.symbol())?;
                    write_operand(f, right)?;
                }
                Ok(())
            }
            ExprKind::Call { func, args } => {
                write_operand(f, func)?;
                f.write_char('(')?;
                write_joined(f, args)?;
                f.write_char(')')
            }
            ExprKind::Subscript { value, index } => {
                write_operand(f, value)?;
                write!(f, "[{index}]")
            }
            ExprKind::List(elts) => {
                f.write_char('[')?;
                write_joined(f, elts)?;
                f.write_char(']')
            }
            ExprKind::Tuple(elts) => {
                f.write_char('(')?;
                write_joined(f, elts)?;
                if elts.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            ExprKind::Set(elts) if elts.is_empty() => f.write_str("set()"),
            ExprKind::Set(elts) => {
                f.write_char('{')?;
                write_joined(f, elts)?;
                f.write_char('}')
            }
            ExprKind::Dict { keys, values } => {
                f.write_char('{')?;
                for (i, (k, v)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_char('}')
            }
            ExprKind::ListComp { elt, generators } => {
                write!(f, "[{elt}")?;
                write_generators(f, generators)?;
                f.write_char(']')
            }
            ExprKind::GeneratorExp { elt, generators } => {
                write!(f, "({elt}")?;
                write_generators(f, generators)?;
                f.write_char(')')
            }
            ExprKind::Yield(None) => f.write_str("yield"),
            ExprKind::Yield(Some(value)) => write!(f, "yield {value}"),
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &[Stmt], depth: usize) -> fmt::Result {
    if block.is_empty() {
        return writeln!(f, "{}pass", INDENT.repeat(depth));
    }
    for stmt in block {
        write_stmt(f, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match &stmt.kind {
        StmtKind::FunctionDef(def) => {
            let params: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
            writeln!(f, "{pad}def {}({}):", def.name, params.join(", "))?;
            write_block(f, &def.body, depth + 1)
        }
        StmtKind::Assign { targets, value } => {
            f.write_str(&pad)?;
            for target in targets {
                write!(f, "{target} = ")?;
            }
            writeln!(f, "{value}")
        }
        StmtKind::AugAssign { target, op, value } => {
            writeln!(f, "{pad}{target} {}= {value}", op.symbol())
        }
        StmtKind::Expr(value) => writeln!(f, "{pad}{value}"),
        StmtKind::Return(None) => writeln!(f, "{pad}return"),
        StmtKind::Return(Some(value)) => writeln!(f, "{pad}return {value}"),
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            writeln!(f, "{pad}for {target} in {iter}:")?;
            write_block(f, body, depth + 1)?;
            if !orelse.is_empty() {
                writeln!(f, "{pad}else:")?;
                write_block(f, orelse, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::While { test, body, orelse } => {
            writeln!(f, "{pad}while {test}:")?;
            write_block(f, body, depth + 1)?;
            if !orelse.is_empty() {
                writeln!(f, "{pad}else:")?;
                write_block(f, orelse, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::If { test, body, orelse } => {
            writeln!(f, "{pad}if {test}:")?;
            write_block(f, body, depth + 1)?;
            if !orelse.is_empty() {
                writeln!(f, "{pad}else:")?;
                write_block(f, orelse, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::Break => writeln!(f, "{pad}break"),
        StmtKind::Continue => writeln!(f, "{pad}continue"),
        StmtKind::Pass => writeln!(f, "{pad}pass"),
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.body {
            write_stmt(f, stmt, 0)?;
        }
        Ok(())
    }
}
