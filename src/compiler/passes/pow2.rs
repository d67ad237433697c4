//! Squaring lowering: `x ** 2` becomes `__builtin__.pow2(x)`.

use crate::{
    analysis::Analyses,
    ast::{BinOp, Expr, ExprKind, Literal, Module},
    compiler::{pass::TreePass, passes::rewrite_exprs, CompilerContext, EventKind},
    Result,
};

/// Replaces squaring by an integer literal with a call to the `pow2` builtin.
#[derive(Debug, Default)]
pub struct Pow2Pass;

impl Pow2Pass {
    /// Creates a new squaring lowering pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn lower(expr: &mut Expr, function: Option<&str>, ctx: &CompilerContext) -> bool {
    let ExprKind::BinOp {
        left,
        op: BinOp::Pow,
        right,
    } = &mut expr.kind
    else {
        return false;
    };
    if !matches!(right.kind, ExprKind::Literal(Literal::Int(2))) {
        return false;
    }

    let base = std::mem::replace(left.as_mut(), Expr::int(0));
    let lowered = Expr::call(Expr::builtin("pow2"), vec![base]);
    ctx.events
        .record(EventKind::PowerLowered)
        .at(function, expr.id)
        .message(format!("{lowered}"));
    ctx.mark_changed(function);
    *expr = lowered;
    true
}

impl TreePass for Pow2Pass {
    fn name(&self) -> &'static str {
        "pow2-lowering"
    }

    fn description(&self) -> &'static str {
        "Lowers squaring to the pow2 builtin"
    }

    fn run(&self, module: &mut Module, _analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        Ok(rewrite_exprs(&mut module.body, None, &mut |expr, function| {
            lower(expr, function, ctx)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{apply, ret_function};

    #[test]
    fn test_square_lowered() {
        let mut module = ret_function(Expr::binop(Expr::name("a"), BinOp::Pow, Expr::int(2)));
        assert!(apply(&mut Pow2Pass::new(), &mut module).unwrap());
        assert_eq!(
            module.to_string(),
            "def foo():\n    return __builtin__.pow2(a)\n"
        );
        assert!(!apply(&mut Pow2Pass::new(), &mut module).unwrap());
    }

    #[test]
    fn test_nested_squares() {
        // (a ** 2) ** 2
        let inner = Expr::binop(Expr::name("a"), BinOp::Pow, Expr::int(2));
        let mut module = ret_function(Expr::binop(inner, BinOp::Pow, Expr::int(2)));
        assert!(apply(&mut Pow2Pass::new(), &mut module).unwrap());
        assert_eq!(
            module.to_string(),
            "def foo():\n    return __builtin__.pow2(__builtin__.pow2(a))\n"
        );
    }

    #[test]
    fn test_other_exponents_kept() {
        let mut module = ret_function(Expr::tuple(vec![
            Expr::binop(Expr::name("a"), BinOp::Pow, Expr::int(3)),
            Expr::binop(Expr::name("a"), BinOp::Pow, Expr::float(2.0)),
            Expr::binop(Expr::name("a"), BinOp::Mul, Expr::int(2)),
        ]));
        assert!(!apply(&mut Pow2Pass::new(), &mut module).unwrap());
    }
}
