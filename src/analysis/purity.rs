//! Side-effect analysis.
//!
//! A top-level function is pure when its body stores nothing outside its own
//! local names, never yields and only calls pure callees. Purity of mutually
//! recursive functions is solved as a greatest fixpoint: every function starts
//! out pure and loses the property once a violation is found.
//!
//! Table builtins are pure by construction. `print`, unknown modules, method
//! calls and calls through variables are not.

use std::collections::BTreeSet;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::{
    analysis::scope::{self, Callee, Resolver},
    ast::{AstId, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind},
    eval::ModuleTable,
};

/// Expressions without observable side effects, plus the pure top-level
/// functions.
#[derive(Debug, Clone, Default)]
pub struct PureExpressions {
    exprs: FxHashSet<AstId>,
    functions: BTreeSet<String>,
}

impl PureExpressions {
    /// Computes purity facts for a module.
    #[must_use]
    pub fn compute(module: &Module, table: &ModuleTable) -> Self {
        let names = scope::function_names(module);
        let module_stored = scope::stored_names(&module.body);
        let functions = pure_functions(module, table, &names, &module_stored);

        let mut exprs: FxHashSet<AstId> = FxHashSet::default();
        let top_level = Resolver::module(table, &names, &module_stored);
        mark_block(&module.body, &top_level, &functions, &mut exprs);

        let defs: Vec<&FunctionDef> = module.functions().map(|(_, def)| def).collect();
        let per_function: Vec<FxHashSet<AstId>> = defs
            .par_iter()
            .map(|def| {
                let resolver = Resolver::function(table, &names, &module_stored, def);
                let mut out = FxHashSet::default();
                mark_block(&def.body, &resolver, &functions, &mut out);
                out
            })
            .collect();
        for set in per_function {
            exprs.extend(set);
        }

        PureExpressions { exprs, functions }
    }

    /// Returns `true` if the expression has no side effect.
    #[must_use]
    pub fn contains(&self, id: AstId) -> bool {
        self.exprs.contains(&id)
    }

    /// Returns `true` if the top-level function is pure.
    #[must_use]
    pub fn is_pure_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// The pure top-level functions, sorted by name.
    pub fn functions(&self) -> impl Iterator<Item = &str> + '_ {
        self.functions.iter().map(String::as_str)
    }

    /// Number of pure expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns `true` if no expression is pure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

fn pure_functions(
    module: &Module,
    table: &ModuleTable,
    names: &BTreeSet<String>,
    module_stored: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut impure: BTreeSet<String> = BTreeSet::new();
    loop {
        let pure: BTreeSet<String> = names.difference(&impure).cloned().collect();
        let mut changed = false;
        for (_, def) in module.functions() {
            if impure.contains(&def.name) {
                continue;
            }
            let resolver = Resolver::function(table, names, module_stored, def);
            if !block_is_pure(&def.body, &resolver, &pure) {
                impure.insert(def.name.clone());
                changed = true;
            }
        }
        if !changed {
            return pure;
        }
    }
}

fn block_is_pure(block: &[Stmt], resolver: &Resolver<'_>, pure: &BTreeSet<String>) -> bool {
    block.iter().all(|stmt| {
        let stores_ok = match &stmt.kind {
            StmtKind::FunctionDef(_) => return false,
            StmtKind::Assign { targets, .. } => targets.iter().all(|t| t.as_name().is_some()),
            StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => {
                target.as_name().is_some()
            }
            _ => true,
        };
        stores_ok
            && scope::loaded_exprs(stmt)
                .into_iter()
                .all(|e| expr_is_pure(e, resolver, pure, &mut None))
            && stmt
                .blocks()
                .into_iter()
                .all(|b| block_is_pure(b, resolver, pure))
    })
}

fn mark_block(
    block: &[Stmt],
    resolver: &Resolver<'_>,
    pure: &BTreeSet<String>,
    out: &mut FxHashSet<AstId>,
) {
    for stmt in block {
        if stmt.as_function().is_some() {
            continue;
        }
        for expr in scope::loaded_exprs(stmt) {
            expr_is_pure(expr, resolver, pure, &mut Some(&mut *out));
        }
        for nested in stmt.blocks() {
            mark_block(nested, resolver, pure, out);
        }
    }
}

/// Decides purity bottom-up, recording every pure node when `out` is given.
pub(crate) fn expr_is_pure(
    expr: &Expr,
    resolver: &Resolver<'_>,
    pure: &BTreeSet<String>,
    out: &mut Option<&mut FxHashSet<AstId>>,
) -> bool {
    let mut children_pure = true;
    for child in expr.children() {
        children_pure &= expr_is_pure(child, resolver, pure, out);
    }

    let own = match &expr.kind {
        ExprKind::Yield(_) => false,
        ExprKind::Call { func, .. } => match resolver.callee(func) {
            Callee::Builtin(_) | Callee::Module(..) => true,
            Callee::User(name) => pure.contains(name),
            Callee::Method(_) | Callee::Unknown => false,
        },
        _ => true,
    };

    let result = own && children_pure;
    if result {
        if let Some(set) = out.as_deref_mut() {
            set.insert(expr.id);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn compute(module: &Module) -> PureExpressions {
        PureExpressions::compute(module, &ModuleTable::standard())
    }

    #[test]
    fn test_builtin_calls_are_pure_print_is_not() {
        let pure_call = Expr::call_named("len", vec![Expr::name("a")]);
        let print = Expr::call_named("print", vec![Expr::name("a")]);
        let (pure_id, print_id) = (pure_call.id, print.id);
        let module = Module::new(vec![Stmt::function_def(
            "f",
            &["a"],
            vec![Stmt::expr(print), Stmt::ret(Some(pure_call))],
        )]);

        let facts = compute(&module);
        assert!(facts.contains(pure_id));
        assert!(!facts.contains(print_id));
        assert!(!facts.is_pure_function("f"));
    }

    #[test]
    fn test_pure_function_fixpoint() {
        // def even(n): return odd(n - 1)
        // def odd(n): return even(n - 1)
        // def noisy(): print(1)
        // def caller(): return noisy()
        let module = Module::new(vec![
            Stmt::function_def(
                "even",
                &["n"],
                vec![Stmt::ret(Some(Expr::call_named(
                    "odd",
                    vec![Expr::binop(Expr::name("n"), BinOp::Sub, Expr::int(1))],
                )))],
            ),
            Stmt::function_def(
                "odd",
                &["n"],
                vec![Stmt::ret(Some(Expr::call_named(
                    "even",
                    vec![Expr::binop(Expr::name("n"), BinOp::Sub, Expr::int(1))],
                )))],
            ),
            Stmt::function_def(
                "noisy",
                &[],
                vec![Stmt::expr(Expr::call_named("print", vec![Expr::int(1)]))],
            ),
            Stmt::function_def(
                "caller",
                &[],
                vec![Stmt::ret(Some(Expr::call_named("noisy", vec![])))],
            ),
        ]);

        let facts = compute(&module);
        let pure: Vec<&str> = facts.functions().collect();
        assert_eq!(pure, vec!["even", "odd"]);
    }

    #[test]
    fn test_subscript_store_and_yield_are_impure() {
        let store = Module::new(vec![Stmt::function_def(
            "f",
            &["a"],
            vec![Stmt::assign(
                vec![Expr::subscript(Expr::name("a"), Expr::int(0))],
                Expr::int(1),
            )],
        )]);
        assert!(!compute(&store).is_pure_function("f"));

        let gen = Expr::yield_(Some(Expr::int(1)));
        let gen_id = gen.id;
        let yields = Module::new(vec![Stmt::function_def("g", &[], vec![Stmt::expr(gen)])]);
        let facts = compute(&yields);
        assert!(!facts.is_pure_function("g"));
        assert!(!facts.contains(gen_id));
    }
}
