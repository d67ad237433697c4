//! Expressions whose value is only ever iterated once, where it is produced.
//!
//! Such an expression may be replaced by a lazy iterator: a list
//! comprehension by a generator expression, `range` by `xrange`. A position
//! counts as iterating when it is:
//!
//! - the sole argument of an iterator-consuming builtin (`sum(...)`,
//!   `sorted(...)`, ...);
//! - the iterable of a `for` loop or of the outermost comprehension clause;
//! - an argument bound to a parameter that the callee only ever iterates.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;

use crate::{
    analysis::scope::{self, Callee, Resolver},
    ast::{AstId, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind},
    eval::ModuleTable,
};

/// Builtins that consume their sole argument by iterating it.
const CONSUMERS: &[&str] = &[
    "sum", "min", "max", "any", "all", "sorted", "list", "tuple", "set", "enumerate", "zip",
];

/// The set of potential iterator expressions.
#[derive(Debug, Clone, Default)]
pub struct PotentialIterators {
    exprs: FxHashSet<AstId>,
}

impl PotentialIterators {
    /// Finds every potential iterator in the module.
    #[must_use]
    pub fn compute(module: &Module, table: &ModuleTable) -> Self {
        let names = scope::function_names(module);
        let module_stored = scope::stored_names(&module.body);

        // Parameters are classified from builtin and loop positions only, so
        // iteration through a chain of user calls is not followed.
        let no_params = BTreeMap::new();
        let mut iterated_params: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (_, def) in module.functions() {
            let resolver = Resolver::function(table, &names, &module_stored, def);
            let mut finder = Finder::new(&resolver, &no_params);
            finder.block(&def.body, false);
            let params = finder.iterated_params(def);
            if !params.is_empty() {
                iterated_params.insert(def.name.clone(), params);
            }
        }

        let mut exprs = FxHashSet::default();
        let top_level = Resolver::module(table, &names, &module_stored);
        let mut finder = Finder::new(&top_level, &iterated_params);
        finder.block(&module.body, false);
        exprs.extend(finder.found.into_iter().map(|(id, _)| id));
        for (_, def) in module.functions() {
            let resolver = Resolver::function(table, &names, &module_stored, def);
            let mut finder = Finder::new(&resolver, &iterated_params);
            finder.block(&def.body, false);
            exprs.extend(finder.found.into_iter().map(|(id, _)| id));
        }

        PotentialIterators { exprs }
    }

    /// Returns `true` if the expression is a potential iterator.
    #[must_use]
    pub fn contains(&self, id: AstId) -> bool {
        self.exprs.contains(&id)
    }

    /// Number of potential iterators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns `true` if there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

struct Finder<'a> {
    resolver: &'a Resolver<'a>,
    /// Per user function, indices of the parameters it only iterates
    iterated_params: &'a BTreeMap<String, BTreeSet<usize>>,
    /// Iterated expressions, with whether the position is inside a loop
    found: Vec<(AstId, bool)>,
}

impl<'a> Finder<'a> {
    fn new(
        resolver: &'a Resolver<'a>,
        iterated_params: &'a BTreeMap<String, BTreeSet<usize>>,
    ) -> Self {
        Finder {
            resolver,
            iterated_params,
            found: Vec::new(),
        }
    }

    /// Indices of the parameters of `def` that are read exactly once, in an
    /// iterated position outside any loop, and never stored.
    fn iterated_params(&self, def: &FunctionDef) -> BTreeSet<usize> {
        let stored = scope::stored_names(&def.body);
        let once: FxHashSet<AstId> = self
            .found
            .iter()
            .filter(|(_, in_loop)| !in_loop)
            .map(|(id, _)| *id)
            .collect();

        def.params
            .iter()
            .enumerate()
            .filter(|(_, param)| !stored.contains(&param.name))
            .filter(|(_, param)| {
                let mut reads = Vec::new();
                for stmt in &def.body {
                    stmt.walk_exprs(&mut |e| {
                        if e.as_name() == Some(param.name.as_str()) {
                            reads.push(e.id);
                        }
                    });
                }
                matches!(reads.as_slice(), [only] if once.contains(only))
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn block(&mut self, block: &[Stmt], in_loop: bool) {
        for stmt in block {
            self.stmt(stmt, in_loop);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, in_loop: bool) {
        match &stmt.kind {
            StmtKind::FunctionDef(_) => {}
            StmtKind::For {
                iter, body, orelse, ..
            } => {
                self.found.push((iter.id, in_loop));
                self.expr(iter, in_loop);
                self.block(body, true);
                self.block(orelse, in_loop);
            }
            StmtKind::While { test, body, orelse } => {
                self.expr(test, true);
                self.block(body, true);
                self.block(orelse, in_loop);
            }
            _ => {
                for expr in stmt.exprs() {
                    self.expr(expr, in_loop);
                }
                for nested in stmt.blocks() {
                    self.block(nested, in_loop);
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr, in_loop: bool) {
        match &expr.kind {
            ExprKind::Call { func, args } => {
                match self.resolver.callee(func) {
                    Callee::Builtin(name) if CONSUMERS.contains(&name) && args.len() == 1 => {
                        self.found.push((args[0].id, in_loop));
                    }
                    Callee::User(name) => {
                        let indices = self.iterated_params.get(name).into_iter().flatten();
                        for arg in indices.filter_map(|&index| args.get(index)) {
                            self.found.push((arg.id, in_loop));
                        }
                    }
                    _ => {}
                }
                for child in expr.children() {
                    self.expr(child, in_loop);
                }
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                for (index, generator) in generators.iter().enumerate() {
                    let outer = index == 0;
                    let depth_loop = in_loop || !outer;
                    self.found.push((generator.iter.id, depth_loop));
                    self.expr(&generator.iter, depth_loop);
                    for cond in &generator.ifs {
                        self.expr(cond, true);
                    }
                }
                self.expr(elt, true);
            }
            _ => {
                for child in expr.children() {
                    self.expr(child, in_loop);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(module: &Module) -> PotentialIterators {
        PotentialIterators::compute(module, &ModuleTable::standard())
    }

    #[test]
    fn test_consumer_and_loop_positions() {
        let comp = Expr::list_comp(Expr::name("x"), "x", Expr::name("xs"));
        let looped = Expr::call_named("range", vec![Expr::int(3)]);
        let returned = Expr::list_comp(Expr::name("y"), "y", Expr::name("xs"));
        let (comp_id, looped_id, returned_id) = (comp.id, looped.id, returned.id);

        let module = Module::new(vec![Stmt::function_def(
            "f",
            &["xs"],
            vec![
                Stmt::assign_name("s", Expr::call_named("sum", vec![comp])),
                Stmt::for_loop("i", looped, vec![Stmt::pass()]),
                Stmt::ret(Some(returned)),
            ],
        )]);

        let iterators = compute(&module);
        assert!(iterators.contains(comp_id));
        assert!(iterators.contains(looped_id));
        assert!(!iterators.contains(returned_id));
    }

    #[test]
    fn test_argument_to_iterating_parameter() {
        // def total(xs): return sum(xs)
        // def twice(xs): return sum(xs) + len(xs)
        // total([...]); twice([...])
        let passed = Expr::list_comp(Expr::name("x"), "x", Expr::name("data"));
        let passed_twice = Expr::list_comp(Expr::name("x"), "x", Expr::name("data"));
        let (passed_id, twice_id) = (passed.id, passed_twice.id);

        let module = Module::new(vec![
            Stmt::function_def(
                "total",
                &["xs"],
                vec![Stmt::ret(Some(Expr::call_named("sum", vec![Expr::name("xs")])))],
            ),
            Stmt::function_def(
                "twice",
                &["xs"],
                vec![Stmt::ret(Some(Expr::binop(
                    Expr::call_named("sum", vec![Expr::name("xs")]),
                    crate::ast::BinOp::Add,
                    Expr::call_named("len", vec![Expr::name("xs")]),
                )))],
            ),
            Stmt::expr(Expr::call_named("total", vec![passed])),
            Stmt::expr(Expr::call_named("twice", vec![passed_twice])),
        ]);

        let iterators = compute(&module);
        assert!(iterators.contains(passed_id));
        assert!(!iterators.contains(twice_id));
    }

    #[test]
    fn test_shadowed_consumer_is_ignored() {
        let arg = Expr::list_comp(Expr::name("x"), "x", Expr::name("xs"));
        let arg_id = arg.id;
        let module = Module::new(vec![Stmt::function_def(
            "f",
            &["xs", "sum"],
            vec![Stmt::ret(Some(Expr::call_named("sum", vec![arg])))],
        )]);
        assert!(!compute(&module).contains(arg_id));
    }
}
