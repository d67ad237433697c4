//! Laziness metric.
//!
//! For every variable of a function, how many times the value bound at a
//! definition site may be consumed. A value of 1 means the definition is
//! read exactly once with the same value, so its expression can be moved to
//! the read. [`Lazy::Infinite`] marks variables whose definitions are
//! mutated, re-read in loops or otherwise unsafe to move.
//!
//! Mutation is tracked through aliases. Binding `y = <value>` makes `y` a
//! possible alias of every name the value reads, and mutating any member of
//! such a class invalidates definitions computed from any other member.
//! Parameters and globals are objects the caller can reach, so they form a
//! single class, and a call that may run arbitrary code mutates it.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::{
    analysis::{
        constants::mutated_by_call,
        purity::{self, PureExpressions},
        scope::{self, Callee, Resolver},
    },
    ast::{AstId, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind},
    eval::ModuleTable,
};

/// Laziness of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lazy {
    /// Number of reads of the bound value
    Finite(usize),
    /// Unbounded, or unsafe to count
    Infinite,
}

impl Lazy {
    /// Returns `true` unless infinite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        matches!(self, Lazy::Finite(_))
    }

    fn bump(self) -> Lazy {
        match self {
            Lazy::Finite(n) => Lazy::Finite(n + 1),
            Lazy::Infinite => Lazy::Infinite,
        }
    }
}

/// Laziness of every variable of every top-level function.
#[derive(Debug, Clone, Default)]
pub struct Laziness {
    functions: BTreeMap<AstId, BTreeMap<String, Lazy>>,
}

impl Laziness {
    /// Computes the metric for every top-level function.
    #[must_use]
    pub fn compute(module: &Module, table: &ModuleTable) -> Self {
        let purity = PureExpressions::compute(module, table);
        let names = scope::function_names(module);
        let module_stored = scope::stored_names(&module.body);
        let pure_functions: BTreeSet<String> = purity.functions().map(str::to_string).collect();

        let defs: Vec<(AstId, &FunctionDef)> = module.functions().collect();
        let functions = defs
            .par_iter()
            .map(|(id, def)| {
                let mut counter = Counter {
                    resolver: Resolver::function(table, &names, &module_stored, def),
                    purity: &purity,
                    pure_functions: &pure_functions,
                    locals: scope::function_locals(def),
                    params: def.params.iter().map(|p| p.name.clone()).collect(),
                    current: BTreeMap::new(),
                    deps: BTreeMap::new(),
                    aliases: BTreeMap::new(),
                    result: BTreeMap::new(),
                    loops: Vec::new(),
                };
                for param in &def.params {
                    counter.bind(&param.name, Lazy::Finite(0), BTreeSet::new());
                }
                counter.block(&def.body);
                (*id, counter.finish())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        Laziness { functions }
    }

    /// Laziness of `name` in the function defined by statement `function`.
    #[must_use]
    pub fn get(&self, function: AstId, name: &str) -> Option<Lazy> {
        self.functions.get(&function)?.get(name).copied()
    }
}

struct Counter<'a> {
    resolver: Resolver<'a>,
    purity: &'a PureExpressions,
    pure_functions: &'a BTreeSet<String>,
    locals: BTreeSet<String>,
    params: BTreeSet<String>,
    /// Count of the live definition of each name
    current: BTreeMap<String, Lazy>,
    /// Names the live definition's value was computed from
    deps: BTreeMap<String, BTreeSet<String>>,
    /// Names that may share an object, symmetric and never shrinking
    aliases: BTreeMap<String, BTreeSet<String>>,
    /// Maximum over every definition site seen so far
    result: BTreeMap<String, Lazy>,
    /// Names bound inside each enclosing loop so far
    loops: Vec<BTreeSet<String>>,
}

impl Counter<'_> {
    fn finish(mut self) -> BTreeMap<String, Lazy> {
        let live: Vec<(String, Lazy)> = std::mem::take(&mut self.current).into_iter().collect();
        for (name, lazy) in live {
            self.retire(&name, lazy);
        }
        self.result
    }

    fn retire(&mut self, name: &str, lazy: Lazy) {
        let slot = self.result.entry(name.to_string()).or_insert(lazy);
        *slot = (*slot).max(lazy);
    }

    /// Starts a new definition of `name`.
    fn bind(&mut self, name: &str, lazy: Lazy, deps: BTreeSet<String>) {
        if let Some(old) = self.current.insert(name.to_string(), lazy) {
            self.retire(name, old);
        }
        self.deps.insert(name.to_string(), deps);
        if let Some(frame) = self.loops.last_mut() {
            frame.insert(name.to_string());
        }
        self.invalidate_dependents(name);
    }

    /// Records that `name` may refer to an object reachable from `sources`.
    fn link(&mut self, name: &str, sources: &BTreeSet<String>) {
        for source in sources.iter().filter(|source| source.as_str() != name) {
            self.aliases
                .entry(name.to_string())
                .or_default()
                .insert(source.clone());
            self.aliases
                .entry(source.clone())
                .or_default()
                .insert(name.to_string());
        }
    }

    /// A name whose object the caller can reach: a parameter or a global
    /// variable. Functions, modules and builtins are not objects here.
    fn is_external(&self, name: &str) -> bool {
        if self.params.contains(name) {
            return true;
        }
        if self.locals.contains(name) {
            return false;
        }
        self.resolver.is_variable(name)
            || !(self.resolver.is_function(name)
                || self.resolver.is_module(name)
                || self.resolver.table().is_builtin(name))
    }

    /// Every external name seen so far.
    fn externals(&self) -> BTreeSet<String> {
        self.params
            .iter()
            .chain(self.deps.values().flatten())
            .chain(self.aliases.keys())
            .filter(|name| self.is_external(name))
            .cloned()
            .collect()
    }

    /// `name` plus every name that may share an object with it.
    fn alias_class(&self, name: &str) -> BTreeSet<String> {
        let mut class = BTreeSet::new();
        let mut work = vec![name.to_string()];
        let mut externals_added = false;
        while let Some(next) = work.pop() {
            if !class.insert(next.clone()) {
                continue;
            }
            if !externals_added && self.is_external(&next) {
                externals_added = true;
                work.extend(self.externals());
            }
            if let Some(linked) = self.aliases.get(&next) {
                work.extend(linked.iter().cloned());
            }
        }
        class
    }

    /// The object bound to `name` changes in place.
    fn mutate(&mut self, name: &str) {
        for member in self.alias_class(name) {
            self.spoil(&member);
        }
    }

    /// A call to code that may change any object the caller can reach.
    fn clobber_externals(&mut self) {
        let externals = self.externals();
        if let Some(first) = externals.iter().next() {
            self.mutate(first);
        }
    }

    /// Calls whose body is unknown or impure.
    fn is_opaque_call(&self, func: &Expr) -> bool {
        match self.resolver.callee(func) {
            Callee::User(name) => !self.purity.is_pure_function(name),
            Callee::Method(None) => true,
            Callee::Unknown => func.as_name() != Some("print"),
            Callee::Builtin(_) | Callee::Module(..) | Callee::Method(Some(_)) => false,
        }
    }

    /// Marks the live definition of `name` as unsafe to move.
    fn spoil(&mut self, name: &str) {
        if let Some(lazy) = self.current.get_mut(name) {
            *lazy = Lazy::Infinite;
        }
        self.invalidate_dependents(name);
    }

    /// Values computed from `name` are stale once `name` changes.
    fn invalidate_dependents(&mut self, name: &str) {
        let dependents: Vec<String> = self
            .deps
            .iter()
            .filter(|(dependent, deps)| dependent.as_str() != name && deps.contains(name))
            .map(|(dependent, _)| dependent.clone())
            .collect();
        for dependent in dependents {
            if let Some(lazy) = self.current.get_mut(&dependent) {
                *lazy = Lazy::Infinite;
            }
        }
    }

    fn read(&mut self, name: &str, in_comprehension: bool) {
        let from_outside_loop = self
            .loops
            .last()
            .is_some_and(|frame| !frame.contains(name));
        if let Some(lazy) = self.current.get_mut(name) {
            *lazy = if in_comprehension || from_outside_loop {
                Lazy::Infinite
            } else {
                lazy.bump()
            };
        }
    }

    fn expr(&mut self, expr: &Expr, bound: &mut Vec<String>) {
        match &expr.kind {
            ExprKind::Name(name) => {
                if !bound.contains(name) {
                    self.read(name, false);
                }
            }
            ExprKind::ListComp { .. } | ExprKind::GeneratorExp { .. } => {
                for name in expr.free_names() {
                    if !bound.contains(&name) {
                        self.read(&name, true);
                    }
                }
            }
            ExprKind::Call { func, args } => {
                for child in expr.children() {
                    self.expr(child, bound);
                }
                for name in mutated_by_call(&self.resolver, self.purity, func, args) {
                    self.mutate(&name);
                }
                if self.is_opaque_call(func) {
                    self.clobber_externals();
                }
            }
            _ => {
                for child in expr.children() {
                    self.expr(child, bound);
                }
            }
        }
    }

    fn load(&mut self, expr: &Expr) {
        self.expr(expr, &mut Vec::new());
    }

    fn is_pure(&self, expr: &Expr) -> bool {
        purity::expr_is_pure(expr, &self.resolver, self.pure_functions, &mut None)
    }

    fn block(&mut self, block: &[Stmt]) {
        for stmt in block {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                self.load(value);
                let lazy = if self.is_pure(value) {
                    Lazy::Finite(0)
                } else {
                    Lazy::Infinite
                };
                let deps: BTreeSet<String> = value.free_names().into_iter().collect();
                for target in targets {
                    match target.as_name() {
                        Some(name) => {
                            self.link(name, &deps);
                            self.bind(name, lazy, deps.clone());
                        }
                        None => self.mutate_target(target),
                    }
                }
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.load(value);
                match target.as_name() {
                    Some(name) => {
                        self.read(name, false);
                        // `+=` on a list extends it in place
                        self.mutate(name);
                        self.bind(name, Lazy::Infinite, BTreeSet::new());
                    }
                    None => self.mutate_target(target),
                }
            }
            StmtKind::Expr(value) | StmtKind::Return(Some(value)) => self.load(value),
            StmtKind::If { test, body, orelse } => {
                self.load(test);
                let saved = (self.current.clone(), self.deps.clone());
                self.block(body);
                let taken = (
                    std::mem::replace(&mut self.current, saved.0),
                    std::mem::replace(&mut self.deps, saved.1),
                );
                self.block(orelse);
                for (name, lazy) in taken.0 {
                    let slot = self.current.entry(name).or_insert(lazy);
                    *slot = (*slot).max(lazy);
                }
                for (name, deps) in taken.1 {
                    self.deps.entry(name).or_default().extend(deps);
                }
            }
            StmtKind::While { test, body, orelse } => {
                self.loops.push(BTreeSet::new());
                self.load(test);
                self.block(body);
                self.loops.pop();
                self.block(orelse);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.load(iter);
                self.loops.push(BTreeSet::new());
                match target.as_name() {
                    Some(name) => {
                        let elements: BTreeSet<String> = iter.free_names().into_iter().collect();
                        self.link(name, &elements);
                        self.bind(name, Lazy::Infinite, BTreeSet::new());
                    }
                    None => self.mutate_target(target),
                }
                self.block(body);
                self.loops.pop();
                self.block(orelse);
            }
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Pass
            | StmtKind::FunctionDef(_) => {}
        }
    }

    /// A subscript or attribute store reads its parts and mutates its root.
    fn mutate_target(&mut self, target: &Expr) {
        for part in target.children() {
            self.load(part);
        }
        if let Some(root) = scope::target_root(target) {
            self.mutate(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn laziness_of(body: Vec<Stmt>, params: &[&str], name: &str) -> Option<Lazy> {
        let module = Module::new(vec![Stmt::function_def("f", params, body)]);
        let facts = Laziness::compute(&module, &ModuleTable::standard());
        let (id, _) = module.functions().next()?;
        facts.get(id, name)
    }

    #[test]
    fn test_single_read() {
        // a = [2, 3]; print(a)
        let lazy = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::list(vec![Expr::int(2), Expr::int(3)])),
                Stmt::expr(Expr::call_named("print", vec![Expr::name("a")])),
            ],
            &[],
            "a",
        );
        assert_eq!(lazy, Some(Lazy::Finite(1)));
    }

    #[test]
    fn test_reads_are_counted_and_maxed_over_sites() {
        // a = 1; b = a + a; a = 2; return a
        let lazy = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::int(1)),
                Stmt::assign_name("b", Expr::binop(Expr::name("a"), BinOp::Add, Expr::name("a"))),
                Stmt::assign_name("a", Expr::int(2)),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &[],
            "a",
        );
        assert_eq!(lazy, Some(Lazy::Finite(2)));
    }

    #[test]
    fn test_loops_and_comprehensions_are_infinite() {
        // a = 1
        // for i in xs: s = a
        let in_loop = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::int(1)),
                Stmt::for_loop("i", Expr::name("xs"), vec![Stmt::assign_name("s", Expr::name("a"))]),
            ],
            &["xs"],
            "a",
        );
        assert_eq!(in_loop, Some(Lazy::Infinite));

        let in_comp = laziness_of(
            vec![
                Stmt::assign_name("k", Expr::int(2)),
                Stmt::ret(Some(Expr::list_comp(
                    Expr::binop(Expr::name("x"), BinOp::Mul, Expr::name("k")),
                    "x",
                    Expr::name("xs"),
                ))),
            ],
            &["xs"],
            "k",
        );
        assert_eq!(in_comp, Some(Lazy::Infinite));
    }

    #[test]
    fn test_modified_dependency_spoils_definition() {
        // b = a + 1; a += 1; return b
        let lazy = laziness_of(
            vec![
                Stmt::assign_name("b", Expr::binop(Expr::name("a"), BinOp::Add, Expr::int(1))),
                Stmt::aug_assign("a", BinOp::Add, Expr::int(1)),
                Stmt::ret(Some(Expr::name("b"))),
            ],
            &["a"],
            "b",
        );
        assert_eq!(lazy, Some(Lazy::Infinite));
    }

    #[test]
    fn test_mutating_calls() {
        // a = []; a.append(1); return a
        let method = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::list(vec![])),
                Stmt::expr(Expr::call(
                    Expr::attribute(Expr::name("a"), "append"),
                    vec![Expr::int(1)],
                )),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &[],
            "a",
        );
        assert_eq!(method, Some(Lazy::Infinite));

        // impure values are never movable
        let impure = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::call_named("input", vec![])),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &[],
            "a",
        );
        assert_eq!(impure, Some(Lazy::Infinite));
    }

    fn laziness_in(module: &Module, function: &str, name: &str) -> Option<Lazy> {
        let facts = Laziness::compute(module, &ModuleTable::standard());
        let (id, _) = module.functions().find(|(_, def)| def.name == function)?;
        facts.get(id, name)
    }

    fn append(receiver: &str, value: Expr) -> Stmt {
        Stmt::expr(Expr::call(
            Expr::attribute(Expr::name(receiver), "append"),
            vec![value],
        ))
    }

    #[test]
    fn test_impure_call_spoils_reads_of_globals() {
        // G = [1]
        // def h(): G.append(2)
        // def foo(): a = len(G); h(); return a
        let module = Module::new(vec![
            Stmt::assign_name("G", Expr::list(vec![Expr::int(1)])),
            Stmt::function_def("h", &[], vec![append("G", Expr::int(2))]),
            Stmt::function_def(
                "foo",
                &[],
                vec![
                    Stmt::assign_name("a", Expr::call_named("len", vec![Expr::name("G")])),
                    Stmt::expr(Expr::call_named("h", vec![])),
                    Stmt::ret(Some(Expr::name("a"))),
                ],
            ),
        ]);
        assert_eq!(laziness_in(&module, "foo", "a"), Some(Lazy::Infinite));
    }

    #[test]
    fn test_impure_call_spoils_reads_of_parameters() {
        // def h(): print(1)
        // def foo(x): a = len(x); h(); return a
        let module = Module::new(vec![
            Stmt::function_def(
                "h",
                &[],
                vec![Stmt::expr(Expr::call_named("print", vec![Expr::int(1)]))],
            ),
            Stmt::function_def(
                "foo",
                &["x"],
                vec![
                    Stmt::assign_name("a", Expr::call_named("len", vec![Expr::name("x")])),
                    Stmt::expr(Expr::call_named("h", vec![])),
                    Stmt::ret(Some(Expr::name("a"))),
                ],
            ),
        ]);
        assert_eq!(laziness_in(&module, "foo", "a"), Some(Lazy::Infinite));
    }

    #[test]
    fn test_pure_call_keeps_local_reads() {
        // def sq(n): return n * n
        // def foo(): a = [1]; b = len(a); sq(3); return b
        let module = Module::new(vec![
            Stmt::function_def(
                "sq",
                &["n"],
                vec![Stmt::ret(Some(Expr::binop(
                    Expr::name("n"),
                    BinOp::Mul,
                    Expr::name("n"),
                )))],
            ),
            Stmt::function_def(
                "foo",
                &[],
                vec![
                    Stmt::assign_name("a", Expr::list(vec![Expr::int(1)])),
                    Stmt::assign_name("b", Expr::call_named("len", vec![Expr::name("a")])),
                    Stmt::expr(Expr::call_named("sq", vec![Expr::int(3)])),
                    Stmt::ret(Some(Expr::name("b"))),
                ],
            ),
        ]);
        assert_eq!(laziness_in(&module, "foo", "b"), Some(Lazy::Finite(1)));
    }

    #[test]
    fn test_mutation_through_alias() {
        // def foo(x): a = len(x); y = x; y.append(1); return a
        let through_local = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::call_named("len", vec![Expr::name("x")])),
                Stmt::assign_name("y", Expr::name("x")),
                append("y", Expr::int(1)),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &["x"],
            "a",
        );
        assert_eq!(through_local, Some(Lazy::Infinite));

        // def foo(): x = [1]; a = len(x); y = x; y[0] = 2; return a
        let through_store = laziness_of(
            vec![
                Stmt::assign_name("x", Expr::list(vec![Expr::int(1)])),
                Stmt::assign_name("a", Expr::subscript(Expr::name("x"), Expr::int(0))),
                Stmt::assign_name("y", Expr::name("x")),
                Stmt::assign(
                    vec![Expr::subscript(Expr::name("y"), Expr::int(0))],
                    Expr::int(2),
                ),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &[],
            "a",
        );
        assert_eq!(through_store, Some(Lazy::Infinite));

        // def foo(x, z): a = len(x); z.append(1); return a
        let between_parameters = laziness_of(
            vec![
                Stmt::assign_name("a", Expr::call_named("len", vec![Expr::name("x")])),
                append("z", Expr::int(1)),
                Stmt::ret(Some(Expr::name("a"))),
            ],
            &["x", "z"],
            "a",
        );
        assert_eq!(between_parameters, Some(Lazy::Infinite));
    }
}
