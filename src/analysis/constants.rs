//! Constant expression detection.
//!
//! An expression is constant when it can be evaluated at compile time with
//! no runtime input and no side effect. The folding pass replaces every
//! flagged node with a literal, so this analysis never flags a node that is
//! already in literal form; that keeps folding idempotent.
//!
//! Three kinds of names can appear inside a constant expression:
//!
//! - module-level names bound exactly once to a constant and never mutated
//!   anywhere in the module ("global constants");
//! - targets of an enclosing comprehension over a constant iterable;
//! - top-level functions, when called, if they are pure and read nothing but
//!   their own locals, global constants, table builtins and other such
//!   functions ("foldable functions").
//!
//! Function locals shadow global constants.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::{
    analysis::{
        purity::PureExpressions,
        scope::{self, Callee, Resolver},
    },
    ast::{AstId, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind},
    eval::{Entry, ModuleTable},
};

/// Set of constant expressions that are not yet literals.
#[derive(Debug, Clone, Default)]
pub struct ConstantExpressions {
    exprs: FxHashSet<AstId>,
    globals: BTreeSet<String>,
}

impl ConstantExpressions {
    /// Computes the constant expressions of a module.
    #[must_use]
    pub fn compute(module: &Module, table: &ModuleTable) -> Self {
        let purity = PureExpressions::compute(module, table);
        let ctx = ModuleContext::new(module, table, &purity);

        let candidates = ctx.global_candidates(module);
        let mut globals = candidates.clone();
        let mut foldable = ctx.foldable_functions(module, &globals);
        for _ in 0..=candidates.len() {
            let next = ctx.top_level(module, &candidates, &foldable, &mut Vec::new());
            if next == globals {
                break;
            }
            globals = next;
            foldable = ctx.foldable_functions(module, &globals);
        }

        let mut flagged = Vec::new();
        ctx.top_level(module, &candidates, &foldable, &mut flagged);
        let mut exprs: FxHashSet<AstId> = flagged.into_iter().collect();

        let defs: Vec<&FunctionDef> = module.functions().map(|(_, def)| def).collect();
        let per_function: Vec<Vec<AstId>> = defs
            .par_iter()
            .map(|def| {
                let locals = scope::function_locals(def);
                let classifier = Classifier {
                    resolver: Resolver::function(table, &ctx.names, &ctx.module_stored, def),
                    locals: &locals,
                    globals: &globals,
                    foldable: &foldable,
                };
                let mut out = Vec::new();
                classifier.block(&def.body, &mut out);
                out
            })
            .collect();
        for ids in per_function {
            exprs.extend(ids);
        }

        ConstantExpressions { exprs, globals }
    }

    /// Returns `true` if the expression is a foldable constant.
    #[must_use]
    pub fn contains(&self, id: AstId) -> bool {
        self.exprs.contains(&id)
    }

    /// Returns `true` if `name` is a module-level constant.
    #[must_use]
    pub fn is_global_constant(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    /// Number of flagged expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns `true` if nothing is foldable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

struct ModuleContext<'a> {
    table: &'a ModuleTable,
    purity: &'a PureExpressions,
    names: BTreeSet<String>,
    module_stored: BTreeSet<String>,
}

impl<'a> ModuleContext<'a> {
    fn new(module: &Module, table: &'a ModuleTable, purity: &'a PureExpressions) -> Self {
        ModuleContext {
            table,
            purity,
            names: scope::function_names(module),
            module_stored: scope::stored_names(&module.body),
        }
    }

    /// Names bound by exactly one direct top-level assignment and mutated
    /// nowhere.
    fn global_candidates(&self, module: &Module) -> BTreeSet<String> {
        let mut stores: BTreeMap<String, usize> = BTreeMap::new();
        count_stores(&module.body, &mut stores);

        let mut direct: BTreeSet<String> = BTreeSet::new();
        for stmt in &module.body {
            if let StmtKind::Assign { targets, .. } = &stmt.kind {
                direct.extend(targets.iter().filter_map(Expr::as_name).map(str::to_string));
            }
        }

        let mut mutated = BTreeSet::new();
        let top_level = Resolver::module(self.table, &self.names, &self.module_stored);
        collect_mutations(&module.body, &top_level, self.purity, &mut mutated);
        for (_, def) in module.functions() {
            let resolver = Resolver::function(self.table, &self.names, &self.module_stored, def);
            collect_mutations(&def.body, &resolver, self.purity, &mut mutated);
        }

        stores
            .into_iter()
            .filter(|(name, count)| {
                *count == 1
                    && direct.contains(name)
                    && !mutated.contains(name)
                    && !self.names.contains(name)
            })
            .map(|(name, _)| name)
            .collect()
    }

    /// Pure functions whose every free read is a global constant, a table
    /// entry or another foldable function.
    fn foldable_functions(&self, module: &Module, globals: &BTreeSet<String>) -> BTreeSet<String> {
        let mut foldable: BTreeSet<String> = self.purity.functions().map(str::to_string).collect();
        loop {
            let mut removed = BTreeSet::new();
            for (_, def) in module.functions() {
                if !foldable.contains(&def.name) {
                    continue;
                }
                let locals = scope::function_locals(def);
                let mut reads = Vec::new();
                for_each_loaded(&def.body, &mut |expr| reads.extend(expr.free_names()));
                let closed = reads.iter().all(|name| {
                    locals.contains(name)
                        || globals.contains(name)
                        || foldable.contains(name)
                        || (!self.module_stored.contains(name)
                            && !self.names.contains(name)
                            && (self.table.is_builtin(name) || self.table.has_module(name)))
                });
                if !closed {
                    removed.insert(def.name.clone());
                }
            }
            if removed.is_empty() {
                return foldable;
            }
            foldable.retain(|name| !removed.contains(name));
        }
    }

    /// Classifies the top level in statement order, so a global only counts
    /// as constant after its binding. Returns the global constants found.
    fn top_level(
        &self,
        module: &Module,
        candidates: &BTreeSet<String>,
        foldable: &BTreeSet<String>,
        out: &mut Vec<AstId>,
    ) -> BTreeSet<String> {
        let no_locals = BTreeSet::new();
        let mut globals = BTreeSet::new();
        for stmt in &module.body {
            if stmt.as_function().is_some() {
                continue;
            }
            let binds_constant = {
                let classifier = Classifier {
                    resolver: Resolver::module(self.table, &self.names, &self.module_stored),
                    locals: &no_locals,
                    globals: &globals,
                    foldable,
                };
                match &stmt.kind {
                    StmtKind::Assign { targets, value } => {
                        let constant = classifier.classify(value, &mut Vec::new(), out);
                        for target in targets {
                            classifier.target(target, out);
                        }
                        constant
                    }
                    _ => {
                        classifier.block(std::slice::from_ref(stmt), out);
                        false
                    }
                }
            };
            if binds_constant {
                if let StmtKind::Assign { targets, .. } = &stmt.kind {
                    globals.extend(
                        targets
                            .iter()
                            .filter_map(Expr::as_name)
                            .filter(|name| candidates.contains(*name))
                            .map(str::to_string),
                    );
                }
            }
        }
        globals
    }
}

fn count_stores(block: &[Stmt], stores: &mut BTreeMap<String, usize>) {
    for stmt in block {
        let names: Vec<&str> = match &stmt.kind {
            StmtKind::FunctionDef(def) => vec![def.name.as_str()],
            StmtKind::Assign { targets, .. } => targets.iter().filter_map(Expr::as_name).collect(),
            StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => {
                target.as_name().into_iter().collect()
            }
            _ => Vec::new(),
        };
        for name in names {
            *stores.entry(name.to_string()).or_default() += 1;
        }
        if stmt.as_function().is_none() {
            for nested in stmt.blocks() {
                count_stores(nested, stores);
            }
        }
    }
}

/// Records names that may be mutated in place: roots of subscript and
/// attribute stores, method receivers and arguments of calls that may
/// mutate them.
fn collect_mutations(
    block: &[Stmt],
    resolver: &Resolver<'_>,
    purity: &PureExpressions,
    mutated: &mut BTreeSet<String>,
) {
    for stmt in block {
        if stmt.as_function().is_some() {
            continue;
        }
        let targets: Vec<&Expr> = match &stmt.kind {
            StmtKind::Assign { targets, .. } => targets.iter().collect(),
            StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => vec![target],
            _ => Vec::new(),
        };
        for target in targets.into_iter().filter(|t| t.as_name().is_none()) {
            mutated.extend(scope::target_root(target).map(str::to_string));
        }
        for expr in scope::loaded_exprs(stmt) {
            expr.walk(&mut |e| {
                if let ExprKind::Call { func, args } = &e.kind {
                    mutated.extend(mutated_by_call(resolver, purity, func, args));
                }
            });
        }
        for nested in stmt.blocks() {
            collect_mutations(nested, resolver, purity, mutated);
        }
    }
}

/// Names a call may mutate. Pure callees and `print` mutate nothing.
pub(crate) fn mutated_by_call(
    resolver: &Resolver<'_>,
    purity: &PureExpressions,
    func: &Expr,
    args: &[Expr],
) -> Vec<String> {
    let mut out = Vec::new();
    let args_escape = match resolver.callee(func) {
        Callee::Builtin(_) | Callee::Module(..) => false,
        Callee::User(name) => !purity.is_pure_function(name),
        Callee::Method(receiver) => {
            out.extend(receiver.map(str::to_string));
            true
        }
        Callee::Unknown => func.as_name() != Some("print"),
    };
    if args_escape {
        out.extend(args.iter().filter_map(Expr::as_name).map(str::to_string));
    }
    out
}

fn for_each_loaded<'a>(block: &'a [Stmt], f: &mut dyn FnMut(&'a Expr)) {
    for stmt in block {
        if stmt.as_function().is_some() {
            continue;
        }
        for expr in scope::loaded_exprs(stmt) {
            f(expr);
        }
        for nested in stmt.blocks() {
            for_each_loaded(nested, f);
        }
    }
}

struct Classifier<'a> {
    resolver: Resolver<'a>,
    locals: &'a BTreeSet<String>,
    globals: &'a BTreeSet<String>,
    foldable: &'a BTreeSet<String>,
}

impl Classifier<'_> {
    fn block(&self, block: &[Stmt], out: &mut Vec<AstId>) {
        for_each_loaded(block, &mut |expr| {
            self.classify(expr, &mut Vec::new(), out);
        });
    }

    /// Classifies the loaded parts of a store target.
    fn target(&self, target: &Expr, out: &mut Vec<AstId>) {
        if target.as_name().is_none() {
            for part in target.children() {
                self.classify(part, &mut Vec::new(), out);
            }
        }
    }

    /// Returns `true` if `expr` is constant given the comprehension targets in
    /// `bound`, flagging every closed, non-literal constant node.
    fn classify(&self, expr: &Expr, bound: &mut Vec<String>, out: &mut Vec<AstId>) -> bool {
        let constant = match &expr.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Name(name) => {
                bound.contains(name) || (!self.locals.contains(name) && self.globals.contains(name))
            }
            ExprKind::Attribute { value, attr } => value.as_name().is_some_and(|module| {
                !bound.iter().any(|b| b == module)
                    && self.resolver.is_module(module)
                    && matches!(
                        self.resolver.table().lookup(module, attr),
                        Some(Entry::Constant(_))
                    )
            }),
            ExprKind::Call { func, args } => {
                let mut args_constant = true;
                for arg in args {
                    args_constant &= self.classify(arg, bound, out);
                }
                let callee_folds = match self.resolver.callee(func) {
                    Callee::Builtin(_) | Callee::Module(..) => true,
                    Callee::User(name) => self.foldable.contains(name),
                    Callee::Method(_) | Callee::Unknown => false,
                };
                args_constant && callee_folds
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                let depth = bound.len();
                let mut constant = true;
                for generator in generators {
                    constant &= self.classify(&generator.iter, bound, out);
                    bound.push(generator.target.clone());
                    for cond in &generator.ifs {
                        constant &= self.classify(cond, bound, out);
                    }
                }
                constant &= self.classify(elt, bound, out);
                bound.truncate(depth);
                constant
            }
            ExprKind::Yield(value) => {
                if let Some(value) = value {
                    self.classify(value, bound, out);
                }
                false
            }
            _ => {
                let mut constant = true;
                for child in expr.children() {
                    constant &= self.classify(child, bound, out);
                }
                constant
            }
        };

        let closed =
            bound.is_empty() || expr.free_names().iter().all(|name| !bound.contains(name));
        if constant
            && closed
            && !expr.is_literal_value()
            && !matches!(expr.kind, ExprKind::GeneratorExp { .. })
        {
            out.push(expr.id);
        }
        constant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, CmpOp, Comprehension};

    fn compute(module: &Module) -> ConstantExpressions {
        ConstantExpressions::compute(module, &ModuleTable::standard())
    }

    #[test]
    fn test_arithmetic_is_flagged_literals_are_not() {
        let sum = Expr::binop(Expr::int(1), BinOp::Add, Expr::int(3));
        let sum_id = sum.id;
        let lit = Expr::list(vec![Expr::int(1), Expr::int(2)]);
        let lit_id = lit.id;
        let module = Module::new(vec![Stmt::function_def(
            "foo",
            &[],
            vec![Stmt::expr(lit), Stmt::ret(Some(sum))],
        )]);

        let facts = compute(&module);
        assert!(facts.contains(sum_id));
        assert!(!facts.contains(lit_id));
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_free_variables_are_not_constant() {
        let e = Expr::binop(Expr::name("x"), BinOp::Add, Expr::int(1));
        let id = e.id;
        let module = Module::new(vec![Stmt::function_def(
            "f",
            &["x"],
            vec![Stmt::ret(Some(e))],
        )]);
        assert!(!compute(&module).contains(id));
    }

    #[test]
    fn test_global_constants_and_shadowing() {
        // N = 4
        // def f(): return N * 2
        // def g(N): return N * 2
        let in_f = Expr::binop(Expr::name("N"), BinOp::Mul, Expr::int(2));
        let in_g = Expr::binop(Expr::name("N"), BinOp::Mul, Expr::int(2));
        let (f_id, g_id) = (in_f.id, in_g.id);
        let module = Module::new(vec![
            Stmt::assign_name("N", Expr::int(4)),
            Stmt::function_def("f", &[], vec![Stmt::ret(Some(in_f))]),
            Stmt::function_def("g", &["N"], vec![Stmt::ret(Some(in_g))]),
        ]);

        let facts = compute(&module);
        assert!(facts.is_global_constant("N"));
        assert!(facts.contains(f_id));
        assert!(!facts.contains(g_id));
    }

    #[test]
    fn test_mutated_global_is_not_constant() {
        // L = [1]
        // def f(): L.append(2)
        let module = Module::new(vec![
            Stmt::assign_name("L", Expr::list(vec![Expr::int(1)])),
            Stmt::function_def(
                "f",
                &[],
                vec![Stmt::expr(Expr::call(
                    Expr::attribute(Expr::name("L"), "append"),
                    vec![Expr::int(2)],
                ))],
            ),
        ]);
        assert!(!compute(&module).is_global_constant("L"));
    }

    #[test]
    fn test_calls_and_comprehensions() {
        // def sq(x): return x * x
        // def main(): return [sq(i) for i in range(3) if i != 1]
        let elt = Expr::call_named("sq", vec![Expr::name("i")]);
        let elt_id = elt.id;
        let comp = Expr::new(ExprKind::ListComp {
            elt: Box::new(elt),
            generators: vec![Comprehension {
                target: "i".to_string(),
                iter: Expr::call_named("range", vec![Expr::int(3)]),
                ifs: vec![Expr::compare(Expr::name("i"), CmpOp::NotEq, Expr::int(1))],
            }],
        });
        let comp_id = comp.id;
        let print = Expr::call_named("print", vec![Expr::int(1)]);
        let print_id = print.id;
        let module = Module::new(vec![
            Stmt::function_def(
                "sq",
                &["x"],
                vec![Stmt::ret(Some(Expr::binop(
                    Expr::name("x"),
                    BinOp::Mul,
                    Expr::name("x"),
                )))],
            ),
            Stmt::function_def(
                "main",
                &[],
                vec![Stmt::expr(print), Stmt::ret(Some(comp))],
            ),
        ]);

        let facts = compute(&module);
        assert!(facts.contains(comp_id));
        // reads the comprehension target, so only foldable as part of the whole
        assert!(!facts.contains(elt_id));
        assert!(!facts.contains(print_id));
    }

    #[test]
    fn test_module_constants_and_unknown_modules() {
        let pi = Expr::attribute(Expr::name("math"), "pi");
        let cwd = Expr::call(Expr::attribute(Expr::name("os"), "getcwd"), vec![]);
        let (pi_id, cwd_id) = (pi.id, cwd.id);
        let module = Module::new(vec![Stmt::function_def(
            "f",
            &[],
            vec![Stmt::expr(cwd), Stmt::ret(Some(pi))],
        )]);

        let facts = compute(&module);
        assert!(facts.contains(pi_id));
        assert!(!facts.contains(cwd_id));
    }
}
