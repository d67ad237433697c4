//! Name binding and callee resolution shared by the analyses.

use std::collections::BTreeSet;

use crate::{
    ast::{Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind, BUILTIN_MODULE},
    eval::{Entry, ModuleTable},
};

/// Names stored by a block: name targets of assignments and augmented
/// assignments, and loop targets. Nested function bodies are not entered.
pub(crate) fn stored_names(block: &[Stmt]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_stored(block, &mut out);
    out
}

fn collect_stored(block: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in block {
        match &stmt.kind {
            StmtKind::FunctionDef(_) => continue,
            StmtKind::Assign { targets, .. } => {
                out.extend(targets.iter().filter_map(Expr::as_name).map(str::to_string));
            }
            StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => {
                out.extend(target.as_name().map(str::to_string));
            }
            _ => {}
        }
        for nested in stmt.blocks() {
            collect_stored(nested, out);
        }
    }
}

/// Parameters plus every name the function stores.
pub(crate) fn function_locals(def: &FunctionDef) -> BTreeSet<String> {
    let mut locals = stored_names(&def.body);
    locals.extend(def.params.iter().map(|p| p.name.clone()));
    locals
}

/// Names of all top-level function definitions.
pub(crate) fn function_names(module: &Module) -> BTreeSet<String> {
    module.functions().map(|(_, def)| def.name.clone()).collect()
}

/// The variable a store target ultimately writes into: `a` for `a`, `a[i]`
/// and `a[i].x`.
pub(crate) fn target_root(target: &Expr) -> Option<&str> {
    match &target.kind {
        ExprKind::Name(name) => Some(name),
        ExprKind::Subscript { value, .. } | ExprKind::Attribute { value, .. } => {
            target_root(value)
        }
        _ => None,
    }
}

/// Expressions a statement evaluates, excluding name targets.
///
/// Subscript and attribute targets are not loaded as a whole, but their
/// container and index are.
pub(crate) fn loaded_exprs(stmt: &Stmt) -> Vec<&Expr> {
    fn target_parts(target: &Expr) -> Vec<&Expr> {
        match &target.kind {
            ExprKind::Name(_) => Vec::new(),
            _ => target.children(),
        }
    }

    match &stmt.kind {
        StmtKind::Assign { targets, value } => {
            let mut out = vec![value];
            for target in targets {
                out.extend(target_parts(target));
            }
            out
        }
        StmtKind::AugAssign { target, value, .. } => {
            let mut out = vec![value];
            out.extend(target_parts(target));
            out
        }
        StmtKind::For { target, iter, .. } => {
            let mut out = vec![iter];
            out.extend(target_parts(target));
            out
        }
        _ => stmt.exprs(),
    }
}

/// What a call expression calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Callee<'a> {
    /// A function of the builtin namespace, bare or `__builtin__.`-qualified
    Builtin(&'a str),
    /// A function of another table module
    Module(&'a str, &'a str),
    /// A top-level user function
    User(&'a str),
    /// A method on a variable, with the variable it was looked up on
    Method(Option<&'a str>),
    /// Anything else, including `print` and unknown modules
    Unknown,
}

/// Resolves names against one scope: a function body or the module top level.
pub(crate) struct Resolver<'a> {
    table: &'a ModuleTable,
    functions: &'a BTreeSet<String>,
    shadowed: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    /// Resolver for the module top level.
    pub(crate) fn module(
        table: &'a ModuleTable,
        functions: &'a BTreeSet<String>,
        module_stored: &BTreeSet<String>,
    ) -> Self {
        Resolver {
            table,
            functions,
            shadowed: module_stored.clone(),
        }
    }

    /// Resolver for a function body. The function's locals and the module's
    /// globals both shadow builtins.
    pub(crate) fn function(
        table: &'a ModuleTable,
        functions: &'a BTreeSet<String>,
        module_stored: &BTreeSet<String>,
        def: &FunctionDef,
    ) -> Self {
        let mut shadowed = function_locals(def);
        shadowed.extend(module_stored.iter().cloned());
        Resolver {
            table,
            functions,
            shadowed,
        }
    }

    /// Returns `true` if `name` is bound by a variable in this scope.
    pub(crate) fn is_variable(&self, name: &str) -> bool {
        self.shadowed.contains(name)
    }

    /// Returns `true` if `name` refers to a top-level user function here.
    pub(crate) fn is_function(&self, name: &str) -> bool {
        !self.is_variable(name) && self.functions.contains(name)
    }

    /// The builtin module table.
    pub(crate) fn table(&self) -> &ModuleTable {
        self.table
    }

    /// Returns `true` if `name` refers to a table module here.
    pub(crate) fn is_module(&self, name: &str) -> bool {
        !self.is_variable(name) && !self.functions.contains(name) && self.table.has_module(name)
    }

    /// Classifies the callee expression of a call.
    pub(crate) fn callee<'e>(&self, func: &'e Expr) -> Callee<'e> {
        match &func.kind {
            ExprKind::Name(name) => {
                if self.is_variable(name) {
                    Callee::Method(None)
                } else if self.functions.contains(name.as_str()) {
                    Callee::User(name)
                } else if self.table.is_builtin(name) {
                    Callee::Builtin(name)
                } else {
                    Callee::Unknown
                }
            }
            ExprKind::Attribute { value, attr } => match value.as_name() {
                Some(module) if self.is_module(module) => {
                    match self.table.lookup(module, attr) {
                        Some(Entry::Function(_)) if module == BUILTIN_MODULE => {
                            Callee::Builtin(attr)
                        }
                        Some(Entry::Function(_)) => Callee::Module(module, attr),
                        _ => Callee::Unknown,
                    }
                }
                _ => Callee::Method(target_root(value)),
            },
            _ => Callee::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    #[test]
    fn test_stored_names_skips_nested_functions() {
        let block = vec![
            Stmt::assign_name("a", Expr::int(1)),
            Stmt::for_loop(
                "i",
                Expr::name("xs"),
                vec![Stmt::aug_assign("s", BinOp::Add, Expr::name("i"))],
            ),
            Stmt::function_def("f", &[], vec![Stmt::assign_name("hidden", Expr::int(0))]),
        ];
        let names: Vec<String> = stored_names(&block).into_iter().collect();
        assert_eq!(names, vec!["a", "i", "s"]);
    }

    #[test]
    fn test_callee_resolution() {
        let table = ModuleTable::standard();
        let functions: BTreeSet<String> = ["helper".to_string()].into();
        let def = FunctionDef {
            name: "g".to_string(),
            params: vec![crate::ast::Param::new("xs")],
            body: vec![Stmt::assign_name("sum", Expr::int(0))],
        };
        let resolver = Resolver::function(&table, &functions, &BTreeSet::new(), &def);

        assert_eq!(resolver.callee(&Expr::name("len")), Callee::Builtin("len"));
        assert_eq!(resolver.callee(&Expr::builtin("len")), Callee::Builtin("len"));
        assert_eq!(resolver.callee(&Expr::name("helper")), Callee::User("helper"));
        assert_eq!(resolver.callee(&Expr::name("print")), Callee::Unknown);
        // a local named `sum` shadows the builtin
        assert_eq!(resolver.callee(&Expr::name("sum")), Callee::Method(None));
        assert_eq!(
            resolver.callee(&Expr::attribute(Expr::name("math"), "sqrt")),
            Callee::Module("math", "sqrt")
        );
        assert_eq!(
            resolver.callee(&Expr::attribute(Expr::name("xs"), "append")),
            Callee::Method(Some("xs"))
        );
    }
}
