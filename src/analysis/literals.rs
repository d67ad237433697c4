//! Variables bound only to immutable literals.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::scope,
    ast::{AstId, Module, Stmt, StmtKind},
};

/// Per function, the names every definition of which assigns a scalar literal
/// or a tuple of scalar literals.
///
/// Such a value may be duplicated into any number of use sites without
/// changing behavior.
#[derive(Debug, Clone, Default)]
pub struct Literals {
    functions: BTreeMap<AstId, BTreeSet<String>>,
}

impl Literals {
    /// Collects literal-bound names for every top-level function.
    #[must_use]
    pub fn compute(module: &Module) -> Self {
        let functions = module
            .functions()
            .map(|(id, def)| {
                let mut candidates = BTreeSet::new();
                let mut disqualified: BTreeSet<String> =
                    def.params.iter().map(|p| p.name.clone()).collect();
                scan(&def.body, &mut candidates, &mut disqualified);
                let names = candidates.difference(&disqualified).cloned().collect();
                (id, names)
            })
            .collect();
        Literals { functions }
    }

    /// Returns `true` if `name` is literal-bound in the function defined by
    /// statement `function`.
    #[must_use]
    pub fn contains(&self, function: AstId, name: &str) -> bool {
        self.functions
            .get(&function)
            .is_some_and(|names| names.contains(name))
    }

    /// Literal-bound names of one function.
    pub fn names(&self, function: AstId) -> impl Iterator<Item = &str> + '_ {
        self.functions
            .get(&function)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }
}

fn scan(block: &[Stmt], candidates: &mut BTreeSet<String>, disqualified: &mut BTreeSet<String>) {
    for stmt in block {
        match &stmt.kind {
            StmtKind::FunctionDef(_) => continue,
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    match target.as_name() {
                        Some(name) if value.is_immutable_literal() => {
                            candidates.insert(name.to_string());
                        }
                        _ => {
                            disqualified.extend(scope::target_root(target).map(str::to_string));
                        }
                    }
                }
            }
            StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => {
                disqualified.extend(scope::target_root(target).map(str::to_string));
            }
            _ => {}
        }
        for nested in stmt.blocks() {
            scan(nested, candidates, disqualified);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, Expr};

    #[test]
    fn test_literal_bound_names() {
        // def f(p):
        //     a = 1
        //     t = (1, 2)
        //     l = [1]
        //     b = 2
        //     b = p
        //     c = 0
        //     c += 1
        //     p = 3
        let module = Module::new(vec![Stmt::function_def(
            "f",
            &["p"],
            vec![
                Stmt::assign_name("a", Expr::int(1)),
                Stmt::assign_name("t", Expr::tuple(vec![Expr::int(1), Expr::int(2)])),
                Stmt::assign_name("l", Expr::list(vec![Expr::int(1)])),
                Stmt::assign_name("b", Expr::int(2)),
                Stmt::assign_name("b", Expr::name("p")),
                Stmt::assign_name("c", Expr::int(0)),
                Stmt::aug_assign("c", BinOp::Add, Expr::int(1)),
                Stmt::assign_name("p", Expr::int(3)),
            ],
        )]);

        let literals = Literals::compute(&module);
        let (id, _) = module.functions().next().unwrap();
        let names: Vec<&str> = literals.names(id).collect();
        assert_eq!(names, vec!["a", "t"]);
        assert!(!literals.contains(id, "p"));
    }
}
