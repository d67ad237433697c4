//! Forward substitution pass.
//!
//! Moves the value of a definition into the places that read it, leaving a
//! `pass` where the assignment was. A definition qualifies when either
//!
//! - it is read exactly once and the read evaluates it at most once
//!   (laziness `Finite(1)`), or
//! - it binds an immutable literal and every read happens a bounded number
//!   of times.
//!
//! Each read must be reached by that definition alone, and the variable must
//! have no other binding in the function.
//!
//! Rewrites invalidate the chains of the names they touch, so a name that a
//! substitution touched is left alone for the rest of the invocation and
//! picked up again on the next iteration of the pipeline.

use std::collections::BTreeSet;

use log::trace;

use crate::{
    analysis::{scope, Analyses, AnalysisKind, FunctionChains, Laziness, Lazy, Literals},
    ast::{find_in_block_mut, AstId, Expr, FunctionDef, Metadata, Module, Stmt, StmtKind},
    compiler::{
        pass::TreePass,
        passes::{find_stmt, has_functions},
        CompilerContext, EventKind,
    },
    Result,
};

/// Forward substitution pass.
#[derive(Debug, Default)]
pub struct ForwardSubstitutionPass;

impl ForwardSubstitutionPass {
    /// Creates a new forward substitution pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// A substitution that passed every check.
struct Plan {
    name: String,
    statement: AstId,
    target: AstId,
    uses: Vec<AstId>,
    value: Expr,
    single_target: bool,
    touched: BTreeSet<String>,
}

struct Planner<'a> {
    function: AstId,
    chains: &'a FunctionChains,
    laziness: &'a Laziness,
    literals: &'a Literals,
}

impl Planner<'_> {
    fn plan(&self, name: &str, def: &FunctionDef) -> Option<Plan> {
        let chain = self.chains.chain(name)?;
        if chain.has_use_define() {
            return None;
        }
        let definitions = chain.definitions();
        let [definition] = definitions.as_slice() else {
            return None;
        };
        if definition.is_param {
            return None;
        }
        let uses = chain.uses();
        if uses.is_empty() {
            return None;
        }

        let lazy = self.laziness.get(self.function, name);
        let single_use = chain.len() == 2 && uses.len() == 1 && lazy == Some(Lazy::Finite(1));
        let literal =
            lazy.is_some_and(Lazy::is_finite) && self.literals.contains(self.function, name);
        if !single_use && !literal {
            return None;
        }

        let statement = definition.statement?;
        let stmt = find_stmt(&def.body, statement)?;
        let StmtKind::Assign { targets, value } = &stmt.kind else {
            return None;
        };
        if !targets.iter().any(|t| t.id == definition.node) {
            return None;
        }

        let mut touched: BTreeSet<String> = value.free_names().into_iter().collect();
        touched.insert(name.to_string());
        for occurrence in &uses {
            if occurrence.order < definition.order || value.contains_id(occurrence.node) {
                return None;
            }
            let reaching = chain.reaching(occurrence.node);
            if reaching.len() != 1 || reaching[0].node != definition.node {
                return None;
            }
            if let Some(user) = occurrence.statement.and_then(|id| find_stmt(&def.body, id)) {
                touched.extend(scope::stored_names(std::slice::from_ref(user)));
            }
        }

        Some(Plan {
            name: name.to_string(),
            statement,
            target: definition.node,
            uses: uses.iter().map(|occ| occ.node).collect(),
            value: value.clone(),
            single_target: targets.len() == 1,
            touched,
        })
    }
}

/// Replaces the expression with identity `id` in `block`.
fn replace_expr(block: &mut [Stmt], id: AstId, replacement: Expr) -> bool {
    let mut replacement = Some(replacement);
    for stmt in block.iter_mut() {
        stmt.walk_exprs_mut(&mut |expr| {
            if expr.id == id {
                if let Some(value) = replacement.take() {
                    *expr = value;
                }
            }
        });
        if replacement.is_none() {
            return true;
        }
    }
    false
}

fn apply(def: &mut FunctionDef, metadata: &mut Metadata, plan: Plan) -> bool {
    // With a single target the assignment disappears, so the original value
    // moves into the first read and later reads get copies.
    let mut original = plan.single_target.then(|| plan.value.clone());
    for &use_id in &plan.uses {
        let replacement = match original.take() {
            Some(value) => value,
            None => plan.value.deep_copy(metadata),
        };
        if !replace_expr(&mut def.body, use_id, replacement) {
            return false;
        }
    }

    let Some(stmt) = find_in_block_mut(&mut def.body, plan.statement) else {
        return false;
    };
    if plan.single_target {
        stmt.kind = StmtKind::Pass;
    } else if let StmtKind::Assign { targets, .. } = &mut stmt.kind {
        targets.retain(|t| t.id != plan.target);
    }
    true
}

impl TreePass for ForwardSubstitutionPass {
    fn name(&self) -> &'static str {
        "forward-substitution"
    }

    fn description(&self) -> &'static str {
        "Substitutes single-use and literal definitions into their uses"
    }

    fn requires(&self) -> &'static [AnalysisKind] {
        &[
            AnalysisKind::UseDefChains,
            AnalysisKind::Laziness,
            AnalysisKind::Literals,
        ]
    }

    fn should_run(&self, module: &Module, _ctx: &CompilerContext) -> bool {
        has_functions(module)
    }

    fn run(&self, module: &mut Module, analyses: &Analyses, ctx: &CompilerContext) -> Result<bool> {
        let chains = analyses.use_def_chains()?;
        let laziness = analyses.laziness()?;
        let literals = analyses.literals()?;

        let mut changed = false;
        for stmt in &mut module.body {
            let function = stmt.id;
            let StmtKind::FunctionDef(def) = &mut stmt.kind else {
                continue;
            };
            let Some(function_chains) = chains.function(function) else {
                continue;
            };
            let planner = Planner {
                function,
                chains: function_chains,
                laziness,
                literals,
            };

            let mut touched = BTreeSet::new();
            let names: Vec<String> = function_chains.names().map(str::to_string).collect();
            for name in names {
                if touched.contains(&name) {
                    continue;
                }
                let Some(plan) = planner.plan(&name, def) else {
                    continue;
                };
                if plan.touched.iter().any(|n| touched.contains(n)) {
                    trace!("{}: `{name}` depends on a rewritten name", def.name);
                    continue;
                }

                let message = format!(
                    "{} = {} into {} use(s)",
                    plan.name,
                    plan.value,
                    plan.uses.len()
                );
                let target = plan.target;
                let names_touched = plan.touched.clone();
                if apply(def, &mut module.metadata, plan) {
                    ctx.events
                        .record(EventKind::VariableSubstituted)
                        .at(Some(&def.name), target)
                        .message(message);
                    ctx.mark_changed(Some(&def.name));
                    touched.extend(names_touched);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::BinOp,
        test::{apply, apply_with_context, function_module},
    };

    fn substitute(module: &mut Module) -> bool {
        apply(&mut ForwardSubstitutionPass::new(), module).unwrap()
    }

    #[test]
    fn test_single_use_substituted() {
        // a = [2, 3]; print(a)
        let mut module = function_module(vec![
            Stmt::assign_name("a", Expr::list(vec![Expr::int(2), Expr::int(3)])),
            Stmt::expr(Expr::call_named("print", vec![Expr::name("a")])),
        ]);
        assert!(substitute(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo():\n    pass\n    print([2, 3])\n"
        );
    }

    #[test]
    fn test_literal_copied_into_every_use() {
        let mut module = function_module(vec![
            Stmt::assign_name("k", Expr::int(7)),
            Stmt::ret(Some(Expr::binop(
                Expr::name("k"),
                BinOp::Add,
                Expr::name("k"),
            ))),
        ]);
        assert!(substitute(&mut module));
        assert_eq!(module.to_string(), "def foo():\n    pass\n    return 7 + 7\n");
    }

    #[test]
    fn test_multiple_definitions_left_alone() {
        let mut module = function_module(vec![
            Stmt::assign_name("a", Expr::int(1)),
            Stmt::assign_name("a", Expr::int(2)),
            Stmt::ret(Some(Expr::name("a"))),
        ]);
        let before = module.to_string();
        assert!(!substitute(&mut module));
        assert_eq!(module.to_string(), before);
    }

    #[test]
    fn test_use_in_loop_left_alone() {
        // a = [1]; for i in x: print(a)
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["x"],
            vec![
                Stmt::assign_name("a", Expr::list(vec![Expr::int(1)])),
                Stmt::for_loop(
                    "i",
                    Expr::name("x"),
                    vec![Stmt::expr(Expr::call_named("print", vec![Expr::name("a")]))],
                ),
            ],
        )]);
        assert!(!substitute(&mut module));
    }

    #[test]
    fn test_dependency_modified_between() {
        // a = b + 1; b = 5; return a
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["b"],
            vec![
                Stmt::assign_name("a", Expr::binop(Expr::name("b"), BinOp::Add, Expr::int(1))),
                Stmt::assign_name("b", Expr::int(5)),
                Stmt::ret(Some(Expr::name("a"))),
            ],
        )]);
        assert!(!substitute(&mut module));
    }

    #[test]
    fn test_one_target_of_many_removed() {
        // a = b = x * 2; return a + b
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["x"],
            vec![
                Stmt::assign(
                    vec![Expr::name("a"), Expr::name("b")],
                    Expr::binop(Expr::name("x"), BinOp::Mul, Expr::int(2)),
                ),
                Stmt::ret(Some(Expr::binop(
                    Expr::name("a"),
                    BinOp::Add,
                    Expr::name("b"),
                ))),
            ],
        )]);
        assert!(substitute(&mut module));
        assert_eq!(
            module.to_string(),
            "def foo(x):\n    b = x * 2\n    return (x * 2) + b\n"
        );

        // b reads x, which the first rewrite touched
        let ctx = CompilerContext::default();
        assert!(apply_with_context(&mut ForwardSubstitutionPass::new(), &mut module, &ctx).unwrap());
        assert_eq!(ctx.events.count_kind(EventKind::VariableSubstituted), 1);
        assert!(ctx.is_changed("foo"));
    }

    #[test]
    fn test_read_of_global_not_moved_past_impure_call() {
        // G = [1]
        // def h(): G.append(2)
        // def foo(): a = len(G); h(); return a
        let mut module = Module::new(vec![
            Stmt::assign_name("G", Expr::list(vec![Expr::int(1)])),
            Stmt::function_def(
                "h",
                &[],
                vec![Stmt::expr(Expr::call(
                    Expr::attribute(Expr::name("G"), "append"),
                    vec![Expr::int(2)],
                ))],
            ),
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
        let before = module.to_string();
        assert!(!substitute(&mut module));
        assert_eq!(module.to_string(), before);
    }

    #[test]
    fn test_read_not_moved_past_mutation_of_alias() {
        // def foo(x): a = len(x); y = x; y.append(1); return a
        let mut module = Module::new(vec![Stmt::function_def(
            "foo",
            &["x"],
            vec![
                Stmt::assign_name("a", Expr::call_named("len", vec![Expr::name("x")])),
                Stmt::assign_name("y", Expr::name("x")),
                Stmt::expr(Expr::call(
                    Expr::attribute(Expr::name("y"), "append"),
                    vec![Expr::int(1)],
                )),
                Stmt::ret(Some(Expr::name("a"))),
            ],
        )]);
        let before = module.to_string();
        assert!(!substitute(&mut module));
        assert_eq!(module.to_string(), before);
    }
}
