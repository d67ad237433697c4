//! Evaluation environment prepared from a module.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    ast::{FunctionDef, Module, StmtKind},
    eval::{EvalLimits, Evaluator, ModuleTable, Value},
};

/// Globals and callable functions visible to the evaluator.
///
/// Built once per folding pass by [`Environment::prepare`], which replays the
/// module's top level inside the sandbox: function definitions become callable
/// and side-effect-free statements bind their globals. A statement that fails
/// (because it prints, stores through a subscript, calls something unknown) is
/// logged and skipped; it leaves no partial bindings behind.
#[derive(Debug, Clone)]
pub struct Environment {
    table: Arc<ModuleTable>,
    globals: FxHashMap<String, Value>,
    functions: FxHashMap<String, FunctionDef>,
}

impl Environment {
    /// Creates an environment with no globals or functions.
    #[must_use]
    pub fn new(table: Arc<ModuleTable>) -> Self {
        Environment {
            table,
            globals: FxHashMap::default(),
            functions: FxHashMap::default(),
        }
    }

    /// Pre-executes the top level of `module`.
    #[must_use]
    pub fn prepare(module: &Module, table: Arc<ModuleTable>, limits: EvalLimits) -> Self {
        let mut env = Self::new(table);
        for stmt in &module.body {
            if let StmtKind::FunctionDef(def) = &stmt.kind {
                env.functions.insert(def.name.clone(), def.clone());
                env.globals.remove(&def.name);
                continue;
            }

            let staged = {
                let mut staged = env.globals.clone();
                Evaluator::new(&env, limits)
                    .exec_top_level(stmt, &mut staged)
                    .map(|()| staged)
            };
            match staged {
                Ok(globals) => {
                    for name in globals.keys() {
                        env.functions.remove(name);
                    }
                    env.globals = globals;
                }
                Err(e) => log::warn!("skipping top-level statement {}: {e}", stmt.id),
            }
        }
        env
    }

    /// The builtin module table.
    #[must_use]
    pub fn table(&self) -> &ModuleTable {
        &self.table
    }

    /// Value of a prepared global.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// A callable top-level function.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Binds a global directly.
    pub fn define_global(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.functions.remove(&name);
        self.globals.insert(name, value);
    }
}
