//! Use-def chains.
//!
//! For every function, every variable name gets its own [`UseDefChain`]: a
//! directed graph whose nodes are the occurrences of the name and whose
//! edges run from a definition to each use it may reach. Reaching
//! definitions are computed flow-sensitively over the structured body:
//!
//! - `if` branches are analyzed separately and their states unioned;
//! - loops iterate to a fixpoint so definitions in the body reach uses at
//!   the loop head, and `break`/`continue` states feed the exit and the back
//!   edge respectively;
//! - comprehension targets shadow the enclosing name and produce no
//!   occurrences.
//!
//! # Examples
//!
//! ```rust
//! use midend::analysis::{Action, UseDefChains};
//! use midend::ast::{Expr, Module, Stmt};
//!
//! // def f():
//! //     a = 1
//! //     return a
//! let module = Module::new(vec![Stmt::function_def(
//!     "f",
//!     &[],
//!     vec![
//!         Stmt::assign_name("a", Expr::int(1)),
//!         Stmt::ret(Some(Expr::name("a"))),
//!     ],
//! )]);
//! let chains = UseDefChains::compute(&module)?;
//! let (id, _) = module.functions().next().unwrap();
//! let chain = chains.function(id).unwrap().chain("a").unwrap();
//! assert_eq!(chain.len(), 2);
//! assert_eq!(chain.definitions().len(), 1);
//! assert_eq!(chain.uses()[0].action, Action::Use);
//! # Ok::<(), midend::Error>(())
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    ast::{AstId, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind},
    utils::graph::{DirectedGraph, NodeId},
    Result,
};

/// What an occurrence does to its variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// The variable is bound
    Define,
    /// The variable is read
    Use,
    /// The variable is read and rebound in one step, as in `x += 1`
    UseDefine,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Define => "D",
            Action::Use => "U",
            Action::UseDefine => "UD",
        })
    }
}

/// One occurrence of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// The name node, or the parameter, of this occurrence
    pub node: AstId,
    /// What the occurrence does
    pub action: Action,
    /// `true` if this definition binds a function parameter
    pub is_param: bool,
    /// Innermost statement containing the occurrence, `None` for parameters
    pub statement: Option<AstId>,
    /// Position in source order within the function
    pub order: usize,
}

/// The occurrences of one variable and the reaching-definition edges
/// between them.
#[derive(Debug, Clone, Default)]
pub struct UseDefChain {
    graph: DirectedGraph<Occurrence>,
    by_node: FxHashMap<AstId, NodeId>,
}

impl UseDefChain {
    /// All occurrences, in source order.
    #[must_use]
    pub fn occurrences(&self) -> Vec<&Occurrence> {
        let mut out: Vec<&Occurrence> = self.graph.nodes().map(|(_, occ)| occ).collect();
        out.sort_by_key(|occ| occ.order);
        out
    }

    /// Number of occurrences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the chain has no occurrence.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Occurrences that bind the variable: [`Action::Define`] and
    /// [`Action::UseDefine`].
    #[must_use]
    pub fn definitions(&self) -> Vec<&Occurrence> {
        self.occurrences()
            .into_iter()
            .filter(|occ| occ.action != Action::Use)
            .collect()
    }

    /// Plain read occurrences.
    #[must_use]
    pub fn uses(&self) -> Vec<&Occurrence> {
        self.occurrences()
            .into_iter()
            .filter(|occ| occ.action == Action::Use)
            .collect()
    }

    /// Returns `true` if any occurrence reads the variable.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.graph
            .nodes()
            .any(|(_, occ)| occ.action != Action::Define)
    }

    /// Returns `true` if some occurrence is tagged [`Action::UseDefine`].
    #[must_use]
    pub fn has_use_define(&self) -> bool {
        self.graph
            .nodes()
            .any(|(_, occ)| occ.action == Action::UseDefine)
    }

    /// Looks up the occurrence at a node.
    #[must_use]
    pub fn occurrence(&self, node: AstId) -> Option<&Occurrence> {
        self.by_node.get(&node).and_then(|&id| self.graph.node(id))
    }

    /// Definitions that may reach the occurrence at `node`.
    #[must_use]
    pub fn reaching(&self, node: AstId) -> Vec<&Occurrence> {
        let Some(&id) = self.by_node.get(&node) else {
            return Vec::new();
        };
        let mut out: Vec<&Occurrence> = self
            .graph
            .predecessors(id)
            .filter_map(|pred| self.graph.node(pred))
            .collect();
        out.sort_by_key(|occ| occ.order);
        out
    }

    fn node_for(&mut self, occurrence: Occurrence) -> NodeId {
        if let Some(&id) = self.by_node.get(&occurrence.node) {
            return id;
        }
        let node = occurrence.node;
        let id = self.graph.add_node(occurrence);
        self.by_node.insert(node, id);
        id
    }

    fn link(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.graph.add_edge(from, to)?;
        Ok(())
    }
}

/// Chains of one function, keyed by variable name.
#[derive(Debug, Clone, Default)]
pub struct FunctionChains {
    chains: BTreeMap<String, UseDefChain>,
}

impl FunctionChains {
    /// Chain of a variable.
    #[must_use]
    pub fn chain(&self, name: &str) -> Option<&UseDefChain> {
        self.chains.get(name)
    }

    /// Variable names with a chain, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.chains.keys().map(String::as_str)
    }

    /// Returns the variable and chain an occurrence node belongs to.
    #[must_use]
    pub fn find(&self, node: AstId) -> Option<(&str, &UseDefChain)> {
        self.chains
            .iter()
            .find(|(_, chain)| chain.by_node.contains_key(&node))
            .map(|(name, chain)| (name.as_str(), chain))
    }
}

/// Use-def chains of every top-level function, keyed by the identity of the
/// defining statement.
#[derive(Debug, Clone, Default)]
pub struct UseDefChains {
    functions: BTreeMap<AstId, FunctionChains>,
}

impl UseDefChains {
    /// Computes the chains of every top-level function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if a chain graph cannot be built.
    pub fn compute(module: &Module) -> Result<Self> {
        let defs: Vec<(AstId, &FunctionDef)> = module.functions().collect();
        let built: Vec<(AstId, FunctionChains)> = defs
            .par_iter()
            .map(|(id, def)| -> Result<(AstId, FunctionChains)> {
                Ok((*id, Builder::build(def)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(UseDefChains {
            functions: built.into_iter().collect(),
        })
    }

    /// Chains of the function defined by the statement `id`.
    #[must_use]
    pub fn function(&self, id: AstId) -> Option<&FunctionChains> {
        self.functions.get(&id)
    }

    /// Number of analyzed functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the module has no function.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Definitions reaching the current program point, per name.
type Reach = BTreeMap<String, BTreeSet<NodeId>>;

fn union(into: &mut Reach, other: &Reach) {
    for (name, defs) in other {
        into.entry(name.clone())
            .or_default()
            .extend(defs.iter().copied());
    }
}

#[derive(Default)]
struct LoopFrame {
    breaks: Reach,
    continues: Reach,
}

struct Builder {
    chains: BTreeMap<String, UseDefChain>,
    order: usize,
    loops: Vec<LoopFrame>,
}

impl Builder {
    fn build(def: &FunctionDef) -> Result<FunctionChains> {
        let mut builder = Builder {
            chains: BTreeMap::new(),
            order: 0,
            loops: Vec::new(),
        };
        let mut state = Reach::new();
        for param in &def.params {
            let id = builder.occurrence(&param.name, param.id, Action::Define, true, None);
            state.insert(param.name.clone(), BTreeSet::from([id]));
        }
        builder.block(&def.body, &mut state)?;
        Ok(FunctionChains {
            chains: builder.chains,
        })
    }

    fn occurrence(
        &mut self,
        name: &str,
        node: AstId,
        action: Action,
        is_param: bool,
        statement: Option<AstId>,
    ) -> NodeId {
        let order = self.order;
        let chain = self.chains.entry(name.to_string()).or_default();
        let before = chain.len();
        let id = chain.node_for(Occurrence {
            node,
            action,
            is_param,
            statement,
            order,
        });
        if chain.len() > before {
            self.order += 1;
        }
        id
    }

    fn define(&mut self, name: &str, node: AstId, stmt: AstId, state: &mut Reach) {
        let id = self.occurrence(name, node, Action::Define, false, Some(stmt));
        state.insert(name.to_string(), BTreeSet::from([id]));
    }

    /// Records a read of `name` at `node`, linked from every reaching definition.
    fn read(
        &mut self,
        name: &str,
        node: AstId,
        action: Action,
        stmt: AstId,
        state: &Reach,
    ) -> Result<NodeId> {
        let id = self.occurrence(name, node, action, false, Some(stmt));
        if let Some(defs) = state.get(name) {
            if let Some(chain) = self.chains.get_mut(name) {
                for &def in defs {
                    chain.link(def, id)?;
                }
            }
        }
        Ok(id)
    }

    fn expr(
        &mut self,
        expr: &Expr,
        stmt: AstId,
        state: &Reach,
        bound: &mut Vec<String>,
    ) -> Result<()> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if !bound.contains(name) {
                    self.read(name, expr.id, Action::Use, stmt, state)?;
                }
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                let depth = bound.len();
                for generator in generators {
                    self.expr(&generator.iter, stmt, state, bound)?;
                    bound.push(generator.target.clone());
                    for cond in &generator.ifs {
                        self.expr(cond, stmt, state, bound)?;
                    }
                }
                self.expr(elt, stmt, state, bound)?;
                bound.truncate(depth);
            }
            _ => {
                for child in expr.children() {
                    self.expr(child, stmt, state, bound)?;
                }
            }
        }
        Ok(())
    }

    fn load(&mut self, expr: &Expr, stmt: AstId, state: &Reach) -> Result<()> {
        self.expr(expr, stmt, state, &mut Vec::new())
    }

    /// Stores into a target: binds a name, or reads the parts of a subscript
    /// or attribute target.
    fn store(&mut self, target: &Expr, stmt: AstId, state: &mut Reach) -> Result<()> {
        match target.as_name() {
            Some(name) => {
                self.define(name, target.id, stmt, state);
                Ok(())
            }
            None => {
                for part in target.children() {
                    self.load(part, stmt, state)?;
                }
                Ok(())
            }
        }
    }

    fn block(&mut self, block: &[Stmt], state: &mut Reach) -> Result<()> {
        for stmt in block {
            self.stmt(stmt, state)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, state: &mut Reach) -> Result<()> {
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                self.load(value, stmt.id, state)?;
                for target in targets {
                    self.store(target, stmt.id, state)?;
                }
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.load(value, stmt.id, state)?;
                match target.as_name() {
                    Some(name) => {
                        let id = self.read(name, target.id, Action::UseDefine, stmt.id, state)?;
                        state.insert(name.to_string(), BTreeSet::from([id]));
                    }
                    None => self.load(target, stmt.id, state)?,
                }
            }
            StmtKind::Expr(value) | StmtKind::Return(Some(value)) => {
                self.load(value, stmt.id, state)?;
            }
            StmtKind::If { test, body, orelse } => {
                self.load(test, stmt.id, state)?;
                let mut taken = state.clone();
                self.block(body, &mut taken)?;
                self.block(orelse, state)?;
                union(state, &taken);
            }
            StmtKind::While { test, body, orelse } => {
                let entry = state.clone();
                let mut head = entry.clone();
                let breaks = loop {
                    self.load(test, stmt.id, &head)?;
                    let mut current = head.clone();
                    self.loops.push(LoopFrame::default());
                    self.block(body, &mut current)?;
                    let frame = self.loops.pop().unwrap_or_default();

                    let mut next = entry.clone();
                    union(&mut next, &current);
                    union(&mut next, &frame.continues);
                    union(&mut next, &head);
                    if next == head {
                        break frame.breaks;
                    }
                    head = next;
                };
                *state = head;
                self.block(orelse, state)?;
                union(state, &breaks);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.load(iter, stmt.id, state)?;
                let entry = state.clone();
                let mut head = entry.clone();
                let breaks = loop {
                    let mut current = head.clone();
                    self.store(target, stmt.id, &mut current)?;
                    self.loops.push(LoopFrame::default());
                    self.block(body, &mut current)?;
                    let frame = self.loops.pop().unwrap_or_default();

                    let mut next = entry.clone();
                    union(&mut next, &current);
                    union(&mut next, &frame.continues);
                    union(&mut next, &head);
                    if next == head {
                        break frame.breaks;
                    }
                    head = next;
                };
                *state = head;
                self.block(orelse, state)?;
                union(state, &breaks);
            }
            StmtKind::Break => {
                if let Some(frame) = self.loops.last_mut() {
                    union(&mut frame.breaks, state);
                }
            }
            StmtKind::Continue => {
                if let Some(frame) = self.loops.last_mut() {
                    union(&mut frame.continues, state);
                }
            }
            StmtKind::Return(None) | StmtKind::Pass | StmtKind::FunctionDef(_) => {}
        }
        Ok(())
    }
}
