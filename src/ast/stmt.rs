//! Statement nodes and the module root.

use serde::{Deserialize, Serialize};

use crate::ast::{AstId, BinOp, Expr, Metadata};

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Identity of the binding occurrence
    pub id: AstId,
    /// Parameter name
    pub name: String,
}

impl Param {
    /// Creates a parameter with a fresh identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            id: AstId::fresh(),
            name: name.into(),
        }
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Positional parameters
    pub params: Vec<Param>,
    /// Body statements
    pub body: Vec<Stmt>,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Identity of this node
    pub id: AstId,
    /// What this node is
    pub kind: StmtKind,
}

/// The statement vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `def name(params): body`
    FunctionDef(FunctionDef),
    /// `t0 = t1 = ... = value`
    Assign {
        /// Targets: names, subscripts or attributes
        targets: Vec<Expr>,
        /// Assigned value
        value: Expr,
    },
    /// `target op= value`
    AugAssign {
        /// Target: a name, subscript or attribute
        target: Expr,
        /// Operator
        op: BinOp,
        /// Right-hand side
        value: Expr,
    },
    /// Expression evaluated for its effect
    Expr(Expr),
    /// `return value`
    Return(Option<Expr>),
    /// `for target in iter: body else: orelse`
    For {
        /// Loop variable, a name
        target: Expr,
        /// Iterable
        iter: Expr,
        /// Loop body
        body: Vec<Stmt>,
        /// Runs when the loop finishes without `break`
        orelse: Vec<Stmt>,
    },
    /// `while test: body else: orelse`
    While {
        /// Loop condition
        test: Expr,
        /// Loop body
        body: Vec<Stmt>,
        /// Runs when the loop finishes without `break`
        orelse: Vec<Stmt>,
    },
    /// `if test: body else: orelse`
    If {
        /// Condition
        test: Expr,
        /// Taken branch
        body: Vec<Stmt>,
        /// Alternative branch
        orelse: Vec<Stmt>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `pass`, also the no-op marker left behind by removals
    Pass,
}

impl Stmt {
    /// Creates a statement with a fresh identity.
    #[must_use]
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            id: AstId::fresh(),
            kind,
        }
    }

    /// `def name(params): body`
    #[must_use]
    pub fn function_def(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::FunctionDef(FunctionDef {
            name: name.into(),
            params: params.iter().map(|p| Param::new(*p)).collect(),
            body,
        }))
    }

    /// `targets... = value`
    #[must_use]
    pub fn assign(targets: Vec<Expr>, value: Expr) -> Self {
        Self::new(StmtKind::Assign { targets, value })
    }

    /// `name = value`
    #[must_use]
    pub fn assign_name(name: impl Into<String>, value: Expr) -> Self {
        Self::assign(vec![Expr::name(name)], value)
    }

    /// `name op= value`
    #[must_use]
    pub fn aug_assign(name: impl Into<String>, op: BinOp, value: Expr) -> Self {
        Self::new(StmtKind::AugAssign {
            target: Expr::name(name),
            op,
            value,
        })
    }

    /// Expression statement.
    #[must_use]
    pub fn expr(value: Expr) -> Self {
        Self::new(StmtKind::Expr(value))
    }

    /// `return value`
    #[must_use]
    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value))
    }

    /// `for target in iter: body`
    #[must_use]
    pub fn for_loop(target: impl Into<String>, iter: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::For {
            target: Expr::name(target),
            iter,
            body,
            orelse: Vec::new(),
        })
    }

    /// `while test: body`
    #[must_use]
    pub fn while_loop(test: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::While {
            test,
            body,
            orelse: Vec::new(),
        })
    }

    /// `if test: body else: orelse`
    #[must_use]
    pub fn if_else(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        Self::new(StmtKind::If { test, body, orelse })
    }

    /// `break`
    #[must_use]
    pub fn break_() -> Self {
        Self::new(StmtKind::Break)
    }

    /// `continue`
    #[must_use]
    pub fn continue_() -> Self {
        Self::new(StmtKind::Continue)
    }

    /// `pass`
    #[must_use]
    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    /// Returns `true` for a `pass` statement.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self.kind, StmtKind::Pass)
    }

    /// Returns the function definition if this statement is one.
    #[must_use]
    pub fn as_function(&self) -> Option<&FunctionDef> {
        match &self.kind {
            StmtKind::FunctionDef(def) => Some(def),
            _ => None,
        }
    }
}

/// A whole program: top-level statements plus the metadata side table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Top-level statements
    pub body: Vec<Stmt>,
    /// Annotations keyed by node identity
    #[serde(default)]
    pub metadata: Metadata,
}

impl Module {
    /// Creates a module without annotations.
    #[must_use]
    pub fn new(body: Vec<Stmt>) -> Self {
        Module {
            body,
            metadata: Metadata::default(),
        }
    }

    /// Iterates over the top-level function definitions together with the
    /// identity of their defining statement.
    pub fn functions(&self) -> impl Iterator<Item = (AstId, &FunctionDef)> + '_ {
        self.body
            .iter()
            .filter_map(|stmt| stmt.as_function().map(|def| (stmt.id, def)))
    }

    /// Looks up a top-level function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions()
            .map(|(_, def)| def)
            .find(|def| def.name == name)
    }
}
