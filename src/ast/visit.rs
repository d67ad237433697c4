//! Generic traversal and deep copy.
//!
//! Children are always produced in evaluation order: for comprehensions the
//! clauses (iterable, then filters) come before the element expression, for
//! assignments the value comes before the targets.

use crate::ast::{AstId, Expr, ExprKind, Metadata, Stmt, StmtKind};

impl Expr {
    /// Direct children of this expression, in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Name(_) => {}
            ExprKind::Attribute { value, .. } => out.push(value.as_ref()),
            ExprKind::BinOp { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            ExprKind::UnaryOp { operand, .. } => out.push(operand.as_ref()),
            ExprKind::BoolOp { values, .. } => out.extend(values.iter()),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                out.push(left.as_ref());
                out.extend(comparators.iter());
            }
            ExprKind::Call { func, args } => {
                out.push(func.as_ref());
                out.extend(args.iter());
            }
            ExprKind::Subscript { value, index } => {
                out.push(value.as_ref());
                out.push(index.as_ref());
            }
            ExprKind::List(elts) | ExprKind::Tuple(elts) | ExprKind::Set(elts) => {
                out.extend(elts.iter());
            }
            ExprKind::Dict { keys, values } => {
                for (k, v) in keys.iter().zip(values.iter()) {
                    out.push(k);
                    out.push(v);
                }
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                for generator in generators {
                    out.push(&generator.iter);
                    out.extend(generator.ifs.iter());
                }
                out.push(elt.as_ref());
            }
            ExprKind::Yield(value) => out.extend(value.as_deref()),
        }
        out
    }

    /// Mutable direct children of this expression, in evaluation order.
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        let mut out = Vec::new();
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Name(_) => {}
            ExprKind::Attribute { value, .. } => out.push(value.as_mut()),
            ExprKind::BinOp { left, right, .. } => {
                out.push(left.as_mut());
                out.push(right.as_mut());
            }
            ExprKind::UnaryOp { operand, .. } => out.push(operand.as_mut()),
            ExprKind::BoolOp { values, .. } => out.extend(values.iter_mut()),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                out.push(left.as_mut());
                out.extend(comparators.iter_mut());
            }
            ExprKind::Call { func, args } => {
                out.push(func.as_mut());
                out.extend(args.iter_mut());
            }
            ExprKind::Subscript { value, index } => {
                out.push(value.as_mut());
                out.push(index.as_mut());
            }
            ExprKind::List(elts) | ExprKind::Tuple(elts) | ExprKind::Set(elts) => {
                out.extend(elts.iter_mut());
            }
            ExprKind::Dict { keys, values } => {
                for (k, v) in keys.iter_mut().zip(values.iter_mut()) {
                    out.push(k);
                    out.push(v);
                }
            }
            ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
                for generator in generators.iter_mut() {
                    out.push(&mut generator.iter);
                    out.extend(generator.ifs.iter_mut());
                }
                out.push(elt.as_mut());
            }
            ExprKind::Yield(value) => out.extend(value.as_deref_mut()),
        }
        out
    }

    /// Pre-order walk over this expression and all of its descendants.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Pre-order mutable walk over this expression and all of its descendants.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        for child in self.children_mut() {
            child.walk_mut(f);
        }
    }

    /// Returns `true` if any node in this subtree has the given identity.
    #[must_use]
    pub fn contains_id(&self, id: AstId) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= e.id == id);
        found
    }

    /// Names read anywhere in this subtree, excluding names bound by an
    /// enclosing comprehension clause inside the subtree.
    #[must_use]
    pub fn free_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_free_names(self, &mut Vec::new(), &mut out);
        out
    }

    /// Copies this subtree, giving every node a fresh identity.
    ///
    /// Annotations attached to copied nodes are duplicated onto the new ids.
    #[must_use]
    pub fn deep_copy(&self, metadata: &mut Metadata) -> Expr {
        let mut copy = self.clone();
        copy.refresh_ids(metadata);
        copy
    }

    pub(crate) fn refresh_ids(&mut self, metadata: &mut Metadata) {
        self.walk_mut(&mut |e| {
            let fresh = AstId::fresh();
            metadata.copy_annotations(e.id, fresh);
            e.id = fresh;
        });
    }
}

fn collect_free_names(expr: &Expr, bound: &mut Vec<String>, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Name(name) => {
            if !bound.contains(name) && !out.contains(name) {
                out.push(name.clone());
            }
        }
        ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
            let depth = bound.len();
            for generator in generators {
                collect_free_names(&generator.iter, bound, out);
                bound.push(generator.target.clone());
                for cond in &generator.ifs {
                    collect_free_names(cond, bound, out);
                }
            }
            collect_free_names(elt, bound, out);
            bound.truncate(depth);
        }
        _ => {
            for child in expr.children() {
                collect_free_names(child, bound, out);
            }
        }
    }
}

impl Stmt {
    /// Expressions directly owned by this statement, in evaluation order.
    ///
    /// Nested statement blocks are not included, see [`Stmt::blocks`].
    #[must_use]
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Assign { targets, value } => {
                let mut out = vec![value];
                out.extend(targets.iter());
                out
            }
            StmtKind::AugAssign { target, value, .. } => vec![value, target],
            StmtKind::Expr(value) => vec![value],
            StmtKind::Return(value) => value.iter().collect(),
            StmtKind::For { target, iter, .. } => vec![iter, target],
            StmtKind::While { test, .. } | StmtKind::If { test, .. } => vec![test],
            StmtKind::FunctionDef(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Pass => Vec::new(),
        }
    }

    /// Mutable expressions directly owned by this statement.
    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            StmtKind::Assign { targets, value } => {
                let mut out = vec![value];
                out.extend(targets.iter_mut());
                out
            }
            StmtKind::AugAssign { target, value, .. } => vec![value, target],
            StmtKind::Expr(value) => vec![value],
            StmtKind::Return(value) => value.iter_mut().collect(),
            StmtKind::For { target, iter, .. } => vec![iter, target],
            StmtKind::While { test, .. } | StmtKind::If { test, .. } => vec![test],
            StmtKind::FunctionDef(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Pass => Vec::new(),
        }
    }

    /// Nested statement blocks of this statement.
    ///
    /// A function definition's body is included; callers that must stay within
    /// one function scope check for [`StmtKind::FunctionDef`] themselves.
    #[must_use]
    pub fn blocks(&self) -> Vec<&Vec<Stmt>> {
        match &self.kind {
            StmtKind::FunctionDef(def) => vec![&def.body],
            StmtKind::For { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::If { body, orelse, .. } => vec![body, orelse],
            _ => Vec::new(),
        }
    }

    /// Mutable nested statement blocks of this statement.
    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<Stmt>> {
        match &mut self.kind {
            StmtKind::FunctionDef(def) => vec![&mut def.body],
            StmtKind::For { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::If { body, orelse, .. } => vec![body, orelse],
            _ => Vec::new(),
        }
    }

    /// Visits every expression in this statement and in its nested blocks,
    /// without descending into nested function definitions.
    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        if matches!(self.kind, StmtKind::FunctionDef(_)) {
            return;
        }
        for expr in self.exprs() {
            expr.walk(f);
        }
        for block in self.blocks() {
            for stmt in block {
                stmt.walk_exprs(f);
            }
        }
    }

    /// Mutable counterpart of [`Stmt::walk_exprs`].
    pub fn walk_exprs_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        if matches!(self.kind, StmtKind::FunctionDef(_)) {
            return;
        }
        for expr in self.exprs_mut() {
            expr.walk_mut(f);
        }
        for block in self.blocks_mut() {
            for stmt in block.iter_mut() {
                stmt.walk_exprs_mut(f);
            }
        }
    }

    /// Finds the statement with the given identity in this statement or its
    /// nested blocks.
    pub fn find_mut(&mut self, id: AstId) -> Option<&mut Stmt> {
        if self.id == id {
            return Some(self);
        }
        for block in self.blocks_mut() {
            if let Some(found) = find_in_block_mut(block, id) {
                return Some(found);
            }
        }
        None
    }

    /// Copies this statement, giving every node a fresh identity and
    /// duplicating annotations onto the new ids.
    #[must_use]
    pub fn deep_copy(&self, metadata: &mut Metadata) -> Stmt {
        let mut copy = self.clone();
        copy.refresh_ids(metadata);
        copy
    }

    fn refresh_ids(&mut self, metadata: &mut Metadata) {
        let fresh = AstId::fresh();
        metadata.copy_annotations(self.id, fresh);
        self.id = fresh;

        if let StmtKind::FunctionDef(def) = &mut self.kind {
            for param in &mut def.params {
                let fresh = AstId::fresh();
                metadata.copy_annotations(param.id, fresh);
                param.id = fresh;
            }
        }
        for expr in self.exprs_mut() {
            expr.refresh_ids(metadata);
        }
        for block in self.blocks_mut() {
            for stmt in block.iter_mut() {
                stmt.refresh_ids(metadata);
            }
        }
    }
}

/// Finds a statement by identity anywhere in a block, including nested blocks.
pub fn find_in_block_mut(block: &mut [Stmt], id: AstId) -> Option<&mut Stmt> {
    block.iter_mut().find_map(|stmt| stmt.find_mut(id))
}

/// Deep-copies a block of statements, see [`Stmt::deep_copy`].
#[must_use]
pub fn deep_copy_block(block: &[Stmt], metadata: &mut Metadata) -> Vec<Stmt> {
    block.iter().map(|stmt| stmt.deep_copy(metadata)).collect()
}
