//! The sandboxed tree-walking evaluator.

use std::mem;

use rustc_hash::FxHashMap;

use crate::{
    ast::{
        BoolOp, Comprehension, Expr, ExprKind, FunctionDef, Literal, Stmt, StmtKind,
        BUILTIN_MODULE,
    },
    eval::{ops, Entry, Environment, EvalError, EvalLimits, EvalResult, Value},
};

/// Local variables of the running function, or the staged globals when
/// replaying the module's top level.
type Frame = FxHashMap<String, Value>;

/// How a statement finished.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Evaluates expressions against an [`Environment`].
///
/// Each evaluator carries its own step budget, so create a fresh one for
/// every independent evaluation.
pub struct Evaluator<'env> {
    env: &'env Environment,
    limits: EvalLimits,
    fuel: u64,
    depth: usize,
    /// Comprehension targets in scope, innermost last
    bindings: Vec<(String, Value)>,
}

impl<'env> Evaluator<'env> {
    /// Creates an evaluator with a full step budget.
    #[must_use]
    pub fn new(env: &'env Environment, limits: EvalLimits) -> Self {
        Evaluator {
            env,
            limits,
            fuel: limits.fuel,
            depth: 0,
            bindings: Vec::new(),
        }
    }

    /// Evaluates a closed expression.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] if the expression cannot be evaluated inside
    /// the sandbox.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.eval_expr(expr, &Frame::default())
    }

    /// Executes one top-level statement, binding globals into `globals`.
    pub(crate) fn exec_top_level(&mut self, stmt: &Stmt, globals: &mut Frame) -> EvalResult<()> {
        match self.exec_stmt(stmt, globals)? {
            Flow::Normal => Ok(()),
            _ => Err(EvalError::Unsupported(
                "control transfer outside a function".to_string(),
            )),
        }
    }

    fn step(&mut self) -> EvalResult<()> {
        if self.fuel == 0 {
            return Err(EvalError::FuelExhausted);
        }
        self.fuel -= 1;
        Ok(())
    }

    /// Looks a variable up through comprehension targets, the frame and the
    /// prepared globals.
    fn lookup<'a>(&'a self, name: &str, frame: &'a Frame) -> Option<&'a Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, v)| v)
            .or_else(|| frame.get(name))
            .or_else(|| self.env.global(name))
    }

    fn eval_expr(&mut self, expr: &Expr, frame: &Frame) -> EvalResult<Value> {
        self.step()?;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Int(v) => Value::Int(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Complex { re, im } => Value::Complex { re: *re, im: *im },
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            ExprKind::Name(name) => self
                .lookup(name, frame)
                .cloned()
                .ok_or_else(|| EvalError::Name(name.clone())),
            ExprKind::Attribute { value, attr } => self.eval_attribute(value, attr, frame),
            ExprKind::BinOp { left, op, right } => {
                let l = self.eval_expr(left, frame)?;
                let r = self.eval_expr(right, frame)?;
                ops::binary(*op, &l, &r, &self.limits)
            }
            ExprKind::UnaryOp { op, operand } => {
                let v = self.eval_expr(operand, frame)?;
                ops::unary(*op, &v)
            }
            ExprKind::BoolOp { op, values } => {
                let mut last = Value::None;
                for value in values {
                    last = self.eval_expr(value, frame)?;
                    let decided = match op {
                        BoolOp::And => !last.is_truthy(),
                        BoolOp::Or => last.is_truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            ExprKind::Compare {
                left,
                ops: cmp_ops,
                comparators,
            } => {
                let mut lhs = self.eval_expr(left, frame)?;
                for (op, comparator) in cmp_ops.iter().zip(comparators) {
                    let rhs = self.eval_expr(comparator, frame)?;
                    if !ops::compare(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Call { func, args } => self.eval_call(func, args, frame),
            ExprKind::Subscript { value, index } => {
                let container = self.eval_expr(value, frame)?;
                let index = self.eval_expr(index, frame)?;
                subscript(&container, &index)
            }
            ExprKind::List(elts) => Ok(Value::List(self.eval_all(elts, frame)?)),
            ExprKind::Tuple(elts) => Ok(Value::Tuple(self.eval_all(elts, frame)?)),
            ExprKind::Set(elts) => {
                let items = self.eval_all(elts, frame)?;
                Value::set_from(items, &self.limits)
            }
            ExprKind::Dict { keys, values } => {
                let mut pairs = Vec::with_capacity(keys.len());
                for (k, v) in keys.iter().zip(values) {
                    let key = self.eval_expr(k, frame)?;
                    let value = self.eval_expr(v, frame)?;
                    pairs.push((key, value));
                }
                Value::dict_from(pairs, &self.limits)
            }
            ExprKind::ListComp { elt, generators } => {
                let mut out = Vec::new();
                self.comprehension(elt, generators, frame, &mut out)?;
                Ok(Value::List(out))
            }
            ExprKind::GeneratorExp { elt, generators } => {
                let mut out = Vec::new();
                self.comprehension(elt, generators, frame, &mut out)?;
                Ok(Value::Iter(out))
            }
            ExprKind::Yield(_) => Err(EvalError::Unsupported("yield".to_string())),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], frame: &Frame) -> EvalResult<Vec<Value>> {
        self.limits.check_items(exprs.len())?;
        exprs.iter().map(|e| self.eval_expr(e, frame)).collect()
    }

    fn is_bound(&self, name: &str, frame: &Frame) -> bool {
        self.lookup(name, frame).is_some()
    }

    fn eval_attribute(&mut self, value: &Expr, attr: &str, frame: &Frame) -> EvalResult<Value> {
        let Some(module) = value.as_name() else {
            return Err(EvalError::Unsupported(format!("attribute `{attr}` of a value")));
        };
        if self.is_bound(module, frame) {
            return Err(EvalError::Unsupported(format!("attribute `{module}.{attr}`")));
        }
        let table = self.env.table();
        if !table.has_module(module) {
            return Err(EvalError::UnknownModule(module.to_string()));
        }
        match table.lookup(module, attr) {
            Some(Entry::Constant(v)) => Ok(v.clone()),
            Some(Entry::Function(_)) => Err(EvalError::Unsupported(format!(
                "function object `{module}.{attr}`"
            ))),
            None => Err(EvalError::Name(format!("{module}.{attr}"))),
        }
    }

    fn eval_call(&mut self, func: &Expr, args: &[Expr], frame: &Frame) -> EvalResult<Value> {
        let env = self.env;
        let table = env.table();

        let builtin = match &func.kind {
            ExprKind::Name(name) => {
                if self.is_bound(name, frame) {
                    return Err(EvalError::Unsupported(format!("call of value `{name}`")));
                }
                if let Some(def) = env.function(name) {
                    let values = self.eval_all(args, frame)?;
                    return self.call_user(def, values);
                }
                match table.lookup(BUILTIN_MODULE, name) {
                    Some(Entry::Function(f)) => *f,
                    _ => return Err(EvalError::Name(name.clone())),
                }
            }
            ExprKind::Attribute { value, attr } => {
                let Some(module) = value.as_name() else {
                    return Err(EvalError::Unsupported(format!("method call `{attr}`")));
                };
                if self.is_bound(module, frame) {
                    return Err(EvalError::Unsupported(format!(
                        "method call `{module}.{attr}`"
                    )));
                }
                if !table.has_module(module) {
                    return Err(EvalError::UnknownModule(module.to_string()));
                }
                match table.lookup(module, attr) {
                    Some(Entry::Function(f)) => *f,
                    Some(Entry::Constant(_)) => {
                        return Err(EvalError::Type(format!("`{module}.{attr}` is not callable")))
                    }
                    None => return Err(EvalError::Name(format!("{module}.{attr}"))),
                }
            }
            _ => return Err(EvalError::Unsupported("dynamic call target".to_string())),
        };

        let values = self.eval_all(args, frame)?;
        builtin(&values, &self.limits)
    }

    fn call_user(&mut self, def: &FunctionDef, args: Vec<Value>) -> EvalResult<Value> {
        if args.len() != def.params.len() {
            return Err(EvalError::Type(format!(
                "{}() takes {} arguments ({} given)",
                def.name,
                def.params.len(),
                args.len()
            )));
        }
        if self.depth >= self.limits.max_depth {
            return Err(EvalError::RecursionLimit);
        }

        let mut locals: Frame = def
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();

        let saved = mem::take(&mut self.bindings);
        self.depth += 1;
        let outcome = self.exec_block(&def.body, &mut locals);
        self.depth -= 1;
        self.bindings = saved;

        match outcome? {
            Flow::Normal => Ok(Value::None),
            Flow::Return(v) => Ok(v),
            Flow::Break | Flow::Continue => Err(EvalError::Unsupported(
                "loop control outside a loop".to_string(),
            )),
        }
    }

    fn comprehension(
        &mut self,
        elt: &Expr,
        generators: &[Comprehension],
        frame: &Frame,
        out: &mut Vec<Value>,
    ) -> EvalResult<()> {
        let Some((first, rest)) = generators.split_first() else {
            let value = self.eval_expr(elt, frame)?;
            out.push(value);
            return self.limits.check_items(out.len());
        };

        let items = self.eval_expr(&first.iter, frame)?.items()?;
        for item in items {
            self.bindings.push((first.target.clone(), item));
            let outcome = self.comprehension_step(first, rest, elt, frame, out);
            self.bindings.pop();
            outcome?;
        }
        Ok(())
    }

    fn comprehension_step(
        &mut self,
        clause: &Comprehension,
        rest: &[Comprehension],
        elt: &Expr,
        frame: &Frame,
        out: &mut Vec<Value>,
    ) -> EvalResult<()> {
        for cond in &clause.ifs {
            if !self.eval_expr(cond, frame)?.is_truthy() {
                return Ok(());
            }
        }
        self.comprehension(elt, rest, frame, out)
    }

    fn exec_block(&mut self, block: &[Stmt], frame: &mut Frame) -> EvalResult<Flow> {
        for stmt in block {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn store(target: &Expr, value: Value, frame: &mut Frame) -> EvalResult<()> {
        match target.as_name() {
            Some(name) => {
                frame.insert(name.to_string(), value);
                Ok(())
            }
            None => Err(EvalError::Unsupported(
                "store through a subscript or attribute".to_string(),
            )),
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> EvalResult<Flow> {
        self.step()?;
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value, frame)?;
                for target in targets {
                    Self::store(target, value.clone(), frame)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::AugAssign { target, op, value } => {
                let current = self.eval_expr(target, frame)?;
                let rhs = self.eval_expr(value, frame)?;
                let updated = ops::binary(*op, &current, &rhs, &self.limits)?;
                Self::store(target, updated, frame)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expr(value) => {
                self.eval_expr(value, frame)?;
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(v) => self.eval_expr(v, frame)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If { test, body, orelse } => {
                if self.eval_expr(test, frame)?.is_truthy() {
                    self.exec_block(body, frame)
                } else {
                    self.exec_block(orelse, frame)
                }
            }
            StmtKind::While { test, body, orelse } => {
                while self.eval_expr(test, frame)?.is_truthy() {
                    match self.exec_block(body, frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                self.exec_block(orelse, frame)
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let items = self.eval_expr(iter, frame)?.items()?;
                for item in items {
                    Self::store(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                self.exec_block(orelse, frame)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Pass => Ok(Flow::Normal),
            StmtKind::FunctionDef(def) => Err(EvalError::Unsupported(format!(
                "nested function `{}`",
                def.name
            ))),
        }
    }
}

fn subscript(container: &Value, index: &Value) -> EvalResult<Value> {
    fn position(len: usize, index: &Value) -> EvalResult<usize> {
        let i = index.as_int().ok_or_else(|| {
            EvalError::Type(format!(
                "indices must be integers, not '{}'",
                index.kind_name()
            ))
        })?;
        let len = i64::try_from(len).map_err(|_| EvalError::Overflow)?;
        let resolved = if i < 0 { i + len } else { i };
        if (0..len).contains(&resolved) {
            usize::try_from(resolved).map_err(|_| EvalError::Index)
        } else {
            Err(EvalError::Index)
        }
    }

    match container {
        Value::List(items) | Value::Tuple(items) => {
            Ok(items[position(items.len(), index)?].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[position(chars.len(), index)?].to_string()))
        }
        Value::Dict(pairs) => pairs
            .iter()
            .find(|(k, _)| k.py_eq(index))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| EvalError::Key(index.repr())),
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        ast::{BinOp, CmpOp, Module},
        eval::ModuleTable,
    };

    fn env_for(module: &Module) -> Environment {
        Environment::prepare(
            module,
            Arc::new(ModuleTable::standard()),
            EvalLimits::default(),
        )
    }

    fn eval(expr: &Expr) -> EvalResult<Value> {
        let env = env_for(&Module::default());
        Evaluator::new(&env, EvalLimits::default()).eval(expr)
    }

    #[test]
    fn test_arithmetic_and_builtins() {
        let e = Expr::binop(Expr::int(1), BinOp::Add, Expr::int(3));
        assert_eq!(eval(&e), Ok(Value::Int(4)));

        let e = Expr::call_named("len", vec![Expr::str("abc")]);
        assert_eq!(eval(&e), Ok(Value::Int(3)));

        let e = Expr::call(Expr::builtin("sum"), vec![Expr::list(vec![Expr::int(1), Expr::int(2)])]);
        assert_eq!(eval(&e), Ok(Value::Int(3)));

        let e = Expr::attribute(Expr::name("math"), "pi");
        assert_eq!(eval(&e), Ok(Value::Float(std::f64::consts::PI)));
    }

    #[test]
    fn test_sandbox_rejections() {
        let print = Expr::call_named("print", vec![Expr::int(1)]);
        assert_eq!(eval(&print), Err(EvalError::Name("print".to_string())));

        let unknown = Expr::call(Expr::attribute(Expr::name("os"), "getcwd"), vec![]);
        assert_eq!(eval(&unknown), Err(EvalError::UnknownModule("os".to_string())));

        let free = Expr::name("x");
        assert_eq!(eval(&free), Err(EvalError::Name("x".to_string())));

        assert!(matches!(
            eval(&Expr::yield_(None)),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn test_comprehensions() {
        // [x * x for x in range(4) if x != 2]
        let e = Expr::new(ExprKind::ListComp {
            elt: Box::new(Expr::binop(Expr::name("x"), BinOp::Mul, Expr::name("x"))),
            generators: vec![Comprehension {
                target: "x".to_string(),
                iter: Expr::call_named("range", vec![Expr::int(4)]),
                ifs: vec![Expr::compare(Expr::name("x"), CmpOp::NotEq, Expr::int(2))],
            }],
        });
        assert_eq!(
            eval(&e),
            Ok(Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(9)]))
        );

        let gen = Expr::generator(Expr::name("y"), "y", Expr::list(vec![Expr::int(5)]));
        assert_eq!(eval(&gen), Ok(Value::Iter(vec![Value::Int(5)])));
    }

    #[test]
    fn test_short_circuit_and_chains() {
        // 0 and (1 // 0) short-circuits
        let e = Expr::boolop(
            BoolOp::And,
            vec![
                Expr::int(0),
                Expr::binop(Expr::int(1), BinOp::FloorDiv, Expr::int(0)),
            ],
        );
        assert_eq!(eval(&e), Ok(Value::Int(0)));

        let chain = Expr::new(ExprKind::Compare {
            left: Box::new(Expr::int(1)),
            ops: vec![CmpOp::Lt, CmpOp::Lt],
            comparators: vec![Expr::int(2), Expr::int(2)],
        });
        assert_eq!(eval(&chain), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_user_functions() {
        // def fact(n):
        //     if n <= 1: return 1
        //     return n * fact(n - 1)
        let module = Module::new(vec![Stmt::function_def(
            "fact",
            &["n"],
            vec![
                Stmt::if_else(
                    Expr::compare(Expr::name("n"), CmpOp::LtE, Expr::int(1)),
                    vec![Stmt::ret(Some(Expr::int(1)))],
                    vec![],
                ),
                Stmt::ret(Some(Expr::binop(
                    Expr::name("n"),
                    BinOp::Mul,
                    Expr::call_named(
                        "fact",
                        vec![Expr::binop(Expr::name("n"), BinOp::Sub, Expr::int(1))],
                    ),
                ))),
            ],
        )]);
        let env = env_for(&module);

        let call = Expr::call_named("fact", vec![Expr::int(5)]);
        assert_eq!(
            Evaluator::new(&env, EvalLimits::default()).eval(&call),
            Ok(Value::Int(120))
        );

        let deep = Expr::call_named("fact", vec![Expr::int(500)]);
        assert_eq!(
            Evaluator::new(&env, EvalLimits::default()).eval(&deep),
            Err(EvalError::RecursionLimit)
        );
    }

    #[test]
    fn test_fuel_budget() {
        // def spin():
        //     while True: pass
        let module = Module::new(vec![Stmt::function_def(
            "spin",
            &[],
            vec![Stmt::while_loop(Expr::bool(true), vec![Stmt::pass()])],
        )]);
        let env = env_for(&module);
        let limits = EvalLimits {
            fuel: 1_000,
            ..EvalLimits::default()
        };
        let call = Expr::call_named("spin", vec![]);
        assert_eq!(
            Evaluator::new(&env, limits).eval(&call),
            Err(EvalError::FuelExhausted)
        );
    }

    #[test]
    fn test_subscripts() {
        let e = Expr::subscript(
            Expr::tuple(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
            Expr::int(-1),
        );
        assert_eq!(eval(&e), Ok(Value::Int(3)));

        let e = Expr::subscript(Expr::list(vec![]), Expr::int(0));
        assert_eq!(eval(&e), Err(EvalError::Index));

        let e = Expr::subscript(
            Expr::dict(vec![(Expr::str("k"), Expr::int(7))]),
            Expr::str("k"),
        );
        assert_eq!(eval(&e), Ok(Value::Int(7)));
    }
}
