//! Expression nodes.

use serde::{Deserialize, Serialize};

use crate::ast::AstId;

/// Name of the builtin namespace module-qualified builtins resolve through,
/// as in `__builtin__.pow2(x)`.
pub const BUILTIN_MODULE: &str = "__builtin__";

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (true division)
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
}

impl BinOp {
    /// Source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
    /// `~x`
    Invert,
}

impl UnaryOp {
    /// Source spelling of the operator, including a trailing space for `not`.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not ",
            UnaryOp::Invert => "~",
        }
    }
}

/// Short-circuiting boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl BoolOp {
    /// Source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

/// Comparison operators. Comparisons chain as in `a < b <= c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

impl CmpOp {
    /// Source spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/// A scalar literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// Complex literal, `re + im*j`
    Complex {
        /// Real part
        re: f64,
        /// Imaginary part
        im: f64,
    },
    /// `True` / `False`
    Bool(bool),
    /// String literal
    Str(String),
}

/// One `for target in iter if cond...` clause of a comprehension.
///
/// The target is scoped to the comprehension and never visible to the
/// enclosing function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    /// Name bound on every iteration
    pub target: String,
    /// Iterable, evaluated in the enclosing scope for the first clause
    pub iter: Expr,
    /// Filter conditions
    pub ifs: Vec<Expr>,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Identity of this node
    pub id: AstId,
    /// What this node is
    pub kind: ExprKind,
}

/// The expression vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A scalar literal
    Literal(Literal),
    /// A variable reference, load or store depending on position
    Name(String),
    /// `value.attr`
    Attribute {
        /// Object or module the attribute is read from
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },
    /// `left op right`
    BinOp {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: BinOp,
        /// Right operand
        right: Box<Expr>,
    },
    /// `op operand`
    UnaryOp {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `a and b and c`
    BoolOp {
        /// Operator
        op: BoolOp,
        /// Operands, at least two
        values: Vec<Expr>,
    },
    /// `left op0 c0 op1 c1 ...`
    Compare {
        /// Leftmost operand
        left: Box<Expr>,
        /// Operators, one per comparator
        ops: Vec<CmpOp>,
        /// Right-hand operands
        comparators: Vec<Expr>,
    },
    /// `func(args...)`
    Call {
        /// Callee
        func: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
    },
    /// `value[index]`
    Subscript {
        /// Container
        value: Box<Expr>,
        /// Index or key
        index: Box<Expr>,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `{a, b}`
    Set(Vec<Expr>),
    /// `{k: v}`
    Dict {
        /// Keys
        keys: Vec<Expr>,
        /// Values, same length as `keys`
        values: Vec<Expr>,
    },
    /// `[elt for ...]`
    ListComp {
        /// Element expression
        elt: Box<Expr>,
        /// Clauses, outermost first
        generators: Vec<Comprehension>,
    },
    /// `(elt for ...)`
    GeneratorExp {
        /// Element expression
        elt: Box<Expr>,
        /// Clauses, outermost first
        generators: Vec<Comprehension>,
    },
    /// `yield value`
    Yield(Option<Box<Expr>>),
}

impl Expr {
    /// Creates an expression with a fresh identity.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: AstId::fresh(),
            kind,
        }
    }

    /// Integer literal.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)))
    }

    /// Float literal.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(value)))
    }

    /// Complex literal.
    #[must_use]
    pub fn complex(re: f64, im: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Complex { re, im }))
    }

    /// Boolean literal.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)))
    }

    /// String literal.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(Literal::Str(value.into())))
    }

    /// Variable reference.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Name(name.into()))
    }

    /// `value.attr`
    #[must_use]
    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Self::new(ExprKind::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        })
    }

    /// `__builtin__.name`
    #[must_use]
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::attribute(Self::name(BUILTIN_MODULE), name)
    }

    /// `left op right`
    #[must_use]
    pub fn binop(left: Expr, op: BinOp, right: Expr) -> Self {
        Self::new(ExprKind::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// `op operand`
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    /// `values[0] op values[1] ...`
    #[must_use]
    pub fn boolop(op: BoolOp, values: Vec<Expr>) -> Self {
        Self::new(ExprKind::BoolOp { op, values })
    }

    /// Single comparison `left op right`.
    #[must_use]
    pub fn compare(left: Expr, op: CmpOp, right: Expr) -> Self {
        Self::new(ExprKind::Compare {
            left: Box::new(left),
            ops: vec![op],
            comparators: vec![right],
        })
    }

    /// `func(args...)`
    #[must_use]
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            func: Box::new(func),
            args,
        })
    }

    /// `name(args...)` for a plain function name.
    #[must_use]
    pub fn call_named(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call(Self::name(name), args)
    }

    /// `value[index]`
    #[must_use]
    pub fn subscript(value: Expr, index: Expr) -> Self {
        Self::new(ExprKind::Subscript {
            value: Box::new(value),
            index: Box::new(index),
        })
    }

    /// List display.
    #[must_use]
    pub fn list(elts: Vec<Expr>) -> Self {
        Self::new(ExprKind::List(elts))
    }

    /// Tuple display.
    #[must_use]
    pub fn tuple(elts: Vec<Expr>) -> Self {
        Self::new(ExprKind::Tuple(elts))
    }

    /// Set display.
    #[must_use]
    pub fn set(elts: Vec<Expr>) -> Self {
        Self::new(ExprKind::Set(elts))
    }

    /// Dict display from key/value pairs.
    #[must_use]
    pub fn dict(pairs: Vec<(Expr, Expr)>) -> Self {
        let (keys, values) = pairs.into_iter().unzip();
        Self::new(ExprKind::Dict { keys, values })
    }

    /// `[elt for target in iter]` with a single clause and no filter.
    #[must_use]
    pub fn list_comp(elt: Expr, target: impl Into<String>, iter: Expr) -> Self {
        Self::new(ExprKind::ListComp {
            elt: Box::new(elt),
            generators: vec![Comprehension {
                target: target.into(),
                iter,
                ifs: Vec::new(),
            }],
        })
    }

    /// `(elt for target in iter)` with a single clause and no filter.
    #[must_use]
    pub fn generator(elt: Expr, target: impl Into<String>, iter: Expr) -> Self {
        Self::new(ExprKind::GeneratorExp {
            elt: Box::new(elt),
            generators: vec![Comprehension {
                target: target.into(),
                iter,
                ifs: Vec::new(),
            }],
        })
    }

    /// `yield value`
    #[must_use]
    pub fn yield_(value: Option<Expr>) -> Self {
        Self::new(ExprKind::Yield(value.map(Box::new)))
    }

    /// Returns the variable name if this is a [`ExprKind::Name`].
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` for a scalar literal node.
    #[must_use]
    pub fn is_scalar_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    /// Returns `true` if this node is already in folded form: a scalar literal,
    /// or a container display all of whose elements are in folded form.
    ///
    /// Folded nodes are never constant-expression candidates, which is what
    /// makes repeated folding a no-op.
    #[must_use]
    pub fn is_literal_value(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) => true,
            ExprKind::List(elts) | ExprKind::Tuple(elts) | ExprKind::Set(elts) => {
                elts.iter().all(Expr::is_literal_value)
            }
            ExprKind::Dict { keys, values } => keys
                .iter()
                .chain(values.iter())
                .all(Expr::is_literal_value),
            _ => false,
        }
    }

    /// Returns `true` if this is a scalar literal, or a tuple of scalar literals.
    ///
    /// These are the immutable literal values that may safely be duplicated
    /// into several use sites.
    #[must_use]
    pub fn is_immutable_literal(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Tuple(elts) => elts.iter().all(Expr::is_scalar_literal),
            _ => false,
        }
    }

    /// Returns `true` if this is a `yield`.
    #[must_use]
    pub fn is_yield(&self) -> bool {
        matches!(self.kind, ExprKind::Yield(_))
    }
}
