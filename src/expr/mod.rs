//! Deferred parameter expressions.
//!
//! A node's parameters are stored as syntax trees and evaluated later, during
//! simulation, against the values of earlier nodes. The DAG core never
//! evaluates them itself except for two build-time rewrites:
//!
//! - `Expr::Eager` markers are evaluated in the caller's scope and replaced by
//!   a literal (see [`Expr::resolve_eager`]).
//! - `Expr::Time` and `Expr::Lag` are templated against the node's time point
//!   (see [`Expr::resolve_time`]).

mod eval;
mod value;

pub use eval::{Bindings, EvalError, Scope};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops;

/// Separator joining a generic node name and its time index (`L#2`).
pub const TIME_SEPARATOR: char = '#';

/// Builds the expanded name of a node from its generic name and time.
pub fn expanded_name(generic: &str, time: Option<u32>) -> String {
    match time {
        Some(t) => format!("{}{}{}", generic, TIME_SEPARATOR, t),
        None => generic.to_string(),
    }
}

/// Splits an expanded name into its generic part and time suffix, if any.
pub fn split_expanded_name(name: &str) -> (&str, Option<u32>) {
    match name.rsplit_once(TIME_SEPARATOR) {
        Some((generic, suffix)) => match suffix.parse::<u32>() {
            Ok(t) => (generic, Some(t)),
            Err(_) => (name, None),
        },
        None => (name, None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }
}

/// An unevaluated parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Reference by name: an expanded node name, an action attribute or a
    /// caller-scope variable, resolved at evaluation time.
    Var(String),
    /// The time point of the node owning this expression.
    Time,
    /// The node `name` at time `t + offset`, where `t` is the owning node's time.
    Lag { name: String, offset: i64 },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Call { func: String, args: Vec<Expr> },
    /// Element `index` of a series-valued `target` (zero based).
    Index { target: Box<Expr>, index: Box<Expr> },
    /// Evaluated immediately, in the caller's scope, when the node is declared.
    Eager(Box<Expr>),
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn time() -> Self {
        Expr::Time
    }

    pub fn lag(name: impl Into<String>, offset: i64) -> Self {
        Expr::Lag { name: name.into(), offset }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call { func: func.into(), args }
    }

    pub fn index(self, index: Expr) -> Self {
        Expr::Index { target: Box::new(self), index: Box::new(index) }
    }

    pub fn eager(inner: Expr) -> Self {
        Expr::Eager(Box::new(inner))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn pow(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Pow, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn equals(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::And, self, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Or, self, rhs)
    }

    /// Names referenced through `Var`. Eager markers are skipped since they
    /// bind against the caller's scope, not against nodes.
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Var(name) => {
                names.insert(name.clone());
            }
            Expr::Literal(_) | Expr::Time | Expr::Lag { .. } | Expr::Eager(_) => {}
            Expr::Unary { arg, .. } => arg.collect_references(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(names);
                rhs.collect_references(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(names);
                }
            }
            Expr::Index { target, index } => {
                target.collect_references(names);
                index.collect_references(names);
            }
        }
    }

    /// True if the tree still holds time templates (`Time` or `Lag`).
    pub fn is_time_templated(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::Time | Expr::Lag { .. }) {
                found = true;
            }
        });
        found
    }

    fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Var(_) | Expr::Time | Expr::Lag { .. } => {}
            Expr::Unary { arg, .. } => arg.visit(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Expr::Index { target, index } => {
                target.visit(f);
                index.visit(f);
            }
            Expr::Eager(inner) => inner.visit(f),
        }
    }

    /// Pre-order rewrite. `f` returns `Some(replacement)` to replace a subtree
    /// (its children are not visited) or `None` to descend.
    fn try_rewrite<E>(
        self,
        f: &mut impl FnMut(&Expr) -> Result<Option<Expr>, E>,
    ) -> Result<Expr, E> {
        if let Some(replacement) = f(&self)? {
            return Ok(replacement);
        }
        Ok(match self {
            leaf @ (Expr::Literal(_) | Expr::Var(_) | Expr::Time | Expr::Lag { .. }) => leaf,
            Expr::Unary { op, arg } => Expr::Unary { op, arg: Box::new((*arg).try_rewrite(f)?) },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new((*lhs).try_rewrite(f)?),
                rhs: Box::new((*rhs).try_rewrite(f)?),
            },
            Expr::Call { func, args } => Expr::Call {
                func,
                args: args
                    .into_iter()
                    .map(|a| a.try_rewrite(f))
                    .collect::<Result<Vec<_>, E>>()?,
            },
            Expr::Index { target, index } => Expr::Index {
                target: Box::new((*target).try_rewrite(f)?),
                index: Box::new((*index).try_rewrite(f)?),
            },
            Expr::Eager(inner) => Expr::Eager(Box::new((*inner).try_rewrite(f)?)),
        })
    }

    /// Replaces every `Eager` marker by the literal it evaluates to in `scope`.
    /// Everything else is left deferred.
    pub fn resolve_eager(self, scope: &dyn Bindings) -> Result<Expr, EvalError> {
        self.try_rewrite(&mut |e| match e {
            Expr::Eager(inner) => inner.evaluate(scope).map(|v| Some(Expr::Literal(v))),
            _ => Ok(None),
        })
    }

    /// Substitutes `Time` with `time` and `Lag { name, offset }` with a
    /// reference to `name#(time + offset)`.
    pub fn resolve_time(self, time: Option<u32>) -> Result<Expr, EvalError> {
        self.try_rewrite(&mut |e| match e {
            Expr::Time => match time {
                Some(t) => Ok(Some(Expr::lit(f64::from(t)))),
                None => Err(EvalError::NoTimeAxis("t".to_string())),
            },
            Expr::Lag { name, offset } => {
                let t = time.ok_or_else(|| EvalError::NoTimeAxis(name.clone()))?;
                let target = i64::from(t) + offset;
                let target = u32::try_from(target).map_err(|_| EvalError::TimeOutOfRange {
                    name: name.clone(),
                    time: target,
                })?;
                Ok(Some(Expr::Var(expanded_name(name, Some(target)))))
            }
            _ => Ok(None),
        })
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::lit(v)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::var(name)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Unary { op: UnaryOp::Neg, arg: Box::new(self) }
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Unary { op: UnaryOp::Not, arg: Box::new(self) }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Time => write!(f, "t"),
            Expr::Lag { name, offset } if *offset == 0 => write!(f, "{}[t]", name),
            Expr::Lag { name, offset } if *offset > 0 => write!(f, "{}[t+{}]", name, offset),
            Expr::Lag { name, offset } => write!(f, "{}[t{}]", name, offset),
            Expr::Unary { op: UnaryOp::Neg, arg } => write!(f, "-{}", Paren(arg)),
            Expr::Unary { op: UnaryOp::Not, arg } => write!(f, "!{}", Paren(arg)),
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", Paren(lhs), op.symbol(), Paren(rhs))
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", func)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Index { target, index } => write!(f, "{}[{}]", Paren(target), index),
            Expr::Eager(inner) => write!(f, ".({})", inner),
        }
    }
}

/// Parenthesizes compound operands when rendering.
struct Paren<'a>(&'a Expr);

impl fmt::Display for Paren<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            e @ (Expr::Binary { .. } | Expr::Unary { .. }) => write!(f, "({})", e),
            e => write!(f, "{}", e),
        }
    }
}
