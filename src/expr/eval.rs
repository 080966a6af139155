//! Evaluation of deferred expressions against caller-supplied bindings.

use super::{BinaryOp, Expr, UnaryOp, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{func}' expects {expected} argument(s), got {actual}")]
    Arity { func: String, expected: usize, actual: usize },
    #[error("series lengths differ in '{0}'")]
    LengthMismatch(String),
    #[error("expected a scalar in '{0}'")]
    NotScalar(String),
    #[error("index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("'{0}' needs a time axis but the node has none")]
    NoTimeAxis(String),
    #[error("reference to '{name}' at time {time} is out of range")]
    TimeOutOfRange { name: String, time: i64 },
    #[error("time template '{0}' was never resolved")]
    Unresolved(String),
}

/// Name -> value lookup used during evaluation.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Bindings for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Bindings for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Empty bindings, for declarations without eager markers.
impl Bindings for () {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Layered bindings; the first layer that knows a name wins.
///
/// Used to put action attributes in front of simulated node values.
#[derive(Default)]
pub struct Scope<'a> {
    layers: Vec<&'a dyn Bindings>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, layer: &'a dyn Bindings) -> Self {
        self.layers.push(layer);
        self
    }
}

impl Bindings for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.layers.iter().find_map(|layer| layer.lookup(name))
    }
}

fn truthy(x: f64) -> bool {
    x != 0.0 && !x.is_nan()
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn plogis(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Expr {
    /// Evaluates the expression. Time templates must have been resolved.
    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => bindings
                .lookup(name)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            Expr::Time => Err(EvalError::Unresolved("t".to_string())),
            Expr::Lag { .. } => Err(EvalError::Unresolved(self.to_string())),
            Expr::Unary { op, arg } => {
                let v = arg.evaluate(bindings)?;
                Ok(match op {
                    UnaryOp::Neg => v.map(|x| -x),
                    UnaryOp::Not => v.map(|x| flag(!truthy(x))),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.evaluate(bindings)?;
                let b = rhs.evaluate(bindings)?;
                let f: fn(f64, f64) -> f64 = match op {
                    BinaryOp::Add => |x, y| x + y,
                    BinaryOp::Sub => |x, y| x - y,
                    BinaryOp::Mul => |x, y| x * y,
                    BinaryOp::Div => |x, y| x / y,
                    BinaryOp::Pow => f64::powf,
                    BinaryOp::Lt => |x, y| flag(x < y),
                    BinaryOp::Le => |x, y| flag(x <= y),
                    BinaryOp::Gt => |x, y| flag(x > y),
                    BinaryOp::Ge => |x, y| flag(x >= y),
                    BinaryOp::Eq => |x, y| flag(x == y),
                    BinaryOp::Ne => |x, y| flag(x != y),
                    BinaryOp::And => |x, y| flag(truthy(x) && truthy(y)),
                    BinaryOp::Or => |x, y| flag(truthy(x) || truthy(y)),
                };
                a.zip_with(&b, f)
                    .ok_or_else(|| EvalError::LengthMismatch(self.to_string()))
            }
            Expr::Call { func, args } => self.evaluate_call(func, args, bindings),
            Expr::Index { target, index } => {
                let series = target.evaluate(bindings)?;
                let idx = index
                    .evaluate(bindings)?
                    .as_scalar()
                    .ok_or_else(|| EvalError::NotScalar(index.to_string()))?;
                let values = series.to_vec();
                let i = idx as i64;
                usize::try_from(i)
                    .ok()
                    .and_then(|u| values.get(u).copied())
                    .map(Value::Scalar)
                    .ok_or(EvalError::IndexOutOfRange { index: i, len: values.len() })
            }
            Expr::Eager(inner) => inner.evaluate(bindings),
        }
    }

    fn evaluate_call(
        &self,
        func: &str,
        args: &[Expr],
        bindings: &dyn Bindings,
    ) -> Result<Value, EvalError> {
        let values = args
            .iter()
            .map(|a| a.evaluate(bindings))
            .collect::<Result<Vec<_>, _>>()?;

        let arity = |expected: usize| -> Result<(), EvalError> {
            if values.len() == expected {
                Ok(())
            } else {
                Err(EvalError::Arity { func: func.to_string(), expected, actual: values.len() })
            }
        };

        match func {
            "exp" => arity(1).map(|_| values[0].map(f64::exp)),
            "log" => arity(1).map(|_| values[0].map(f64::ln)),
            "sqrt" => arity(1).map(|_| values[0].map(f64::sqrt)),
            "abs" => arity(1).map(|_| values[0].map(f64::abs)),
            "plogis" => arity(1).map(|_| values[0].map(plogis)),
            "ifelse" => {
                arity(3)?;
                let (cond, yes, no) = (values[0].to_vec(), values[1].to_vec(), values[2].to_vec());
                let n = cond.len().max(yes.len()).max(no.len());
                let at = |v: &[f64], i: usize| -> Result<f64, EvalError> {
                    match v.len() {
                        1 => Ok(v[0]),
                        len if len == n => Ok(v[i]),
                        _ => Err(EvalError::LengthMismatch(self.to_string())),
                    }
                };
                let picked = (0..n)
                    .map(|i| if truthy(at(&cond, i)?) { at(&yes, i) } else { at(&no, i) })
                    .collect::<Result<Vec<_>, _>>()?;
                if values.iter().all(|v| matches!(v, Value::Scalar(_))) {
                    Ok(Value::Scalar(picked[0]))
                } else {
                    Ok(Value::Series(picked))
                }
            }
            "min" | "max" => {
                let all: Vec<f64> = values.iter().flat_map(Value::to_vec).collect();
                let folded = if func == "min" {
                    all.into_iter().fold(f64::INFINITY, f64::min)
                } else {
                    all.into_iter().fold(f64::NEG_INFINITY, f64::max)
                };
                Ok(Value::Scalar(folded))
            }
            "c" => Ok(Value::Series(values.iter().flat_map(Value::to_vec).collect())),
            other => Err(EvalError::UnknownFunction(other.to_string())),
        }
    }
}
