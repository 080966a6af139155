//! value.rs
//! Hybrid Scalar/Series values produced by expression evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The atomic unit of data flowing through a parameter expression.
///
/// Series values carry per-time data, e.g. an action attribute holding one
/// threshold per time point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Series(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the scalar, or the single element of a length-1 series.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Series(v) if v.len() == 1 => Some(v[0]),
            Value::Series(_) => None,
        }
    }

    /// This clones data if it is a scalar, which is expected at the boundary.
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Value::Scalar(s) => vec![*s],
            Value::Series(s) => s.clone(),
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(s) => Value::Scalar(f(*s)),
            Value::Series(v) => Value::Series(v.iter().copied().map(f).collect()),
        }
    }

    /// Element-wise combination with scalar broadcasting.
    ///
    /// Returns `None` when both sides are series of different lengths.
    pub fn zip_with(&self, other: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Some(Value::Scalar(f(*a, *b))),
            (Value::Scalar(a), Value::Series(b)) => {
                Some(Value::Series(b.iter().map(|y| f(*a, *y)).collect()))
            }
            (Value::Series(a), Value::Scalar(b)) => {
                Some(Value::Series(a.iter().map(|x| f(*x, *b)).collect()))
            }
            (Value::Series(a), Value::Series(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                Some(Value::Series(a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Scalar(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(if v { 1.0 } else { 0.0 })
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Series(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Series(v) => {
                write!(f, "c(")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, ")")
            }
        }
    }
}
