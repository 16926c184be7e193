//! Compile-time-known or run-time-only numbers.
//!
//! Arithmetic between two [`Value::Known`] operands folds locally. As soon as
//! one operand is [`Value::Deferred`], the result is an [`Expr`] tree that the
//! runtime evaluates when the program executes. There is no way back: a
//! deferred value never turns into a number on the host.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use gateseq_traits::{Expr, VarId};

use crate::error::{Result, SequenceError};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Known(f64),
    Deferred(Expr),
}

impl Value {
    #[inline]
    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }

    /// The number behind a compile-time value.
    pub fn known(&self) -> Result<f64> {
        match self {
            Value::Known(v) => Ok(*v),
            Value::Deferred(e) => Err(eyre::Report::new(
                SequenceError::NotAvailableUntilRuntime(e.to_string()),
            )),
        }
    }

    #[inline]
    pub fn as_known(&self) -> Option<f64> {
        match self {
            Value::Known(v) => Some(*v),
            Value::Deferred(_) => None,
        }
    }

    /// True only for a compile-time zero.
    #[inline]
    pub fn is_known_zero(&self) -> bool {
        matches!(self, Value::Known(v) if *v == 0.0)
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Known(v) => Expr::lit(*v),
            Value::Deferred(e) => e.clone(),
        }
    }

    pub fn into_expr(self) -> Expr {
        match self {
            Value::Known(v) => Expr::lit(v),
            Value::Deferred(e) => e,
        }
    }

    pub fn max(self, other: Value) -> Value {
        match (self, other) {
            (Value::Known(a), Value::Known(b)) => Value::Known(a.max(b)),
            (a, b) => Value::Deferred(a.into_expr().max(b.into_expr())),
        }
    }
}

macro_rules! impl_value_op {
    ($trait:ident, $function:ident) => {
        impl $trait for Value {
            type Output = Value;
            fn $function(self, rhs: Value) -> Value {
                match (self, rhs) {
                    (Value::Known(a), Value::Known(b)) => Value::Known($trait::$function(a, b)),
                    (a, b) => Value::Deferred($trait::$function(a.into_expr(), b.into_expr())),
                }
            }
        }

        impl $trait<f64> for Value {
            type Output = Value;
            fn $function(self, rhs: f64) -> Value {
                $trait::$function(self, Value::Known(rhs))
            }
        }
    };
}

impl_value_op!(Add, add);
impl_value_op!(Sub, sub);
impl_value_op!(Mul, mul);
impl_value_op!(Div, div);

impl Neg for Value {
    type Output = Value;
    fn neg(self) -> Value {
        match self {
            Value::Known(v) => Value::Known(-v),
            Value::Deferred(e) => Value::Deferred(-e),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Known(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Known(v as f64)
    }
}

impl From<VarId> for Value {
    fn from(v: VarId) -> Self {
        Value::Deferred(Expr::var(v))
    }
}

impl From<Expr> for Value {
    fn from(e: Expr) -> Self {
        match e {
            Expr::Lit(v) => Value::Known(v),
            Expr::Int(i) => Value::Known(i as f64),
            other => Value::Deferred(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Known(v) => write!(f, "{v}"),
            Value::Deferred(e) => write!(f, "<{e}>"),
        }
    }
}
