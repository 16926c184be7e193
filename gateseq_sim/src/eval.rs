//! Run-time arithmetic with the controller's numeric kinds.
//!
//! Integers are 64-bit and overflow is an error. Fixed-point values are
//! rounded to `2^-FIXED_FRAC_BITS` and every fixed-point intermediate must lie
//! in `[-FIXED_RANGE, FIXED_RANGE)`. A literal takes the kind of the operand it
//! meets: integral next to an integer it is an integer, otherwise fixed.
//! Integer times fixed (or divided by) is the controller's mixed multiply and
//! only its result is range-checked.

use gateseq_traits::{BinaryOp, EvalError, Expr, NumKind, UnaryOp};

use crate::error::{Result, SimError};
use crate::{FIXED_FRAC_BITS, FIXED_RANGE};

/// A value held by the simulated controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Fixed(f64),
    /// Literal that has not met a typed operand yet.
    Const(f64),
}

impl Num {
    pub fn value(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Fixed(v) | Num::Const(v) => v,
        }
    }

    fn as_int(self) -> Option<i64> {
        match self {
            Num::Int(i) => Some(i),
            Num::Const(c) if c.fract() == 0.0 && in_i64(c) => Some(c as i64),
            _ => None,
        }
    }
}

/// Initial value of a declared variable.
pub fn initial(kind: NumKind, init: f64, expr: &Expr) -> Result<Num> {
    convert(kind, Num::Const(init), expr)
}

/// Value stored by a variable of `kind`: integers truncate, fixed rounds.
pub fn convert(kind: NumKind, v: Num, expr: &Expr) -> Result<Num> {
    match kind {
        NumKind::Int => match v {
            Num::Int(i) => Ok(Num::Int(i)),
            Num::Fixed(x) | Num::Const(x) => Ok(Num::Int(to_int(x.trunc(), expr)?)),
        },
        NumKind::Fixed => fixed(v.value(), expr),
        NumKind::Bool => Ok(Num::Int(i64::from(v.value() != 0.0))),
    }
}

/// Evaluate `expr` against the variable environment.
pub fn eval(expr: &Expr, env: &[Num]) -> Result<Num> {
    match expr {
        Expr::Lit(v) => Ok(Num::Const(*v)),
        Expr::Int(i) => Ok(Num::Int(*i)),
        Expr::Var(id) => env
            .get(id.index() as usize)
            .copied()
            .ok_or(SimError::Eval(EvalError::Unbound(*id))),
        Expr::Unary { op, arg } => unary(*op, eval(arg, env)?, expr),
        Expr::Binary { op, lhs, rhs } => binary(*op, eval(lhs, env)?, eval(rhs, env)?, expr),
    }
}

fn unary(op: UnaryOp, a: Num, expr: &Expr) -> Result<Num> {
    let overflow = || int_overflow(expr);
    Ok(match (op, a) {
        (UnaryOp::Neg, Num::Int(i)) => Num::Int(i.checked_neg().ok_or_else(overflow)?),
        (UnaryOp::Neg, Num::Fixed(v)) => fixed(-v, expr)?,
        (UnaryOp::Neg, Num::Const(v)) => Num::Const(-v),
        (UnaryOp::Abs, Num::Int(i)) => Num::Int(i.checked_abs().ok_or_else(overflow)?),
        (UnaryOp::Abs, Num::Fixed(v)) => fixed(v.abs(), expr)?,
        (UnaryOp::Abs, Num::Const(v)) => Num::Const(v.abs()),
        (UnaryOp::Ceil, Num::Int(i)) => Num::Int(i),
        (UnaryOp::Ceil, Num::Fixed(v) | Num::Const(v)) => Num::Int(to_int(v.ceil(), expr)?),
        (UnaryOp::Quantize(bits), Num::Int(i)) => {
            let scale = 1i64
                .checked_shl(bits)
                .filter(|s| *s > 0)
                .ok_or_else(overflow)?;
            Num::Int(i.checked_mul(scale).ok_or_else(overflow)?)
        }
        (UnaryOp::Quantize(bits), Num::Fixed(v) | Num::Const(v)) => {
            Num::Int(to_int((v * 2f64.powi(bits as i32)).round(), expr)?)
        }
    })
}

fn binary(op: BinaryOp, a: Num, b: Num, expr: &Expr) -> Result<Num> {
    if let (Num::Const(x), Num::Const(y)) = (a, b) {
        return Ok(Num::Const(real(op, x, y, expr)?));
    }
    let typed_int = matches!(a, Num::Int(_)) || matches!(b, Num::Int(_));
    match (op, a.as_int(), b.as_int()) {
        (BinaryOp::IntDiv, Some(x), Some(y)) => {
            if y == 0 {
                return Err(SimError::Eval(EvalError::DivisionByZero(expr.to_string())));
            }
            return Ok(Num::Int(x.checked_div(y).ok_or_else(|| int_overflow(expr))?));
        }
        (BinaryOp::IntDiv, _, _) => {
            return Err(SimError::KindMismatch {
                expr: expr.to_string(),
                reason: "integer division needs integer operands",
            });
        }
        (_, Some(x), Some(y)) if typed_int => {
            let r = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Max => Some(x.max(y)),
                BinaryOp::Min => Some(x.min(y)),
                BinaryOp::Div | BinaryOp::IntDiv => {
                    return fixed(real(op, x as f64, y as f64, expr)?, expr);
                }
            };
            return Ok(Num::Int(r.ok_or_else(|| int_overflow(expr))?));
        }
        _ => {}
    }
    let mixed_product = matches!(op, BinaryOp::Mul | BinaryOp::Div) && typed_int;
    let (x, y) = if mixed_product {
        (a.value(), b.value())
    } else {
        (fixed_operand(a, expr)?, fixed_operand(b, expr)?)
    };
    fixed(real(op, x, y, expr)?, expr)
}

fn fixed_operand(n: Num, expr: &Expr) -> Result<f64> {
    match n {
        Num::Int(i) => Ok(fixed(i as f64, expr)?.value()),
        Num::Fixed(v) | Num::Const(v) => Ok(v),
    }
}

fn real(op: BinaryOp, x: f64, y: f64, expr: &Expr) -> Result<f64> {
    let zero = || SimError::Eval(EvalError::DivisionByZero(expr.to_string()));
    let v = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(zero());
            }
            x / y
        }
        BinaryOp::IntDiv => {
            if y.trunc() == 0.0 {
                return Err(zero());
            }
            (x.trunc() / y.trunc()).trunc()
        }
        BinaryOp::Max => x.max(y),
        BinaryOp::Min => x.min(y),
    };
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SimError::Eval(EvalError::NonFinite(expr.to_string())))
    }
}

fn fixed(v: f64, expr: &Expr) -> Result<Num> {
    if !(-FIXED_RANGE..FIXED_RANGE).contains(&v) {
        return Err(SimError::FixedRange {
            expr: expr.to_string(),
            value: v,
        });
    }
    let scale = 2f64.powi(FIXED_FRAC_BITS);
    Ok(Num::Fixed((v * scale).round() / scale))
}

fn in_i64(v: f64) -> bool {
    v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64
}

fn to_int(v: f64, expr: &Expr) -> Result<i64> {
    if in_i64(v) {
        Ok(v as i64)
    } else {
        Err(int_overflow(expr))
    }
}

fn int_overflow(expr: &Expr) -> SimError {
    SimError::IntOverflow {
        expr: expr.to_string(),
    }
}
