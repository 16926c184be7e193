//! Opaque run-time handles and the expression tree handed to the runtime.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::Serialize;
use thiserror::Error;

/// Handle to a variable declared in the runtime. Only the runtime knows its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Numeric kind of a run-time variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumKind {
    /// Signed 64-bit integer.
    Int,
    /// Signed fixed-point fraction (the runtime's native analog amplitude type).
    Fixed,
    Bool,
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumKind::Int => "int",
            NumKind::Fixed => "fixed",
            NumKind::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Abs,
    Ceil,
    /// `round(arg · 2^bits)` as an integer: the raw fixed-point word.
    Quantize(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Integer division truncating toward zero.
    IntDiv,
    Max,
    Min,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "//",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
        }
    }
}

/// Deferred arithmetic, built locally and evaluated by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Numeric constant; takes the kind of the operand it is combined with.
    Lit(f64),
    /// Exact integer constant.
    Int(i64),
    Var(VarId),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Failure to evaluate an expression against a variable environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("variable {0} has no value")]
    Unbound(VarId),
    #[error("division by zero in `{0}`")]
    DivisionByZero(String),
    #[error("non-finite result in `{0}`")]
    NonFinite(String),
}

impl Expr {
    #[inline]
    pub fn lit(value: f64) -> Self {
        Expr::Lit(value)
    }

    #[inline]
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    #[inline]
    pub fn var(var: VarId) -> Self {
        Expr::Var(var)
    }

    fn unary(op: UnaryOp, arg: Expr) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(arg),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn abs(self) -> Self {
        Self::unary(UnaryOp::Abs, self)
    }

    pub fn ceil(self) -> Self {
        Self::unary(UnaryOp::Ceil, self)
    }

    pub fn quantize(self, bits: u32) -> Self {
        Self::unary(UnaryOp::Quantize(bits), self)
    }

    pub fn int_div(self, other: Expr) -> Self {
        Self::binary(BinaryOp::IntDiv, self, other)
    }

    pub fn max(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Max, self, other)
    }

    pub fn min(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Min, self, other)
    }

    /// The literal value, when this expression is a bare literal.
    pub fn as_lit(&self) -> Option<f64> {
        match self {
            Expr::Lit(v) => Some(*v),
            _ => None,
        }
    }

    /// Evaluate in real arithmetic with `lookup` resolving variables.
    ///
    /// This is the ideal value of the expression; a runtime adds the range
    /// limits and rounding of its numeric kinds.
    pub fn evaluate(&self, lookup: &dyn Fn(VarId) -> Option<f64>) -> Result<f64, EvalError> {
        let v = match self {
            Expr::Lit(v) => *v,
            Expr::Int(i) => *i as f64,
            Expr::Var(id) => lookup(*id).ok_or(EvalError::Unbound(*id))?,
            Expr::Unary { op, arg } => {
                let a = arg.evaluate(lookup)?;
                match op {
                    UnaryOp::Neg => -a,
                    UnaryOp::Abs => a.abs(),
                    UnaryOp::Ceil => a.ceil(),
                    UnaryOp::Quantize(bits) => (a * 2f64.powi(*bits as i32)).round(),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.evaluate(lookup)?;
                let b = rhs.evaluate(lookup)?;
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(EvalError::DivisionByZero(self.to_string()));
                        }
                        a / b
                    }
                    BinaryOp::IntDiv => {
                        if b.trunc() == 0.0 {
                            return Err(EvalError::DivisionByZero(self.to_string()));
                        }
                        (a.trunc() / b.trunc()).trunc()
                    }
                    BinaryOp::Max => a.max(b),
                    BinaryOp::Min => a.min(b),
                }
            }
        };
        if v.is_finite() {
            Ok(v)
        } else {
            Err(EvalError::NonFinite(self.to_string()))
        }
    }

    /// Variables referenced anywhere in the tree, in first-seen order.
    pub fn variables(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Expr::Lit(_) | Expr::Int(_) => {}
            Expr::Var(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            Expr::Unary { arg, .. } => arg.collect_vars(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }
}

macro_rules! impl_expr_op {
    ($trait:ident, $function:ident, $op:ident) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $function(self, other: Expr) -> Expr {
                Expr::binary(BinaryOp::$op, self, other)
            }
        }
    };
}

impl_expr_op!(Add, add, Add);
impl_expr_op!(Sub, sub, Sub);
impl_expr_op!(Mul, mul, Mul);
impl_expr_op!(Div, div, Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Lit(v)
    }
}

impl From<VarId> for Expr {
    fn from(v: VarId) -> Self {
        Expr::Var(v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{v}"),
            Expr::Int(i) => write!(f, "{i}"),
            Expr::Var(id) => write!(f, "{id}"),
            Expr::Unary { op, arg } => match op {
                UnaryOp::Neg => write!(f, "-({arg})"),
                UnaryOp::Abs => write!(f, "abs({arg})"),
                UnaryOp::Ceil => write!(f, "ceil({arg})"),
                UnaryOp::Quantize(bits) => write!(f, "quantize({arg}, {bits})"),
            },
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Max | BinaryOp::Min => write!(f, "{}({lhs}, {rhs})", op.symbol()),
                _ => write!(f, "({lhs} {} {rhs})", op.symbol()),
            },
        }
    }
}
