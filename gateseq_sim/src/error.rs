use gateseq_traits::{EvalError, VarId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("operation '{operation}' is not registered on channel {channel}")]
    UnknownOperation { channel: String, operation: String },
    #[error("unknown variable: {0}")]
    UnknownVariable(VarId),
    #[error("fixed-point overflow assigning {value} to {var} (range [-8, 8))")]
    FixedOverflow { var: VarId, value: f64 },
    #[error("fixed-point intermediate {value} out of range [-8, 8) in `{expr}`")]
    FixedRange { expr: String, value: f64 },
    #[error("64-bit integer overflow in `{expr}`")]
    IntOverflow { expr: String },
    #[error("kind mismatch in `{expr}`: {reason}")]
    KindMismatch { expr: String, reason: &'static str },
    #[error("invalid duration on {channel}: {cycles} cycles")]
    InvalidDuration { channel: String, cycles: f64 },
    #[error("no runtime configuration registered")]
    NotRegistered,
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, SimError>;
