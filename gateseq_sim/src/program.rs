//! Recorded runtime instructions.

use std::fmt;

use gateseq_traits::{Expr, NumKind, VarId};

/// A variable declared through the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: NumKind,
    pub init: Option<f64>,
}

/// One primitive emitted by the compiler, in program order.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Declare {
        var: VarId,
        kind: NumKind,
        init: Option<f64>,
    },
    Assign {
        var: VarId,
        value: Expr,
    },
    Play {
        channel: String,
        operation: String,
        amplitude: Expr,
        cycles: Expr,
    },
    Ramp {
        channel: String,
        slope: Expr,
        cycles: Expr,
    },
    Wait {
        channel: String,
        cycles: Expr,
    },
    RampToZero {
        channel: String,
        cycles: Option<u32>,
    },
    Align {
        channels: Vec<String>,
    },
}

impl Instruction {
    /// Channel touched by a per-channel primitive.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Instruction::Play { channel, .. }
            | Instruction::Ramp { channel, .. }
            | Instruction::Wait { channel, .. }
            | Instruction::RampToZero { channel, .. } => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Declare { var, kind, init } => match init {
                Some(v) => write!(f, "declare {var}: {kind} = {v}"),
                None => write!(f, "declare {var}: {kind}"),
            },
            Instruction::Assign { var, value } => write!(f, "assign {var} = {value}"),
            Instruction::Play {
                channel,
                operation,
                amplitude,
                cycles,
            } => write!(
                f,
                "play {operation} * amp({amplitude}) on {channel} for {cycles} cycles"
            ),
            Instruction::Ramp {
                channel,
                slope,
                cycles,
            } => write!(f, "ramp {channel} slope {slope} V/ns for {cycles} cycles"),
            Instruction::Wait { channel, cycles } => {
                write!(f, "wait {cycles} cycles on {channel}")
            }
            Instruction::RampToZero { channel, cycles } => match cycles {
                Some(c) => write!(f, "ramp_to_zero {channel} over {c} cycles"),
                None => write!(f, "ramp_to_zero {channel}"),
            },
            Instruction::Align { channels } => write!(f, "align {}", channels.join(", ")),
        }
    }
}
