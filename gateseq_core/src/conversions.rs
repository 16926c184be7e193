//! `From` implementations bridging `gateseq_config` types to `gateseq_core` types.

use crate::config::{Channel, CompensationCfg, PrecisionCfg, PulseCfg, SequenceCfg, TimingCfg};
use crate::value::Value;

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&gateseq_config::TimingCfg> for TimingCfg {
    fn from(c: &gateseq_config::TimingCfg) -> Self {
        Self {
            clock_unit_ns: c.clock_unit_ns,
            min_step_ns: c.min_step_ns,
            min_ramp_ns: c.min_ramp_ns,
            max_pulse_cycles: c.max_pulse_cycles,
        }
    }
}

// ── PulseCfg ─────────────────────────────────────────────────────────────────

impl From<&gateseq_config::PulseCfg> for PulseCfg {
    fn from(c: &gateseq_config::PulseCfg) -> Self {
        Self {
            operation: c.operation.clone(),
            step_amplitude: c.step_amplitude,
            step_length_ns: c.step_length_ns,
        }
    }
}

// ── CompensationCfg ──────────────────────────────────────────────────────────

impl From<&gateseq_config::CompensationCfg> for CompensationCfg {
    fn from(c: &gateseq_config::CompensationCfg) -> Self {
        Self {
            output_ceiling: c.output_ceiling,
            zero_tolerance: c.zero_tolerance,
        }
    }
}

// ── PrecisionCfg ─────────────────────────────────────────────────────────────

impl From<&gateseq_config::PrecisionCfg> for PrecisionCfg {
    fn from(c: &gateseq_config::PrecisionCfg) -> Self {
        Self {
            frac_bits: c.frac_bits,
        }
    }
}

// ── SequenceCfg ──────────────────────────────────────────────────────────────

impl From<&gateseq_config::Config> for SequenceCfg {
    fn from(c: &gateseq_config::Config) -> Self {
        Self {
            timing: (&c.timing).into(),
            pulse: (&c.pulses).into(),
            compensation: (&c.compensation).into(),
            precision: (&c.precision).into(),
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────────────

impl From<&gateseq_config::ChannelCfg> for Channel {
    fn from(c: &gateseq_config::ChannelCfg) -> Self {
        Channel::new(c.name.clone(), c.controller.clone(), c.port)
    }
}

// ── Value ────────────────────────────────────────────────────────────────────

/// Numbers only; variable names need the runtime's `VarId`, which the caller resolves.
impl TryFrom<&gateseq_config::Scalar> for Value {
    type Error = String;

    fn try_from(s: &gateseq_config::Scalar) -> Result<Self, Self::Error> {
        match s {
            gateseq_config::Scalar::Number(v) => Ok(Value::Known(*v)),
            gateseq_config::Scalar::Variable(name) => Err(name.clone()),
        }
    }
}
