//! Duration checks and ns/cycle helpers.

use gateseq_traits::Expr;

use crate::config::TimingCfg;
use crate::error::{Result, SequenceError};
use crate::value::Value;

/// What a duration is used for; decides its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Hold after a step. Zero means an instantaneous jump.
    Step,
    /// Linear transition. Zero degenerates to a step.
    Ramp,
    /// Hold after a ramp. Zero means no hold.
    Dwell,
    /// Explicit compensation pulse length. Must be non-zero.
    Compensation,
}

impl SpanKind {
    pub fn name(self) -> &'static str {
        match self {
            SpanKind::Step => "step",
            SpanKind::Ramp => "ramp",
            SpanKind::Dwell => "dwell",
            SpanKind::Compensation => "compensation",
        }
    }

    fn min_ns(self, timing: &TimingCfg) -> u32 {
        match self {
            SpanKind::Ramp => timing.min_ramp_ns,
            _ => timing.min_step_ns,
        }
    }

    fn allows_zero(self) -> bool {
        !matches!(self, SpanKind::Compensation)
    }
}

/// Validate a duration in ns. Run-time durations cannot be checked here and pass.
pub fn check_span(target: &str, kind: SpanKind, value: &Value, timing: &TimingCfg) -> Result<()> {
    let Some(ns) = value.as_known() else {
        tracing::debug!(
            target_name = target,
            kind = kind.name(),
            "run-time duration is validated by the runtime only"
        );
        return Ok(());
    };
    let fail = |reason: String| {
        Err(eyre::Report::new(SequenceError::InvalidDuration {
            target: target.to_string(),
            kind: kind.name(),
            value: ns,
            reason,
        }))
    };
    if !ns.is_finite() || ns < 0.0 {
        return fail("must be a finite, non-negative number".into());
    }
    if ns.fract() != 0.0 {
        return fail("must be a whole number of ns".into());
    }
    if ns == 0.0 {
        return if kind.allows_zero() {
            Ok(())
        } else {
            fail("must be > 0".into())
        };
    }
    let unit = f64::from(timing.clock_unit_ns);
    if ns % unit != 0.0 {
        return fail(format!(
            "must be a multiple of the {} ns clock unit",
            timing.clock_unit_ns
        ));
    }
    let min = kind.min_ns(timing);
    if ns < f64::from(min) {
        return fail(format!("must be >= {min} ns"));
    }
    if ns > timing.max_pulse_ns() as f64 {
        return fail(format!("must be <= {} ns", timing.max_pulse_ns()));
    }
    Ok(())
}

/// Duration in clock cycles. Run-time durations divide as integers.
#[inline]
pub fn to_cycles(ns: &Value, timing: &TimingCfg) -> Value {
    match ns {
        Value::Known(v) => Value::Known(v / f64::from(timing.clock_unit_ns)),
        Value::Deferred(e) => {
            Value::from(e.clone().int_div(Expr::int(i64::from(timing.clock_unit_ns))))
        }
    }
}
