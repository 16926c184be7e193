//! Charge compensation and the end-of-sequence reset.
//!
//! Each channel is compensated independently: a constant level held long
//! enough that level × duration cancels the charge accumulated since the
//! previous discharge, with |level| ≤ `max_amplitude`. Durations are quantized
//! up to the clock unit, so the level is usually a little below the bound.

use gateseq_traits::{Expr, NumKind, Runtime};

use crate::config::TimingCfg;
use crate::error::{Result, SequenceError};
use crate::fixed_point::{ceil_to_unit, floor_level, volt_ns_per_area2};
use crate::runtime_error::emitted;
use crate::sequence::VoltageGateSequence;
use crate::util::{SpanKind, check_span, to_cycles};
use crate::value::Value;

/// The pulse emitted on one channel by a compensation call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationResult {
    pub channel: String,
    /// Charge closed out, in V·ns.
    pub charge: Value,
    /// Level held during the pulse; `None` when the channel needed no pulse.
    pub level: Option<Value>,
    /// Pulse length in ns; zero when skipped.
    pub duration_ns: Value,
}

impl CompensationResult {
    pub fn skipped(&self) -> bool {
        self.level.is_none()
    }
}

/// Shortest clock-aligned pulse of at least `base_ns` that cancels `charge`
/// within `max_amplitude`, and its level.
pub fn known_pulse(
    channel: &str,
    charge: f64,
    max_amplitude: f64,
    base_ns: u64,
    timing: &TimingCfg,
) -> Result<(u64, f64)> {
    let unit = u64::from(timing.clock_unit_ns);
    let needed_ns = charge.abs() / max_amplitude;
    let mut duration = base_ns.max(ceil_to_unit(needed_ns, timing.clock_unit_ns));
    while duration <= timing.max_pulse_ns() && charge.abs() / duration as f64 > max_amplitude {
        duration += unit;
    }
    if duration > timing.max_pulse_ns() {
        return Err(eyre::Report::new(SequenceError::CompensationHeadroom {
            channel: channel.to_string(),
            charge,
            max_amplitude,
            required_ns: needed_ns,
            limit_ns: timing.max_pulse_ns(),
        }));
    }
    Ok((duration, -charge / duration as f64))
}

enum Planned {
    Skip { charge: f64 },
    Known { charge: f64, duration_ns: u64, level: f64 },
    Deferred,
}

impl<R: Runtime> VoltageGateSequence<R> {
    /// Emit one compensation pulse per channel and start a new accumulation window.
    ///
    /// Without `duration` the pulse is as short as `max_amplitude` allows (at
    /// least the minimum step). A given duration is extended when it would need
    /// a larger amplitude. All channels are aligned afterwards; the hold during
    /// that padding counts toward the next window.
    pub fn add_compensation_pulse(
        &mut self,
        max_amplitude: f64,
        duration: Option<Value>,
    ) -> Result<Vec<CompensationResult>> {
        let comp = self.cfg.compensation.clone();
        let timing = self.cfg.timing.clone();
        if !max_amplitude.is_finite() || max_amplitude <= 0.0 || max_amplitude >= comp.output_ceiling
        {
            return Err(eyre::Report::new(SequenceError::InvalidAmplitude {
                value: max_amplitude,
                ceiling: comp.output_ceiling,
            }));
        }
        if let Some(d) = &duration {
            check_span("compensation", SpanKind::Compensation, d, &timing)?;
        }
        let explicit_ns = duration.as_ref().and_then(Value::as_known).map(|d| d as u64);
        let duration_known = duration.as_ref().is_none_or(Value::is_known);
        let base_ns = explicit_ns.unwrap_or(u64::from(timing.min_step_ns));

        let names = self.channel_names();
        let mut planned = Vec::with_capacity(names.len());
        for channel in &names {
            let charge = self.tracker.accumulated(channel)?;
            let p = match charge.as_known() {
                Some(q) if q.abs() <= comp.zero_tolerance => Planned::Skip { charge: q },
                Some(q) if duration_known => {
                    let (duration_ns, level) =
                        known_pulse(channel, q, max_amplitude, base_ns, &timing)?;
                    if let Some(requested) = explicit_ns
                        && duration_ns > requested
                    {
                        tracing::warn!(
                            channel = %channel,
                            requested_ns = requested,
                            duration_ns,
                            "compensation duration extended to respect max_amplitude"
                        );
                    }
                    Planned::Known {
                        charge: q,
                        duration_ns,
                        level,
                    }
                }
                _ => Planned::Deferred,
            };
            planned.push(p);
        }

        let mut results = Vec::with_capacity(names.len());
        let mut cycles = Vec::with_capacity(names.len());
        for (channel, p) in names.iter().zip(planned) {
            match p {
                Planned::Skip { charge } => {
                    tracing::debug!(channel = %channel, charge, "no compensation needed");
                    self.tracker.clear_charge(channel)?;
                    cycles.push(Value::Known(0.0));
                    results.push(CompensationResult {
                        channel: channel.clone(),
                        charge: Value::Known(charge),
                        level: None,
                        duration_ns: Value::Known(0.0),
                    });
                }
                Planned::Known {
                    charge,
                    duration_ns,
                    level,
                } => {
                    tracing::debug!(channel = %channel, charge, duration_ns, level, "compensation pulse");
                    let n = to_cycles(&Value::Known(duration_ns as f64), &timing);
                    self.emit_step(channel, &Value::Known(level), &n, &mut None)?;
                    self.tracker.discharge(channel, Value::Known(level))?;
                    cycles.push(n);
                    results.push(CompensationResult {
                        channel: channel.clone(),
                        charge: Value::Known(charge),
                        level: Some(Value::Known(level)),
                        duration_ns: Value::Known(duration_ns as f64),
                    });
                }
                Planned::Deferred => {
                    let (r, n) =
                        self.emit_deferred(channel, max_amplitude, duration.as_ref(), &timing)?;
                    cycles.push(n);
                    results.push(r);
                }
            }
        }

        emitted(self.runtime.align(&names), || {
            "aligning channels after compensation".to_string()
        })?;
        let longest = cycles
            .iter()
            .cloned()
            .reduce(Value::max)
            .unwrap_or(Value::Known(0.0));
        for (channel, own) in names.iter().zip(cycles) {
            let pad = (longest.clone() - own) * f64::from(timing.clock_unit_ns);
            self.tracker.record_hold(channel, &pad)?;
            self.settle_charge(channel)?;
        }
        Ok(results)
    }

    /// Run-time compensation: pulse length and level are assigned to
    /// variables and evaluated when the program executes. Length and the
    /// per-cycle charge are integer arithmetic on the doubled charge; only the
    /// final int-by-fixed multiply produces a fixed-point level, bounded by
    /// `max_amplitude`. Returns the result and the pulse length in cycles.
    fn emit_deferred(
        &mut self,
        channel: &str,
        max_amplitude: f64,
        duration: Option<&Value>,
        timing: &TimingCfg,
    ) -> Result<(CompensationResult, Value)> {
        let frac_bits = self.tracker.frac_bits();
        let unit = f64::from(timing.clock_unit_ns);
        let charge = self.tracker.accumulated(channel)?;
        let area2 = self.tracker.area2_expr(channel)?;

        // Largest doubled area one cycle cancels at `max_amplitude`.
        let per_cycle =
            (2 * floor_level(max_amplitude, frac_bits) * i64::from(timing.clock_unit_ns)).max(1);
        let base = match duration {
            Some(d) => to_cycles(d, timing),
            None => Value::Known(f64::from(timing.min_step_ns) / unit),
        };
        let needed = (area2.clone().abs() + Expr::int(per_cycle - 1)).int_div(Expr::int(per_cycle));
        let cycles_var = self.comp_cycles_var(channel)?;
        self.assign(cycles_var, &base.max(Value::from(needed)).into_expr())?;

        let level_var = self.declare(NumKind::Fixed, &format!("{channel} compensation level"))?;
        let level =
            -area2.int_div(Expr::var(cycles_var)) * Expr::lit(volt_ns_per_area2(frac_bits) / unit);
        self.assign(level_var, &level)?;

        tracing::warn!(
            channel,
            max_amplitude,
            "run-time compensation: pulse length limit is enforced by the runtime only"
        );
        let n = Value::from(cycles_var);
        self.emit_step(channel, &Value::from(level_var), &n, &mut None)?;
        self.tracker.discharge(channel, Value::from(level_var))?;
        let result = CompensationResult {
            channel: channel.to_string(),
            charge,
            level: Some(Value::from(level_var)),
            duration_ns: n.clone() * unit,
        };
        Ok((result, n))
    }

    /// Ramp every channel to exactly 0 V and zero its state. `duration_ns`
    /// of `None` (or 0) uses the runtime's shortest ramp.
    pub fn ramp_to_zero(&mut self, duration_ns: Option<u64>) -> Result<()> {
        let timing = self.cfg.timing.clone();
        let cycles = match duration_ns {
            Some(ns) if ns > 0 => {
                check_span("ramp_to_zero", SpanKind::Ramp, &Value::from(ns), &timing)?;
                let c = ns / u64::from(timing.clock_unit_ns);
                Some(u32::try_from(c).map_err(|_| {
                    eyre::Report::new(SequenceError::InvalidDuration {
                        target: "ramp_to_zero".into(),
                        kind: SpanKind::Ramp.name(),
                        value: ns as f64,
                        reason: "too many clock cycles".into(),
                    })
                })?)
            }
            _ => None,
        };
        tracing::debug!(?cycles, "ramp to zero");
        for channel in self.channel_names() {
            emitted(self.runtime.ramp_to_zero(&channel, cycles), || {
                format!("ramp to zero on {channel}")
            })?;
            self.tracker.reset(&channel)?;
        }
        Ok(())
    }
}
