//! Step and ramp planning and emission.
//!
//! A request is first resolved into a [`StepPlan`] holding one target level per
//! channel and validated durations. Nothing is emitted until the whole plan is
//! valid, so a failing call leaves the runtime program and the tracker untouched.

use std::collections::BTreeMap;

use gateseq_traits::{Expr, Runtime};

use crate::config::{Channel, TimingCfg};
use crate::error::{Result, SequenceError};
use crate::point::VoltagePoint;
use crate::runtime_error::emitted;
use crate::sequence::{VoltageGateSequence, check_level};
use crate::step::Step;
use crate::strategy::{PulseForm, effective_form};
use crate::tracker::VoltageStateTracker;
use crate::util::{SpanKind, check_span, to_cycles};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepKind {
    /// Jump, or ramp when a ramp duration is given; the hold is required.
    Step,
    /// Ramp, always; the hold is an optional dwell.
    Ramp,
}

/// A validated step, one target per channel in channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPlan {
    pub label: String,
    pub targets: Vec<(String, Value)>,
    /// Ramp length in ns; `None` for an instantaneous jump.
    pub ramp: Option<Value>,
    /// Hold (or dwell) in ns at the target after the jump or ramp.
    pub hold: Value,
}

pub(crate) fn plan_step(
    step: &Step,
    kind: StepKind,
    channels: &[Channel],
    points: &BTreeMap<String, VoltagePoint>,
    tracker: &VoltageStateTracker,
    timing: &TimingCfg,
) -> Result<StepPlan> {
    let label = step.label();
    let point = match &step.point {
        Some(name) => Some(
            points
                .get(name)
                .ok_or_else(|| eyre::Report::new(SequenceError::UnknownPoint(name.clone())))?,
        ),
        None => None,
    };
    if point.is_none() && step.levels.is_empty() {
        return Err(eyre::Report::new(SequenceError::MissingLevel { target: label }));
    }

    let mut targets = Vec::with_capacity(channels.len());
    for (i, channel) in channels.iter().enumerate() {
        let level = match point.and_then(|p| p.level(i)) {
            Some(v) => v.clone(),
            None => tracker.level(&channel.name)?.clone(),
        };
        targets.push((channel.name.clone(), level));
    }
    for (name, level) in &step.levels {
        let slot = targets
            .iter_mut()
            .find(|(c, _)| c == name)
            .ok_or_else(|| eyre::Report::new(SequenceError::UnknownChannel(name.clone())))?;
        slot.1 = level.clone();
    }
    for (channel, level) in &targets {
        check_level(&label, channel, level)?;
    }

    let hold = step
        .duration
        .clone()
        .or_else(|| point.map(|p| p.duration.clone()));
    let ramp = step.ramp.clone();
    let hold = match (kind, hold) {
        (_, Some(h)) => h,
        (StepKind::Ramp, None) => Value::Known(0.0),
        (StepKind::Step, None) => {
            return Err(eyre::Report::new(SequenceError::MissingDuration { target: label }));
        }
    };
    if kind == StepKind::Ramp && ramp.is_none() {
        return Err(eyre::Report::new(SequenceError::MissingRampDuration {
            target: label,
        }));
    }

    if let Some(r) = &ramp {
        check_span(&label, SpanKind::Ramp, r, timing)?;
    }
    let hold_kind = if ramp.is_some() {
        SpanKind::Dwell
    } else {
        SpanKind::Step
    };
    check_span(&label, hold_kind, &hold, timing)?;

    Ok(StepPlan {
        label,
        targets,
        ramp,
        hold,
    })
}

impl<R: Runtime> VoltageGateSequence<R> {
    /// Step every channel to a voltage point or explicit levels.
    ///
    /// With a ramp duration the transition is linear, otherwise instantaneous.
    /// Channels the step does not name hold their current level.
    pub fn add_step(&mut self, step: Step) -> Result<StepPlan> {
        let plan = self.plan(&step, StepKind::Step)?;
        self.apply(&plan)?;
        Ok(plan)
    }

    /// Ramp every channel over the ramp duration, then dwell for the duration
    /// (explicit, else the point's default, else none).
    pub fn add_ramp(&mut self, step: Step) -> Result<StepPlan> {
        let plan = self.plan(&step, StepKind::Ramp)?;
        self.apply(&plan)?;
        Ok(plan)
    }

    fn plan(&self, step: &Step, kind: StepKind) -> Result<StepPlan> {
        plan_step(
            step,
            kind,
            &self.channels,
            &self.points,
            &self.tracker,
            &self.cfg.timing,
        )
    }

    pub(crate) fn apply(&mut self, plan: &StepPlan) -> Result<()> {
        let ramp = plan.ramp.as_ref().filter(|r| !r.is_known_zero());
        tracing::debug!(
            target_name = %plan.label,
            ramp = ?ramp.map(ToString::to_string),
            hold = %plan.hold,
            "emitting step"
        );
        let timing = self.cfg.timing.clone();

        if let Some(r) = ramp {
            let cycles = to_cycles(r, &timing);
            for (channel, level) in &plan.targets {
                self.emit_ramp(channel, level, r, &cycles)?;
                self.tracker.record_ramp(channel, level, r)?;
                self.settle_charge(channel)?;
            }
            if !plan.hold.is_known_zero() {
                let cycles = to_cycles(&plan.hold, &timing).into_expr();
                for (channel, level) in &plan.targets {
                    emitted(self.runtime.wait(channel, &cycles), || {
                        format!("dwell on {channel}")
                    })?;
                    self.tracker.record_step(channel, level, &plan.hold)?;
                    self.settle_charge(channel)?;
                }
            }
            return Ok(());
        }

        if plan.hold.is_known_zero() {
            for (channel, level) in &plan.targets {
                self.tracker.record_step(channel, level, &plan.hold)?;
            }
            return Ok(());
        }
        let cycles = to_cycles(&plan.hold, &timing);
        let mut shared_cycles = None;
        for (channel, level) in &plan.targets {
            self.emit_step(channel, level, &cycles, &mut shared_cycles)?;
            self.tracker.record_step(channel, level, &plan.hold)?;
            self.settle_charge(channel)?;
        }
        Ok(())
    }

    /// Play the jump from the held level to `level` and hold it for `cycles`.
    ///
    /// `shared_cycles` caches the run-time length variable so one step assigns
    /// it once for all channels.
    pub(crate) fn emit_step(
        &mut self,
        channel: &str,
        level: &Value,
        cycles: &Value,
        shared_cycles: &mut Option<Expr>,
    ) -> Result<()> {
        let held = self.tracker.held(channel)?.clone();
        let delta = level.clone() - held;
        if delta.is_known_zero() {
            return emitted(self.runtime.wait(channel, &cycles.to_expr()), || {
                format!("hold on {channel}")
            });
        }

        let form = effective_form(self.strategy.as_ref(), delta.is_known(), cycles.is_known());
        let amplitude = delta / self.cfg.pulse.step_amplitude;
        let amplitude = match form {
            PulseForm::Constant => amplitude.into_expr(),
            PulseForm::Scaled | PulseForm::DurationParameterized => {
                let var = self.amplitude_var(channel)?;
                self.assign(var, &amplitude.into_expr())?;
                Expr::var(var)
            }
        };
        let cycles = match (form, shared_cycles.as_ref()) {
            (PulseForm::DurationParameterized, _) if matches!(cycles, Value::Deferred(Expr::Var(_))) => {
                cycles.to_expr()
            }
            (PulseForm::DurationParameterized, Some(shared)) => shared.clone(),
            (PulseForm::DurationParameterized, None) => {
                let var = self.duration_var()?;
                self.assign(var, &cycles.to_expr())?;
                let shared = Expr::var(var);
                *shared_cycles = Some(shared.clone());
                shared
            }
            _ => cycles.to_expr(),
        };
        tracing::trace!(channel, ?form, %amplitude, %cycles, "play step");
        let operation = self.cfg.pulse.operation.clone();
        emitted(
            self.runtime.play(channel, &operation, &amplitude, &cycles),
            || format!("step on {channel}"),
        )
    }

    fn emit_ramp(&mut self, channel: &str, level: &Value, ramp_ns: &Value, cycles: &Value) -> Result<()> {
        let held = self.tracker.held(channel)?.clone();
        let delta = level.clone() - held;
        if delta.is_known_zero() {
            return emitted(self.runtime.wait(channel, &cycles.to_expr()), || {
                format!("flat ramp on {channel}")
            });
        }
        let slope = (delta / ramp_ns.clone()).into_expr();
        tracing::trace!(channel, %slope, "ramp");
        emitted(
            self.runtime.ramp(channel, &slope, &cycles.to_expr()),
            || format!("ramp on {channel}"),
        )
    }
}
