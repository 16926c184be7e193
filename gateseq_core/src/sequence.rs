//! The voltage-gate sequence: channel state, voltage points and the runtime it emits into.

use std::collections::BTreeMap;

use gateseq_traits::{Expr, NumKind, Runtime, VarId};

use crate::builder::{Missing, SequenceBuilder};
use crate::config::{Channel, SequenceCfg};
use crate::error::{Result, SequenceError};
use crate::point::VoltagePoint;
use crate::runtime_error::emitted;
use crate::strategy::PulseFormStrategy;
use crate::tracker::VoltageStateTracker;
use crate::util::{SpanKind, check_span};
use crate::value::Value;

/// Run-time variables the sequence declares lazily and reuses.
#[derive(Debug, Default)]
pub(crate) struct RuntimeVars {
    pub(crate) amplitude: BTreeMap<String, VarId>,
    pub(crate) charge: BTreeMap<String, VarId>,
    pub(crate) comp_cycles: BTreeMap<String, VarId>,
    pub(crate) duration: Option<VarId>,
}

/// Compiles steps, ramps and compensation pulses for a fixed set of channels
/// into runtime primitives while tracking each channel's level and charge.
pub struct VoltageGateSequence<R = Box<dyn Runtime>> {
    pub(crate) runtime: R,
    pub(crate) cfg: SequenceCfg,
    pub(crate) channels: Vec<Channel>,
    pub(crate) points: BTreeMap<String, VoltagePoint>,
    pub(crate) tracker: VoltageStateTracker,
    pub(crate) strategy: Box<dyn PulseFormStrategy>,
    pub(crate) vars: RuntimeVars,
}

impl<R> core::fmt::Debug for VoltageGateSequence<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VoltageGateSequence")
            .field("channels", &self.channel_names())
            .field("points", &self.points.keys().collect::<Vec<_>>())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl VoltageGateSequence {
    /// Start building a sequence.
    pub fn builder() -> SequenceBuilder<Missing, Missing> {
        SequenceBuilder::default()
    }
}

impl<R> VoltageGateSequence<R> {
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn points(&self) -> impl Iterator<Item = &VoltagePoint> {
        self.points.values()
    }

    pub fn point(&self, name: &str) -> Option<&VoltagePoint> {
        self.points.get(name)
    }

    pub fn config(&self) -> &SequenceCfg {
        &self.cfg
    }

    /// Last requested level of `channel`.
    pub fn current_level(&self, channel: &str) -> Result<&Value> {
        self.tracker.level(channel)
    }

    /// Charge in V·ns accumulated on `channel` since the last discharge.
    pub fn accumulated_charge(&self, channel: &str) -> Result<Value> {
        self.tracker.accumulated(channel)
    }

    pub fn tracker(&self) -> &VoltageStateTracker {
        &self.tracker
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }
}

impl<R: Runtime> VoltageGateSequence<R> {
    /// Register a named voltage point with one level per channel.
    pub fn add_points<I, V>(
        &mut self,
        name: impl Into<String>,
        levels: I,
        duration: impl Into<Value>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        if self.points.contains_key(&name) {
            return Err(eyre::Report::new(SequenceError::DuplicatePoint(name)));
        }
        let levels: Vec<Value> = levels.into_iter().map(Into::into).collect();
        if levels.len() != self.channels.len() {
            return Err(eyre::Report::new(SequenceError::LevelCountMismatch {
                point: name,
                expected: self.channels.len(),
                got: levels.len(),
            }));
        }
        let target = format!("point '{name}'");
        for (channel, level) in self.channels.iter().zip(&levels) {
            check_level(&target, &channel.name, level)?;
        }
        let duration = duration.into();
        check_span(&target, SpanKind::Step, &duration, &self.cfg.timing)?;
        tracing::debug!(point = %name, duration = %duration, "voltage point registered");
        self.points.insert(
            name.clone(),
            VoltagePoint {
                name,
                levels,
                duration,
            },
        );
        Ok(())
    }

    pub(crate) fn declare(&mut self, kind: NumKind, what: &str) -> Result<VarId> {
        emitted(self.runtime.declare(kind, None), || {
            format!("declaring {kind} variable for {what}")
        })
    }

    pub(crate) fn amplitude_var(&mut self, channel: &str) -> Result<VarId> {
        if let Some(v) = self.vars.amplitude.get(channel) {
            return Ok(*v);
        }
        let v = self.declare(NumKind::Fixed, &format!("{channel} amplitude"))?;
        self.vars.amplitude.insert(channel.to_string(), v);
        Ok(v)
    }

    pub(crate) fn charge_var(&mut self, channel: &str) -> Result<VarId> {
        if let Some(v) = self.vars.charge.get(channel) {
            return Ok(*v);
        }
        let v = self.declare(NumKind::Int, &format!("{channel} charge"))?;
        self.vars.charge.insert(channel.to_string(), v);
        Ok(v)
    }

    pub(crate) fn comp_cycles_var(&mut self, channel: &str) -> Result<VarId> {
        if let Some(v) = self.vars.comp_cycles.get(channel) {
            return Ok(*v);
        }
        let v = self.declare(NumKind::Int, &format!("{channel} compensation length"))?;
        self.vars.comp_cycles.insert(channel.to_string(), v);
        Ok(v)
    }

    pub(crate) fn duration_var(&mut self) -> Result<VarId> {
        if let Some(v) = self.vars.duration {
            return Ok(v);
        }
        let v = self.declare(NumKind::Int, "step length")?;
        self.vars.duration = Some(v);
        Ok(v)
    }

    pub(crate) fn assign(&mut self, var: VarId, value: &Expr) -> Result<()> {
        emitted(self.runtime.assign(var, value), || format!("assigning {var}"))
    }

    /// Store a freshly deferred charge in the channel's run-time accumulator,
    /// an integer of doubled V·ns in units of `2^-frac_bits`.
    pub(crate) fn settle_charge(&mut self, channel: &str) -> Result<()> {
        if let Some(expr) = self.tracker.pending_charge(channel)? {
            let var = self.charge_var(channel)?;
            self.assign(var, &expr)?;
            self.tracker.settle_charge(channel, var)?;
            tracing::trace!(channel, %var, value = %expr, "run-time charge updated");
        }
        Ok(())
    }
}

/// Known levels must be finite.
pub(crate) fn check_level(target: &str, channel: &str, level: &Value) -> Result<()> {
    match level.as_known() {
        Some(v) if !v.is_finite() => Err(eyre::Report::new(SequenceError::InvalidLevel {
            target: target.to_string(),
            channel: channel.to_string(),
            value: v,
        })),
        _ => Ok(()),
    }
}
