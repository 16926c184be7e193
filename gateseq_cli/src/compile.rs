//! Config mapping and script execution against the simulated runtime.

use std::collections::BTreeMap;

use eyre::WrapErr;
use gateseq_config::{Config, Scalar, SequenceOp, StepOp, VarKind};
use gateseq_core::error::Result as CoreResult;
use gateseq_core::{
    Channel, CompensationResult, SequenceCfg, Step, Value, VoltageGateSequence, build_sequence,
    strategy_by_name,
};
use gateseq_sim::SimRuntime;
use gateseq_traits::{NumKind, Runtime, VarId};

/// A sequence compiled from a config, with its declared variables.
#[derive(Debug)]
pub struct Compiled {
    pub seq: VoltageGateSequence<SimRuntime>,
    pub vars: BTreeMap<String, VarId>,
    /// Results of the final op when the script ends in a compensation.
    pub final_compensation: Option<Vec<CompensationResult>>,
}

fn num_kind(k: VarKind) -> NumKind {
    match k {
        VarKind::Int => NumKind::Int,
        VarKind::Fixed => NumKind::Fixed,
        VarKind::Bool => NumKind::Bool,
    }
}

/// Build the sequence (registration included) without running the script.
pub fn build(cfg: &Config) -> CoreResult<VoltageGateSequence<SimRuntime>> {
    let channels: Vec<Channel> = cfg.channels.iter().map(Channel::from).collect();
    let seq_cfg = SequenceCfg::from(cfg);
    let strategy = strategy_by_name(&cfg.pulses.forms);
    build_sequence(
        SimRuntime::new(cfg.timing.clock_unit_ns),
        channels,
        seq_cfg,
        strategy,
    )
}

/// Build, declare `[[variables]]`, register `[[points]]` and run `[[sequence]]`.
pub fn compile(cfg: &Config) -> CoreResult<Compiled> {
    let mut seq = build(cfg)?;

    let mut vars = BTreeMap::new();
    for v in &cfg.variables {
        let id = seq
            .runtime_mut()
            .declare(num_kind(v.kind), v.init)
            .map_err(|e| eyre::eyre!("declaring variable '{}': {e}", v.name))?;
        tracing::debug!(name = %v.name, var = %id, kind = ?v.kind, init = ?v.init, "variable declared");
        vars.insert(v.name.clone(), id);
    }

    let mut compiled = Compiled {
        seq,
        vars,
        final_compensation: None,
    };

    for p in &cfg.points {
        let levels = p
            .levels
            .iter()
            .map(|s| compiled.value(s))
            .collect::<CoreResult<Vec<Value>>>()?;
        let duration = compiled.value(&p.duration)?;
        compiled
            .seq
            .add_points(p.name.clone(), levels, duration)
            .wrap_err_with(|| format!("points '{}'", p.name))?;
    }

    for (i, op) in cfg.sequence.iter().enumerate() {
        compiled.final_compensation = None;
        compiled
            .run_op(op, cfg)
            .wrap_err_with(|| format!("sequence[{i}]"))?;
    }
    tracing::info!(
        channels = cfg.channels.len(),
        points = cfg.points.len(),
        ops = cfg.sequence.len(),
        instructions = compiled.seq.runtime().program().len(),
        "sequence compiled"
    );
    Ok(compiled)
}

impl Compiled {
    /// Number, or a declared variable by name.
    pub fn value(&self, s: &Scalar) -> CoreResult<Value> {
        Value::try_from(s).or_else(|name| {
            self.vars
                .get(&name)
                .map(|id| Value::from(*id))
                .ok_or_else(|| eyre::eyre!("unknown variable '{name}'"))
        })
    }

    fn step(&self, op: &StepOp) -> CoreResult<Step> {
        let mut step = match &op.point {
            Some(p) => Step::to_point(p.clone()),
            None => Step::default(),
        };
        for (channel, level) in &op.levels {
            step = step.level(channel.clone(), self.value(level)?);
        }
        if let Some(d) = &op.duration {
            step = step.duration(self.value(d)?);
        }
        if let Some(r) = &op.ramp {
            step = step.ramp(self.value(r)?);
        }
        Ok(step)
    }

    fn run_op(&mut self, op: &SequenceOp, cfg: &Config) -> CoreResult<()> {
        match op {
            SequenceOp::Step(s) => {
                let step = self.step(s)?;
                self.seq.add_step(step)?;
            }
            SequenceOp::Ramp(s) => {
                let step = self.step(s)?;
                self.seq.add_ramp(step)?;
            }
            SequenceOp::Compensate {
                max_amplitude,
                duration,
            } => {
                let max_amplitude = max_amplitude.unwrap_or(cfg.compensation.max_amplitude);
                let duration = duration.as_ref().map(|d| self.value(d)).transpose()?;
                let results = self.seq.add_compensation_pulse(max_amplitude, duration)?;
                self.final_compensation = Some(results);
            }
            SequenceOp::RampToZero { duration } => {
                self.seq.ramp_to_zero(*duration)?;
            }
        }
        Ok(())
    }
}
