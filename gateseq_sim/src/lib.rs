//! Simulated real-time runtime.
//!
//! [`SimRuntime`] records every primitive the compiler emits and can execute
//! the recorded program into a per-channel [`Waveform`], evaluating run-time
//! variables the way the real controller would (see [`eval`] for the numeric
//! rules: 64-bit integers, range-checked fixed point).

pub mod error;
pub mod eval;
pub mod program;
pub mod waveform;

use gateseq_traits::{Expr, NumKind, Runtime, RuntimeConfig, RuntimeError, VarId};

use eval::{Num, convert, eval, initial};

pub use error::{Result, SimError};
pub use program::{Instruction, VarDecl};
pub use waveform::{Segment, Waveform};

use waveform::Track;

/// Fractional bits of the simulated fixed-point type.
pub const FIXED_FRAC_BITS: i32 = 28;
/// Fixed-point values live in `[-FIXED_RANGE, FIXED_RANGE)`.
pub const FIXED_RANGE: f64 = 8.0;

/// Recording runtime with an executor.
#[derive(Debug, Clone)]
pub struct SimRuntime {
    clock_unit_ns: u32,
    config: Option<RuntimeConfig>,
    vars: Vec<VarDecl>,
    program: Vec<Instruction>,
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SimRuntime {
    pub fn new(clock_unit_ns: u32) -> Self {
        Self {
            clock_unit_ns: clock_unit_ns.max(1),
            config: None,
            vars: Vec::new(),
            program: Vec::new(),
        }
    }

    pub fn clock_unit_ns(&self) -> u32 {
        self.clock_unit_ns
    }

    pub fn config(&self) -> Option<&RuntimeConfig> {
        self.config.as_ref()
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    pub fn variables(&self) -> &[VarDecl] {
        &self.vars
    }

    /// Override the initial value of a declared variable before execution.
    pub fn bind(&mut self, var: VarId, value: f64) -> Result<()> {
        let decl = self
            .vars
            .get_mut(var.index() as usize)
            .ok_or(SimError::UnknownVariable(var))?;
        decl.init = Some(value);
        Ok(())
    }

    /// Human-readable listing, one instruction per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (i, instr) in self.program.iter().enumerate() {
            out.push_str(&format!("{i:>4}  {instr}\n"));
        }
        out
    }

    fn check_channel(&self, channel: &str) -> Result<()> {
        let cfg = self.config.as_ref().ok_or(SimError::NotRegistered)?;
        if cfg.elements.contains_key(channel) {
            Ok(())
        } else {
            Err(SimError::UnknownChannel(channel.to_string()))
        }
    }

    fn check_var(&self, var: VarId) -> Result<()> {
        if (var.index() as usize) < self.vars.len() {
            Ok(())
        } else {
            Err(SimError::UnknownVariable(var))
        }
    }

    /// Execute the recorded program from time zero with all outputs at 0 V.
    pub fn execute(&self) -> Result<Waveform> {
        let cfg = self.config.as_ref().ok_or(SimError::NotRegistered)?;
        let mut env: Vec<Num> = Vec::with_capacity(self.vars.len());
        for (i, d) in self.vars.iter().enumerate() {
            let init = d.init.unwrap_or(0.0);
            let var = VarId::new(i as u32);
            env.push(
                initial(d.kind, init, &Expr::var(var))
                    .map_err(|_| SimError::FixedOverflow { var, value: init })?,
            );
        }
        let mut wf = Waveform::default();
        for name in cfg.elements.keys() {
            wf.tracks.insert(name.clone(), Track::default());
        }
        let unit = u64::from(self.clock_unit_ns);

        for instr in &self.program {
            match instr {
                Instruction::Declare { .. } => {}
                Instruction::Assign { var, value } => {
                    let v = eval(value, &env)?;
                    let kind = self.vars[var.index() as usize].kind;
                    env[var.index() as usize] = convert(kind, v, value).map_err(|e| match e {
                        SimError::FixedRange { value, .. } => SimError::FixedOverflow {
                            var: *var,
                            value,
                        },
                        other => other,
                    })?;
                }
                Instruction::Play {
                    channel,
                    operation,
                    amplitude,
                    cycles,
                } => {
                    let sample = cfg.constant_sample(channel, operation).ok_or_else(|| {
                        SimError::UnknownOperation {
                            channel: channel.clone(),
                            operation: operation.clone(),
                        }
                    })?;
                    let amp = eval(amplitude, &env)?.value();
                    let n = eval_cycles(channel, cycles, &env)?;
                    let track = track_mut(&mut wf, channel)?;
                    let to = track.level + sample * amp;
                    track.level = to;
                    track.push(n * unit, to);
                }
                Instruction::Ramp {
                    channel,
                    slope,
                    cycles,
                } => {
                    let s = eval(slope, &env)?.value();
                    let n = eval_cycles(channel, cycles, &env)?;
                    let track = track_mut(&mut wf, channel)?;
                    let dur = n * unit;
                    let to = track.level + s * dur as f64;
                    track.push(dur, to);
                }
                Instruction::Wait { channel, cycles } => {
                    let n = eval_cycles(channel, cycles, &env)?;
                    track_mut(&mut wf, channel)?.hold(n * unit);
                }
                Instruction::RampToZero { channel, cycles } => {
                    let n = u64::from(cycles.unwrap_or(1));
                    track_mut(&mut wf, channel)?.push(n * unit, 0.0);
                }
                Instruction::Align { channels } => {
                    let end = channels
                        .iter()
                        .filter_map(|c| wf.tracks.get(c).map(|t| t.t_ns))
                        .max()
                        .unwrap_or(0);
                    for c in channels {
                        let track = track_mut(&mut wf, c)?;
                        let pad = end - track.t_ns;
                        track.hold(pad);
                    }
                }
            }
        }
        tracing::debug!(
            instructions = self.program.len(),
            variables = self.vars.len(),
            "simulated program executed"
        );
        wf.variables = env.into_iter().map(Num::value).collect();
        Ok(wf)
    }
}

fn eval_cycles(channel: &str, cycles: &Expr, env: &[Num]) -> Result<u64> {
    let c = eval(cycles, env)?.value();
    let rounded = c.round();
    if c < 0.0 || (c - rounded).abs() > 1e-9 {
        return Err(SimError::InvalidDuration {
            channel: channel.to_string(),
            cycles: c,
        });
    }
    Ok(rounded as u64)
}

fn track_mut<'a>(wf: &'a mut Waveform, channel: &str) -> Result<&'a mut Track> {
    wf.tracks
        .get_mut(channel)
        .ok_or_else(|| SimError::UnknownChannel(channel.to_string()))
}

fn boxed(e: SimError) -> RuntimeError {
    Box::new(e)
}

impl Runtime for SimRuntime {
    fn register(&mut self, config: &RuntimeConfig) -> std::result::Result<(), RuntimeError> {
        tracing::debug!(elements = config.elements.len(), "runtime configuration registered");
        self.config = Some(config.clone());
        Ok(())
    }

    fn declare(
        &mut self,
        kind: NumKind,
        init: Option<f64>,
    ) -> std::result::Result<VarId, RuntimeError> {
        let var = VarId::new(self.vars.len() as u32);
        self.vars.push(VarDecl { kind, init });
        self.program.push(Instruction::Declare { var, kind, init });
        Ok(var)
    }

    fn assign(&mut self, var: VarId, value: &Expr) -> std::result::Result<(), RuntimeError> {
        self.check_var(var).map_err(boxed)?;
        for v in value.variables() {
            self.check_var(v).map_err(boxed)?;
        }
        self.program.push(Instruction::Assign {
            var,
            value: value.clone(),
        });
        Ok(())
    }

    fn play(
        &mut self,
        channel: &str,
        operation: &str,
        amplitude: &Expr,
        cycles: &Expr,
    ) -> std::result::Result<(), RuntimeError> {
        self.check_channel(channel).map_err(boxed)?;
        let registered = self
            .config
            .as_ref()
            .and_then(|c| c.constant_sample(channel, operation))
            .is_some();
        if !registered {
            return Err(boxed(SimError::UnknownOperation {
                channel: channel.to_string(),
                operation: operation.to_string(),
            }));
        }
        self.program.push(Instruction::Play {
            channel: channel.to_string(),
            operation: operation.to_string(),
            amplitude: amplitude.clone(),
            cycles: cycles.clone(),
        });
        Ok(())
    }

    fn ramp(
        &mut self,
        channel: &str,
        slope: &Expr,
        cycles: &Expr,
    ) -> std::result::Result<(), RuntimeError> {
        self.check_channel(channel).map_err(boxed)?;
        self.program.push(Instruction::Ramp {
            channel: channel.to_string(),
            slope: slope.clone(),
            cycles: cycles.clone(),
        });
        Ok(())
    }

    fn wait(&mut self, channel: &str, cycles: &Expr) -> std::result::Result<(), RuntimeError> {
        self.check_channel(channel).map_err(boxed)?;
        self.program.push(Instruction::Wait {
            channel: channel.to_string(),
            cycles: cycles.clone(),
        });
        Ok(())
    }

    fn ramp_to_zero(
        &mut self,
        channel: &str,
        cycles: Option<u32>,
    ) -> std::result::Result<(), RuntimeError> {
        self.check_channel(channel).map_err(boxed)?;
        self.program.push(Instruction::RampToZero {
            channel: channel.to_string(),
            cycles,
        });
        Ok(())
    }

    fn align(&mut self, channels: &[String]) -> std::result::Result<(), RuntimeError> {
        for c in channels {
            self.check_channel(c).map_err(boxed)?;
        }
        self.program.push(Instruction::Align {
            channels: channels.to_vec(),
        });
        Ok(())
    }
}
