#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! TOML schema for voltage-gate sequences.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Levels and durations accept either a number or the name of a run-time
//!   variable declared under `[[variables]]`.
//! - `[[sequence]]` is a small script of steps, ramps, compensation pulses and
//!   ramps to zero, executed in order by the CLI.
use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

/// A number, or the name of a declared run-time variable.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Variable(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v),
            Scalar::Variable(_) => None,
        }
    }

    pub fn variable(&self) -> Option<&str> {
        match self {
            Scalar::Number(_) => None,
            Scalar::Variable(name) => Some(name),
        }
    }
}

/// Output channel and the controller port it drives.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelCfg {
    pub name: String,
    #[serde(default = "default_controller")]
    pub controller: String,
    pub port: u16,
}

fn default_controller() -> String {
    "con1".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    /// Clock cycle of the runtime; every duration is a multiple of it.
    pub clock_unit_ns: u32,
    pub min_step_ns: u32,
    pub min_ramp_ns: u32,
    /// Longest single pulse, in clock cycles.
    pub max_pulse_cycles: u32,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            clock_unit_ns: 4,
            min_step_ns: 16,
            min_ramp_ns: 4,
            max_pulse_cycles: i32::MAX as u32,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PulseCfg {
    pub operation: String,
    /// Amplitude of the registered constant step waveform (V).
    pub step_amplitude: f64,
    pub step_length_ns: u32,
    /// Pulse-form strategy: "default" | "always-scaled"
    pub forms: String,
}

impl Default for PulseCfg {
    fn default() -> Self {
        Self {
            operation: "step".to_string(),
            step_amplitude: 0.25,
            step_length_ns: 16,
            forms: "default".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompensationCfg {
    /// Default bound for `compensate` steps that do not name one (V).
    pub max_amplitude: f64,
    /// Exclusive hardware output limit; requested amplitudes stay below it (V).
    pub output_ceiling: f64,
    /// Charges at or below this are treated as zero (V·ns).
    pub zero_tolerance: f64,
    /// Largest residual `simulate` accepts after the final compensation (V·ns).
    pub residual_tolerance: f64,
}

impl Default for CompensationCfg {
    fn default() -> Self {
        Self {
            max_amplitude: 0.49,
            output_ceiling: 0.5,
            zero_tolerance: 1e-6,
            residual_tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PrecisionCfg {
    /// Fractional bits of the level quantization in the charge accumulator.
    pub frac_bits: u32,
}

impl Default for PrecisionCfg {
    fn default() -> Self {
        Self { frac_bits: 28 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    Int,
    #[default]
    Fixed,
    Bool,
}

/// Run-time input declared before the sequence is compiled.
#[derive(Debug, Deserialize, Clone)]
pub struct VariableCfg {
    pub name: String,
    #[serde(default)]
    pub kind: VarKind,
    /// Initial value; the simulator starts from it.
    #[serde(default)]
    pub init: Option<f64>,
}

/// Named voltage point, one level per channel in `[[channels]]` order.
#[derive(Debug, Deserialize, Clone)]
pub struct PointCfg {
    pub name: String,
    pub levels: Vec<Scalar>,
    pub duration: Scalar,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StepOp {
    pub point: Option<String>,
    /// Per-channel levels; override the point's levels when both are given.
    pub levels: BTreeMap<String, Scalar>,
    pub duration: Option<Scalar>,
    pub ramp: Option<Scalar>,
}

/// One entry of the `[[sequence]]` script.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SequenceOp {
    Step(StepOp),
    Ramp(StepOp),
    Compensate {
        #[serde(default)]
        max_amplitude: Option<f64>,
        #[serde(default)]
        duration: Option<Scalar>,
    },
    RampToZero {
        #[serde(default)]
        duration: Option<u64>,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub channels: Vec<ChannelCfg>,
    pub timing: TimingCfg,
    pub pulses: PulseCfg,
    pub compensation: CompensationCfg,
    pub precision: PrecisionCfg,
    pub logging: Logging,
    pub variables: Vec<VariableCfg>,
    pub points: Vec<PointCfg>,
    pub sequence: Vec<SequenceOp>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file; does not validate.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))
}

impl Config {
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableCfg> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Channels
        if self.channels.is_empty() {
            eyre::bail!("channels must list at least one channel");
        }
        let mut names = BTreeSet::new();
        for c in &self.channels {
            if c.name.trim().is_empty() {
                eyre::bail!("channels.name must not be empty");
            }
            if !names.insert(c.name.as_str()) {
                eyre::bail!("channels.name '{}' is duplicated", c.name);
            }
        }

        // Timing
        let t = &self.timing;
        if t.clock_unit_ns == 0 {
            eyre::bail!("timing.clock_unit_ns must be > 0");
        }
        if t.min_step_ns == 0 || t.min_step_ns % t.clock_unit_ns != 0 {
            eyre::bail!("timing.min_step_ns must be a positive multiple of timing.clock_unit_ns");
        }
        if t.min_ramp_ns == 0 || t.min_ramp_ns % t.clock_unit_ns != 0 {
            eyre::bail!("timing.min_ramp_ns must be a positive multiple of timing.clock_unit_ns");
        }
        if u64::from(t.max_pulse_cycles) * u64::from(t.clock_unit_ns) < u64::from(t.min_step_ns) {
            eyre::bail!("timing.max_pulse_cycles must cover timing.min_step_ns");
        }

        // Pulses
        let p = &self.pulses;
        if p.operation.trim().is_empty() {
            eyre::bail!("pulses.operation must not be empty");
        }
        if !(p.step_amplitude.is_finite() && p.step_amplitude > 0.0) {
            eyre::bail!("pulses.step_amplitude must be > 0");
        }
        if p.step_length_ns == 0 || p.step_length_ns % t.clock_unit_ns != 0 {
            eyre::bail!("pulses.step_length_ns must be a positive multiple of timing.clock_unit_ns");
        }
        if !matches!(p.forms.as_str(), "default" | "always-scaled") {
            eyre::bail!("pulses.forms must be one of: default, always-scaled");
        }

        // Compensation
        let c = &self.compensation;
        if !(c.output_ceiling.is_finite() && c.output_ceiling > 0.0) {
            eyre::bail!("compensation.output_ceiling must be > 0");
        }
        if !(c.max_amplitude > 0.0 && c.max_amplitude < c.output_ceiling) {
            eyre::bail!("compensation.max_amplitude must be in (0, compensation.output_ceiling)");
        }
        if !(c.zero_tolerance.is_finite() && c.zero_tolerance >= 0.0) {
            eyre::bail!("compensation.zero_tolerance must be >= 0");
        }
        if !(c.residual_tolerance.is_finite() && c.residual_tolerance > 0.0) {
            eyre::bail!("compensation.residual_tolerance must be > 0");
        }

        // Precision
        if !(8..=48).contains(&self.precision.frac_bits) {
            eyre::bail!("precision.frac_bits must be in [8, 48]");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of: never, daily, hourly");
        }

        // Variables
        let mut vars = BTreeSet::new();
        for v in &self.variables {
            if v.name.trim().is_empty() {
                eyre::bail!("variables.name must not be empty");
            }
            if !vars.insert(v.name.as_str()) {
                eyre::bail!("variables.name '{}' is duplicated", v.name);
            }
            if let Some(init) = v.init
                && !init.is_finite()
            {
                eyre::bail!("variables '{}': init must be finite", v.name);
            }
        }
        let check_scalar = |what: &str, s: &Scalar| -> eyre::Result<()> {
            match s {
                Scalar::Number(v) if !v.is_finite() => {
                    eyre::bail!("{what} must be finite, got {v}")
                }
                Scalar::Variable(name) if !vars.contains(name.as_str()) => {
                    eyre::bail!("{what} refers to undeclared variable '{name}'")
                }
                _ => Ok(()),
            }
        };

        // Points
        let mut points = BTreeSet::new();
        for pt in &self.points {
            if !points.insert(pt.name.as_str()) {
                eyre::bail!("points.name '{}' is duplicated", pt.name);
            }
            if pt.levels.len() != self.channels.len() {
                eyre::bail!(
                    "points '{}': expected {} levels (one per channel), got {}",
                    pt.name,
                    self.channels.len(),
                    pt.levels.len()
                );
            }
            for l in &pt.levels {
                check_scalar(&format!("points '{}' level", pt.name), l)?;
            }
            check_scalar(&format!("points '{}' duration", pt.name), &pt.duration)?;
        }

        // Sequence
        for (i, op) in self.sequence.iter().enumerate() {
            let at = format!("sequence[{i}]");
            match op {
                SequenceOp::Step(s) | SequenceOp::Ramp(s) => {
                    if let Some(p) = &s.point
                        && !points.contains(p.as_str())
                    {
                        eyre::bail!("{at}: unknown point '{p}'");
                    }
                    if s.point.is_none() && s.levels.is_empty() {
                        eyre::bail!("{at}: needs a point or levels");
                    }
                    for (ch, l) in &s.levels {
                        if !names.contains(ch.as_str()) {
                            eyre::bail!("{at}: unknown channel '{ch}'");
                        }
                        check_scalar(&format!("{at} level for {ch}"), l)?;
                    }
                    if let Some(d) = &s.duration {
                        check_scalar(&format!("{at} duration"), d)?;
                    }
                    if let Some(r) = &s.ramp {
                        check_scalar(&format!("{at} ramp"), r)?;
                    }
                    if matches!(op, SequenceOp::Ramp(_)) && s.ramp.is_none() {
                        eyre::bail!("{at}: ramp needs a ramp duration");
                    }
                }
                SequenceOp::Compensate {
                    max_amplitude,
                    duration,
                } => {
                    if let Some(a) = max_amplitude
                        && !(*a > 0.0 && *a < c.output_ceiling)
                    {
                        eyre::bail!(
                            "{at}: max_amplitude must be in (0, compensation.output_ceiling)"
                        );
                    }
                    if let Some(d) = duration {
                        check_scalar(&format!("{at} duration"), d)?;
                    }
                }
                SequenceOp::RampToZero { .. } => {}
            }
        }

        Ok(())
    }
}
