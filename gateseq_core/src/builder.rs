//! Type-state builder for `VoltageGateSequence` and the generic `build_sequence` constructor.
//!
//! The builder enforces at compile time that a runtime and the channels are
//! provided before `build()` is available. `try_build()` is available as soon
//! as a runtime is set and reports missing channels dynamically.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use gateseq_traits::Runtime;

use crate::config::*;
use crate::error::{BuildError, Result};
use crate::registration::runtime_config;
use crate::runtime_error::emitted;
use crate::sequence::{RuntimeVars, VoltageGateSequence};
use crate::strategy::{DefaultPulseForms, PulseFormStrategy};
use crate::tracker::VoltageStateTracker;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `VoltageGateSequence`. The first parameter is `Missing` until a
/// runtime is given, then the runtime type itself.
pub struct SequenceBuilder<R, C> {
    runtime: R,
    channels: Vec<Channel>,
    timing: Option<TimingCfg>,
    pulse: Option<PulseCfg>,
    compensation: Option<CompensationCfg>,
    precision: Option<PrecisionCfg>,
    strategy: Option<Box<dyn PulseFormStrategy>>,
    _c: PhantomData<C>,
}

impl Default for SequenceBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            runtime: Missing,
            channels: Vec::new(),
            timing: None,
            pulse: None,
            compensation: None,
            precision: None,
            strategy: None,
            _c: PhantomData,
        }
    }
}

/// Validate configuration, register the runtime configuration and construct the sequence.
///
/// Single source of truth for validation, used by both `SequenceBuilder::try_build()`
/// and `build_sequence()`.
fn validate_and_build<R: Runtime>(
    mut runtime: R,
    channels: Vec<Channel>,
    cfg: SequenceCfg,
    strategy: Box<dyn PulseFormStrategy>,
) -> Result<VoltageGateSequence<R>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if channels.is_empty() {
        return Err(eyre::Report::new(BuildError::MissingChannels));
    }
    let mut seen = BTreeSet::new();
    for c in &channels {
        if c.name.is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "channel names must not be empty",
            )));
        }
        if !seen.insert(c.name.as_str()) {
            return Err(eyre::Report::new(BuildError::DuplicateChannel(
                c.name.clone(),
            )));
        }
    }
    let t = &cfg.timing;
    if t.clock_unit_ns == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "clock_unit_ns must be > 0",
        )));
    }
    if t.min_step_ns == 0 || t.min_step_ns % t.clock_unit_ns != 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_step_ns must be a positive multiple of clock_unit_ns",
        )));
    }
    if t.min_ramp_ns == 0 || t.min_ramp_ns % t.clock_unit_ns != 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_ramp_ns must be a positive multiple of clock_unit_ns",
        )));
    }
    if u64::from(t.min_step_ns) > t.max_pulse_ns() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_pulse_cycles must cover min_step_ns",
        )));
    }
    let p = &cfg.pulse;
    if p.operation.is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "pulse operation name must not be empty",
        )));
    }
    if !p.step_amplitude.is_finite() || p.step_amplitude <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "step_amplitude must be > 0",
        )));
    }
    if p.step_length_ns == 0 || p.step_length_ns % t.clock_unit_ns != 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "step_length_ns must be a positive multiple of clock_unit_ns",
        )));
    }
    let c = &cfg.compensation;
    if !c.output_ceiling.is_finite() || c.output_ceiling <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "output_ceiling must be > 0",
        )));
    }
    if !c.zero_tolerance.is_finite() || c.zero_tolerance < 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "zero_tolerance must be >= 0",
        )));
    }
    if !(8..=48).contains(&cfg.precision.frac_bits) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "frac_bits must be in 8..=48",
        )));
    }

    // ── Registration ─────────────────────────────────────────────────────────
    let registration = runtime_config(&channels, &cfg.pulse);
    emitted(runtime.register(&registration), || {
        "registering channels with the runtime".to_string()
    })?;
    tracing::debug!(
        channels = channels.len(),
        strategy = ?strategy,
        "sequence registered"
    );

    let tracker = VoltageStateTracker::new(
        channels.iter().map(|c| c.name.clone()),
        cfg.precision.frac_bits,
    );
    Ok(VoltageGateSequence {
        runtime,
        cfg,
        channels,
        points: BTreeMap::new(),
        tracker,
        strategy,
        vars: RuntimeVars::default(),
    })
}

impl<R: Runtime, C> SequenceBuilder<R, C> {
    /// Fallible build available once a runtime is set; reports missing channels.
    pub fn try_build(self) -> Result<VoltageGateSequence<R>> {
        let cfg = SequenceCfg {
            timing: self.timing.unwrap_or_default(),
            pulse: self.pulse.unwrap_or_default(),
            compensation: self.compensation.unwrap_or_default(),
            precision: self.precision.unwrap_or_default(),
        };
        validate_and_build(
            self.runtime,
            self.channels,
            cfg,
            self.strategy.unwrap_or_else(|| Box::new(DefaultPulseForms)),
        )
    }
}

/// Chainable setters that do not affect type-state.
impl<R, C> SequenceBuilder<R, C> {
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_pulse(mut self, pulse: PulseCfg) -> Self {
        self.pulse = Some(pulse);
        self
    }
    pub fn with_compensation(mut self, compensation: CompensationCfg) -> Self {
        self.compensation = Some(compensation);
        self
    }
    pub fn with_precision(mut self, precision: PrecisionCfg) -> Self {
        self.precision = Some(precision);
        self
    }
    /// Set every section at once.
    pub fn with_config(self, cfg: SequenceCfg) -> Self {
        self.with_timing(cfg.timing)
            .with_pulse(cfg.pulse)
            .with_compensation(cfg.compensation)
            .with_precision(cfg.precision)
    }
    pub fn with_strategy(mut self, strategy: Box<dyn PulseFormStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

// Setters that advance type-state
impl<C> SequenceBuilder<Missing, C> {
    pub fn with_runtime<R: Runtime>(self, runtime: R) -> SequenceBuilder<R, C> {
        SequenceBuilder {
            runtime,
            channels: self.channels,
            timing: self.timing,
            pulse: self.pulse,
            compensation: self.compensation,
            precision: self.precision,
            strategy: self.strategy,
            _c: PhantomData,
        }
    }
}

impl<R> SequenceBuilder<R, Missing> {
    pub fn with_channels<I>(self, channels: I) -> SequenceBuilder<R, Set>
    where
        I: IntoIterator<Item = Channel>,
    {
        SequenceBuilder {
            runtime: self.runtime,
            channels: channels.into_iter().collect(),
            timing: self.timing,
            pulse: self.pulse,
            compensation: self.compensation,
            precision: self.precision,
            strategy: self.strategy,
            _c: PhantomData,
        }
    }
}

impl<R: Runtime> SequenceBuilder<R, Set> {
    /// Validate and build. Only available when the runtime and channels are set.
    pub fn build(self) -> Result<VoltageGateSequence<R>> {
        self.try_build()
    }
}

/// Build a sequence directly from its parts.
///
/// Delegates to the shared `validate_and_build`, no duplicated validation logic.
pub fn build_sequence<R: Runtime>(
    runtime: R,
    channels: Vec<Channel>,
    cfg: SequenceCfg,
    strategy: Option<Box<dyn PulseFormStrategy>>,
) -> Result<VoltageGateSequence<R>> {
    validate_and_build(
        runtime,
        channels,
        cfg,
        strategy.unwrap_or_else(|| Box::new(DefaultPulseForms)),
    )
}
