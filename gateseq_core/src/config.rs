//! Configuration types for the sequence compiler.
//!
//! These are the runtime configuration structs used by `VoltageGateSequence`.
//! They are separate from the TOML-deserialized config in `gateseq_config`.

/// Clock and duration limits of the target runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingCfg {
    /// Granularity of every duration in ns (one clock cycle).
    pub clock_unit_ns: u32,
    /// Shortest non-zero step or hold.
    pub min_step_ns: u32,
    /// Shortest non-zero ramp.
    pub min_ramp_ns: u32,
    /// Longest single play/wait, in clock cycles.
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

impl TimingCfg {
    /// Longest single pulse in ns.
    #[inline]
    pub fn max_pulse_ns(&self) -> u64 {
        u64::from(self.max_pulse_cycles) * u64::from(self.clock_unit_ns)
    }
}

/// The constant pulse every step is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseCfg {
    /// Operation name registered on each channel.
    pub operation: String,
    /// Sample of the constant waveform in volts. Played amplitudes scale it.
    pub step_amplitude: f64,
    pub step_length_ns: u32,
}

impl Default for PulseCfg {
    fn default() -> Self {
        Self {
            operation: "step".to_string(),
            step_amplitude: 0.25,
            step_length_ns: 16,
        }
    }
}

/// Compensation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationCfg {
    /// Exclusive bound of the hardware output; `max_amplitude` must stay below it.
    pub output_ceiling: f64,
    /// Net charge at or below this magnitude (V·ns) counts as zero and emits nothing.
    pub zero_tolerance: f64,
}

impl Default for CompensationCfg {
    fn default() -> Self {
        Self {
            output_ceiling: 0.5,
            zero_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionCfg {
    /// Fractional bits of quantized levels in the charge accumulator, at compile
    /// time and in the run-time integer accumulator. Match it to the runtime's
    /// fixed-point width.
    pub frac_bits: u32,
}

impl Default for PrecisionCfg {
    fn default() -> Self {
        Self { frac_bits: 28 }
    }
}

/// Everything a sequence needs besides its channels and runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceCfg {
    pub timing: TimingCfg,
    pub pulse: PulseCfg,
    pub compensation: CompensationCfg,
    pub precision: PrecisionCfg,
}

/// A sequenced output and the controller port it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub controller: String,
    pub port: u16,
}

impl Channel {
    pub fn new(name: impl Into<String>, controller: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            controller: controller.into(),
            port,
        }
    }
}
