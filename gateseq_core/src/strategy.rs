//! Pulse-form selection.
//!
//! How a step is encoded for the runtime is an instruction-economy concern:
//! every form plays the same waveform. A strategy may ask for a more general
//! form than the inputs need, never a less general one.

use std::fmt::Debug;

/// Encoding of one step, from cheapest to most general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PulseForm {
    /// Amplitude and length are literals in the instruction.
    Constant,
    /// Amplitude comes from a run-time variable; length is a literal.
    Scaled,
    /// Amplitude and length both come from run-time variables.
    DurationParameterized,
}

impl PulseForm {
    /// Least general form able to encode a step with these inputs.
    pub fn required(level_known: bool, duration_known: bool) -> Self {
        match (level_known, duration_known) {
            (true, true) => PulseForm::Constant,
            (false, true) => PulseForm::Scaled,
            (_, false) => PulseForm::DurationParameterized,
        }
    }
}

pub trait PulseFormStrategy: Debug {
    fn form(&self, level_known: bool, duration_known: bool) -> PulseForm;
}

/// Cheapest form the inputs allow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPulseForms;

impl PulseFormStrategy for DefaultPulseForms {
    fn form(&self, level_known: bool, duration_known: bool) -> PulseForm {
        PulseForm::required(level_known, duration_known)
    }
}

/// Always route amplitudes through a run-time variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysScaled;

impl PulseFormStrategy for AlwaysScaled {
    fn form(&self, level_known: bool, duration_known: bool) -> PulseForm {
        PulseForm::required(level_known, duration_known).max(PulseForm::Scaled)
    }
}

/// Strategy choice, clamped so the form can encode the inputs.
pub fn effective_form(
    strategy: &dyn PulseFormStrategy,
    level_known: bool,
    duration_known: bool,
) -> PulseForm {
    strategy
        .form(level_known, duration_known)
        .max(PulseForm::required(level_known, duration_known))
}

/// Strategy by configuration name.
pub fn strategy_by_name(name: &str) -> Option<Box<dyn PulseFormStrategy>> {
    match name {
        "default" => Some(Box::new(DefaultPulseForms)),
        "always-scaled" => Some(Box::new(AlwaysScaled)),
        _ => None,
    }
}
