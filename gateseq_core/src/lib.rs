#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Voltage-gate pulse-sequence compiler (runtime-agnostic).
//!
//! This crate turns named voltage points, steps, ramps and compensation
//! requests into play/ramp/wait primitives of a real-time runtime. All runtime
//! interactions go through the `gateseq_traits::Runtime` trait.
//!
//! ## Architecture
//!
//! - **Values**: compile-time numbers or run-time expressions (`value` module)
//! - **Tracking**: per-channel level and accumulated charge (`tracker` module)
//! - **Planning**: steps and ramps are validated for every channel before emission (`planner`)
//! - **Compensation**: per-channel pulses that return the net charge to zero (`compensation`)
//! - **Encoding**: pluggable pulse-form choice per step (`strategy` module)
//!
//! ## Fixed-Point Arithmetic
//!
//! Compile-time charge is accumulated exactly as an `i128` of twice the V·ns
//! integral, with levels quantized to `PrecisionCfg::frac_bits` fractional bits.
//! See `fixed_point` for the conversions. Run-time charge keeps the same unit
//! in a 64-bit integer runtime variable, so both paths add identical words.
//!
//! ## Example
//!
//! ```
//! use gateseq_core::{Channel, Step, VoltageGateSequence};
//! use gateseq_core::mocks::NullRuntime;
//!
//! let mut seq = VoltageGateSequence::builder()
//!     .with_runtime(NullRuntime::default())
//!     .with_channels([Channel::new("P1", "con1", 1), Channel::new("P2", "con1", 2)])
//!     .build()?;
//! seq.add_points("load", [0.25, -0.1], 1000u64)?;
//! seq.add_step(Step::to_point("load"))?;
//! let pulses = seq.add_compensation_pulse(0.2, None)?;
//! assert_eq!(pulses.len(), 2);
//! seq.ramp_to_zero(None)?;
//! # Ok::<(), gateseq_core::Report>(())
//! ```

pub mod builder;
pub mod compensation;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fixed_point;
pub mod mocks;
pub mod planner;
pub mod point;
pub mod registration;
pub mod runtime_error;
pub mod sequence;
pub mod step;
pub mod strategy;
pub mod tracker;
pub mod util;
pub mod value;

pub use builder::{Missing, SequenceBuilder, Set, build_sequence};
pub use compensation::CompensationResult;
pub use config::{Channel, CompensationCfg, PrecisionCfg, PulseCfg, SequenceCfg, TimingCfg};
pub use error::{BuildError, Report, Result, SequenceError};
pub use planner::StepPlan;
pub use point::VoltagePoint;
pub use sequence::VoltageGateSequence;
pub use step::Step;
pub use strategy::{
    AlwaysScaled, DefaultPulseForms, PulseForm, PulseFormStrategy, strategy_by_name,
};
pub use tracker::{Charge, ChannelState, VoltageStateTracker};
pub use value::Value;
