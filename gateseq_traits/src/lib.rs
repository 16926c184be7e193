//! Interface to the real-time control runtime that executes compiled sequences.
//!
//! The sequence compiler never evaluates run-time values itself. It declares
//! variables, assigns [`Expr`] trees to them and emits play/ramp/wait primitives
//! through [`Runtime`]; the runtime executes them later on dedicated hardware.

pub mod expr;
pub mod registration;

pub use expr::{BinaryOp, EvalError, Expr, NumKind, UnaryOp, VarId};
pub use registration::{Element, PulseDef, RuntimeConfig, WaveformDef};

/// Error type crossing the runtime boundary.
pub type RuntimeError = Box<dyn std::error::Error + Send + Sync>;

/// Primitives of the real-time runtime consumed by the compiler.
///
/// Durations are expressed in clock cycles of the runtime. Amplitudes passed to
/// [`Runtime::play`] scale the registered waveform of the named operation.
pub trait Runtime {
    /// Register elements, pulses and waveforms so operation names resolve.
    fn register(&mut self, config: &RuntimeConfig) -> Result<(), RuntimeError>;

    /// Declare a mutable run-time variable, optionally initialized.
    fn declare(&mut self, kind: NumKind, init: Option<f64>) -> Result<VarId, RuntimeError>;

    fn assign(&mut self, var: VarId, value: &Expr) -> Result<(), RuntimeError>;

    /// Play `operation` on `channel`, scaled by `amplitude`, for `cycles` clock cycles.
    fn play(
        &mut self,
        channel: &str,
        operation: &str,
        amplitude: &Expr,
        cycles: &Expr,
    ) -> Result<(), RuntimeError>;

    /// Linear ramp with `slope` in volts per nanosecond over `cycles` clock cycles.
    fn ramp(&mut self, channel: &str, slope: &Expr, cycles: &Expr) -> Result<(), RuntimeError>;

    fn wait(&mut self, channel: &str, cycles: &Expr) -> Result<(), RuntimeError>;

    /// Ramp the channel output to exactly zero. `None` uses the runtime's shortest ramp.
    fn ramp_to_zero(&mut self, channel: &str, cycles: Option<u32>) -> Result<(), RuntimeError>;

    /// Synchronize the timelines of the given channels.
    fn align(&mut self, channels: &[String]) -> Result<(), RuntimeError>;
}

impl<R: Runtime + ?Sized> Runtime for Box<R> {
    fn register(&mut self, config: &RuntimeConfig) -> Result<(), RuntimeError> {
        (**self).register(config)
    }
    fn declare(&mut self, kind: NumKind, init: Option<f64>) -> Result<VarId, RuntimeError> {
        (**self).declare(kind, init)
    }
    fn assign(&mut self, var: VarId, value: &Expr) -> Result<(), RuntimeError> {
        (**self).assign(var, value)
    }
    fn play(
        &mut self,
        channel: &str,
        operation: &str,
        amplitude: &Expr,
        cycles: &Expr,
    ) -> Result<(), RuntimeError> {
        (**self).play(channel, operation, amplitude, cycles)
    }
    fn ramp(&mut self, channel: &str, slope: &Expr, cycles: &Expr) -> Result<(), RuntimeError> {
        (**self).ramp(channel, slope, cycles)
    }
    fn wait(&mut self, channel: &str, cycles: &Expr) -> Result<(), RuntimeError> {
        (**self).wait(channel, cycles)
    }
    fn ramp_to_zero(&mut self, channel: &str, cycles: Option<u32>) -> Result<(), RuntimeError> {
        (**self).ramp_to_zero(channel, cycles)
    }
    fn align(&mut self, channels: &[String]) -> Result<(), RuntimeError> {
        (**self).align(channels)
    }
}
