//! Test and helper runtimes for gateseq_core

use gateseq_traits::{Expr, NumKind, Runtime, RuntimeConfig, RuntimeError, VarId};

/// Accepts every instruction and discards it; counts what it was given.
/// Useful for benchmarks and for checking validation without a program.
#[derive(Debug, Default)]
pub struct NullRuntime {
    next_var: u32,
    pub instructions: usize,
}

impl Runtime for NullRuntime {
    fn register(&mut self, _config: &RuntimeConfig) -> Result<(), RuntimeError> {
        Ok(())
    }
    fn declare(&mut self, _kind: NumKind, _init: Option<f64>) -> Result<VarId, RuntimeError> {
        let id = VarId::new(self.next_var);
        self.next_var += 1;
        Ok(id)
    }
    fn assign(&mut self, _var: VarId, _value: &Expr) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
    fn play(&mut self, _: &str, _: &str, _: &Expr, _: &Expr) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
    fn ramp(&mut self, _: &str, _: &Expr, _: &Expr) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
    fn wait(&mut self, _: &str, _: &Expr) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
    fn ramp_to_zero(&mut self, _: &str, _: Option<u32>) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
    fn align(&mut self, _: &[String]) -> Result<(), RuntimeError> {
        self.instructions += 1;
        Ok(())
    }
}

/// A runtime that refuses registration; useful to exercise error propagation.
pub struct RejectingRuntime;

impl Runtime for RejectingRuntime {
    fn register(&mut self, _config: &RuntimeConfig) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn declare(&mut self, _: NumKind, _: Option<f64>) -> Result<VarId, RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn assign(&mut self, _: VarId, _: &Expr) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn play(&mut self, _: &str, _: &str, _: &Expr, _: &Expr) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn ramp(&mut self, _: &str, _: &Expr, _: &Expr) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn wait(&mut self, _: &str, _: &Expr) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn ramp_to_zero(&mut self, _: &str, _: Option<u32>) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
    fn align(&mut self, _: &[String]) -> Result<(), RuntimeError> {
        Err(Box::new(std::io::Error::other("controller unreachable")))
    }
}
