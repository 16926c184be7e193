//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "gateseq",
    version,
    about = "Compile charge-compensated voltage-gate pulse sequences"
)]
pub struct Cli {
    /// Path to the sequence TOML
    #[arg(long, value_name = "FILE", default_value = "gateseq.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON, log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the [[sequence]] script and print the instruction listing
    Compile,
    /// Compile, execute on the simulator and report per-channel charge
    Simulate {
        /// Rebind a declared variable before execution, e.g. --set v1=0.4
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_binding)]
        set: Vec<(String, f64)>,
    },
    /// Print the runtime registration (elements, operations, waveforms) as JSON
    Config,
    /// Parse and validate the config only
    Check,
}

/// Parse `NAME=VALUE`.
pub fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value in '{s}': {e}"))?;
    Ok((name.to_string(), value))
}
