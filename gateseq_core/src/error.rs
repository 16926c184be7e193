use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SequenceError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("unknown voltage point: {0}")]
    UnknownPoint(String),
    #[error("voltage point '{0}' is already registered")]
    DuplicatePoint(String),
    #[error("voltage point '{point}' has {got} levels but the sequence has {expected} channels")]
    LevelCountMismatch {
        point: String,
        expected: usize,
        got: usize,
    },
    #[error("{target}: a step needs a voltage point or at least one explicit level")]
    MissingLevel { target: String },
    #[error("{target}: no duration given and no voltage point default")]
    MissingDuration { target: String },
    #[error("{target}: a ramp needs a ramp duration")]
    MissingRampDuration { target: String },
    #[error("{target}: invalid level {value} on channel {channel}")]
    InvalidLevel {
        target: String,
        channel: String,
        value: f64,
    },
    #[error("{target}: invalid {kind} duration {value} ns ({reason})")]
    InvalidDuration {
        target: String,
        kind: &'static str,
        value: f64,
        reason: String,
    },
    #[error("compensation max_amplitude {value} must be in (0, {ceiling})")]
    InvalidAmplitude { value: f64, ceiling: f64 },
    #[error(
        "channel {channel}: compensating {charge} V·ns at {max_amplitude} V needs {required_ns} ns, above the {limit_ns} ns pulse limit"
    )]
    CompensationHeadroom {
        channel: String,
        charge: f64,
        max_amplitude: f64,
        required_ns: f64,
        limit_ns: u64,
    },
    #[error("channel {channel}: accumulated charge does not fit the run-time 64-bit accumulator")]
    AccumulatorOverflow { channel: String },
    #[error("value not available until the real-time program runs: {0}")]
    NotAvailableUntilRuntime(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing channels")]
    MissingChannels,
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
