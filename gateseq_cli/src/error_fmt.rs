//! Human-readable error descriptions and structured JSON error formatting.

use crate::simulate::ResidualExceeded;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use gateseq_core::error::{BuildError, SequenceError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingChannels => {
                "What happened: No channels were given to the sequence.\nLikely causes: The config has no [[channels]] entries.\nHow to fix: Add one [[channels]] table (name, port) per gate electrode.".to_string()
            }
            BuildError::DuplicateChannel(name) => format!(
                "What happened: Channel '{name}' is declared twice.\nLikely causes: A copy-pasted [[channels]] table.\nHow to fix: Give every channel a unique name."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [timing], [pulses], [compensation] or [precision].\nHow to fix: Edit the config file, then rerun `gateseq check`."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<ResidualExceeded>() {
        return format!(
            "What happened: {re}.\nLikely causes: Run-time inputs drove the compensation outside the fixed-point range, or the tolerance is tighter than the level quantization.\nHow to fix: Check the --set values and compensation.max_amplitude, or raise compensation.residual_tolerance."
        );
    }

    if let Some(se) = err.downcast_ref::<SequenceError>() {
        let hint = match se {
            SequenceError::UnknownChannel(_) => {
                "A [[sequence]] step names a channel missing from [[channels]]."
            }
            SequenceError::UnknownPoint(_) => {
                "A step refers to a point that is not declared under [[points]]."
            }
            SequenceError::DuplicatePoint(_) => "Two [[points]] share a name.",
            SequenceError::LevelCountMismatch { .. } => {
                "A point needs exactly one level per channel, in [[channels]] order."
            }
            SequenceError::InvalidDuration { .. } => {
                "Durations must be whole multiples of timing.clock_unit_ns and at least the minimum step or ramp."
            }
            SequenceError::InvalidAmplitude { .. } => {
                "max_amplitude must be positive and below compensation.output_ceiling."
            }
            SequenceError::AccumulatorOverflow { .. } => {
                "The window is too long to carry into run time; compensate more often."
            }
            SequenceError::CompensationHeadroom { .. } => {
                "The accumulated charge is too large for one pulse at this amplitude; raise max_amplitude or compensate more often."
            }
            SequenceError::Runtime(_) => {
                "The runtime refused an instruction; run with --log-level=debug to see which."
            }
            _ => "See the message above; run with --log-level=debug for the emitted instructions.",
        };
        return format!("What happened: {err:#}.\nHow to fix: {hint}");
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Pass an existing file with --config <FILE>."
        );
    }
    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this schema ({msg}).\nHow to fix: Check the field names and the `op` of every [[sequence]] entry."
        );
    }
    if lower.starts_with("channels")
        || lower.starts_with("timing.")
        || lower.starts_with("pulses.")
        || lower.starts_with("compensation.")
        || lower.starts_with("precision.")
        || lower.starts_with("logging.")
        || lower.starts_with("variables")
        || lower.starts_with("points")
        || lower.starts_with("sequence")
    {
        return format!(
            "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the config file, then rerun `gateseq check`."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason name used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    use gateseq_core::error::{BuildError, SequenceError};
    if err.downcast_ref::<ResidualExceeded>().is_some() {
        return "ResidualExceeded";
    }
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingChannels => "MissingChannels",
            BuildError::DuplicateChannel(_) => "DuplicateChannel",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    if let Some(se) = err.downcast_ref::<SequenceError>() {
        return match se {
            SequenceError::UnknownChannel(_) => "UnknownChannel",
            SequenceError::UnknownPoint(_) => "UnknownPoint",
            SequenceError::DuplicatePoint(_) => "DuplicatePoint",
            SequenceError::LevelCountMismatch { .. } => "LevelCountMismatch",
            SequenceError::MissingLevel { .. } => "MissingLevel",
            SequenceError::MissingDuration { .. } => "MissingDuration",
            SequenceError::MissingRampDuration { .. } => "MissingRampDuration",
            SequenceError::InvalidLevel { .. } => "InvalidLevel",
            SequenceError::InvalidDuration { .. } => "InvalidDuration",
            SequenceError::InvalidAmplitude { .. } => "InvalidAmplitude",
            SequenceError::CompensationHeadroom { .. } => "CompensationHeadroom",
            SequenceError::AccumulatorOverflow { .. } => "AccumulatorOverflow",
            SequenceError::NotAvailableUntilRuntime(_) => "NotAvailableUntilRuntime",
            SequenceError::Runtime(_) => "Runtime",
        };
    }
    "Error"
}

/// Residual failures exit with 3; everything else is a validation or compile error (1).
/// Usage errors exit with 2 from clap.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ResidualExceeded>().is_some() {
        return 3;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(re) = err.downcast_ref::<ResidualExceeded>() {
        return json!({
            "reason": reason_name(err),
            "details": { "channel": re.channel, "residual_vns": re.residual, "tolerance_vns": re.tolerance },
            "message": humanize(err),
        })
        .to_string();
    }
    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
