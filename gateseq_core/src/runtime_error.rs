//! Maps `Box<dyn Error>` from the runtime boundary to typed `SequenceError`.
//!
//! `gateseq_traits::Runtime` returns boxed errors; this module converts them
//! to our typed enum, with an optional feature-gated path for
//! `gateseq_sim::SimError` downcasting.

use eyre::WrapErr;
use gateseq_traits::RuntimeError;

use crate::error::{Result, SequenceError};

/// Map a runtime-boundary error to a typed `SequenceError`.
pub fn map_runtime_error(e: &(dyn std::error::Error + 'static)) -> SequenceError {
    #[cfg(feature = "sim-errors")]
    {
        if let Some(sim) = e.downcast_ref::<gateseq_sim::SimError>() {
            return match sim {
                gateseq_sim::SimError::UnknownChannel(c) => SequenceError::UnknownChannel(c.clone()),
                other => SequenceError::Runtime(other.to_string()),
            };
        }
    }

    SequenceError::Runtime(e.to_string())
}

/// Convert a runtime call result, naming what was being emitted.
pub(crate) fn emitted<T>(
    res: std::result::Result<T, RuntimeError>,
    what: impl FnOnce() -> String,
) -> Result<T> {
    res.map_err(|e| eyre::Report::new(map_runtime_error(e.as_ref())))
        .wrap_err_with(what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_errors_keep_their_message() {
        let e = std::io::Error::other("link down");
        assert_eq!(
            map_runtime_error(&e),
            SequenceError::Runtime("link down".into())
        );
    }

    #[cfg(feature = "sim-errors")]
    #[test]
    fn sim_unknown_channel_maps_to_typed_variant() {
        let e = gateseq_sim::SimError::UnknownChannel("P7".into());
        assert_eq!(
            map_runtime_error(&e),
            SequenceError::UnknownChannel("P7".into())
        );
    }

    #[test]
    fn emitted_errors_downcast_through_context() {
        let res: std::result::Result<(), RuntimeError> =
            Err(Box::new(std::io::Error::other("boom")));
        let err = emitted(res, || "play on P1".to_string()).expect_err("fails");
        assert!(matches!(
            err.downcast_ref::<SequenceError>(),
            Some(SequenceError::Runtime(_))
        ));
        assert_eq!(err.to_string(), "play on P1");
    }
}
