//! Runtime configuration the emitted operation names resolve against.

use std::collections::BTreeMap;

use gateseq_traits::{Element, PulseDef, RuntimeConfig, WaveformDef};

use crate::config::{Channel, PulseCfg};

pub const STEP_PULSE: &str = "step_pulse";
pub const STEP_WAVEFORM: &str = "step_wf";

/// One sticky element per channel, each with the step operation bound to a
/// constant waveform of `pulse.step_amplitude`.
pub fn runtime_config(channels: &[Channel], pulse: &PulseCfg) -> RuntimeConfig {
    let elements = channels
        .iter()
        .map(|c| {
            (
                c.name.clone(),
                Element {
                    controller: c.controller.clone(),
                    port: c.port,
                    operations: BTreeMap::from([(pulse.operation.clone(), STEP_PULSE.to_string())]),
                    sticky: true,
                },
            )
        })
        .collect();
    RuntimeConfig {
        elements,
        pulses: BTreeMap::from([(
            STEP_PULSE.to_string(),
            PulseDef {
                length_ns: pulse.step_length_ns,
                waveform: STEP_WAVEFORM.to_string(),
            },
        )]),
        waveforms: BTreeMap::from([(
            STEP_WAVEFORM.to_string(),
            WaveformDef::Constant {
                sample: pulse.step_amplitude,
            },
        )]),
    }
}
