//! Element / pulse / waveform definitions registered with the runtime.

use std::collections::BTreeMap;

use serde::Serialize;

/// Configuration a runtime needs before the emitted operation names resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuntimeConfig {
    pub elements: BTreeMap<String, Element>,
    pub pulses: BTreeMap<String, PulseDef>,
    pub waveforms: BTreeMap<String, WaveformDef>,
}

/// One output channel bound to a controller port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub controller: String,
    pub port: u16,
    /// Operation name -> pulse name.
    pub operations: BTreeMap<String, String>,
    /// Output holds its last level between pulses.
    pub sticky: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseDef {
    pub length_ns: u32,
    pub waveform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WaveformDef {
    Constant { sample: f64 },
}

impl RuntimeConfig {
    /// Resolve `operation` on `channel` to the sample of its constant waveform.
    pub fn constant_sample(&self, channel: &str, operation: &str) -> Option<f64> {
        let pulse = self.elements.get(channel)?.operations.get(operation)?;
        let wf = &self.pulses.get(pulse)?.waveform;
        match self.waveforms.get(wf)? {
            WaveformDef::Constant { sample } => Some(*sample),
        }
    }
}
