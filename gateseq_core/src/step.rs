//! Step and ramp requests.

use crate::value::Value;

/// One step or ramp applied to every channel at once.
///
/// Levels come from a named voltage point, explicit per-channel levels, or
/// both (explicit levels override the point). Channels named by neither keep
/// their current level for the same duration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub(crate) point: Option<String>,
    pub(crate) levels: Vec<(String, Value)>,
    pub(crate) duration: Option<Value>,
    pub(crate) ramp: Option<Value>,
}

impl Step {
    /// Step to a registered voltage point.
    pub fn to_point(name: impl Into<String>) -> Self {
        Self {
            point: Some(name.into()),
            ..Self::default()
        }
    }

    /// Step with explicit levels for the named channels.
    pub fn levels<I, S, V>(levels: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        Self {
            levels: levels
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Set or override the level of one channel.
    pub fn level(mut self, channel: impl Into<String>, level: impl Into<Value>) -> Self {
        let channel = channel.into();
        let level = level.into();
        match self.levels.iter_mut().find(|(c, _)| *c == channel) {
            Some(slot) => slot.1 = level,
            None => self.levels.push((channel, level)),
        }
        self
    }

    /// Hold time in ns after reaching the level.
    pub fn duration(mut self, ns: impl Into<Value>) -> Self {
        self.duration = Some(ns.into());
        self
    }

    /// Ramp time in ns. Without it, `add_step` jumps instantaneously.
    pub fn ramp(mut self, ns: impl Into<Value>) -> Self {
        self.ramp = Some(ns.into());
        self
    }

    pub fn point_name(&self) -> Option<&str> {
        self.point.as_deref()
    }

    /// Label used in logs and errors.
    pub fn label(&self) -> String {
        match &self.point {
            Some(p) => format!("point '{p}'"),
            None => "explicit levels".to_string(),
        }
    }
}
