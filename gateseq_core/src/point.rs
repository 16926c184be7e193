//! Named voltage presets.

use crate::value::Value;

/// A reusable (levels, default duration) pair, one level per channel in
/// sequence channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltagePoint {
    pub name: String,
    pub levels: Vec<Value>,
    pub duration: Value,
}

impl VoltagePoint {
    pub fn level(&self, index: usize) -> Option<&Value> {
        self.levels.get(index)
    }
}
