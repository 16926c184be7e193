//! Piecewise-linear per-channel output produced by executing a program.

use std::collections::BTreeMap;

use gateseq_traits::VarId;

/// One linear piece of a channel's output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start_ns: u64,
    pub duration_ns: u64,
    pub from: f64,
    pub to: f64,
}

impl Segment {
    #[inline]
    pub fn end_ns(&self) -> u64 {
        self.start_ns + self.duration_ns
    }

    /// Time integral of the level over the segment, in V·ns.
    #[inline]
    pub fn integral(&self) -> f64 {
        (self.from + self.to) * 0.5 * self.duration_ns as f64
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Track {
    pub(crate) t_ns: u64,
    pub(crate) level: f64,
    pub(crate) segments: Vec<Segment>,
}

impl Track {
    pub(crate) fn push(&mut self, duration_ns: u64, to: f64) {
        if duration_ns > 0 {
            self.segments.push(Segment {
                start_ns: self.t_ns,
                duration_ns,
                from: self.level,
                to,
            });
            self.t_ns += duration_ns;
        }
        self.level = to;
    }

    pub(crate) fn hold(&mut self, duration_ns: u64) {
        let level = self.level;
        self.push(duration_ns, level);
    }
}

/// Executed output of every registered channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub(crate) tracks: BTreeMap<String, Track>,
    /// Variable values at the end of the program, indexed by `VarId`.
    pub(crate) variables: Vec<f64>,
}

impl Waveform {
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    /// Segments of `channel`; empty for unknown channels.
    pub fn segments(&self, channel: &str) -> &[Segment] {
        self.tracks
            .get(channel)
            .map(|t| t.segments.as_slice())
            .unwrap_or(&[])
    }

    /// Total V·ns integral of `channel`.
    pub fn integral(&self, channel: &str) -> f64 {
        self.segments(channel).iter().map(Segment::integral).sum()
    }

    /// V·ns integral over `[from_ns, to_ns)`.
    pub fn integral_between(&self, channel: &str, from_ns: u64, to_ns: u64) -> f64 {
        self.segments(channel)
            .iter()
            .filter_map(|s| {
                let a = s.start_ns.max(from_ns);
                let b = s.end_ns().min(to_ns);
                if b <= a {
                    return None;
                }
                let span = s.duration_ns as f64;
                let level_at = |t: u64| s.from + (s.to - s.from) * ((t - s.start_ns) as f64 / span);
                Some((level_at(a) + level_at(b)) * 0.5 * (b - a) as f64)
            })
            .sum()
    }

    pub fn final_level(&self, channel: &str) -> f64 {
        self.tracks.get(channel).map(|t| t.level).unwrap_or(0.0)
    }

    pub fn duration_ns(&self, channel: &str) -> u64 {
        self.tracks.get(channel).map(|t| t.t_ns).unwrap_or(0)
    }

    /// Value of `var` after the last instruction.
    pub fn variable(&self, var: VarId) -> Option<f64> {
        self.variables.get(var.index() as usize).copied()
    }
}
