//! Per-channel level and charge bookkeeping.
//!
//! Each channel tracks two levels: `level` is the last requested target and
//! `held` is the level actually on the output. They differ only after a
//! zero-duration step, whose jump is played by the next emitted segment.
//!
//! Charge is twice the V·ns integral in units of `2^-frac_bits`, exact while
//! every contribution is known at compile time. The first run-time
//! contribution promotes the channel to a [`Charge::Deferred`] integer
//! expression in the same unit, which the sequence stores in a run-time `Int`
//! variable. Levels enter it through [`Expr::quantize`], so the run-time sum is
//! as exact as the compile-time one. Promotion is one-way until the next
//! discharge.

use std::collections::BTreeMap;

use gateseq_traits::{Expr, VarId};

use crate::error::{Result, SequenceError};
use crate::fixed_point::{area2_to_volt_ns, quantize_level, ramp_area2, step_area2, volt_ns_per_area2};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Charge {
    /// Twice the V·ns integral in units of `2^-frac_bits`.
    Exact(i128),
    /// Same unit, as a run-time integer expression.
    Deferred(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub level: Value,
    pub held: Value,
    pub charge: Charge,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            level: Value::Known(0.0),
            held: Value::Known(0.0),
            charge: Charge::Exact(0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoltageStateTracker {
    frac_bits: u32,
    states: BTreeMap<String, ChannelState>,
}

impl VoltageStateTracker {
    pub fn new<I, S>(channels: I, frac_bits: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut t = Self {
            frac_bits,
            states: BTreeMap::new(),
        };
        t.initialize(channels);
        t
    }

    /// Zero level and charge for every channel, dropping any previous state.
    pub fn initialize<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = channels
            .into_iter()
            .map(|c| (c.into(), ChannelState::default()))
            .collect();
    }

    pub fn state(&self, channel: &str) -> Result<&ChannelState> {
        self.states
            .get(channel)
            .ok_or_else(|| eyre::Report::new(SequenceError::UnknownChannel(channel.to_string())))
    }

    fn state_mut(&mut self, channel: &str) -> Result<&mut ChannelState> {
        self.states
            .get_mut(channel)
            .ok_or_else(|| eyre::Report::new(SequenceError::UnknownChannel(channel.to_string())))
    }

    pub fn level(&self, channel: &str) -> Result<&Value> {
        Ok(&self.state(channel)?.level)
    }

    pub fn held(&self, channel: &str) -> Result<&Value> {
        Ok(&self.state(channel)?.held)
    }

    pub fn frac_bits(&self) -> u32 {
        self.frac_bits
    }

    /// Accumulated charge in V·ns since the last discharge.
    ///
    /// A run-time charge comes back as the ideal V·ns expression for
    /// diagnostics; it is not meant to be emitted.
    pub fn accumulated(&self, channel: &str) -> Result<Value> {
        Ok(match &self.state(channel)?.charge {
            Charge::Exact(a) => Value::Known(area2_to_volt_ns(*a, self.frac_bits)),
            Charge::Deferred(e) => {
                Value::Deferred(e.clone() * Expr::lit(volt_ns_per_area2(self.frac_bits)))
            }
        })
    }

    /// Doubled charge as a run-time integer expression.
    pub fn area2_expr(&self, channel: &str) -> Result<Expr> {
        match &self.state(channel)?.charge {
            Charge::Exact(a) => exact_int(channel, *a),
            Charge::Deferred(e) => Ok(e.clone()),
        }
    }

    /// Constant segment at `level` for `duration_ns`. A zero duration only moves `level`.
    pub fn record_step(&mut self, channel: &str, level: &Value, duration_ns: &Value) -> Result<()> {
        let frac_bits = self.frac_bits;
        let st = self.state_mut(channel)?;
        if duration_ns.is_known_zero() {
            st.level = level.clone();
            return Ok(());
        }
        st.charge = match (&st.charge, level.as_known(), duration_ns.as_known()) {
            (Charge::Exact(a), Some(l), Some(d)) => {
                Charge::Exact(a + step_area2(quantize_level(l, frac_bits), d as u64))
            }
            (prev, _, _) => {
                let contribution =
                    Expr::int(2) * level_word(level, frac_bits) * duration_word(duration_ns);
                promote(channel, prev, contribution)?
            }
        };
        st.level = level.clone();
        st.held = level.clone();
        tracing::trace!(channel, charge = ?st.charge, "step recorded");
        Ok(())
    }

    /// Linear segment from the held level to `level` over `ramp_ns`. A zero
    /// ramp degenerates to a zero-duration step.
    pub fn record_ramp(&mut self, channel: &str, level: &Value, ramp_ns: &Value) -> Result<()> {
        if ramp_ns.is_known_zero() {
            return self.record_step(channel, level, ramp_ns);
        }
        let frac_bits = self.frac_bits;
        let st = self.state_mut(channel)?;
        st.charge = match (
            &st.charge,
            st.held.as_known(),
            level.as_known(),
            ramp_ns.as_known(),
        ) {
            (Charge::Exact(a), Some(from), Some(to), Some(r)) => Charge::Exact(
                a + ramp_area2(
                    quantize_level(from, frac_bits),
                    quantize_level(to, frac_bits),
                    r as u64,
                ),
            ),
            (prev, _, _, _) => {
                let contribution = (level_word(&st.held, frac_bits) + level_word(level, frac_bits))
                    * duration_word(ramp_ns);
                promote(channel, prev, contribution)?
            }
        };
        st.level = level.clone();
        st.held = level.clone();
        tracing::trace!(channel, charge = ?st.charge, "ramp recorded");
        Ok(())
    }

    /// Hold the current output for `duration_ns` without changing the target.
    pub fn record_hold(&mut self, channel: &str, duration_ns: &Value) -> Result<()> {
        if duration_ns.is_known_zero() {
            return Ok(());
        }
        let frac_bits = self.frac_bits;
        let st = self.state_mut(channel)?;
        st.charge = match (&st.charge, st.held.as_known(), duration_ns.as_known()) {
            (Charge::Exact(a), Some(l), Some(d)) => {
                Charge::Exact(a + step_area2(quantize_level(l, frac_bits), d as u64))
            }
            (prev, _, _) => {
                let contribution =
                    Expr::int(2) * level_word(&st.held, frac_bits) * duration_word(duration_ns);
                promote(channel, prev, contribution)?
            }
        };
        tracing::trace!(channel, charge = ?st.charge, "hold recorded");
        Ok(())
    }

    /// Deferred charge that has not been stored in a run-time variable yet.
    pub fn pending_charge(&self, channel: &str) -> Result<Option<Expr>> {
        Ok(match &self.state(channel)?.charge {
            Charge::Deferred(Expr::Var(_)) | Charge::Exact(_) => None,
            Charge::Deferred(e) => Some(e.clone()),
        })
    }

    /// Record that the deferred charge now lives in `var`.
    pub fn settle_charge(&mut self, channel: &str, var: VarId) -> Result<()> {
        self.state_mut(channel)?.charge = Charge::Deferred(Expr::var(var));
        Ok(())
    }

    /// Close the accumulation window with the output sitting at `level`.
    pub fn discharge(&mut self, channel: &str, level: Value) -> Result<()> {
        let st = self.state_mut(channel)?;
        st.held = level.clone();
        st.level = level;
        st.charge = Charge::Exact(0);
        Ok(())
    }

    /// Drop the accumulated charge, leaving both levels as they are.
    pub fn clear_charge(&mut self, channel: &str) -> Result<()> {
        self.state_mut(channel)?.charge = Charge::Exact(0);
        Ok(())
    }

    /// Zero level and charge.
    pub fn reset(&mut self, channel: &str) -> Result<()> {
        self.discharge(channel, Value::Known(0.0))
    }
}

/// Fixed-point word of a level.
fn level_word(level: &Value, frac_bits: u32) -> Expr {
    match level {
        Value::Known(l) => Expr::int(quantize_level(*l, frac_bits)),
        Value::Deferred(e) => e.clone().quantize(frac_bits),
    }
}

/// Whole nanoseconds of a duration.
fn duration_word(duration_ns: &Value) -> Expr {
    match duration_ns {
        Value::Known(d) => Expr::int(*d as i64),
        Value::Deferred(e) => e.clone(),
    }
}

fn exact_int(channel: &str, area2: i128) -> Result<Expr> {
    i64::try_from(area2).map(Expr::int).map_err(|_| {
        eyre::Report::new(SequenceError::AccumulatorOverflow {
            channel: channel.to_string(),
        })
    })
}

fn promote(channel: &str, prev: &Charge, contribution: Expr) -> Result<Charge> {
    let base = match prev {
        Charge::Exact(0) => return Ok(Charge::Deferred(contribution)),
        Charge::Exact(a) => exact_int(channel, *a)?,
        Charge::Deferred(e) => e.clone(),
    };
    Ok(Charge::Deferred(base + contribution))
}
