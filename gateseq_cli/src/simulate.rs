//! Execute a compiled sequence on the simulator and check charge neutrality.

use gateseq_core::Value;
use gateseq_core::error::Result as CoreResult;
use gateseq_sim::Waveform;
use serde_json::json;
use thiserror::Error;

use crate::compile::Compiled;

/// Per-channel outcome of one simulated run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReport {
    pub channel: String,
    /// Total V·ns integral of the played output.
    pub integral: f64,
    pub final_level: f64,
    pub duration_ns: u64,
    /// Integral not explained by alignment padding; only when the script ends
    /// in a compensation.
    pub residual: Option<f64>,
}

impl ChannelReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "channel": self.channel,
            "integral_vns": self.integral,
            "final_level_v": self.final_level,
            "duration_ns": self.duration_ns,
            "residual_vns": self.residual,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("channel {channel}: residual charge {residual} V·ns exceeds tolerance {tolerance} V·ns")]
pub struct ResidualExceeded {
    pub channel: String,
    pub residual: f64,
    pub tolerance: f64,
}

/// Rebind `bindings`, execute and report every channel.
pub fn simulate(compiled: &mut Compiled, bindings: &[(String, f64)]) -> CoreResult<Vec<ChannelReport>> {
    for (name, value) in bindings {
        let var = *compiled
            .vars
            .get(name)
            .ok_or_else(|| eyre::eyre!("--set {name}: unknown variable"))?;
        compiled.seq.runtime_mut().bind(var, *value)?;
        tracing::debug!(name = %name, value, "variable rebound");
    }
    let wf = compiled.seq.runtime().execute()?;

    let mut reports = Vec::new();
    for channel in compiled.seq.channel_names() {
        let residual = match &compiled.final_compensation {
            Some(_) => {
                let carried = compiled.seq.accumulated_charge(&channel)?;
                Some(wf.integral(&channel) - evaluate(&carried, &wf)?)
            }
            None => None,
        };
        reports.push(ChannelReport {
            integral: wf.integral(&channel),
            final_level: wf.final_level(&channel),
            duration_ns: wf.duration_ns(&channel),
            residual,
            channel,
        });
    }
    Ok(reports)
}

/// Resolve a value against the variables at the end of the run.
fn evaluate(v: &Value, wf: &Waveform) -> CoreResult<f64> {
    match v {
        Value::Known(x) => Ok(*x),
        Value::Deferred(e) => Ok(e.evaluate(&|var| wf.variable(var))?),
    }
}

/// First channel whose residual is above `tolerance`.
pub fn check_residuals(reports: &[ChannelReport], tolerance: f64) -> Result<(), ResidualExceeded> {
    for r in reports {
        if let Some(residual) = r.residual
            && residual.abs() > tolerance
        {
            return Err(ResidualExceeded {
                channel: r.channel.clone(),
                residual,
                tolerance,
            });
        }
    }
    Ok(())
}

/// Fixed-width table for the console.
pub fn render_table(reports: &[ChannelReport]) -> String {
    let mut out = format!(
        "{:<8} {:>14} {:>12} {:>12} {:>14}\n",
        "channel", "integral V·ns", "final V", "length ns", "residual V·ns"
    );
    for r in reports {
        let residual = r
            .residual
            .map(|x| format!("{x:.3e}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<8} {:>14.6} {:>12.6} {:>12} {:>14}\n",
            r.channel, r.integral, r.final_level, r.duration_ns, residual
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use rstest::rstest;

    const SCRIPT: &str = r#"
[[channels]]
name = "P1"
port = 1

[[channels]]
name = "P2"
port = 2

[[variables]]
name = "v1"
init = 0.8

[[points]]
name = "init"
levels = ["v1", -0.1]
duration = 1000

[[points]]
name = "idle"
levels = [0.5, -0.3]
duration = 100

[[sequence]]
op = "step"
point = "init"

[[sequence]]
op = "step"
point = "idle"

[[sequence]]
op = "compensate"
max_amplitude = 0.2
"#;

    fn compiled() -> Compiled {
        let cfg = gateseq_config::load_toml(SCRIPT).expect("parse");
        cfg.validate().expect("valid");
        compile(&cfg).expect("compile")
    }

    fn report(residual: Option<f64>) -> ChannelReport {
        ChannelReport {
            channel: "P1".into(),
            integral: 0.0,
            final_level: 0.0,
            duration_ns: 0,
            residual,
        }
    }

    #[test]
    fn compensated_run_has_small_residuals() {
        let mut c = compiled();
        let reports = simulate(&mut c, &[]).expect("simulate");
        assert_eq!(reports.len(), 2);
        for r in &reports {
            assert!(r.residual.expect("ends in compensation").abs() < 1e-3, "{r:?}");
        }
        assert_eq!(reports[0].duration_ns, reports[1].duration_ns);
        assert!(check_residuals(&reports, 1e-3).is_ok());
    }

    #[test]
    fn rebinding_keeps_the_run_neutral() {
        let mut c = compiled();
        let reports = simulate(&mut c, &[("v1".to_string(), -0.4)]).expect("simulate");
        assert!(reports[0].residual.expect("residual").abs() < 1e-3);
        let err = simulate(&mut c, &[("nope".to_string(), 1.0)]).expect_err("unknown");
        assert!(format!("{err}").contains("nope"));
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(5e-4), true)]
    #[case(Some(-2e-3), false)]
    fn residual_tolerance(#[case] residual: Option<f64>, #[case] ok: bool) {
        let res = check_residuals(&[report(residual)], 1e-3);
        assert_eq!(res.is_ok(), ok);
        if let Err(e) = res {
            assert_eq!(e.channel, "P1");
            assert_eq!(e.tolerance, 1e-3);
        }
    }

    #[test]
    fn table_has_one_row_per_channel() {
        let table = render_table(&[report(Some(1e-6)), report(None)]);
        assert_eq!(table.lines().count(), 3);
        assert!(table.lines().nth(2).expect("row").trim_end().ends_with('-'));
    }
}
