mod cli;
mod compile;
mod error_fmt;
mod logging;
mod simulate;

use clap::Parser;
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        tracing::debug!(error = %format!("{e:#}"), "gateseq failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    let loaded = gateseq_config::load_file(&cli.config);
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init(&level, cli.json, &logging)?;

    let cfg = loaded?;
    cfg.validate()?;
    tracing::debug!(config = %cli.config.display(), "config validated");

    match cli.cmd {
        Commands::Check => {
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "channels": cfg.channel_names(),
                        "points": cfg.points.len(),
                        "ops": cfg.sequence.len(),
                    })
                );
            } else {
                println!(
                    "config ok: {} channels, {} points, {} sequence ops",
                    cfg.channels.len(),
                    cfg.points.len(),
                    cfg.sequence.len()
                );
            }
        }
        Commands::Config => {
            let seq = compile::build(&cfg)?;
            let registration = seq
                .runtime()
                .config()
                .ok_or_else(|| eyre::eyre!("runtime registration missing after build"))?;
            println!("{}", serde_json::to_string_pretty(registration)?);
        }
        Commands::Compile => {
            let compiled = compile::compile(&cfg)?;
            let rt = compiled.seq.runtime();
            if cli.json {
                let listing: Vec<String> = rt.program().iter().map(ToString::to_string).collect();
                println!(
                    "{}",
                    json!({
                        "variables": rt.variables().len(),
                        "instructions": listing,
                    })
                );
            } else {
                print!("{}", rt.listing());
            }
        }
        Commands::Simulate { set } => {
            let mut compiled = compile::compile(&cfg)?;
            let reports = simulate::simulate(&mut compiled, &set)?;
            let tolerance = cfg.compensation.residual_tolerance;
            let verdict = simulate::check_residuals(&reports, tolerance);
            if cli.json {
                let channels: Vec<_> = reports.iter().map(simulate::ChannelReport::to_json).collect();
                println!(
                    "{}",
                    json!({
                        "channels": channels,
                        "residual_tolerance_vns": tolerance,
                        "neutral": verdict.is_ok(),
                    })
                );
            } else {
                print!("{}", simulate::render_table(&reports));
            }
            verdict?;
        }
    }
    Ok(())
}
