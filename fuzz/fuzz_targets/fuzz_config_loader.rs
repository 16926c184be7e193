#![no_main]
use gateseq_core::mocks::NullRuntime;
use gateseq_core::{Channel, SequenceCfg, Value, build_sequence, strategy_by_name};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = toml::from_str::<gateseq_config::Config>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must also satisfy the builder.
    let channels: Vec<Channel> = cfg.channels.iter().map(Channel::from).collect();
    let mut seq = match build_sequence(
        NullRuntime::default(),
        channels,
        SequenceCfg::from(&cfg),
        strategy_by_name(&cfg.pulses.forms),
    ) {
        Ok(seq) => seq,
        Err(e) => panic!("validated config rejected by the builder: {e:#}"),
    };
    for p in &cfg.points {
        let levels: Option<Vec<Value>> = p.levels.iter().map(|l| Value::try_from(l).ok()).collect();
        let (Some(levels), Ok(duration)) = (levels, Value::try_from(&p.duration)) else {
            continue;
        };
        let _ = seq.add_points(p.name.clone(), levels, duration);
    }
});
