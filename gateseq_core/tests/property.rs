use gateseq_core::mocks::NullRuntime;
use gateseq_core::{Channel, Step, Value, VoltageGateSequence};
use gateseq_sim::{SimRuntime, Waveform};
use gateseq_traits::{NumKind, Runtime};
use proptest::prelude::*;

const CH: [&str; 2] = ["P1", "P2"];

fn channels() -> Vec<Channel> {
    vec![Channel::new("P1", "con1", 1), Channel::new("P2", "con1", 2)]
}

#[derive(Debug, Clone)]
struct Op {
    levels: [f64; 2],
    /// Hold in clock cycles (4 ns), at least the 16 ns minimum step.
    hold_cycles: u64,
    /// Ramp in clock cycles; `None` is a jump.
    ramp_cycles: Option<u64>,
}

impl Op {
    fn step(&self) -> Step {
        self.step_to(self.levels.map(Value::from))
    }

    fn step_to(&self, levels: [Value; 2]) -> Step {
        let s = Step::levels(CH.into_iter().zip(levels)).duration(self.hold_cycles * 4);
        match self.ramp_cycles {
            Some(r) => s.ramp(r * 4),
            None => s,
        }
    }
}

prop_compose! {
    fn op_strategy()(
        l1 in -1.0f64..1.0,
        l2 in -1.0f64..1.0,
        hold_cycles in 4u64..250,
        ramp_cycles in proptest::option::of(1u64..50),
    ) -> Op {
        Op { levels: [l1, l2], hold_cycles, ramp_cycles }
    }
}

prop_compose! {
    /// Holds up to the longest pulse the controller accepts, at levels that
    /// keep three of them inside the 64-bit run-time accumulator.
    fn long_op_strategy()(
        l1 in -0.45f64..0.45,
        l2 in -0.45f64..0.45,
        hold_cycles in 4u64..=i32::MAX as u64,
        ramp_cycles in proptest::option::of(1u64..50),
    ) -> Op {
        Op { levels: [l1, l2], hold_cycles, ramp_cycles }
    }
}

fn known(v: &Value) -> f64 {
    v.known().expect("compile-time value")
}

fn executed(v: &Value, wf: &Waveform) -> f64 {
    match v {
        Value::Known(x) => *x,
        Value::Deferred(e) => e.evaluate(&|var| wf.variable(var)).expect("evaluates"),
    }
}

proptest! {
    #[test]
    fn level_equals_the_last_request(ops in proptest::collection::vec(op_strategy(), 1..30)) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(NullRuntime::default())
            .with_channels(channels())
            .build()
            .expect("build");
        for op in &ops {
            seq.add_step(op.step()).expect("step");
            for (ch, l) in CH.iter().zip(op.levels) {
                prop_assert_eq!(seq.current_level(ch).expect("level"), &Value::Known(l));
            }
        }
    }

    #[test]
    fn compensation_nets_the_window_to_zero(
        ops in proptest::collection::vec(op_strategy(), 1..20),
        max_amplitude in 0.1f64..0.5,
    ) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(SimRuntime::default())
            .with_channels(channels())
            .build()
            .expect("build");
        for op in &ops {
            seq.add_step(op.step()).expect("step");
        }
        let results = seq.add_compensation_pulse(max_amplitude, None).expect("compensate");

        let wf = seq.runtime().execute().expect("execute");
        for r in &results {
            if let Some(level) = &r.level {
                let level = known(level);
                let d = known(&r.duration_ns);
                prop_assert!(level.abs() <= max_amplitude, "{} > {}", level, max_amplitude);
                prop_assert!((level * d + known(&r.charge)).abs() < 1e-6);
            }
            // Whatever is left after compensation is the alignment padding,
            // which the tracker already carries into the next window.
            let carried = known(&seq.accumulated_charge(&r.channel).expect("charge"));
            let residual = wf.integral(&r.channel) - carried;
            prop_assert!(residual.abs() < 1e-3, "residual {} on {}", residual, r.channel);
        }
    }

    #[test]
    fn run_time_compensation_nets_long_windows_to_zero(
        ops in proptest::collection::vec(long_op_strategy(), 1..4),
        max_amplitude in 0.1f64..0.5,
    ) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(SimRuntime::default())
            .with_channels(channels())
            .build()
            .expect("build");
        for op in &ops {
            let rt = seq.runtime_mut();
            let levels = op.levels.map(|l| {
                Value::from(rt.declare(NumKind::Fixed, Some(l)).expect("declare"))
            });
            seq.add_step(op.step_to(levels)).expect("step");
        }
        let results = seq.add_compensation_pulse(max_amplitude, None).expect("compensate");

        let wf = seq.runtime().execute().expect("execute");
        for r in &results {
            let level = executed(r.level.as_ref().expect("run-time pulse"), &wf);
            prop_assert!(level.abs() <= max_amplitude, "{} > {}", level, max_amplitude);
            let carried = executed(&seq.accumulated_charge(&r.channel).expect("charge"), &wf);
            let residual = wf.integral(&r.channel) - carried;
            // Run-time levels are 2^-28 V words, so the error grows with the window.
            let tol = wf.duration_ns(&r.channel) as f64 * 2f64.powi(-26) + 1e-3;
            prop_assert!(residual.abs() < tol, "residual {} on {} (tol {})", residual, r.channel, tol);
        }
    }

    #[test]
    fn duration_is_extended_instead_of_exceeding_the_amplitude(
        level in -1.0f64..1.0,
        hold_cycles in 4u64..2000,
        max_amplitude in 0.01f64..0.5,
        requested_cycles in proptest::option::of(4u64..500),
    ) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(NullRuntime::default())
            .with_channels(vec![Channel::new("P1", "con1", 1)])
            .build()
            .expect("build");
        seq.add_step(Step::levels([("P1", level)]).duration(hold_cycles * 4)).expect("step");
        let requested = requested_cycles.map(|c| Value::from(c * 4));
        let results = seq.add_compensation_pulse(max_amplitude, requested).expect("compensate");
        let r = &results[0];
        if let Some(l) = &r.level {
            let (l, d, q) = (known(l), known(&r.duration_ns), known(&r.charge));
            prop_assert!(l.abs() <= max_amplitude);
            prop_assert!((l * d + q).abs() < 1e-6 * q.abs().max(1.0));
            prop_assert_eq!(d % 4.0, 0.0);
            if let Some(c) = requested_cycles {
                prop_assert!(d >= (c * 4) as f64);
            }
        }
    }

    #[test]
    fn symmetric_excursions_need_no_compensation(level in -1.0f64..1.0, hold_cycles in 4u64..1000) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(NullRuntime::default())
            .with_channels(channels())
            .build()
            .expect("build");
        let ns = hold_cycles * 4;
        seq.add_step(Step::levels([("P1", level), ("P2", -level)]).duration(ns)).expect("up");
        seq.add_step(Step::levels([("P1", -level), ("P2", level)]).duration(ns)).expect("down");
        let results = seq.add_compensation_pulse(0.49, None).expect("compensate");
        prop_assert!(results.iter().all(|r| r.skipped()));
    }

    #[test]
    fn zero_duration_and_zero_ramp_only_move_the_level(
        ops in proptest::collection::vec(op_strategy(), 0..10),
        jump in -1.0f64..1.0,
    ) {
        let mut seq = VoltageGateSequence::builder()
            .with_runtime(NullRuntime::default())
            .with_channels(channels())
            .build()
            .expect("build");
        for op in &ops {
            seq.add_step(op.step()).expect("step");
        }
        let before: Vec<Value> = CH.iter().map(|c| seq.accumulated_charge(c).expect("charge")).collect();

        seq.add_step(Step::levels([("P1", jump)]).duration(0u64)).expect("zero duration");
        prop_assert_eq!(seq.current_level("P1").expect("level"), &Value::Known(jump));
        seq.add_ramp(Step::levels([("P2", jump)]).ramp(0u64)).expect("zero ramp");
        prop_assert_eq!(seq.current_level("P2").expect("level"), &Value::Known(jump));

        let after: Vec<Value> = CH.iter().map(|c| seq.accumulated_charge(c).expect("charge")).collect();
        prop_assert_eq!(before, after);
    }
}
