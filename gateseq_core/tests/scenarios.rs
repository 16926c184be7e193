//! End-to-end sequences executed on the simulated runtime.

use gateseq_core::{
    AlwaysScaled, Channel, CompensationResult, Step, Value, VoltageGateSequence,
};
use gateseq_sim::{Segment, SimRuntime, Waveform};
use gateseq_traits::{NumKind, Runtime};

const CH: [&str; 2] = ["P1", "P2"];
/// Levels are quantized to 2^-28 V in the accumulator, so charges agree to a few µV·ns.
const TOL: f64 = 1e-4;

fn channels() -> Vec<Channel> {
    vec![Channel::new("P1", "con1", 1), Channel::new("P2", "con1", 2)]
}

fn sim_sequence() -> VoltageGateSequence<SimRuntime> {
    VoltageGateSequence::builder()
        .with_runtime(SimRuntime::default())
        .with_channels(channels())
        .build()
        .expect("build")
}

fn add_points(seq: &mut VoltageGateSequence<SimRuntime>, init: [Value; 2]) {
    seq.add_points("init", init, 1000u64).expect("init");
    seq.add_points("idle", [0.5, -0.3], 100u64).expect("idle");
    seq.add_points("readout", [0.2, -0.2], 2000u64).expect("readout");
}

fn cycle(seq: &mut VoltageGateSequence<SimRuntime>) -> Vec<CompensationResult> {
    for p in ["init", "idle", "readout"] {
        seq.add_step(Step::to_point(p)).expect("step");
    }
    seq.add_compensation_pulse(0.2, None).expect("compensate")
}

fn assert_same_waveform(a: &Waveform, b: &Waveform, tol: f64) {
    for ch in CH {
        let (sa, sb): (&[Segment], &[Segment]) = (a.segments(ch), b.segments(ch));
        assert_eq!(sa.len(), sb.len(), "segment count on {ch}");
        for (x, y) in sa.iter().zip(sb) {
            assert_eq!(x.start_ns, y.start_ns, "{ch}: {x:?} vs {y:?}");
            assert_eq!(x.duration_ns, y.duration_ns, "{ch}: {x:?} vs {y:?}");
            assert!((x.from - y.from).abs() < tol, "{ch}: {x:?} vs {y:?}");
            assert!((x.to - y.to).abs() < tol, "{ch}: {x:?} vs {y:?}");
        }
        assert!((a.integral(ch) - b.integral(ch)).abs() < 1e-3, "integral on {ch}");
    }
}

fn known(v: &Value) -> f64 {
    v.known().expect("compile-time value")
}

#[test]
fn known_levels_compile_to_constant_segments_and_one_compensation() {
    let mut seq = sim_sequence();
    add_points(&mut seq, [0.8.into(), (-0.1).into()]);
    let results = cycle(&mut seq);
    seq.ramp_to_zero(None).expect("ramp to zero");

    // P1: 0.8*1000 + 0.5*100 + 0.2*2000 = 1250 V·ns, 1250/0.2 = 6250 -> 6252 ns on the 4 ns clock.
    assert_eq!(results[0].channel, "P1");
    assert!((known(&results[0].charge) - 1250.0).abs() < TOL);
    assert_eq!(known(&results[0].duration_ns), 6252.0);
    let l1 = known(results[0].level.as_ref().expect("pulse"));
    assert!(l1.abs() <= 0.2);
    assert!((l1 * 6252.0 + 1250.0).abs() < TOL);

    // P2: -0.1*1000 - 0.3*100 - 0.2*2000 = -530 V·ns -> 2652 ns.
    assert!((known(&results[1].charge) + 530.0).abs() < TOL);
    assert_eq!(known(&results[1].duration_ns), 2652.0);

    let rt = seq.runtime();
    assert!(rt.variables().is_empty(), "all-known sequence needs no variables");
    let wf = rt.execute().expect("execute");
    let p1 = wf.segments("P1");
    let expected = [
        (0, 1000, 0.8),
        (1000, 100, 0.5),
        (1100, 2000, 0.2),
        (3100, 6252, l1),
    ];
    for (seg, (start, dur, level)) in p1.iter().zip(expected) {
        assert_eq!(seg.start_ns, start);
        assert_eq!(seg.duration_ns, dur);
        assert!(seg.is_constant());
        assert!((seg.to - level).abs() < 1e-12, "{seg:?}");
    }
    // Final ramp to exactly zero.
    let last = p1.last().expect("segments");
    assert_eq!(last.start_ns, 9352);
    assert_eq!(last.to, 0.0);
    assert_eq!(wf.final_level("P1"), 0.0);
    assert_eq!(wf.final_level("P2"), 0.0);

    // The window up to the end of the compensation is charge neutral.
    assert!(wf.integral_between("P1", 0, 9352).abs() < TOL);
    assert!(wf.integral_between("P2", 0, 3100 + 2652).abs() < TOL);
    // Both channels stay time aligned.
    assert_eq!(wf.duration_ns("P1"), wf.duration_ns("P2"));
}

#[test]
fn run_time_levels_match_the_compile_time_path() {
    let mut known_seq = sim_sequence();
    add_points(&mut known_seq, [0.8.into(), (-0.1).into()]);
    cycle(&mut known_seq);
    known_seq.ramp_to_zero(None).expect("ramp to zero");

    let mut seq = sim_sequence();
    let v1 = seq
        .runtime_mut()
        .declare(NumKind::Fixed, Some(0.8))
        .expect("declare");
    let v2 = seq
        .runtime_mut()
        .declare(NumKind::Fixed, Some(-0.1))
        .expect("declare");
    add_points(&mut seq, [v1.into(), v2.into()]);
    let results = cycle(&mut seq);
    seq.ramp_to_zero(None).expect("ramp to zero");

    assert!(results.iter().all(|r| !r.charge.is_known()));
    assert!(results.iter().all(|r| !r.skipped()));

    let a = known_seq.runtime().execute().expect("execute");
    let b = seq.runtime().execute().expect("execute");
    assert_same_waveform(&a, &b, 1e-6);
}

#[test]
fn run_time_level_over_a_long_hold_compensates_like_the_known_level() {
    // 0.4 V for 25 µs is 10_000 V·ns, well past what a fixed-point charge could hold.
    let hold = |seq: &mut VoltageGateSequence<SimRuntime>, level: Value| {
        seq.add_step(Step::levels([("P1", level)]).duration(25_000u64))
            .expect("step");
        seq.add_compensation_pulse(0.4, None).expect("compensate")
    };

    let mut known_seq = sim_sequence();
    let known_results = hold(&mut known_seq, 0.4.into());
    assert!((known(&known_results[0].charge) - 10_000.0).abs() < TOL);

    let mut seq = sim_sequence();
    let v = seq
        .runtime_mut()
        .declare(NumKind::Fixed, Some(0.4))
        .expect("declare");
    let results = hold(&mut seq, v.into());
    assert!(!results[0].charge.is_known());

    let a = known_seq.runtime().execute().expect("execute");
    let b = seq.runtime().execute().expect("execute");
    // 10_000 / 0.4 = 25_000 ns at the full amplitude.
    assert_eq!(b.segments("P1")[1].duration_ns, 25_000);
    assert!((b.segments("P1")[1].to + 0.4).abs() < 1e-6);
    assert!(b.integral("P1").abs() < 1e-3);
    assert_same_waveform(&a, &b, 1e-6);

    // Ten times longer still fits the integer accumulator.
    let mut seq = sim_sequence();
    let v = seq
        .runtime_mut()
        .declare(NumKind::Fixed, Some(-0.3))
        .expect("declare");
    seq.add_step(Step::levels([("P1", v)]).duration(250_000u64))
        .expect("step");
    seq.add_compensation_pulse(0.2, None).expect("compensate");
    let wf = seq.runtime().execute().expect("execute");
    // -0.3 V quantizes just above 0.3 in magnitude, so 375_000 ns rounds up a cycle.
    let comp = wf.segments("P1")[1];
    assert_eq!(comp.duration_ns, 375_004);
    assert!(comp.to > 0.0 && comp.to <= 0.2);
    assert!(wf.integral("P1").abs() < comp.duration_ns as f64 * 2f64.powi(-28));
}

#[test]
fn run_time_compensation_follows_rebound_inputs() {
    let mut seq = sim_sequence();
    let v1 = seq
        .runtime_mut()
        .declare(NumKind::Fixed, Some(0.8))
        .expect("declare");
    add_points(&mut seq, [v1.into(), (-0.1).into()]);
    cycle(&mut seq);

    let rt = seq.runtime_mut();
    rt.bind(v1, 0.4).expect("bind");
    let wf = rt.execute().expect("execute");
    // 0.4*1000 + 50 + 400 = 850 V·ns -> 850/0.2 = 4250 -> 4252 ns.
    let comp = wf.segments("P1")[3];
    assert_eq!(comp.duration_ns, 4252);
    assert!(comp.to.abs() <= 0.2);
    // P1 compensates within P2's longer padding window, so check the whole P1 window.
    let end = comp.end_ns();
    assert!(wf.integral_between("P1", 0, end).abs() < 1e-3);
}

#[test]
fn consecutive_compensations_discharge_only_their_own_window() {
    let mut seq = sim_sequence();
    add_points(&mut seq, [0.8.into(), (-0.1).into()]);
    let first = cycle(&mut seq);
    let second = cycle(&mut seq);
    seq.ramp_to_zero(None).expect("ramp to zero");

    // P1 is the longest pulse, so it gets no padding: both windows carry 1250 V·ns.
    assert!((known(&first[0].charge) - 1250.0).abs() < TOL);
    assert!((known(&second[0].charge) - 1250.0).abs() < TOL);

    // P2 holds its compensation level while P1 finishes; that padding belongs to
    // the second window.
    let p2_level = known(first[1].level.as_ref().expect("pulse"));
    let padding = p2_level * (6252.0 - 2652.0);
    assert!((known(&second[1].charge) - (-530.0 + padding)).abs() < TOL);

    let wf = seq.runtime().execute().expect("execute");
    let second_start = 3100 + 6252;
    let second_end = second_start + 3100 + known(&second[0].duration_ns) as u64;
    assert!(wf.integral_between("P1", 0, second_start).abs() < TOL);
    assert!(wf.integral_between("P1", second_start, second_end).abs() < TOL);
    let p2_second_end = second_start + 3100 + known(&second[1].duration_ns) as u64;
    assert!(wf.integral_between("P2", 2652 + 3100, p2_second_end).abs() < TOL);
}

#[test]
fn pulse_form_strategy_does_not_change_the_waveform() {
    let mut a = sim_sequence();
    add_points(&mut a, [0.8.into(), (-0.1).into()]);
    cycle(&mut a);

    let mut b = VoltageGateSequence::builder()
        .with_runtime(SimRuntime::default())
        .with_channels(channels())
        .with_strategy(Box::new(AlwaysScaled))
        .build()
        .expect("build");
    add_points(&mut b, [0.8.into(), (-0.1).into()]);
    cycle(&mut b);

    assert!(a.runtime().variables().is_empty());
    assert!(!b.runtime().variables().is_empty());
    assert_same_waveform(
        &a.runtime().execute().expect("execute"),
        &b.runtime().execute().expect("execute"),
        1e-8,
    );
}
