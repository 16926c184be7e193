use gateseq_core::error::SequenceError;
use gateseq_core::{Channel, Step, Value, VoltageGateSequence};
use gateseq_sim::{Instruction, SimRuntime};
use gateseq_traits::{NumKind, Runtime};
use rstest::{fixture, rstest};

#[fixture]
fn seq() -> VoltageGateSequence<SimRuntime> {
    let mut seq = VoltageGateSequence::builder()
        .with_runtime(SimRuntime::default())
        .with_channels([
            Channel::new("P1", "con1", 1),
            Channel::new("P2", "con1", 2),
            Channel::new("B1", "con1", 3),
        ])
        .build()
        .expect("build");
    seq.add_points("idle", [0.5, -0.3, 0.1], 100u64)
        .expect("idle");
    seq
}

fn seq_err(err: &gateseq_core::Report) -> SequenceError {
    err.downcast_ref::<SequenceError>()
        .cloned()
        .unwrap_or_else(|| panic!("untyped error: {err:?}"))
}

#[rstest]
fn point_registration_is_validated(mut seq: VoltageGateSequence<SimRuntime>) {
    let err = seq
        .add_points("idle", [0.0, 0.0, 0.0], 100u64)
        .expect_err("duplicate");
    assert_eq!(seq_err(&err), SequenceError::DuplicatePoint("idle".into()));

    let err = seq
        .add_points("short", [0.0, 0.0], 100u64)
        .expect_err("count");
    assert!(matches!(
        seq_err(&err),
        SequenceError::LevelCountMismatch { expected: 3, got: 2, .. }
    ));

    let err = seq
        .add_points("odd", [0.0, 0.0, 0.0], 102u64)
        .expect_err("off clock");
    match seq_err(&err) {
        SequenceError::InvalidDuration { target, value, .. } => {
            assert_eq!(target, "point 'odd'");
            assert_eq!(value, 102.0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(seq.point("odd").is_none());
    assert_eq!(seq.points().count(), 1);
}

#[rstest]
#[case::below_minimum(Step::to_point("idle").duration(8u64), "step")]
#[case::off_clock(Step::to_point("idle").duration(22u64), "step")]
#[case::fractional(Step::to_point("idle").duration(16.5), "step")]
#[case::short_ramp(Step::to_point("idle").ramp(2u64), "ramp")]
#[case::negative_ramp(Step::to_point("idle").ramp(-4.0), "ramp")]
fn bad_durations_fail_before_anything_is_emitted(
    mut seq: VoltageGateSequence<SimRuntime>,
    #[case] step: Step,
    #[case] kind: &str,
) {
    let before = seq.runtime().program().len();
    let err = seq.add_step(step).expect_err("invalid");
    match seq_err(&err) {
        SequenceError::InvalidDuration { kind: k, target, .. } => {
            assert_eq!(k, kind);
            assert_eq!(target, "point 'idle'");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(seq.runtime().program().len(), before);
    assert_eq!(
        seq.current_level("P1").expect("level"),
        &Value::Known(0.0)
    );
}

#[rstest]
fn unknown_names_are_reported(mut seq: VoltageGateSequence<SimRuntime>) {
    let err = seq.add_step(Step::to_point("readout")).expect_err("point");
    assert_eq!(seq_err(&err), SequenceError::UnknownPoint("readout".into()));
    assert!(format!("{err}").contains("readout"));

    let err = seq
        .add_step(Step::levels([("P1", 0.1), ("X9", 0.2)]).duration(16u64))
        .expect_err("channel");
    assert_eq!(seq_err(&err), SequenceError::UnknownChannel("X9".into()));
    assert!(seq.runtime().program().is_empty());

    let err = seq.current_level("X9").expect_err("diagnostic lookup");
    assert_eq!(seq_err(&err), SequenceError::UnknownChannel("X9".into()));
}

#[rstest]
fn partial_step_holds_the_other_channels(mut seq: VoltageGateSequence<SimRuntime>) {
    seq.add_step(Step::to_point("idle")).expect("idle");
    seq.add_step(Step::levels([("B1", 0.3)]).duration(200u64))
        .expect("partial");
    assert_eq!(seq.current_level("P1").expect("level"), &Value::Known(0.5));
    assert_eq!(seq.current_level("B1").expect("level"), &Value::Known(0.3));

    // P1: 0.5*100 + 0.5*200 = 150 V·ns
    let q = seq.accumulated_charge("P1").expect("charge");
    assert!((q.known().expect("known") - 150.0).abs() < 1e-6);

    let waits = seq
        .runtime()
        .program()
        .iter()
        .filter(|i| matches!(i, Instruction::Wait { channel, .. } if channel == "P1" || channel == "P2"))
        .count();
    assert_eq!(waits, 2);
}

#[rstest]
fn point_levels_can_be_overridden_per_call(mut seq: VoltageGateSequence<SimRuntime>) {
    seq.add_step(Step::to_point("idle").level("P2", 0.0).duration(40u64))
        .expect("override");
    assert_eq!(seq.current_level("P2").expect("level"), &Value::Known(0.0));
    assert_eq!(seq.current_level("P1").expect("level"), &Value::Known(0.5));
    assert_eq!(
        seq.accumulated_charge("P1").expect("charge"),
        Value::Known(20.0)
    );
}

#[rstest]
fn ramps_are_linear_and_dwell_at_the_target(mut seq: VoltageGateSequence<SimRuntime>) {
    seq.add_ramp(Step::to_point("idle").ramp(40u64))
        .expect("ramp");
    // Trapezoid 0 -> 0.5 over 40 ns, then the point's 100 ns dwell.
    let q = seq
        .accumulated_charge("P1")
        .expect("charge")
        .known()
        .expect("known");
    assert!((q - (10.0 + 50.0)).abs() < 1e-6);

    let wf = seq.runtime().execute().expect("execute");
    let segs = wf.segments("P1");
    assert_eq!(segs.len(), 2);
    assert_eq!((segs[0].duration_ns, segs[0].from), (40, 0.0));
    assert!((segs[0].to - 0.5).abs() < 1e-12);
    assert!(segs[1].is_constant());
    assert_eq!(segs[1].duration_ns, 100);
    assert!((wf.integral("P1") - q).abs() < 1e-6);
}

#[rstest]
fn step_with_ramp_uses_the_explicit_hold(mut seq: VoltageGateSequence<SimRuntime>) {
    seq.add_step(Step::levels([("P1", 0.4)]).ramp(20u64).duration(16u64))
        .expect("step with ramp");
    let q = seq
        .accumulated_charge("P1")
        .expect("charge")
        .known()
        .expect("known");
    assert!((q - (4.0 + 6.4)).abs() < 1e-6);
}

#[rstest]
fn zero_duration_jump_is_played_by_the_next_step(mut seq: VoltageGateSequence<SimRuntime>) {
    seq.add_step(Step::levels([("P1", 0.4)]).duration(0u64))
        .expect("jump");
    assert!(seq.runtime().program().is_empty());
    assert_eq!(seq.accumulated_charge("P1").expect("charge"), Value::Known(0.0));

    seq.add_step(Step::levels([("P2", 0.2)]).duration(16u64))
        .expect("next");
    let wf = seq.runtime().execute().expect("execute");
    assert!((wf.final_level("P1") - 0.4).abs() < 1e-12);
    assert!((wf.integral("P1") - 6.4).abs() < 1e-9);
}

#[rstest]
fn run_time_durations_are_assigned_once_per_step(mut seq: VoltageGateSequence<SimRuntime>) {
    let n = seq
        .runtime_mut()
        .declare(NumKind::Int, Some(64.0))
        .expect("declare");
    seq.add_step(Step::to_point("idle").duration(n))
        .expect("run-time hold");
    let assigns_to_length = seq
        .runtime()
        .program()
        .iter()
        .filter(|i| matches!(i, Instruction::Assign { value, .. } if value.variables().contains(&n)))
        .count();
    // One shared length assignment, plus each channel's run-time charge.
    assert_eq!(assigns_to_length, 1 + 3);

    let wf = seq.runtime().execute().expect("execute");
    for ch in ["P1", "P2", "B1"] {
        assert_eq!(wf.duration_ns(ch), 64);
    }
    assert!((wf.integral("P1") - 32.0).abs() < 1e-6);
}
