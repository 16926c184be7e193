use gateseq_config::{SequenceOp, VarKind, load_file, load_toml};
use rstest::rstest;
use std::io::Write;

const BASE: &str = r#"
[[channels]]
name = "P1"
controller = "con1"
port = 1

[[channels]]
name = "P2"
controller = "con1"
port = 2

[[variables]]
name = "amp"
kind = "fixed"
init = 0.1

[[variables]]
name = "wait_ns"
kind = "int"
init = 200

[[points]]
name = "initialization"
levels = [0.1, -0.05]
duration = 1000

[[points]]
name = "measurement"
levels = ["amp", 0.0]
duration = "wait_ns"

[[sequence]]
op = "step"
point = "initialization"

[[sequence]]
op = "ramp"
point = "measurement"
ramp = 40

[[sequence]]
op = "step"
levels = { P2 = 0.2 }
duration = 16

[[sequence]]
op = "compensate"
max_amplitude = 0.3

[[sequence]]
op = "ramp_to_zero"
"#;

#[test]
fn full_example_parses_and_validates() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.channel_names(), ["P1", "P2"]);
    assert_eq!(cfg.variable("wait_ns").map(|v| v.kind), Some(VarKind::Int));
    assert_eq!(cfg.sequence.len(), 5);
    assert!(matches!(
        cfg.sequence[3],
        SequenceOp::Compensate {
            max_amplitude: Some(a),
            duration: None
        } if a == 0.3
    ));
    assert!(matches!(
        cfg.sequence[4],
        SequenceOp::RampToZero { duration: None }
    ));
}

#[rstest]
#[case("[timing]\nclock_unit_ns = 0\n", "timing.clock_unit_ns must be > 0")]
#[case("[timing]\nmin_step_ns = 18\n", "timing.min_step_ns must be a positive multiple")]
#[case("[pulses]\nstep_amplitude = 0.0\n", "pulses.step_amplitude must be > 0")]
#[case("[pulses]\nforms = \"fastest\"\n", "pulses.forms must be one of")]
#[case("[compensation]\nmax_amplitude = 0.6\n", "compensation.max_amplitude must be in")]
#[case("[compensation]\nmax_amplitude = 0.5\n", "compensation.max_amplitude must be in")]
#[case("[compensation]\nresidual_tolerance = 0.0\n", "compensation.residual_tolerance must be > 0")]
#[case("[precision]\nfrac_bits = 60\n", "precision.frac_bits must be in [8, 48]")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_bad_sections(#[case] section: &str, #[case] message: &str) {
    let cfg = load_toml(&format!("{BASE}\n{section}")).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(message),
        "expected '{message}' in '{err}'"
    );
}

#[rstest]
#[case(
    "[[points]]\nname = \"bad\"\nlevels = [0.1]\nduration = 16\n",
    "expected 2 levels"
)]
#[case(
    "[[points]]\nname = \"bad\"\nlevels = [\"nope\", 0.0]\nduration = 16\n",
    "undeclared variable 'nope'"
)]
#[case("[[sequence]]\nop = \"step\"\npoint = \"missing\"\n", "unknown point 'missing'")]
#[case(
    "[[sequence]]\nop = \"step\"\nlevels = { P9 = 0.1 }\nduration = 16\n",
    "unknown channel 'P9'"
)]
#[case("[[sequence]]\nop = \"ramp\"\npoint = \"initialization\"\n", "needs a ramp duration")]
#[case("[[sequence]]\nop = \"step\"\nduration = 16\n", "needs a point or levels")]
fn rejects_bad_references(#[case] extra: &str, #[case] message: &str) {
    let cfg = load_toml(&format!("{BASE}\n{extra}")).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(message),
        "expected '{message}' in '{err}'"
    );
}

#[test]
fn rejects_empty_and_duplicate_channels() {
    let cfg = load_toml("").expect("parse TOML");
    let err = cfg.validate().expect_err("no channels");
    assert!(format!("{err}").contains("at least one channel"));

    let dup = "[[channels]]\nname = \"P1\"\nport = 1\n[[channels]]\nname = \"P1\"\nport = 2\n";
    let err = load_toml(dup)
        .expect("parse TOML")
        .validate()
        .expect_err("duplicate");
    assert!(format!("{err}").contains("'P1' is duplicated"));
}

#[test]
fn unknown_op_is_a_parse_error() {
    let text = format!("{BASE}\n[[sequence]]\nop = \"teleport\"\n");
    assert!(load_toml(&text).is_err());
}

#[test]
fn loads_from_file() {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(BASE.as_bytes()).expect("write");
    let cfg = load_file(f.path()).expect("load");
    assert_eq!(cfg.points.len(), 2);

    let missing = f.path().with_extension("absent");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
