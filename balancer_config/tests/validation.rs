use balancer_config::{RxMode, load_file, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

const PINS: &str = r#"
[pins]
encoder_a = 17
encoder_b = 27
motor_forward = 12
motor_backward = 13
"#;

fn with_pins(extra: &str) -> String {
    format!("{PINS}\n{extra}")
}

#[rstest]
#[case("[link]\nrx_buffer_size = 64", "link.rx_buffer_size must be >=")]
#[case("[link]\ntx_buffer_size = 0", "link.tx_buffer_size must be >=")]
#[case("[link]\ndrain_period_us = 0", "drain_period_us must be > 0")]
#[case("[encoder]\ncounts_per_rev = 0", "counts_per_rev must be > 0")]
#[case("[encoder]\nmm_per_rev = -1.0", "mm_per_rev must be > 0")]
#[case("[actuator]\nsaturation_v = 0.0", "saturation_v must be > 0")]
#[case("[actuator]\npwm_max = 0", "pwm_max must be > 0")]
#[case("[control]\ndefault_cycle_ms = 0", "default_cycle_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "rotation must be one of")]
#[case("[serial]\nbaud_rate = 0", "baud_rate must be > 0")]
fn rejects_out_of_range_values(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_pins(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn rejects_shared_encoder_pins() {
    let toml = r#"
[pins]
encoder_a = 17
encoder_b = 17
motor_forward = 12
motor_backward = 13
"#;
    let err = load_toml(toml).unwrap().validate().unwrap_err();
    assert!(format!("{err}").contains("encoder_a and pins.encoder_b must differ"));
}

#[test]
fn polled_mode_ignores_drain_period() {
    let cfg = load_toml(&with_pins("[link]\nrx_mode = \"polled\"\ndrain_period_us = 0")).unwrap();
    assert_eq!(cfg.link.rx_mode, RxMode::Polled);
    cfg.validate().expect("drain period is unused when polling");
}

#[test]
fn unknown_rx_mode_fails_to_parse() {
    assert!(load_toml(&with_pins("[link]\nrx_mode = \"dma\"")).is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("balancer.toml");
    fs::write(&path, with_pins("[control]\ndefault_cycle_ms = 5")).unwrap();
    let cfg = load_file(&path).unwrap();
    assert_eq!(cfg.control.default_cycle_ms, 5);

    fs::write(&path, with_pins("[actuator]\npwm_max = 0")).unwrap();
    assert!(load_file(&path).is_err());

    let missing = dir.path().join("nope.toml");
    let err = load_file(&missing).unwrap_err();
    assert!(format!("{err}").contains("read config"));
}
