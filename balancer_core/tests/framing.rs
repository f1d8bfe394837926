use balancer_core::CodecError;
use balancer_core::protocol::codec::{self, HEADER_LEN, START_TOKEN};
use balancer_core::protocol::interface::{Command, StatusPacket, Telemetry, TelemetryPacket};
use balancer_core::protocol::message::StatusMessage;
use proptest::prelude::*;
use rstest::rstest;

prop_compose! {
    fn command_strategy()(
        calibration in any::<bool>(),
        control_state in any::<bool>(),
        reset_pos in any::<bool>(),
        pos in -5_000.0f64..5_000.0,
        h_ms in 0u16..50,
        r_stop in any::<u8>(),
        r_start in any::<u8>(),
        gains in prop::array::uniform6(-100.0f64..100.0),
        phi in prop::array::uniform4(prop::array::uniform4(-2.0f64..2.0)),
        gamma in prop::array::uniform4(-1.0f64..1.0),
    ) -> Command {
        let mut cmd = Command {
            calibration,
            control_state,
            pos_setpoint_mm: pos,
            reset_pos,
            ..Command::default()
        };
        let var = &mut cmd.parameters.variable;
        var.general.h_ms = h_ms;
        var.general.r_stop = r_stop;
        var.general.r_start = r_start;
        var.balance.k1 = gains[0];
        var.balance.k2 = gains[1];
        var.balance.k3 = gains[2];
        var.position.k4 = gains[3];
        var.position.ki = gains[4];
        var.position.kr = gains[5];
        cmd.parameters.inferred.observer.phi = phi;
        cmd.parameters.inferred.feedforward.phi = phi;
        cmd.parameters.inferred.feedforward.gamma = gamma;
        cmd
    }
}

proptest! {
    #[test]
    fn command_round_trips_through_a_frame(cmd in command_strategy()) {
        let mut buf = vec![0u8; 1500];
        let n = codec::encode(&cmd, &mut buf).unwrap();
        prop_assert_eq!(buf[0], START_TOKEN);
        let len = codec::declared_len(&buf[..n]).unwrap();
        prop_assert_eq!(len + HEADER_LEN, n);
        let back: Command = codec::decode(&buf[HEADER_LEN..n]).unwrap();
        prop_assert_eq!(back, cmd);
    }
}

#[test]
fn telemetry_frame_fits_default_buffer() {
    let mut msg = StatusMessage::new();
    msg.append(&"x".repeat(200));
    let mut telemetry = Telemetry::default();
    telemetry.control.u = -123_456.789_012_345;
    telemetry.observer.position.s_mm = f64::MAX;
    let n = codec::encoded_len(&TelemetryPacket {
        msg: &msg,
        telemetry: &telemetry,
    })
    .unwrap();
    assert!(n <= 1500, "telemetry frame is {n} bytes");
}

#[rstest]
#[case(0)]
#[case(2)]
#[case(10)]
fn encode_rejects_small_destination(#[case] cap: usize) {
    let mut msg = StatusMessage::new();
    msg.append("hello");
    let mut buf = vec![0u8; cap];
    let err = codec::encode(&StatusPacket { msg: &msg }, &mut buf).unwrap_err();
    assert!(matches!(err, CodecError::InsufficientCapacity { .. }));
}

#[test]
fn decode_reports_malformed_json() {
    let err = codec::decode::<Command>(br#"{"control_state": tru"#).unwrap_err();
    assert!(matches!(err, CodecError::Deserialize(_)));
}

#[test]
fn frames_splits_a_stream_and_skips_noise() {
    let mut stream = b"noise".to_vec();
    stream.extend(codec::encode_to_vec(&serde_json::json!({"a": 1})).unwrap());
    stream.extend(codec::encode_to_vec(&serde_json::json!({"b": 2})).unwrap());
    stream.extend_from_slice(&[START_TOKEN, 0, 9, b'{']);
    let payloads: Vec<&[u8]> = codec::frames(&stream).collect();
    assert_eq!(payloads, vec![&br#"{"a":1}"#[..], &br#"{"b":2}"#[..]]);
}
