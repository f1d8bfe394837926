use balancer_core::protocol::codec::{self, START_TOKEN};
use balancer_core::protocol::rx::RxState;
use balancer_core::protocol::{Command, Link, Polled};
use balancer_core::ReceiveCode;
use balancer_hardware::{SimHost, SimRx, SimTx, sim_serial};
use serde_json::json;

type SimLink = Link<Polled<SimRx>, SimTx>;

fn link(rx_capacity: usize) -> (SimLink, SimHost) {
    let (rx, tx, host) = sim_serial(4096, 4096);
    (Link::new(Polled::new(rx, rx_capacity), tx, 1500), host)
}

/// Status texts the device has sent so far.
fn host_messages(link: &mut SimLink, host: &SimHost) -> Vec<String> {
    while link.async_transmit() > 0 {}
    let bytes = host.recv_all();
    codec::frames(&bytes)
        .filter_map(|p| serde_json::from_slice::<serde_json::Value>(p).ok())
        .filter_map(|v| v.get("msg").and_then(|m| m.as_str()).map(str::to_owned))
        .collect()
}

fn enable_frame() -> Vec<u8> {
    codec::encode_to_vec(&json!({"control_state": true, "pos_setpoint_mm": 12.5})).unwrap()
}

#[test]
fn nothing_buffered_is_no_data() {
    let (mut link, _host) = link(1500);
    assert_eq!(link.async_receive(), ReceiveCode::NoDataAvailable);
}

#[test]
fn split_packet_reports_progress_then_completes() {
    let (mut link, host) = link(1500);
    let frame = enable_frame();
    host.send(&frame[..5]);
    assert_eq!(link.async_receive(), ReceiveCode::RxInProgress);
    assert_eq!(link.rx_state(), RxState::Payload);
    assert_eq!(link.async_receive(), ReceiveCode::NoDataAvailable);
    host.send(&frame[5..]);
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    assert!(link.command().control_state);
    assert!((link.command().pos_setpoint_mm - 12.5).abs() < 1e-12);
    assert_eq!(link.rx_state(), RxState::Idle);
}

#[test]
fn start_token_inside_payload_abandons_previous_packet() {
    let (mut link, host) = link(1500);
    let first = codec::encode_to_vec(&json!({"pos_setpoint_mm": 99.0})).unwrap();
    host.send(&first[..8]);
    host.send(&enable_frame());
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    assert!(link.command().control_state);
    assert!((link.command().pos_setpoint_mm - 12.5).abs() < 1e-12);
    let msgs = host_messages(&mut link, &host);
    assert_eq!(msgs, vec!["Warning: PREVIOUS_PACKET_INCOMPLETE".to_string()]);
}

#[test]
fn oversized_declaration_is_rejected_and_parser_recovers() {
    let (mut link, host) = link(64);
    host.send(&[START_TOKEN, 0x01, 0x00]);
    assert_eq!(link.async_receive(), ReceiveCode::MessageExceedsBufferSize);
    assert_eq!(link.rx_state(), RxState::Idle);
    assert_eq!(link.rx_cursors(), (0, 0));

    host.send(&enable_frame());
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    let msgs = host_messages(&mut link, &host);
    assert_eq!(msgs, vec!["Receive Error: MESSAGE_EXCEEDS_RX_BUFFER_SIZE".to_string()]);
}

#[test]
fn undecodable_packet_leaves_command_untouched() {
    let (mut link, host) = link(1500);
    host.send(&enable_frame());
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    let before: Command = link.command().clone();

    let mut bad = vec![START_TOKEN, 0, 20];
    bad.extend_from_slice(br#"{"control_state": 5}"#);
    host.send(&bad);
    assert_eq!(link.async_receive(), ReceiveCode::DeserializationFailed);
    assert_eq!(link.command(), &before);

    let msgs = host_messages(&mut link, &host);
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].starts_with("Error: "), "{}", msgs[0]);
    assert!(msgs[0].contains("when deserializing"), "{}", msgs[0]);
}

#[test]
fn two_queued_packets_are_returned_one_per_call() {
    let (mut link, host) = link(1500);
    host.send(&codec::encode_to_vec(&json!({"pos_setpoint_mm": 1.0})).unwrap());
    host.send(&codec::encode_to_vec(&json!({"pos_setpoint_mm": 2.0})).unwrap());
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    assert!((link.command().pos_setpoint_mm - 1.0).abs() < 1e-12);
    assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    assert!((link.command().pos_setpoint_mm - 2.0).abs() < 1e-12);
    assert_eq!(link.async_receive(), ReceiveCode::NoDataAvailable);
}

#[test]
fn full_hardware_fifo_warns_about_receive_rate() {
    let (rx, tx, host) = sim_serial(16, 4096);
    let mut link = Link::new(Polled::new(rx, 1500), tx, 1500);
    let frame = enable_frame();
    let mut code = ReceiveCode::NoDataAvailable;
    for chunk in frame.chunks(16) {
        assert_eq!(host.send(chunk), chunk.len());
        code = link.async_receive();
    }
    assert_eq!(code, ReceiveCode::PacketReceived);
    let msgs = host_messages(&mut link, &host);
    assert_eq!(msgs.len(), frame.len() / 16);
    assert!(msgs.iter().all(|m| m == "Receive Warning: INSUFFICIENT_RECEIVE_RATE"));
}

#[test]
fn diagnostics_held_back_by_a_full_queue_stay_readable() {
    let (rx, tx, host) = sim_serial(4096, 4096);
    // too small for any status frame, so every diagnostic stays pending
    let mut link = Link::new(Polled::new(rx, 1500), tx, 16);
    let partial = &enable_frame()[..8];
    for _ in 0..2 {
        host.send(partial);
        host.send(&enable_frame());
        assert_eq!(link.async_receive(), ReceiveCode::PacketReceived);
    }
    assert_eq!(link.message().as_str(), "Warning: PREVIOUS_PACKET_INCOMPLETE");

    host.send(&codec::encode_to_vec(&json!({"control_state": 5})).unwrap());
    assert_eq!(link.async_receive(), ReceiveCode::DeserializationFailed);
    let text = link.message().as_str();
    assert!(text.starts_with("Warning: PREVIOUS_PACKET_INCOMPLETE; Error: "), "{text}");
    assert_eq!(text.matches("PREVIOUS_PACKET_INCOMPLETE").count(), 1);
    assert!(link.command().control_state);
}
