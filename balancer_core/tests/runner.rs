use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use balancer_core::protocol::codec;
use balancer_core::protocol::{Link, Polled};
use balancer_core::runner::{CALIBRATION_DONE, CALIBRATION_NOTICE};
use balancer_core::{BalanceLoop, LoopCfg, RunnerCfg, run};
use balancer_hardware::{SimHost, SimRx, SimTx, SimulatedEncoder, SimulatedImu, SimulatedMotor, sim_serial};
use balancer_traits::clock::test_clock::TestClock;
use serde_json::{Value, json};

type Balance = BalanceLoop<SimulatedEncoder, SimulatedImu, SimulatedMotor>;

struct Rig {
    link: Link<Polled<SimRx>, SimTx>,
    balance: Balance,
    host: SimHost,
    imu: SimulatedImu,
    motor: SimulatedMotor,
}

fn rig(tx_fifo: usize) -> Rig {
    let (rx, tx, host) = sim_serial(4096, tx_fifo);
    let imu = SimulatedImu::upright();
    let motor = SimulatedMotor::new();
    let balance = BalanceLoop::new(
        SimulatedEncoder::new(),
        imu.clone(),
        motor.clone(),
        &LoopCfg::default(),
        Arc::new(TestClock::new()),
    )
    .unwrap();
    Rig {
        link: Link::new(Polled::new(rx, 1500), tx, 1500),
        balance,
        host,
        imu,
        motor,
    }
}

fn cfg(max_cycles: u64) -> RunnerCfg {
    RunnerCfg {
        idle_sleep: Duration::from_micros(200),
        max_cycles: Some(max_cycles),
    }
}

fn received(host: &SimHost) -> Vec<Value> {
    let bytes = host.recv_all();
    codec::frames(&bytes)
        .map(|p| serde_json::from_slice(p).unwrap())
        .collect()
}

#[test]
fn runs_fixed_number_of_cycles_and_streams_telemetry() {
    let mut rig = rig(1 << 16);
    rig.host
        .send(&codec::encode_to_vec(&json!({"parameters": {"variable": {"General": {"h_ms": 5}}}})).unwrap());
    let shutdown = AtomicBool::new(false);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(5), &shutdown).unwrap();

    assert_eq!(stats.cycles, 5);
    assert_eq!(stats.packets_received, 1);
    assert_eq!(stats.receive_errors, 0);
    assert_eq!(stats.telemetry_sent, 5);
    assert_eq!(stats.missed_deadlines, 0);

    let docs = received(&rig.host);
    assert_eq!(docs.len(), 5);
    assert!(docs.iter().all(|d| d.get("msg").is_none()));
    assert_eq!(docs[0]["control"]["cycle_us"], 0);
    assert_eq!(docs[4]["control"]["cycle_us"], 5_000);
    assert_eq!(rig.motor.last_command(), (0, 0));
}

#[test]
fn stalled_loop_counts_one_missed_deadline() {
    let mut rig = rig(1 << 16);
    let shutdown = AtomicBool::new(false);
    let first = run(&mut rig.link, &mut rig.balance, &cfg(3), &shutdown).unwrap();
    assert_eq!(first.missed_deadlines, 0);

    // default period is 10 ms; 35 ms without a cycle skips whole slots
    rig.balance.clock().sleep(Duration::from_millis(35));
    let late = run(&mut rig.link, &mut rig.balance, &cfg(2), &shutdown).unwrap();
    assert_eq!(late.cycles, 2);
    assert_eq!(late.missed_deadlines, 1);

    let docs = received(&rig.host);
    assert!(docs[3]["control"]["cycle_us"].as_u64().unwrap() >= 35_000);
    assert_eq!(docs[4]["control"]["cycle_us"], 10_000);
}

#[test]
fn calibration_request_notifies_host_before_blocking() {
    let mut rig = rig(1 << 16);
    rig.host
        .send(&codec::encode_to_vec(&json!({"calibration": true})).unwrap());
    let shutdown = AtomicBool::new(false);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(3), &shutdown).unwrap();

    assert_eq!(stats.calibrations, 1);
    assert_eq!(rig.imu.calibrations(), (1, 1));
    let docs = received(&rig.host);
    assert_eq!(docs[0], json!({"msg": CALIBRATION_NOTICE}));
    assert_eq!(docs[1]["msg"], CALIBRATION_DONE);
    assert_eq!(docs[1]["calibrated"], true);
    // the flag stays set but calibration only runs on its rising edge
    assert_eq!(docs.len(), 4);
}

#[test]
fn failed_calibration_is_reported_not_fatal() {
    let mut rig = rig(1 << 16);
    rig.imu.fail_calibration(true);
    rig.host
        .send(&codec::encode_to_vec(&json!({"calibration": true})).unwrap());
    let shutdown = AtomicBool::new(false);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(2), &shutdown).unwrap();

    assert_eq!(stats.calibrations, 0);
    assert_eq!(stats.cycles, 2);
    let docs = received(&rig.host);
    let msg = docs[1]["msg"].as_str().unwrap();
    assert!(msg.starts_with("IMU calibration failed"), "{msg}");
    assert_eq!(docs[1]["calibrated"], false);
}

#[test]
fn slow_host_causes_backpressure_not_corruption() {
    let mut rig = rig(64);
    let shutdown = AtomicBool::new(false);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(20), &shutdown).unwrap();

    assert_eq!(stats.cycles, 20);
    assert!(stats.tx_backpressure > 0);
    assert_eq!(stats.telemetry_sent + stats.tx_backpressure, 20);

    // whatever got through is a clean prefix of whole frames
    let bytes = rig.host.recv_all();
    assert_eq!(bytes.len(), 64);
    assert_eq!(bytes[0], codec::START_TOKEN);
}

#[test]
fn shutdown_flag_stops_before_first_cycle() {
    let mut rig = rig(1 << 16);
    let shutdown = AtomicBool::new(true);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(100), &shutdown).unwrap();
    assert_eq!(stats.cycles, 0);
    assert!(received(&rig.host).is_empty());
}

#[test]
fn receive_errors_are_counted() {
    let mut rig = rig(1 << 16);
    let mut bad = vec![codec::START_TOKEN, 0, 3];
    bad.extend_from_slice(b"{{{");
    rig.host.send(&bad);
    let shutdown = AtomicBool::new(false);
    let stats = run(&mut rig.link, &mut rig.balance, &cfg(1), &shutdown).unwrap();
    assert_eq!(stats.receive_errors, 1);
    assert_eq!(stats.packets_received, 0);
    let docs = received(&rig.host);
    assert!(docs[0]["msg"].as_str().unwrap().contains("when deserializing"));
}
