use balancer_core::sensor::{CycleStamp, Sensor, SensorBus, SensorKind};
use balancer_hardware::{SimulatedEncoder, SimulatedImu};
use balancer_traits::ImuSample;
use rstest::rstest;

fn bus() -> (SensorBus<SimulatedEncoder, SimulatedImu>, SimulatedImu) {
    let imu = SimulatedImu::upright();
    (SensorBus::new(SimulatedEncoder::new(), imu.clone(), 180), imu)
}

fn at(cycle: u64, now_us: u64) -> CycleStamp {
    CycleStamp { cycle, now_us }
}

#[test]
fn reads_once_per_cycle() {
    let (mut bus, _) = bus();
    let mut wheel = Sensor::new(SensorKind::WheelAngle, 0);
    bus.encoder_mut().rotate(90);
    let first = wheel.read(&bus, at(0, 0));
    bus.encoder_mut().rotate(90);
    assert_eq!(wheel.read(&bus, at(0, 10)), first);
    assert!(wheel.read(&bus, at(1, 20)) > first);
}

#[rstest]
#[case(100, 5_000, false)]
#[case(100, 10_000, true)]
#[case(0, 1, true)]
fn rate_window_limits_sampling(#[case] hz: u32, #[case] later_us: u64, #[case] updated: bool) {
    let (mut bus, _) = bus();
    let mut wheel = Sensor::new(SensorKind::WheelAngle, hz);
    wheel.read(&bus, at(0, 0));
    bus.encoder_mut().rotate(45);
    let v = wheel.read(&bus, at(1, later_us));
    assert_eq!(v != 0.0, updated);
}

#[test]
fn derivative_uses_last_two_updates() {
    let (mut bus, imu) = bus();
    let mut tilt = Sensor::new(SensorKind::TiltAngle, 0);
    tilt.read(&bus, at(0, 0));
    assert_eq!(tilt.derivative(), 0.0);
    imu.set_sample(ImuSample {
        accel: [0.0, -1.0, 1.0],
        gyro_dps: [0.0; 3],
    });
    bus.refresh().unwrap();
    tilt.read(&bus, at(1, 250_000));
    let expected = std::f64::consts::FRAC_PI_4 / 0.25;
    assert!((tilt.derivative() - expected).abs() < 1e-9);

    tilt.reset();
    assert_eq!(tilt.value(), 0.0);
    assert_eq!(tilt.derivative(), 0.0);
}

#[test]
fn tilt_rate_is_gyro_x_in_radians() {
    let (bus, imu) = bus();
    imu.set_sample(ImuSample {
        accel: [0.0, -1.0, 0.0],
        gyro_dps: [-180.0, 5.0, 5.0],
    });
    let mut rate = Sensor::new(SensorKind::TiltRate, 0);
    let v = rate.read(&bus, at(0, 0));
    assert!((v + std::f64::consts::PI).abs() < 1e-6);
}
