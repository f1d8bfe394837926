//! Hardware assembly and the `run` / `self-check` subcommands.

use crate::cli::{RtLock, RunArgs};
use crate::rt::setup_rt_once;
use balancer_core::protocol::{Drained, Polled, RxStrategy, codec};
use balancer_core::{BalanceLoop, Command, Link, LinkCfg, LoopCfg, RunStats, RunnerCfg, RxMode};
use balancer_hardware::{SimHost, SimulatedEncoder, SimulatedImu, SimulatedMotor, sim_serial};
use balancer_traits::{ByteSink, Clock, Encoder, Imu, Motor, MonotonicClock};
use eyre::WrapErr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Host side of the simulated UART; large enough that telemetry never waits on stdout.
const SIM_TX_FIFO: usize = 1 << 16;
const HOST_POLL: Duration = Duration::from_millis(20);

/// Runtime settings derived from the TOML config plus CLI overrides.
struct Plan {
    link: LinkCfg,
    balance: LoopCfg,
    runner: RunnerCfg,
}

impl Plan {
    fn new(cfg: &balancer_config::Config, args: &RunArgs) -> Self {
        let mut link: LinkCfg = (&cfg.link).into();
        if args.polled {
            link.rx_mode = RxMode::Polled;
        }
        let mut runner: RunnerCfg = (&cfg.runner).into();
        if args.max_cycles.is_some() {
            runner.max_cycles = args.max_cycles;
        }
        Self {
            link,
            balance: cfg.into(),
            runner,
        }
    }
}

pub fn run_balance(
    cfg: &balancer_config::Config,
    args: &RunArgs,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<RunStats> {
    setup_rt_once(
        args.rt,
        args.rt_prio,
        args.rt_lock.unwrap_or(RtLock::os_default()),
        args.rt_cpu,
    );
    let plan = Plan::new(cfg, args);
    tracing::info!(
        sim = args.sim,
        rx_mode = ?plan.link.rx_mode,
        max_cycles = ?plan.runner.max_cycles,
        "starting balance loop"
    );

    if args.sim {
        return run_sim(&plan, args.command.as_deref(), &shutdown);
    }
    run_hardware(cfg, &plan, &shutdown)
}

fn run_sim(plan: &Plan, command: Option<&Path>, shutdown: &AtomicBool) -> eyre::Result<RunStats> {
    let command = command.map(load_command).transpose()?;
    let (rx, tx, host) = sim_serial(balancer_hardware::serial_sim::DEFAULT_FIFO_BYTES, SIM_TX_FIFO);
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut balance = BalanceLoop::new(
        SimulatedEncoder::new(),
        SimulatedImu::upright(),
        SimulatedMotor::new(),
        &plan.balance,
        clock,
    )?;

    let done = Arc::new(AtomicBool::new(false));
    let host_done = done.clone();
    let host_thread = std::thread::spawn(move || simulated_host(&host, command.as_deref(), &host_done));

    let result = match plan.link.rx_mode {
        RxMode::Polled => drive(
            Polled::new(rx, plan.link.rx_capacity),
            tx,
            &mut balance,
            plan,
            shutdown,
        ),
        RxMode::Drained => drive(
            Drained::spawn(rx, plan.link.rx_capacity, plan.link.drain_period, MonotonicClock::new()),
            tx,
            &mut balance,
            plan,
            shutdown,
        ),
    };

    done.store(true, Ordering::Relaxed);
    if host_thread.join().is_err() {
        tracing::warn!("simulated host thread panicked");
    }
    result
}

fn drive<R, W, E, I, M>(
    rx: R,
    tx: W,
    balance: &mut BalanceLoop<E, I, M>,
    plan: &Plan,
    shutdown: &AtomicBool,
) -> eyre::Result<RunStats>
where
    R: RxStrategy,
    W: ByteSink,
    E: Encoder,
    I: Imu,
    M: Motor,
{
    let mut link = Link::new(rx, tx, plan.link.tx_capacity);
    balancer_core::run(&mut link, balance, &plan.runner, shutdown)
}

/// Read a JSON command payload and check it decodes as a `Command`.
fn load_command(path: &Path) -> eyre::Result<Vec<u8>> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read command payload {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).wrap_err("command payload is not JSON")?;
    codec::decode::<Command>(text.as_bytes()).wrap_err("command payload does not match the command schema")?;
    codec::encode_to_vec(&value).wrap_err("encode command payload")
}

/// Send the optional command, then print every frame the device emits as one
/// JSON line on stdout until the run is over.
fn simulated_host(host: &SimHost, command: Option<&[u8]>, done: &AtomicBool) {
    if let Some(frame) = command {
        match host.send_blocking(frame) {
            Ok(()) => tracing::debug!(bytes = frame.len(), "simulated host sent command"),
            Err(e) => tracing::warn!(error = %e, "simulated host could not send command"),
        }
    }

    let mut pending = Vec::new();
    let stdout = std::io::stdout();
    loop {
        match host.recv_timeout(HOST_POLL) {
            Some(b) => {
                pending.push(b);
                pending.extend(host.recv_all());
            }
            None if done.load(Ordering::Relaxed) => break,
            None => {}
        }
        let mut out = stdout.lock();
        while let Some(payload) = take_frame(&mut pending) {
            let line = serde_json::from_slice::<serde_json::Value>(&payload).unwrap_or_else(|_| {
                serde_json::json!({ "raw": String::from_utf8_lossy(&payload) })
            });
            if writeln!(out, "{line}").is_err() {
                return;
            }
        }
    }
    pending.extend(host.recv_all());
    let mut out = stdout.lock();
    while let Some(payload) = take_frame(&mut pending) {
        if let Ok(line) = serde_json::from_slice::<serde_json::Value>(&payload) {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Pop the first complete frame's payload, discarding noise before the start token.
fn take_frame(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let start = pending.iter().position(|&b| b == codec::START_TOKEN);
    match start {
        Some(0) => {}
        Some(n) => {
            pending.drain(..n);
        }
        None => {
            pending.clear();
            return None;
        }
    }
    let len = codec::declared_len(&pending[..])?;
    if pending.len() < codec::HEADER_LEN + len {
        return None;
    }
    let frame: Vec<u8> = pending.drain(..codec::HEADER_LEN + len).collect();
    Some(frame[codec::HEADER_LEN..].to_vec())
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn run_hardware(
    cfg: &balancer_config::Config,
    plan: &Plan,
    shutdown: &AtomicBool,
) -> eyre::Result<RunStats> {
    let (encoder, imu, motor, (rx, tx)) = open_hardware(cfg)?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut balance = BalanceLoop::new(encoder, imu, motor, &plan.balance, clock)?;
    match plan.link.rx_mode {
        RxMode::Polled => drive(
            Polled::new(rx, plan.link.rx_capacity),
            tx,
            &mut balance,
            plan,
            shutdown,
        ),
        RxMode::Drained => drive(
            Drained::spawn(rx, plan.link.rx_capacity, plan.link.drain_period, MonotonicClock::new()),
            tx,
            &mut balance,
            plan,
            shutdown,
        ),
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn run_hardware(
    _cfg: &balancer_config::Config,
    _plan: &Plan,
    _shutdown: &AtomicBool,
) -> eyre::Result<RunStats> {
    eyre::bail!(
        "hardware backend not compiled in: rebuild with --features hardware on Linux, or pass --sim"
    )
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
type HardwareSet = (
    balancer_hardware::rpi::GpioEncoder,
    balancer_hardware::rpi::Mpu9250,
    balancer_hardware::rpi::PwmMotor,
    (balancer_hardware::rpi::UartRx, balancer_hardware::rpi::UartTx),
);

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_hardware(cfg: &balancer_config::Config) -> eyre::Result<HardwareSet> {
    use balancer_core::hw_error::map_hw_error;
    use balancer_hardware::rpi::{GpioEncoder, Mpu9250, PwmMotor, open_uart};

    let encoder = GpioEncoder::attach(cfg.pins.encoder_a, cfg.pins.encoder_b)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open encoder pins")?;
    let imu = Mpu9250::new(cfg.imu.i2c_address, cfg.imu.calibration_samples)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open imu")?;
    let motor = PwmMotor::new(
        cfg.pins.motor_forward,
        cfg.pins.motor_backward,
        cfg.actuator.pwm_frequency_hz,
    )
    .map_err(|e| eyre::Report::new(map_hw_error(&e)))
    .wrap_err("open motor pins")?;
    let uart = open_uart(&cfg.serial.device, cfg.serial.baud_rate)
        .map_err(|e| eyre::Report::new(map_hw_error(&e)))
        .wrap_err("open uart")?;
    Ok((encoder, imu, motor, uart))
}

/// Build the loop and run one cycle against simulated devices; with the
/// `hardware` feature, also open every real device once.
pub fn self_check(cfg: &balancer_config::Config) -> eyre::Result<()> {
    let loop_cfg: LoopCfg = cfg.into();
    let link_cfg: LinkCfg = (&cfg.link).into();
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut balance = BalanceLoop::new(
        SimulatedEncoder::new(),
        SimulatedImu::upright(),
        SimulatedMotor::new(),
        &loop_cfg,
        clock,
    )?;
    let (rx, tx, host) = sim_serial(balancer_hardware::serial_sim::DEFAULT_FIFO_BYTES, SIM_TX_FIFO);
    let mut link = Link::new(Polled::new(rx, link_cfg.rx_capacity), tx, link_cfg.tx_capacity);

    let (cmd, telemetry) = link.command_and_telemetry();
    balance.cycle(cmd, telemetry).wrap_err("control cycle")?;
    link.enqueue_telemetry()
        .map_err(|e| eyre::eyre!("telemetry does not fit link.tx_buffer_size: {e}"))?;
    let mut left = link.pending();
    while left > 0 {
        let still = link.async_transmit();
        if still >= left {
            eyre::bail!("simulated link stalled with {still} bytes queued");
        }
        left = still;
    }
    if codec::frames(&host.recv_all()).count() != 1 {
        eyre::bail!("telemetry frame did not reach the simulated host");
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let _devices = open_hardware(cfg)?;
        tracing::info!("hardware devices opened");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_frame_skips_noise_and_waits_for_whole_frame() {
        let frame = codec::encode_to_vec(&serde_json::json!({"msg": "hi"})).unwrap();
        let mut pending = b"xx".to_vec();
        pending.extend_from_slice(&frame[..4]);
        assert!(take_frame(&mut pending).is_none());
        pending.extend_from_slice(&frame[4..]);
        assert_eq!(take_frame(&mut pending).unwrap(), br#"{"msg":"hi"}"#);
        assert!(pending.is_empty());
    }

    #[test]
    #[cfg(not(feature = "hardware"))]
    fn self_check_passes_on_sample_config() {
        let cfg = balancer_config::load_toml(include_str!("../../etc/balancer.toml")).unwrap();
        cfg.validate().unwrap();
        self_check(&cfg).unwrap();
    }
}
