use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use balancer_traits::{ByteSink, Encoder, Imu, Motor};
use eyre::WrapErr;
use serde::Serialize;

use crate::balance::BalanceLoop;
use crate::config::RunnerCfg;
use crate::error::Result;
use crate::protocol::{Link, RxStrategy};
use crate::status::ReceiveCode;

/// Counters collected by [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub cycles: u64,
    pub packets_received: u64,
    pub receive_errors: u64,
    pub telemetry_sent: u64,
    /// Telemetry frames skipped because the transmit queue was still full.
    pub tx_backpressure: u64,
    /// Cycles whose start came two or more periods after the previous
    /// start, i.e. at least one whole slot was skipped.
    pub missed_deadlines: u64,
    pub calibrations: u64,
}

pub const CALIBRATION_NOTICE: &str = "Calibrating IMU, keep the robot still";
pub const CALIBRATION_DONE: &str = "IMU calibration done";

/// Cooperative main loop: receive, calibrate on request, run due control
/// cycles, queue telemetry, drain the transmit queue.
///
/// Returns when `shutdown` is set or `cfg.max_cycles` cycles have run. The
/// motor is stopped on every exit path.
pub fn run<R, W, E, I, M>(
    link: &mut Link<R, W>,
    balance: &mut BalanceLoop<E, I, M>,
    cfg: &RunnerCfg,
    shutdown: &AtomicBool,
) -> Result<RunStats>
where
    R: RxStrategy,
    W: ByteSink,
    E: Encoder,
    I: Imu,
    M: Motor,
{
    let mut stats = RunStats::default();
    let result = run_loop(link, balance, cfg, shutdown, &mut stats);
    if let Err(e) = balance.motor_stop() {
        tracing::warn!(error = %e, "motor_stop failed on exit");
    }
    flush(link, balance, cfg.idle_sleep);
    match &result {
        Ok(()) => tracing::info!(
            cycles = stats.cycles,
            packets = stats.packets_received,
            receive_errors = stats.receive_errors,
            tx_backpressure = stats.tx_backpressure,
            missed_deadlines = stats.missed_deadlines,
            "balance loop stopped"
        ),
        Err(e) => tracing::error!(error = %e, cycles = stats.cycles, "balance loop aborted"),
    }
    result.map(|()| stats)
}

fn run_loop<R, W, E, I, M>(
    link: &mut Link<R, W>,
    balance: &mut BalanceLoop<E, I, M>,
    cfg: &RunnerCfg,
    shutdown: &AtomicBool,
    stats: &mut RunStats,
) -> Result<()>
where
    R: RxStrategy,
    W: ByteSink,
    E: Encoder,
    I: Imu,
    M: Motor,
{
    tracing::info!(max_cycles = ?cfg.max_cycles, "balance loop start");
    let mut calibration_prev = false;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            return Ok(());
        }
        if cfg.max_cycles.is_some_and(|n| stats.cycles >= n) {
            return Ok(());
        }

        let code = link.async_receive();
        match code {
            ReceiveCode::PacketReceived => {
                stats.packets_received += 1;
                balance.observe(link.command());
            }
            c if c.is_error() => stats.receive_errors += 1,
            _ => {}
        }

        let calibration = link.command().calibration;
        if calibration && !calibration_prev {
            calibrate(link, balance, stats)?;
        }
        calibration_prev = calibration;

        let ran = balance.cycle_due(link.command());
        if ran {
            let period = balance.period(link.command());
            let (cmd, telemetry) = link.command_and_telemetry();
            balance.cycle(cmd, telemetry)?;
            stats.cycles += 1;
            let interval = Duration::from_micros(u64::from(telemetry.control.cycle_us));
            if interval >= period * 2 {
                stats.missed_deadlines += 1;
                tracing::debug!(cycle_us = telemetry.control.cycle_us, "missed deadline");
            }
            queue_telemetry(link, stats);
        }

        link.async_transmit();

        if !ran && code == ReceiveCode::NoDataAvailable {
            let wait = balance.time_until_due(link.command()).min(cfg.idle_sleep);
            balance.clock().sleep(wait);
        }
    }
}

fn queue_telemetry<R: RxStrategy, W: ByteSink>(link: &mut Link<R, W>, stats: &mut RunStats) {
    match link.enqueue_telemetry() {
        Ok(_) => stats.telemetry_sent += 1,
        Err(e) if e.is_transient() => {
            stats.tx_backpressure += 1;
            tracing::warn!(pending = link.pending(), "telemetry skipped: {e}");
        }
        Err(e) => {
            tracing::error!(error = %e, "telemetry frame cannot be sent");
            if let Err(e2) = link.message_enqueue(&format!("Transmit Error: {e}")) {
                tracing::warn!(error = %e2, "transmit error not reported");
            }
        }
    }
}

/// Host-requested IMU calibration. A failed calibration is reported to the
/// host and the loop carries on; only a broken link is fatal.
fn calibrate<R, W, E, I, M>(
    link: &mut Link<R, W>,
    balance: &mut BalanceLoop<E, I, M>,
    stats: &mut RunStats,
) -> Result<()>
where
    R: RxStrategy,
    W: ByteSink,
    E: Encoder,
    I: Imu,
    M: Motor,
{
    link.message_transmit_now(CALIBRATION_NOTICE)
        .wrap_err("sending calibration notice")?;
    match balance.calibrate() {
        Ok(()) => {
            stats.calibrations += 1;
            link.telemetry_mut().calibrated = true;
            link.message_append(CALIBRATION_DONE);
        }
        Err(e) => {
            tracing::error!(error = %e, "imu calibration failed");
            link.telemetry_mut().calibrated = false;
            link.message_append(&format!("IMU calibration failed: {e}"));
        }
    }
    Ok(())
}

/// Give queued frames a bounded chance to leave before returning.
fn flush<R, W, E, I, M>(link: &mut Link<R, W>, balance: &BalanceLoop<E, I, M>, poll: Duration)
where
    R: RxStrategy,
    W: ByteSink,
    E: Encoder,
    I: Imu,
    M: Motor,
{
    const FLUSH_ATTEMPTS: u32 = 50;
    for _ in 0..FLUSH_ATTEMPTS {
        if link.async_transmit() == 0 {
            return;
        }
        balance.clock().sleep(poll);
    }
    tracing::debug!(pending = link.pending(), "exit with unsent bytes");
}
