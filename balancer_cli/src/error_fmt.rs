//! Human-readable error descriptions and structured JSON error formatting.

use balancer_core::error::BalancerError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = find_balancer_error(err) {
        return match be {
            BalancerError::Timeout => "What happened: A sensor did not answer in time.\nLikely causes: IMU not wired correctly, wrong I2C address, or no power.\nHow to fix: Verify SDA/SCL wiring and imu.i2c_address in the config.".to_string(),
            BalancerError::LinkClosed => "What happened: The serial link to the host closed.\nLikely causes: USB/UART cable unplugged or the host program exited.\nHow to fix: Reconnect the host and restart the run.".to_string(),
            BalancerError::Calibration(msg) => format!(
                "What happened: IMU calibration failed ({msg}).\nLikely causes: The robot moved while calibrating.\nHow to fix: Hold the robot still and upright, then request calibration again."
            ),
            BalancerError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/balancer.toml for a sample."
            ),
            BalancerError::Hardware(msg) | BalancerError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong pin numbers, missing permissions for GPIO/I2C/UART, or a disconnected device.\nHow to fix: Check [pins] and [serial] in the config and the process permissions."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Pass --config with the path to a TOML file."
        );
    }

    if lower.contains("open uart") || lower.contains("open encoder") || lower.contains("open motor") {
        return "What happened: Failed to initialize hardware.\nLikely causes: Incorrect pin numbers, wrong serial device, or insufficient permissions.\nHow to fix: Fix [pins] and [serial] in the config; ensure the process may access GPIO and the UART.".to_string();
    }

    if lower.contains("invalid configuration")
        || lower.contains("must be")
        || (lower.contains("pins") && lower.contains("missing"))
    {
        let detail = err
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        return format!(
            "What happened: Configuration is invalid or incomplete ({detail}).\nLikely causes: Missing [pins] (encoder_a, encoder_b, motor_forward, motor_backward) or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("command payload") {
        return format!(
            "What happened: The --command file is not a valid command ({msg}).\nHow to fix: Provide a JSON object such as {{\"control_state\": true}}."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn find_balancer_error(err: &eyre::Report) -> Option<&BalancerError> {
    err.chain().find_map(|e| e.downcast_ref::<BalancerError>())
}

/// Stable exit codes: 2 hardware, 3 link closed, 4 calibration, 1 everything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match find_balancer_error(err) {
        Some(BalancerError::Hardware(_) | BalancerError::HardwareFault(_) | BalancerError::Timeout) => 2,
        Some(BalancerError::LinkClosed) => 3,
        Some(BalancerError::Calibration(_)) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match find_balancer_error(err) {
        Some(BalancerError::Hardware(_)) => "Hardware",
        Some(BalancerError::HardwareFault(_)) => "HardwareFault",
        Some(BalancerError::Config(_)) => "Config",
        Some(BalancerError::Timeout) => "Timeout",
        Some(BalancerError::Calibration(_)) => "Calibration",
        Some(BalancerError::LinkClosed) => "LinkClosed",
        Some(BalancerError::Io(_)) => "Io",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
