//! Device readiness polling
//!
//! Repeated transport probes turned into a deterministic ready/not-ready
//! verdict. Normal-mode boot tears the device connection down and rebuilds
//! it, which can report a false "ready" transiently, so readiness there
//! requires a streak of matching observations. Bootloader mode is a stable
//! low-level state and a single observation suffices.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::ProvisionError;
use crate::service::context::DutConnection;

/// Consecutive `device` observations required before normal mode is ready.
pub const DEVICE_READY_STREAK: u32 = 3;

/// Consecutive `unauthorized` observations that turn a slow boot into a
/// trust/pairing failure.
pub const UNAUTHORIZED_LIMIT: u32 = 16;

/// Bounds for one polling loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Sleep between probes
    pub interval: Duration,

    /// Probe budget before the wait times out
    pub max_attempts: u32,
}

/// Device transport state as reported by a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Normal mode, ready
    Device,

    /// Present but not trusted by the host
    Unauthorized,

    /// Bootloader mode, ready
    Fastboot,

    /// Absent, offline, or any unrecognized state
    Offline,
}

impl TransportState {
    pub fn parse(output: &str) -> Self {
        match output.trim() {
            "device" => TransportState::Device,
            "unauthorized" => TransportState::Unauthorized,
            "fastboot" => TransportState::Fastboot,
            _ => TransportState::Offline,
        }
    }
}

/// One transport probe through the given tool (`adb` or `fastboot`).
pub async fn probe_transport(
    dut: &DutConnection,
    tool: &str,
) -> Result<TransportState, ProvisionError> {
    let args = [
        "devices",
        "|",
        "grep",
        "-sw",
        dut.serial_number.as_str(),
        "|",
        "awk",
        "'{print $2}'",
    ];
    let output = dut.run_cmd(tool, &args).await?;
    Ok(TransportState::parse(&output))
}

/// Wait for the device to settle in normal mode.
///
/// Ready after [`DEVICE_READY_STREAK`] consecutive `device` observations.
/// Any other observation resets the streak. A run of [`UNAUTHORIZED_LIMIT`]
/// `unauthorized` observations without an intervening `device` is reported
/// as a distinct trust failure rather than a timeout; offline flaps do not
/// reset that counter.
pub async fn wait_for_normal_mode<S, F>(
    dut: &DutConnection,
    options: &PollOptions,
    sleep_fn: S,
) -> Result<(), ProvisionError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut ready_streak = 0u32;
    let mut unauthorized_run = 0u32;

    for attempt in 0..options.max_attempts {
        if attempt > 0 {
            tokio::select! {
                _ = dut.cancel.cancelled() => return Err(ProvisionError::Cancelled),
                _ = sleep_fn(options.interval) => {}
            }
        }

        let state = match probe_transport(dut, "adb").await {
            Ok(state) => state,
            Err(ProvisionError::Cancelled) => return Err(ProvisionError::Cancelled),
            Err(e) => {
                debug!("transport probe failed, treating as offline: {}", e);
                TransportState::Offline
            }
        };

        match state {
            TransportState::Device => {
                ready_streak += 1;
                unauthorized_run = 0;
                if ready_streak >= DEVICE_READY_STREAK {
                    debug!("device ready after {} probes", attempt + 1);
                    return Ok(());
                }
            }
            TransportState::Unauthorized => {
                ready_streak = 0;
                unauthorized_run += 1;
                warn!(
                    "device unauthorized ({}/{})",
                    unauthorized_run, UNAUTHORIZED_LIMIT
                );
                if unauthorized_run >= UNAUTHORIZED_LIMIT {
                    return Err(ProvisionError::DeviceUnauthorized {
                        observations: unauthorized_run,
                    });
                }
            }
            TransportState::Fastboot | TransportState::Offline => {
                ready_streak = 0;
            }
        }
    }

    Err(ProvisionError::PollTimeout {
        attempts: options.max_attempts,
    })
}

/// Wait for the device to enter bootloader mode.
///
/// A single `fastboot` observation suffices; there is no flapping-reconnect
/// hazard in bootloader mode.
pub async fn wait_for_bootloader_mode<S, F>(
    dut: &DutConnection,
    options: &PollOptions,
    sleep_fn: S,
) -> Result<(), ProvisionError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    for attempt in 0..options.max_attempts {
        if attempt > 0 {
            tokio::select! {
                _ = dut.cancel.cancelled() => return Err(ProvisionError::Cancelled),
                _ = sleep_fn(options.interval) => {}
            }
        }

        match probe_transport(dut, "fastboot").await {
            Ok(TransportState::Fastboot) => {
                debug!("bootloader mode ready after {} probes", attempt + 1);
                return Ok(());
            }
            Ok(state) => {
                debug!("waiting for bootloader mode, observed {:?}", state);
            }
            Err(ProvisionError::Cancelled) => return Err(ProvisionError::Cancelled),
            Err(e) => {
                debug!("transport probe failed, treating as offline: {}", e);
            }
        }
    }

    Err(ProvisionError::PollTimeout {
        attempts: options.max_attempts,
    })
}
