use crate::config::Config;
use crate::core::context::CommandContext;
use crate::core::types::Device;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::debug;
use std::io;

/// Base trait for all subcommands
#[async_trait]
pub trait SubCommand {
    type Args;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()>;
}

/// Run blocking protocol work off the async runtime
pub async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AdbError::from_local(io::Error::new(io::ErrorKind::Other, e)))?
}

/// Helper for device selection in commands
pub async fn select_device(ctx: &CommandContext) -> Result<String> {
    let client = ctx.client();
    let devices = blocking(move || client.devices()).await?;
    resolve_serial(ctx.serial.as_deref(), &devices, &ctx.config)
}

/// Pick the device a command targets.
///
/// `requested` may be a full serial, a configured device name, or a unique
/// serial prefix. Without it, the only online device is used.
pub fn resolve_serial(requested: Option<&str>, devices: &[Device], config: &Config) -> Result<String> {
    let Some(wanted) = requested else {
        let mut online = devices.iter().filter(|d| d.is_online());
        return match (online.next(), online.next()) {
            (None, _) => Err(AdbError::NoDevicesFound),
            (Some(device), None) => Ok(device.serial.clone()),
            _ => Err(AdbError::DeviceIdRequired),
        };
    };

    if devices.iter().any(|d| d.serial == wanted) {
        return Ok(wanted.to_string());
    }

    let lowered = wanted.to_lowercase();
    if let Some(serial) = config.devices.iter().find_map(|(serial, device)| {
        device
            .name
            .as_ref()
            .filter(|name| name.to_lowercase() == lowered)
            .map(|_| serial.clone())
    }) {
        debug!("Device name {} resolves to {}", wanted, serial);
        return Ok(serial);
    }

    let mut matches = devices
        .iter()
        .filter(|d| d.serial.to_lowercase().starts_with(&lowered));
    match (matches.next(), matches.next()) {
        (Some(device), None) => Ok(device.serial.clone()),
        (Some(_), Some(_)) => Err(AdbError::DeviceIdRequired),
        (None, _) => Err(AdbError::DeviceNotFound(wanted.to_string())),
    }
}

pub mod connect;
pub mod devices;
pub mod forward;
pub mod ls;
pub mod pull;
pub mod push;
pub mod reboot;
pub mod runner;
pub mod server;
pub mod shell;
pub mod stat;
pub mod track;
pub mod version;
