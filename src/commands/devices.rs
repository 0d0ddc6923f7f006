use crate::commands::{blocking, SubCommand};
use crate::core::context::CommandContext;
use crate::core::types::{Device, OutputFormat};
use crate::error::Result;
use crate::output::{PlainFormat, TableFormat};
use async_trait::async_trait;
use log::debug;
use serde::Serialize;

pub struct DevicesCommand;

#[derive(Debug, Clone)]
pub struct DevicesArgs {
    pub long: bool,
}

/// Serial and state only, for the default listing
#[derive(Serialize)]
struct ShortDevice {
    serial: String,
    state: String,
}

impl From<&Device> for ShortDevice {
    fn from(device: &Device) -> Self {
        Self {
            serial: device.serial.clone(),
            state: device.state.to_string(),
        }
    }
}

impl TableFormat for ShortDevice {
    fn headers() -> Vec<&'static str> {
        vec!["SERIAL", "STATE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.serial.clone(), self.state.clone()]
    }
}

impl PlainFormat for ShortDevice {
    fn plain(&self) -> String {
        format!("{}\t{}", self.serial, self.state)
    }
}

impl DevicesCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for DevicesCommand {
    type Args = DevicesArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let client = ctx.client();
        let devices = blocking(move || client.devices()).await?;
        debug!("Found {} devices", devices.len());

        let formatter = ctx.formatter();
        if devices.is_empty() && ctx.output_format != OutputFormat::Json {
            formatter.message("No devices attached");
            return Ok(());
        }

        if args.long {
            formatter.print(ctx.output_format, &devices)
        } else {
            let short: Vec<ShortDevice> = devices.iter().map(ShortDevice::from).collect();
            formatter.print(ctx.output_format, &short)
        }
    }
}
