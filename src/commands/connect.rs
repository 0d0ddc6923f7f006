use crate::adb::transport::{Endpoint, DEFAULT_DEVICE_TCP_PORT};
use crate::commands::{blocking, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;

/// `connect` and `disconnect` for devices reachable over TCP/IP
pub struct ConnectCommand {
    disconnect: bool,
}

#[derive(Debug, Clone)]
pub struct ConnectArgs {
    pub address: String,
}

impl ConnectCommand {
    pub fn connect() -> Self {
        Self { disconnect: false }
    }

    pub fn disconnect() -> Self {
        Self { disconnect: true }
    }
}

#[async_trait]
impl SubCommand for ConnectCommand {
    type Args = ConnectArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let address = Endpoint::parse(&args.address, DEFAULT_DEVICE_TCP_PORT)?;
        let client = ctx.client();
        let disconnect = self.disconnect;

        let message = blocking(move || {
            if disconnect {
                client.disconnect_device(&address)
            } else {
                client.connect_device(&address)
            }
        })
        .await?;

        ctx.formatter().success(&message);
        Ok(())
    }
}
