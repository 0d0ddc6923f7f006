use crate::commands::{blocking, SubCommand};
use crate::core::context::CommandContext;
use crate::core::types::OutputFormat;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub struct VersionCommand;

#[derive(Serialize)]
struct VersionInfo {
    client: &'static str,
    server: u32,
}

impl VersionCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for VersionCommand {
    type Args = ();

    async fn run(&self, ctx: &CommandContext, _args: Self::Args) -> Result<()> {
        let client = ctx.client();
        let server = blocking(move || client.server_version()).await?;
        let info = VersionInfo {
            client: env!("CARGO_PKG_VERSION"),
            server,
        };

        let formatter = ctx.formatter();
        match ctx.output_format {
            OutputFormat::Json => formatter.json(&info),
            OutputFormat::Plain => {
                formatter.message(&info.server.to_string());
                Ok(())
            }
            OutputFormat::Table => {
                formatter.message(&format!("adbhost {}", info.client));
                formatter.message(&format!("ADB server version 1.0.{}", info.server));
                Ok(())
            }
        }
    }
}
