use crate::cli::ServerOperation;
use crate::commands::{blocking, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;
use colored::*;

pub struct ServerCommand;

#[derive(Debug, Clone)]
pub struct ServerArgs {
    /// Server operation to perform
    pub operation: ServerOperation,
}

impl ServerCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for ServerCommand {
    type Args = ServerArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let client = ctx.client();
        let server = client.server();
        let formatter = ctx.formatter();

        match args.operation {
            ServerOperation::Start => {
                formatter.message("Starting ADB server...");
                blocking(move || server.start()).await?;
                formatter.success("ADB server started");
            }
            ServerOperation::Stop => {
                formatter.message("Stopping ADB server...");
                blocking(move || client.kill_server()).await?;
                formatter.success("ADB server stopped");
            }
            ServerOperation::Restart => {
                formatter.message("Restarting ADB server...");
                blocking(move || server.restart()).await?;
                formatter.success("ADB server restarted");
            }
            ServerOperation::Status => {
                let endpoint = client.endpoint().clone();
                let version = blocking(move || {
                    Ok(if server.is_running() {
                        client.server_version().ok()
                    } else {
                        None
                    })
                })
                .await?;
                match version {
                    Some(version) => formatter.message(&format!(
                        "{} ADB server 1.0.{} is running on {}",
                        "●".green(),
                        version,
                        endpoint
                    )),
                    None => formatter.message(&format!("{} ADB server is not running", "●".red())),
                }
            }
        }

        Ok(())
    }
}
