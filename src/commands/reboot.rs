use crate::cli::RebootTarget;
use crate::commands::{blocking, select_device, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;

pub struct RebootCommand;

#[derive(Debug, Clone)]
pub struct RebootArgs {
    pub target: Option<RebootTarget>,
}

impl RebootCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for RebootCommand {
    type Args = RebootArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let target = args.target.map(|t| t.as_str()).unwrap_or("");
        let client = ctx.client();
        let message = match args.target {
            Some(t) => format!("Rebooting {} into {}", serial, t.as_str()),
            None => format!("Rebooting {}", serial),
        };

        blocking(move || client.reboot(&serial, target)).await?;
        ctx.formatter().success(&message);
        Ok(())
    }
}
