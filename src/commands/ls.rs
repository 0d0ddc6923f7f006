use crate::commands::{blocking, select_device, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;

pub struct LsCommand;

#[derive(Debug, Clone)]
pub struct LsArgs {
    pub path: String,
    pub all: bool,
}

impl LsCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for LsCommand {
    type Args = LsArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let client = ctx.client();
        let path = args.path.clone();

        let mut entries = blocking(move || client.sync(&serial)?.list(&path)).await?;
        if !args.all {
            entries.retain(|entry| entry.name != "." && entry.name != "..");
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        ctx.formatter().print(ctx.output_format, &entries)
    }
}
