use crate::commands::{blocking, select_device, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use crate::output::file::StatInfo;
use async_trait::async_trait;

pub struct StatCommand;

#[derive(Debug, Clone)]
pub struct StatArgs {
    pub paths: Vec<String>,
}

impl StatCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for StatCommand {
    type Args = StatArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let client = ctx.client();

        let infos = blocking(move || {
            let mut session = client.sync(&serial)?;
            args.paths
                .iter()
                .map(|path| -> Result<StatInfo> {
                    Ok(StatInfo::new(path.as_str(), session.stat(path)?))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?;

        ctx.formatter().print(ctx.output_format, &infos)
    }
}
