use crate::adb::sync::{SyncSession, TransferSummary};
use crate::commands::{blocking, select_device, SubCommand};
use crate::core::cancel::CancelToken;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use crate::output::format_size;
use crate::progress::transfer_progress;
use crate::utils::local_destination;
use async_trait::async_trait;
use log::info;
use std::path::PathBuf;

pub struct PullCommand;

#[derive(Debug, Clone)]
pub struct PullArgs {
    pub src: String,
    pub dst: PathBuf,
}

impl PullCommand {
    pub fn new() -> Self {
        Self
    }
}

fn pull(
    session: &mut SyncSession,
    args: &PullArgs,
    show_progress: bool,
    cancel: &CancelToken,
) -> Result<TransferSummary> {
    let stat = session.stat(&args.src)?;
    if !stat.exists() {
        return Err(AdbError::FileNotFound(args.src.clone()));
    }

    let target = local_destination(&args.src, &args.dst);
    let label = target.display().to_string();
    let progress = transfer_progress(show_progress, &label);

    let summary = if stat.is_directory() {
        let summary = session.pull_dir(&args.src, &target, progress.as_ref(), cancel)?;
        progress.finish();
        summary
    } else {
        TransferSummary {
            files: 1,
            bytes: session.pull_file(&args.src, &target, progress.as_ref(), cancel)?,
        }
    };
    info!("Pulled {} to {}", args.src, label);
    Ok(summary)
}

#[async_trait]
impl SubCommand for PullCommand {
    type Args = PullArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let client = ctx.client();
        let show_progress = ctx.should_show_progress();

        let summary = blocking(move || {
            let mut session = client.sync(&serial)?;
            pull(&mut session, &args, show_progress, &CancelToken::new())
        })
        .await?;

        ctx.formatter().success(&format!(
            "{} file(s) pulled, {}",
            summary.files,
            format_size(summary.bytes)
        ));
        Ok(())
    }
}
