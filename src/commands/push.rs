use crate::adb::sync::{join_remote, SyncSession, TransferSummary};
use crate::commands::{blocking, select_device, SubCommand};
use crate::core::cancel::CancelToken;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use crate::output::format_size;
use crate::progress::transfer_progress;
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct PushCommand;

#[derive(Debug, Clone)]
pub struct PushArgs {
    pub src: Vec<PathBuf>,
    pub dst: String,
}

impl PushCommand {
    pub fn new() -> Self {
        Self
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn tree_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Where `src` lands: inside `dst` when it is an existing remote directory
/// (or several sources are pushed), `dst` itself otherwise
pub(crate) fn push_target(
    session: &mut SyncSession,
    src: &Path,
    dst: &str,
    multiple: bool,
) -> Result<String> {
    if multiple || session.stat(dst)?.is_directory() {
        Ok(join_remote(dst, &file_name(src)))
    } else {
        Ok(dst.to_string())
    }
}

fn push_all(
    session: &mut SyncSession,
    args: &PushArgs,
    show_progress: bool,
    cancel: &CancelToken,
) -> Result<TransferSummary> {
    let multiple = args.src.len() > 1;
    let mut total = TransferSummary::default();

    for src in &args.src {
        let target = push_target(session, src, &args.dst, multiple)?;
        let progress = transfer_progress(show_progress, &file_name(src));

        if src.is_dir() {
            progress.start(tree_size(src));
            let summary = session.push_dir(src, &target, progress.as_ref(), cancel)?;
            progress.finish();
            total.files += summary.files;
            total.bytes += summary.bytes;
        } else if src.is_file() {
            total.bytes += session.push_file(src, &target, progress.as_ref(), cancel)?;
            total.files += 1;
        } else {
            return Err(AdbError::FileNotFound(src.display().to_string()));
        }
        info!("Pushed {} to {}", src.display(), target);
    }

    Ok(total)
}

#[async_trait]
impl SubCommand for PushCommand {
    type Args = PushArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let client = ctx.client();
        let show_progress = ctx.should_show_progress();

        let summary = blocking(move || {
            let mut session = client.sync(&serial)?;
            push_all(&mut session, &args, show_progress, &CancelToken::new())
        })
        .await?;

        ctx.formatter().success(&format!(
            "{} file(s) pushed, {}",
            summary.files,
            format_size(summary.bytes)
        ));
        Ok(())
    }
}
