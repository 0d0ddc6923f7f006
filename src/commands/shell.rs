use crate::adb::shell::OutputReceiver;
use crate::commands::{select_device, SubCommand};
use crate::core::cancel::CancelToken;
use crate::core::context::CommandContext;
use crate::error::{AdbError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use std::io::{self, Write};
use std::time::Duration;

pub struct ShellCommand;

#[derive(Debug, Clone)]
pub struct ShellArgs {
    pub command: Vec<String>,
    pub idle_timeout: Option<u64>,
}

/// Writes decoded output straight to stdout as it arrives
struct StdoutReceiver {
    stdout: io::Stdout,
}

impl OutputReceiver for StdoutReceiver {
    fn add_output(&mut self, data: &[u8]) {
        if let Err(e) = self.stdout.write_all(data) {
            warn!("Failed to write shell output: {}", e);
        }
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl ShellCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for ShellCommand {
    type Args = ShellArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let serial = select_device(ctx).await?;
        let command = ctx.config.resolve_alias(&args.command.join(" "));
        debug!("Running {:?} on {}", command, serial);

        let client = ctx.client();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let idle_timeout = args.idle_timeout.map(Duration::from_secs);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut receiver = StdoutReceiver {
                stdout: io::stdout(),
            };
            client.execute_shell(&serial, &command, &mut receiver, &worker_cancel, idle_timeout)
        });

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = tokio::signal::ctrl_c() => {
                // Checked before the next read
                cancel.cancel();
                task.await
            }
        };
        joined.map_err(|e| AdbError::from_local(io::Error::new(io::ErrorKind::Other, e)))?
    }
}
