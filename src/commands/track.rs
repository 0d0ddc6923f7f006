use crate::adb::client::AdbClient;
use crate::commands::{blocking, SubCommand};
use crate::core::context::CommandContext;
use crate::core::types::OutputFormat;
use crate::error::Result;
use crate::output::device::TimedEvent;
use crate::output::PlainFormat;
use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;

pub struct TrackCommand;

#[derive(Debug, Clone)]
pub struct TrackArgs {
    pub long: bool,
}

impl TrackCommand {
    pub fn new() -> Self {
        Self
    }

    fn print(ctx: &CommandContext, event: &TimedEvent) -> Result<()> {
        match ctx.output_format {
            // One object per line so the stream can be piped
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Plain => println!("{}", event.plain()),
            OutputFormat::Table => println!("{}", event.line()),
        }
        Ok(())
    }
}

#[async_trait]
impl SubCommand for TrackCommand {
    type Args = TrackArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let mut config = ctx.config.clone();
        config.tracker.long_format |= args.long;
        let tracker = AdbClient::new(config).track_devices();

        let (tx, mut rx) = mpsc::unbounded_channel();
        tracker.add_listener(move |event| {
            let _ = tx.send(TimedEvent::now(event.clone()));
        });
        tracker.start()?;
        ctx.formatter()
            .message("Tracking devices, press Ctrl-C to stop");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => Self::print(ctx, &event)?,
                    None => {
                        warn!("Device tracker went away");
                        break;
                    }
                },
            }
        }

        // stop() joins the tracker thread
        blocking(move || {
            tracker.stop();
            Ok(())
        })
        .await
    }
}
