use crate::adb::forward::ForwardSpec;
use crate::cli::ForwardAction;
use crate::commands::{blocking, resolve_serial, select_device, SubCommand};
use crate::core::context::CommandContext;
use crate::error::Result;
use async_trait::async_trait;

pub struct ForwardCommand;

#[derive(Debug, Clone)]
pub struct ForwardArgs {
    pub action: ForwardAction,
}

impl ForwardCommand {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SubCommand for ForwardCommand {
    type Args = ForwardArgs;

    async fn run(&self, ctx: &CommandContext, args: Self::Args) -> Result<()> {
        let client = ctx.client();
        let formatter = ctx.formatter();

        match args.action {
            ForwardAction::List => {
                let serial = match ctx.serial.as_deref() {
                    Some(_) => {
                        let lister = client.clone();
                        let devices = blocking(move || lister.devices()).await?;
                        Some(resolve_serial(ctx.serial.as_deref(), &devices, &ctx.config)?)
                    }
                    None => None,
                };
                let entries = blocking(move || client.list_forward(serial.as_deref())).await?;
                formatter.print(ctx.output_format, &entries)
            }
            ForwardAction::Add {
                local,
                remote,
                no_rebind,
            } => {
                let local: ForwardSpec = local.parse()?;
                let remote: ForwardSpec = remote.parse()?;
                let serial = select_device(ctx).await?;
                let message = format!("{} -> {}", local, remote);
                let port = blocking(move || client.create_forward(&serial, &local, &remote, no_rebind))
                    .await?;
                match port {
                    Some(port) => formatter.message(&port.to_string()),
                    None => formatter.success(&format!("Forwarded {}", message)),
                }
                Ok(())
            }
            ForwardAction::Remove { local, all } => {
                let serial = select_device(ctx).await?;
                match local {
                    Some(local) if !all => {
                        let local: ForwardSpec = local.parse()?;
                        let message = format!("Removed forward {}", local);
                        blocking(move || client.remove_forward(&serial, &local)).await?;
                        formatter.success(&message);
                    }
                    _ => {
                        blocking(move || client.remove_all_forwards(&serial)).await?;
                        formatter.success("Removed all forwards");
                    }
                }
                Ok(())
            }
        }
    }
}
