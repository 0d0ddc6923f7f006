use crate::cli::{Cli, Commands};
use crate::commands::{
    connect::{ConnectArgs, ConnectCommand},
    devices::{DevicesArgs, DevicesCommand},
    forward::{ForwardArgs, ForwardCommand},
    ls::{LsArgs, LsCommand},
    pull::{PullArgs, PullCommand},
    push::{PushArgs, PushCommand},
    reboot::{RebootArgs, RebootCommand},
    server::{ServerArgs, ServerCommand},
    shell::{ShellArgs, ShellCommand},
    stat::{StatArgs, StatCommand},
    track::{TrackArgs, TrackCommand},
    version::VersionCommand,
    SubCommand,
};
use crate::config::Config;
use crate::core::context::{CommandContext, CommandContextBuilder};
use crate::error::Result;
use log::debug;

/// Command runner that handles routing and execution
pub struct CommandRunner {
    config: Config,
}

impl CommandRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the context from global options; flags win over the config file
    pub fn context(&self, cli: &Cli) -> CommandContext {
        let mut config = self.config.clone();
        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        CommandContextBuilder::new()
            .config(config)
            .serial(cli.serial.clone())
            .output_format(cli.output.into())
            .quiet(cli.verbose.is_silent())
            .build()
    }

    /// Run a command based on CLI arguments
    pub async fn run(&self, cli: Cli) -> Result<()> {
        debug!("CommandRunner::run() called with command: {:?}", cli.command());
        let ctx = self.context(&cli);

        match cli.command() {
            Commands::Devices { long } => DevicesCommand::new().run(&ctx, DevicesArgs { long }).await,
            Commands::Track { long } => TrackCommand::new().run(&ctx, TrackArgs { long }).await,
            Commands::Version => VersionCommand::new().run(&ctx, ()).await,
            Commands::Shell {
                command,
                idle_timeout,
            } => {
                let args = ShellArgs {
                    command,
                    idle_timeout,
                };
                ShellCommand::new().run(&ctx, args).await
            }
            Commands::Push { src, dst } => PushCommand::new().run(&ctx, PushArgs { src, dst }).await,
            Commands::Pull { src, dst } => PullCommand::new().run(&ctx, PullArgs { src, dst }).await,
            Commands::Ls { path, all } => LsCommand::new().run(&ctx, LsArgs { path, all }).await,
            Commands::Stat { paths } => StatCommand::new().run(&ctx, StatArgs { paths }).await,
            Commands::Forward { action } => {
                ForwardCommand::new()
                    .run(&ctx, ForwardArgs { action })
                    .await
            }
            Commands::Connect { address } => {
                ConnectCommand::connect()
                    .run(&ctx, ConnectArgs { address })
                    .await
            }
            Commands::Disconnect { address } => {
                ConnectCommand::disconnect()
                    .run(&ctx, ConnectArgs { address })
                    .await
            }
            Commands::Reboot { target } => RebootCommand::new().run(&ctx, RebootArgs { target }).await,
            Commands::Server { operation } => {
                ServerCommand::new()
                    .run(&ctx, ServerArgs { operation })
                    .await
            }
        }
    }
}
