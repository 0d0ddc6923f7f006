use crate::adb::client::AdbClient;
use crate::config::Config;
use crate::core::types::OutputFormat;
use crate::output::OutputFormatter;

/// Shared context for all commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// Serial, serial prefix or configured device name from `--serial`
    pub serial: Option<String>,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            serial: None,
            output_format: OutputFormat::Table,
            quiet: false,
        }
    }

    pub fn client(&self) -> AdbClient {
        AdbClient::new(self.config.clone())
    }

    pub fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new().with_quiet(self.quiet)
    }

    /// Check if progress/status messages should be shown
    /// Returns false if quiet mode is enabled or output format is JSON
    pub fn should_show_progress(&self) -> bool {
        !self.quiet && self.output_format != OutputFormat::Json
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Builder for creating command contexts
#[derive(Default)]
pub struct CommandContextBuilder {
    ctx: CommandContext,
}

impl CommandContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.ctx.config = config;
        self
    }

    pub fn serial(mut self, serial: Option<String>) -> Self {
        self.ctx.serial = serial;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.ctx.output_format = format;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.ctx.quiet = quiet;
        self
    }

    pub fn build(self) -> CommandContext {
        self.ctx
    }
}
