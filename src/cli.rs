use crate::core::types::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputType {
    Table,
    Json,
    Plain,
}

impl From<OutputType> for OutputFormat {
    fn from(output: OutputType) -> Self {
        match output {
            OutputType::Table => OutputFormat::Table,
            OutputType::Json => OutputFormat::Json,
            OutputType::Plain => OutputFormat::Plain,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// ADB server hostname (overrides the config file)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// ADB server port (overrides the config file)
    #[arg(long, short = 'P', global = true)]
    pub port: Option<u16>,

    /// Device serial, serial prefix or configured device name
    #[arg(long, short = 's', global = true)]
    pub serial: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputType::Table)]
    pub output: OutputType,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Lists connected devices
    Devices {
        /// Include product, model and transport details
        #[arg(short = 'l', long)]
        long: bool,
    },

    /// Prints device connect, change and disconnect events until interrupted
    Track {
        /// Subscribe to the long device format
        #[arg(short = 'l', long)]
        long: bool,
    },

    /// Gets the server version
    Version,

    /// Runs a shell command on a device
    Shell {
        /// Command to execute; configured aliases are expanded
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,

        /// Give up after this many seconds without output
        #[arg(long = "idle-timeout")]
        idle_timeout: Option<u64>,
    },

    /// Copy files or directories to a device
    Push {
        /// Local file(s) or directories to push
        #[arg(required = true)]
        src: Vec<PathBuf>,

        /// Remote destination path on device
        dst: String,
    },

    /// Copy a file or directory from a device
    Pull {
        /// Remote path on device
        src: String,

        /// Local destination
        #[arg(default_value = ".")]
        dst: PathBuf,
    },

    /// Lists a remote directory
    Ls {
        /// Remote directory
        #[arg(default_value = "/sdcard")]
        path: String,

        /// Include . and ..
        #[arg(short = 'a', long)]
        all: bool,
    },

    /// Shows mode, size and modification time of remote paths
    Stat {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Manage port forwards
    Forward {
        #[command(subcommand)]
        action: ForwardAction,
    },

    /// Connect to a device over TCP/IP
    Connect {
        /// host[:port], port defaults to 5555
        address: String,
    },

    /// Disconnect a TCP/IP device
    Disconnect {
        /// host[:port], port defaults to 5555
        address: String,
    },

    /// Reboot a device
    Reboot {
        #[arg(value_enum)]
        target: Option<RebootTarget>,
    },

    /// Manage ADB server
    Server {
        /// Server operation to perform
        #[arg(value_enum)]
        operation: ServerOperation,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ForwardAction {
    /// List forwards (all devices unless --serial is given)
    List,

    /// Forward a local spec to a device spec, e.g. `tcp:8080 tcp:80`
    Add {
        local: String,
        remote: String,

        /// Fail if the local spec is already forwarded
        #[arg(long)]
        no_rebind: bool,
    },

    /// Remove one forward, or all forwards of the device
    Remove {
        #[arg(required_unless_present = "all")]
        local: Option<String>,

        #[arg(long, conflicts_with = "local")]
        all: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebootTarget {
    Bootloader,
    Recovery,
    Sideload,
}

impl RebootTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebootTarget::Bootloader => "bootloader",
            RebootTarget::Recovery => "recovery",
            RebootTarget::Sideload => "sideload",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerOperation {
    Start,
    Stop,
    Restart,
    Status,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Devices { long: false })
    }
}
