//! Port forwarding specs (`tcp:1234`, `localabstract:name`, `jdwp:pid`, ...)

use crate::error::{AdbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ForwardSpec {
    Tcp(u16),
    LocalAbstract(String),
    LocalReserved(String),
    LocalFilesystem(String),
    Jdwp(u32),
}

impl ForwardSpec {
    pub fn protocol(&self) -> &'static str {
        match self {
            ForwardSpec::Tcp(_) => "tcp",
            ForwardSpec::LocalAbstract(_) => "localabstract",
            ForwardSpec::LocalReserved(_) => "localreserved",
            ForwardSpec::LocalFilesystem(_) => "localfilesystem",
            ForwardSpec::Jdwp(_) => "jdwp",
        }
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardSpec::Tcp(port) => write!(f, "tcp:{}", port),
            ForwardSpec::LocalAbstract(name)
            | ForwardSpec::LocalReserved(name)
            | ForwardSpec::LocalFilesystem(name) => write!(f, "{}:{}", self.protocol(), name),
            ForwardSpec::Jdwp(pid) => write!(f, "jdwp:{}", pid),
        }
    }
}

impl FromStr for ForwardSpec {
    type Err = AdbError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AdbError::InvalidForwardSpec(s.to_string());
        let (protocol, value) = s.split_once(':').ok_or_else(invalid)?;
        if value.is_empty() {
            return Err(invalid());
        }

        match protocol {
            "tcp" => value.parse().map(ForwardSpec::Tcp).map_err(|_| invalid()),
            "jdwp" => value.parse().map(ForwardSpec::Jdwp).map_err(|_| invalid()),
            "localabstract" => Ok(ForwardSpec::LocalAbstract(value.to_string())),
            "localreserved" => Ok(ForwardSpec::LocalReserved(value.to_string())),
            "localfilesystem" => Ok(ForwardSpec::LocalFilesystem(value.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl From<ForwardSpec> for String {
    fn from(spec: ForwardSpec) -> Self {
        spec.to_string()
    }
}

impl TryFrom<String> for ForwardSpec {
    type Error = AdbError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// One line of a `list-forward` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardEntry {
    pub serial: String,
    pub local: ForwardSpec,
    pub remote: ForwardSpec,
}

/// Parse a `list-forward` body: `serial local remote` per line
pub fn parse_forward_list(body: &str) -> Result<Vec<ForwardEntry>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(serial), Some(local), Some(remote)) => Ok(ForwardEntry {
                    serial: serial.to_string(),
                    local: local.parse()?,
                    remote: remote.parse()?,
                }),
                _ => Err(AdbError::Protocol(format!("Malformed forward entry: {:?}", line))),
            }
        })
        .collect()
}
