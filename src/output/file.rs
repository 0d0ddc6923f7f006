use crate::adb::forward::ForwardEntry;
use crate::adb::sync::{FileEntry, FileType, RemoteFileStat};
use crate::output::{PlainFormat, TableFormat};
use serde::Serialize;

/// Format size in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "K", "M", "G", "T"];

    let mut value = size as f64;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{}{}", size, UNITS[0])
    } else {
        format!("{:.1}{}", value, UNITS[unit_index])
    }
}

fn format_mtime(stat: &RemoteFileStat) -> String {
    stat.modified()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl TableFormat for FileEntry {
    fn headers() -> Vec<&'static str> {
        vec!["MODE", "SIZE", "MODIFIED", "NAME"]
    }

    fn row(&self) -> Vec<String> {
        let name = if self.stat.is_directory() {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        };
        vec![
            self.stat.permissions_string(),
            format_size(u64::from(self.stat.size)),
            format_mtime(&self.stat),
            name,
        ]
    }
}

impl PlainFormat for FileEntry {
    fn plain(&self) -> String {
        self.name.clone()
    }
}

/// `stat` output for one remote path
#[derive(Debug, Clone, Serialize)]
pub struct StatInfo {
    pub path: String,
    pub exists: bool,
    pub file_type: FileType,
    pub permissions: String,
    #[serde(flatten)]
    pub stat: RemoteFileStat,
}

impl StatInfo {
    pub fn new(path: impl Into<String>, stat: RemoteFileStat) -> Self {
        Self {
            path: path.into(),
            exists: stat.exists(),
            file_type: stat.file_type(),
            permissions: stat.permissions_string(),
            stat,
        }
    }
}

impl TableFormat for StatInfo {
    fn headers() -> Vec<&'static str> {
        vec!["PATH", "TYPE", "MODE", "SIZE", "MODIFIED"]
    }

    fn row(&self) -> Vec<String> {
        if !self.exists {
            return vec![self.path.clone(), "missing".into(), "-".into(), "-".into(), "-".into()];
        }
        vec![
            self.path.clone(),
            format!("{:?}", self.file_type).to_lowercase(),
            format!("{:o}", self.stat.permissions()),
            self.stat.size.to_string(),
            format_mtime(&self.stat),
        ]
    }
}

impl PlainFormat for StatInfo {
    fn plain(&self) -> String {
        format!(
            "{} {:o} {} {}",
            self.path,
            self.stat.mode,
            self.stat.size,
            self.stat.mtime
        )
    }
}

impl TableFormat for ForwardEntry {
    fn headers() -> Vec<&'static str> {
        vec!["SERIAL", "LOCAL", "REMOTE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.serial.clone(),
            self.local.to_string(),
            self.remote.to_string(),
        ]
    }
}

impl PlainFormat for ForwardEntry {
    fn plain(&self) -> String {
        format!("{} {} {}", self.serial, self.local, self.remote)
    }
}
