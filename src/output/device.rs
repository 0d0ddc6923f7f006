use crate::adb::tracker::DeviceEvent;
use crate::core::types::Device;
use crate::output::{PlainFormat, TableFormat};
use chrono::{DateTime, Local};
use colored::*;
use serde::{Serialize, Serializer};

impl TableFormat for Device {
    fn headers() -> Vec<&'static str> {
        vec!["SERIAL", "STATE", "MODEL", "PRODUCT", "TRANSPORT"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.serial.clone(),
            self.state.to_string(),
            self.model.clone().unwrap_or_default(),
            self.product.clone().unwrap_or_default(),
            self.transport_id.map(|id| id.to_string()).unwrap_or_default(),
        ]
    }
}

impl PlainFormat for Device {
    fn plain(&self) -> String {
        format!("{}\t{}", self.serial, self.state)
    }
}

/// A tracker event stamped with the time it was observed
#[derive(Debug, Clone, Serialize)]
pub struct TimedEvent {
    #[serde(serialize_with = "rfc3339")]
    pub time: DateTime<Local>,
    #[serde(flatten)]
    pub event: DeviceEvent,
}

impl TimedEvent {
    pub fn now(event: DeviceEvent) -> Self {
        Self {
            time: Local::now(),
            event,
        }
    }

    /// One colored line for the streaming `track` output
    pub fn line(&self) -> String {
        let kind = match &self.event {
            DeviceEvent::Connected(_) => "connected".green(),
            DeviceEvent::Changed { .. } => "changed".yellow(),
            DeviceEvent::Disconnected(_) => "disconnected".red(),
        };
        let state = match &self.event {
            DeviceEvent::Changed { previous, current } => {
                format!("{} -> {}", previous.state, current.state)
            }
            other => other.device().state.to_string(),
        };
        format!(
            "{} {:<12} {} {}",
            self.time.format("%H:%M:%S"),
            kind,
            self.event.serial(),
            state
        )
    }
}

fn rfc3339<S: Serializer>(time: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339())
}

impl PlainFormat for TimedEvent {
    fn plain(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.time.to_rfc3339(),
            self.event.kind(),
            self.event.serial(),
            self.event.device().state
        )
    }
}
