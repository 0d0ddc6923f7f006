use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Device state as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
    Unauthorized,
    NoPermissions,
    Authorizing,
    BootLoader,
    Recovery,
    Host,
    Connecting,
    Sideload,
    Unknown,
}

impl DeviceState {
    /// Parse a wire token. Unrecognized tokens map to `Unknown`.
    pub fn from_token(s: &str) -> Self {
        match s {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "no permissions" => DeviceState::NoPermissions,
            "authorizing" => DeviceState::Authorizing,
            "bootloader" => DeviceState::BootLoader,
            "recovery" => DeviceState::Recovery,
            "host" => DeviceState::Host,
            "connecting" => DeviceState::Connecting,
            "sideload" => DeviceState::Sideload,
            _ => DeviceState::Unknown,
        }
    }

    /// The token the server uses for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::NoPermissions => "no permissions",
            DeviceState::Authorizing => "authorizing",
            DeviceState::BootLoader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Host => "host",
            DeviceState::Connecting => "connecting",
            DeviceState::Sideload => "sideload",
            DeviceState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a device-list snapshot.
///
/// Two devices are equal when every field matches; the tracker uses this to
/// detect changes, while events are correlated by `serial` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Device codename (`device:` token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub features: BTreeSet<String>,
    /// Free text, only for error/no-permission states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Device {
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        Self {
            serial: serial.into(),
            state,
            product: None,
            model: None,
            name: None,
            transport_id: None,
            usb: None,
            features: BTreeSet::new(),
            message: None,
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transport_id(mut self, transport_id: u32) -> Self {
        self.transport_id = Some(transport_id);
        self
    }

    pub fn with_usb(mut self, usb: impl Into<String>) -> Self {
        self.usb = Some(usb.into());
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check if device is available for commands
    pub fn is_online(&self) -> bool {
        self.state == DeviceState::Online
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Get a display name for the device
    pub fn display_name(&self) -> String {
        if let Some(model) = &self.model {
            format!("{} ({})", model, self.serial)
        } else {
            self.serial.clone()
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Plain,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Plain => write!(f, "plain"),
        }
    }
}
