use crate::adb::forward::{parse_forward_list, ForwardEntry, ForwardSpec};
use crate::adb::protocol::{AdbRequest, ProtocolSocket, RawStream};
use crate::adb::server::AdbServer;
use crate::adb::shell::{execute_shell_command, OutputReceiver, ShellStream};
use crate::adb::sync::SyncSession;
use crate::adb::tracker::DeviceTracker;
use crate::adb::transport::{Endpoint, TcpTransportFactory, TransportFactory};
use crate::config::Config;
use crate::core::cancel::CancelToken;
use crate::core::types::Device;
use crate::device::parse_device_list;
use crate::error::{AdbError, Result};
use log::*;
use std::sync::Arc;
use std::time::Duration;

/// Entry point to one server. Every call opens its own socket.
#[derive(Clone)]
pub struct AdbClient {
    config: Config,
    factory: Arc<dyn TransportFactory>,
    endpoint: Endpoint,
}

impl AdbClient {
    pub fn new(config: Config) -> Self {
        let factory = Arc::new(TcpTransportFactory::new(config.timeouts()));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: Config, factory: Arc<dyn TransportFactory>) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            factory,
            endpoint,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fresh socket talking to the server itself
    pub fn open_socket(&self) -> Result<ProtocolSocket> {
        ProtocolSocket::connect(self.factory.as_ref(), &self.endpoint)
    }

    /// Fresh socket scoped to `serial`
    pub fn open_device_socket(&self, serial: &str) -> Result<ProtocolSocket> {
        let mut socket = self.open_socket()?;
        socket.scope_to_device(serial)?;
        Ok(socket)
    }

    /// Issue a host request whose OKAY is followed by one length-prefixed string
    fn host_query(&self, request: &AdbRequest) -> Result<String> {
        let mut socket = self.open_socket()?;
        socket.send(request)?;
        socket.read_okay()?;
        socket.read_length_prefixed_string()
    }

    /// Server protocol version, e.g. 41
    pub fn server_version(&self) -> Result<u32> {
        let text = self.host_query(&AdbRequest::Version)?;
        let version = u32::from_str_radix(text.trim(), 16)
            .map_err(|_| AdbError::Protocol(format!("Invalid version reply: {:?}", text)))?;
        debug!("Server version: {}", version);
        Ok(version)
    }

    /// One-shot device list in long format
    pub fn devices(&self) -> Result<Vec<Device>> {
        let body = self.host_query(&AdbRequest::Devices { long: true })?;
        Ok(parse_device_list(&body))
    }

    pub fn kill_server(&self) -> Result<()> {
        let mut socket = self.open_socket()?;
        socket.send(&AdbRequest::Kill)?;
        socket.read_okay()
    }

    /// Attach a network device. The server answers OKAY plus a status line
    /// even when the connection fails, so the text decides the outcome.
    pub fn connect_device(&self, address: &Endpoint) -> Result<String> {
        let message = self.host_query(&AdbRequest::Connect(address.clone()))?;
        if is_connect_failure(&message) {
            return Err(AdbError::Protocol(message));
        }
        info!("{}", message);
        Ok(message)
    }

    pub fn disconnect_device(&self, address: &Endpoint) -> Result<String> {
        let message = self.host_query(&AdbRequest::Disconnect(address.clone()))?;
        if is_connect_failure(&message) {
            return Err(AdbError::Protocol(message));
        }
        Ok(message)
    }

    /// Create a forward; for `tcp:0` returns the port the server picked
    pub fn create_forward(
        &self,
        serial: &str,
        local: &ForwardSpec,
        remote: &ForwardSpec,
        no_rebind: bool,
    ) -> Result<Option<u16>> {
        let mut socket = self.open_socket()?;
        socket.send(&AdbRequest::Forward {
            serial: serial.to_string(),
            local: local.clone(),
            remote: remote.clone(),
            no_rebind,
        })?;
        // First OKAY acknowledges the host request, the second the forward itself.
        socket.read_okay()?;
        socket.read_okay()?;

        if *local != ForwardSpec::Tcp(0) {
            return Ok(None);
        }
        let port = socket.read_length_prefixed_string()?;
        let port = port
            .trim()
            .parse()
            .map_err(|_| AdbError::Protocol(format!("Invalid forward port: {:?}", port)))?;
        Ok(Some(port))
    }

    /// Forwards of one device, or of all devices
    pub fn list_forward(&self, serial: Option<&str>) -> Result<Vec<ForwardEntry>> {
        let body = self.host_query(&AdbRequest::ListForward {
            serial: serial.map(str::to_string),
        })?;
        parse_forward_list(&body)
    }

    pub fn remove_forward(&self, serial: &str, local: &ForwardSpec) -> Result<()> {
        let mut socket = self.open_socket()?;
        socket.send(&AdbRequest::KillForward {
            serial: serial.to_string(),
            local: local.clone(),
        })?;
        socket.read_okay()
    }

    pub fn remove_all_forwards(&self, serial: &str) -> Result<()> {
        let mut socket = self.open_socket()?;
        socket.send(&AdbRequest::KillForwardAll {
            serial: serial.to_string(),
        })?;
        socket.read_okay()
    }

    /// Reboot `serial`; `target` is empty, `bootloader`, `recovery`, `sideload`...
    pub fn reboot(&self, serial: &str, target: &str) -> Result<()> {
        let mut socket = self.open_device_socket(serial)?;
        socket.send(&AdbRequest::Reboot(target.to_string()))?;
        socket.read_okay()
    }

    /// Run `command` and feed its decoded output to `receiver`
    pub fn execute_shell(
        &self,
        serial: &str,
        command: &str,
        receiver: &mut dyn OutputReceiver,
        cancel: &CancelToken,
        idle_timeout: Option<Duration>,
    ) -> Result<()> {
        let socket = self.open_device_socket(serial)?;
        execute_shell_command(socket, command, receiver, cancel, idle_timeout)
    }

    /// Decoded output stream of `shell:<command>`
    pub fn open_shell_stream(&self, serial: &str, command: &str) -> Result<ShellStream<RawStream>> {
        let socket = self.open_device_socket(serial)?;
        let stream = socket.open_raw_stream(&AdbRequest::Shell(command.to_string()))?;
        Ok(ShellStream::new(stream))
    }

    /// Raw, binary-safe stream of `exec:<command>`
    pub fn exec(&self, serial: &str, command: &str) -> Result<RawStream> {
        let socket = self.open_device_socket(serial)?;
        socket.open_raw_stream(&AdbRequest::Exec(command.to_string()))
    }

    pub fn sync(&self, serial: &str) -> Result<SyncSession> {
        SyncSession::open(self.open_device_socket(serial)?)
    }

    /// Tracker wired to this client's endpoint, with a server restart hook
    pub fn track_devices(&self) -> DeviceTracker {
        DeviceTracker::new(
            Arc::clone(&self.factory),
            self.endpoint.clone(),
            self.config.tracker_settings(),
        )
        .with_restart_hook(Arc::new(self.server()))
    }

    pub fn server(&self) -> AdbServer {
        AdbServer::new(self.config.adb_path(), self.endpoint.clone())
    }
}

fn is_connect_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["unable", "failed", "cannot", "error", "no such device"]
        .iter()
        .any(|phrase| lower.starts_with(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_phrases() {
        assert!(is_connect_failure("unable to connect to 10.0.0.1:5555"));
        assert!(is_connect_failure("failed to connect to '10.0.0.1:5555': Connection refused"));
        assert!(is_connect_failure("no such device '10.0.0.1:5555'"));
        assert!(!is_connect_failure("connected to 10.0.0.1:5555"));
        assert!(!is_connect_failure("already connected to 10.0.0.1:5555"));
        assert!(!is_connect_failure("disconnected 10.0.0.1:5555"));
    }
}
