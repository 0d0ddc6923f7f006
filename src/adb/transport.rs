use crate::error::{AdbError, Result};
use log::*;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Port the host server listens on by default
pub const DEFAULT_ADB_PORT: u16 = 5037;
/// Port adbd listens on when a device is reachable over TCP/IP
pub const DEFAULT_DEVICE_TCP_PORT: u16 = 5555;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Network address of a server (or of a network-attached device)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`, filling in `default_port`
    pub fn parse(text: &str, default_port: u16) -> Result<Self> {
        let invalid = || AdbError::Protocol(format!("Invalid address: {:?}", text));
        match text.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(invalid()),
            None if !text.is_empty() => Ok(Self::new(text, default_port)),
            None => Err(invalid()),
        }
    }

    fn resolve_host(&self) -> &str {
        if self.host == "localhost" {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_ADB_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Per-call deadlines applied to a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    /// `None` blocks indefinitely
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Some(Duration::from_secs(5)),
            write: Some(Duration::from_secs(5)),
        }
    }
}

/// Handle that unblocks a read parked on a transport from another thread
pub struct Interrupter(Box<dyn Fn() + Send + Sync>);

impl Interrupter {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn interrupt(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Interrupter")
    }
}

/// Raw bidirectional byte socket to the server
pub trait Transport: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Re-establish the connection to the last-known endpoint
    fn reconnect(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// A handle that closes the socket, usable while another thread is blocked in `read`
    fn interrupter(&self) -> Result<Interrupter>;
}

/// Opens transports to an endpoint
pub trait TransportFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}

/// TCP connection to the host server
pub struct TcpTransport {
    stream: Option<TcpStream>,
    endpoint: Endpoint,
    timeouts: Timeouts,
}

impl TcpTransport {
    pub fn connect(endpoint: &Endpoint, timeouts: Timeouts) -> Result<Self> {
        let stream = Self::establish_connection(endpoint, &timeouts)?;
        Ok(Self {
            stream: Some(stream),
            endpoint: endpoint.clone(),
            timeouts,
        })
    }

    fn establish_connection(endpoint: &Endpoint, timeouts: &Timeouts) -> Result<TcpStream> {
        let server_address = format!("{}:{}", endpoint.resolve_host(), endpoint.port);
        debug!("Connecting to address: {}", server_address);

        let mut addresses = server_address
            .to_socket_addrs()
            .map_err(AdbError::Connection)?;

        let address = addresses.next().ok_or_else(|| {
            AdbError::Connection(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not resolve address",
            ))
        })?;

        debug!("Resolved address: {:?}", address);

        let stream = TcpStream::connect_timeout(&address, timeouts.connect).map_err(|e| {
            match e.kind() {
                io::ErrorKind::TimedOut => AdbError::Timeout,
                _ => AdbError::Connection(e),
            }
        })?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(timeouts.read)?;
        stream.set_write_timeout(timeouts.write)?;
        debug!("Connection established to {}", endpoint);

        Ok(stream)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport is closed"))
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}

impl Transport for TcpTransport {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.timeouts.read = timeout;
        self.stream()?.set_read_timeout(timeout)?;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.timeouts.write = timeout;
        self.stream()?.set_write_timeout(timeout)?;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        debug!("Reconnecting to {}", self.endpoint);
        self.close()?;
        self.stream = Some(Self::establish_connection(&self.endpoint, &self.timeouts)?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone.
            let _ = stream.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn interrupter(&self) -> Result<Interrupter> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| {
                AdbError::Connection(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "transport is closed",
                ))
            })?
            .try_clone()?;
        Ok(Interrupter::new(move || {
            let _ = stream.shutdown(Shutdown::Both);
        }))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Factory producing `TcpTransport`s with fixed timeouts
#[derive(Debug, Clone, Default)]
pub struct TcpTransportFactory {
    timeouts: Timeouts,
}

impl TcpTransportFactory {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

impl TransportFactory for TcpTransportFactory {
    fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport::connect(endpoint, self.timeouts)?))
    }
}
