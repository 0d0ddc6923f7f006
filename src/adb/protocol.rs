use crate::adb::forward::ForwardSpec;
use crate::adb::transport::{Endpoint, Interrupter, Transport, TransportFactory};
use crate::error::{AdbError, Result};
use bytes::{BufMut, BytesMut};
use log::*;
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

pub const OKAY: &[u8; 4] = b"OKAY";
pub const FAIL: &[u8; 4] = b"FAIL";

/// Largest request the 4 hex digit length field can describe
pub const MAX_REQUEST_LENGTH: usize = 0xFFFF;

/// Outcome of one framed request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdbResponse {
    /// False when the socket could not be read at all
    pub io_success: bool,
    pub okay: bool,
    /// Diagnostic text attached by the remote, if any
    pub message: String,
}

impl AdbResponse {
    pub fn okay() -> Self {
        Self {
            io_success: true,
            okay: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            io_success: true,
            okay: false,
            message: message.into(),
        }
    }

    pub fn io_failure() -> Self {
        Self::default()
    }

    /// Translate the response into the error taxonomy
    pub fn into_result(self) -> Result<()> {
        if !self.io_success {
            return Err(connection_closed("reading response"));
        }
        if !self.okay {
            return Err(AdbError::Protocol(self.message));
        }
        Ok(())
    }
}

/// Requests understood by the host server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdbRequest {
    Version,
    Devices { long: bool },
    TrackDevices { long: bool },
    Kill,
    Transport(String),
    Shell(String),
    Exec(String),
    Sync,
    Connect(Endpoint),
    Disconnect(Endpoint),
    Forward {
        serial: String,
        local: ForwardSpec,
        remote: ForwardSpec,
        no_rebind: bool,
    },
    ListForward { serial: Option<String> },
    KillForward { serial: String, local: ForwardSpec },
    KillForwardAll { serial: String },
    /// Empty target reboots normally; otherwise e.g. `bootloader`, `recovery`
    Reboot(String),
}

impl fmt::Display for AdbRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdbRequest::Version => write!(f, "host:version"),
            AdbRequest::Devices { long: false } => write!(f, "host:devices"),
            AdbRequest::Devices { long: true } => write!(f, "host:devices-l"),
            AdbRequest::TrackDevices { long: false } => write!(f, "host:track-devices"),
            AdbRequest::TrackDevices { long: true } => write!(f, "host:track-devices-l"),
            AdbRequest::Kill => write!(f, "host:kill"),
            AdbRequest::Transport(serial) => write!(f, "host:transport:{}", serial),
            AdbRequest::Shell(command) => write!(f, "shell:{}", command),
            AdbRequest::Exec(command) => write!(f, "exec:{}", command),
            AdbRequest::Sync => write!(f, "sync:"),
            AdbRequest::Connect(endpoint) => write!(f, "host:connect:{}", endpoint),
            AdbRequest::Disconnect(endpoint) => write!(f, "host:disconnect:{}", endpoint),
            AdbRequest::Forward {
                serial,
                local,
                remote,
                no_rebind,
            } => {
                write!(f, "host-serial:{}:forward:", serial)?;
                if *no_rebind {
                    write!(f, "norebind:")?;
                }
                write!(f, "{};{}", local, remote)
            }
            AdbRequest::ListForward { serial: Some(serial) } => {
                write!(f, "host-serial:{}:list-forward", serial)
            }
            AdbRequest::ListForward { serial: None } => write!(f, "host:list-forward"),
            AdbRequest::KillForward { serial, local } => {
                write!(f, "host-serial:{}:killforward:{}", serial, local)
            }
            AdbRequest::KillForwardAll { serial } => {
                write!(f, "host-serial:{}:killforward-all", serial)
            }
            AdbRequest::Reboot(target) => write!(f, "reboot:{}", target),
        }
    }
}

/// Frame a request: 4 uppercase hex digits of byte length, then the text
pub fn encode_request(text: &str) -> Result<BytesMut> {
    let payload = text.as_bytes();
    if payload.len() > MAX_REQUEST_LENGTH {
        return Err(AdbError::RequestTooLong(payload.len()));
    }
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_slice(format!("{:04X}", payload.len()).as_bytes());
    buf.put_slice(payload);
    Ok(buf)
}

/// Inverse of [`encode_request`]; the frame must contain exactly one request
pub fn decode_request(frame: &[u8]) -> Result<String> {
    if frame.len() < 4 {
        return Err(AdbError::Protocol(format!(
            "Request frame too short: {} bytes",
            frame.len()
        )));
    }
    let len = parse_hex_length(&frame[..4])?;
    let payload = &frame[4..];
    if payload.len() != len {
        return Err(AdbError::Protocol(format!(
            "Request length field says {} bytes, frame carries {}",
            len,
            payload.len()
        )));
    }
    String::from_utf8(payload.to_vec())
        .map_err(|e| AdbError::Protocol(format!("Request is not valid UTF-8: {}", e)))
}

/// Parse a 4 digit hex length field (either case)
pub fn parse_hex_length(bytes: &[u8]) -> Result<usize> {
    if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_hexdigit) {
        return Err(AdbError::Protocol(format!(
            "Invalid length field: {:?}",
            String::from_utf8_lossy(bytes)
        )));
    }
    let text = decode_latin1(bytes);
    usize::from_str_radix(&text, 16)
        .map_err(|e| AdbError::Protocol(format!("Invalid length field {:?}: {}", text, e)))
}

/// Single byte per character decoding used on the host channel
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn connection_closed(context: &str) -> AdbError {
    AdbError::Connection(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed while {}", context),
    ))
}

fn is_device_not_found(message: &str) -> bool {
    let lower = message.trim().to_ascii_lowercase();
    lower == "device not found" || (lower.starts_with("device '") && lower.ends_with("' not found"))
}

/// Request/response endpoint over one transport.
///
/// A socket is single purpose: once it has been scoped to a device, switched to
/// sync mode or turned into a raw stream, no other request may be issued on it.
pub struct ProtocolSocket {
    transport: Box<dyn Transport>,
}

impl ProtocolSocket {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open a fresh transport to `endpoint`
    pub fn connect(factory: &dyn TransportFactory, endpoint: &Endpoint) -> Result<Self> {
        debug!("=== Creating new ADB socket to {} ===", endpoint);
        Ok(Self::new(factory.create(endpoint)?))
    }

    pub fn set_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.transport.set_read_timeout(read)?;
        self.transport.set_write_timeout(write)
    }

    pub fn set_read_timeout(&mut self, read: Option<Duration>) -> Result<()> {
        self.transport.set_read_timeout(read)
    }

    /// Send a request to the ADB server
    pub fn send_request(&mut self, text: &str) -> Result<()> {
        debug!("Sending request: {}", text);
        let frame = encode_request(text)?;
        self.transport
            .write_all(&frame)
            .and_then(|_| self.transport.flush())
            .map_err(AdbError::from_socket)
    }

    pub fn send(&mut self, request: &AdbRequest) -> Result<()> {
        self.send_request(&request.to_string())
    }

    /// Read exactly `buf.len()` bytes; `Ok(false)` on a short read
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.transport.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Err(AdbError::Timeout)
            }
            Err(e) => {
                debug!("Short read on socket: {}", e);
                Ok(false)
            }
        }
    }

    /// Read an OKAY/FAIL status, plus the diagnostic message when there is one
    pub fn read_response(&mut self, read_diagnostic_on_okay: bool) -> Result<AdbResponse> {
        let mut status = [0u8; 4];
        if !self.fill(&mut status)? {
            return Ok(AdbResponse::io_failure());
        }
        debug!("Response status: {:?}", decode_latin1(&status));

        let okay = &status == OKAY;
        if okay && !read_diagnostic_on_okay {
            return Ok(AdbResponse::okay());
        }
        if !okay && &status != FAIL {
            warn!("Unexpected response status {:?}", decode_latin1(&status));
        }

        let mut len_bytes = [0u8; 4];
        if !self.fill(&mut len_bytes)? {
            return Ok(AdbResponse::io_failure());
        }
        let len = parse_hex_length(&len_bytes)?;
        let mut message = vec![0u8; len];
        if !self.fill(&mut message)? {
            return Ok(AdbResponse::io_failure());
        }
        let message = decode_latin1(&message);
        if !okay {
            debug!("Remote rejected request: {}", message);
        }

        Ok(AdbResponse {
            io_success: true,
            okay,
            message,
        })
    }

    /// Read a response and require OKAY
    pub fn read_okay(&mut self) -> Result<()> {
        self.read_response(false)?.into_result()
    }

    /// Read a 4 hex digit length followed by that many Latin-1 bytes
    pub fn read_length_prefixed_string(&mut self) -> Result<String> {
        let mut len_bytes = [0u8; 4];
        if !self.fill(&mut len_bytes)? {
            return Err(connection_closed("reading length prefix"));
        }
        let len = parse_hex_length(&len_bytes)?;
        let mut payload = vec![0u8; len];
        if !self.fill(&mut payload)? {
            return Err(connection_closed("reading length-prefixed payload"));
        }
        Ok(decode_latin1(&payload))
    }

    /// Switch this socket to talk to the device `serial` through the server
    pub fn scope_to_device(&mut self, serial: &str) -> Result<()> {
        self.send(&AdbRequest::Transport(serial.to_string()))?;
        // host:transport carries no payload after OKAY; FAIL always brings its message.
        let response = self.read_response(false)?;
        if !response.io_success {
            return Err(connection_closed("switching transport"));
        }
        if !response.okay {
            if is_device_not_found(&response.message) {
                return Err(AdbError::DeviceNotFound(serial.to_string()));
            }
            return Err(AdbError::Protocol(response.message));
        }
        debug!("Socket scoped to device {}", serial);
        Ok(())
    }

    /// Issue a streaming request and hand back the bare byte stream
    pub fn open_raw_stream(mut self, request: &AdbRequest) -> Result<RawStream> {
        self.send(request)?;
        self.read_okay()?;
        Ok(RawStream {
            transport: self.transport,
        })
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.fill(buf)? {
            return Err(connection_closed("reading frame"));
        }
        Ok(())
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.transport.write_all(buf).map_err(AdbError::from_socket)
    }

    pub fn interrupter(&self) -> Result<Interrupter> {
        self.transport.interrupter()
    }

    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }
}

/// Unframed byte stream returned by a streaming request
pub struct RawStream {
    transport: Box<dyn Transport>,
}

impl RawStream {
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.transport.set_read_timeout(timeout)
    }

    pub fn interrupter(&self) -> Result<Interrupter> {
        self.transport.interrupter()
    }

    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }
}

impl Read for RawStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.transport.read(buf)
    }
}

impl Write for RawStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transport.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.transport.flush()
    }
}
