//! Shell command execution and the `\r\n` decoder for shell output.

use crate::adb::protocol::{AdbRequest, ProtocolSocket};
use crate::core::cancel::CancelToken;
use crate::error::{AdbError, Result};
use log::*;
use std::io::{self, Read};
use std::time::Duration;

/// Bytes requested from the stream per read while executing a command
pub const SHELL_CHUNK_SIZE: usize = 16 * 1024;

/// Undoes the remote rewrite of every `\n` into `\r\n`.
///
/// A `\r` that ends a read is held back until the next read shows whether it
/// starts a `\r\n` pair. At most one byte is carried between calls.
pub struct ShellStream<R> {
    inner: R,
    pending: Option<u8>,
}

impl<R: Read> ShellStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Drops any held byte
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result,
            }
        }
    }

    /// A held `\r` with room for only one output byte: look one byte ahead
    fn resolve_pending_cr(&mut self, out: &mut u8) -> io::Result<usize> {
        let mut next = [0u8; 1];
        match self.read_inner(&mut next)? {
            0 => *out = b'\r',
            _ if next[0] == b'\n' => *out = b'\n',
            _ => {
                *out = b'\r';
                self.pending = Some(next[0]);
            }
        }
        Ok(1)
    }
}

impl<R: Read> Read for ShellStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let mut len = 0;
            if let Some(byte) = self.pending.take() {
                if byte != b'\r' {
                    buf[0] = byte;
                    return Ok(1);
                }
                if buf.len() == 1 {
                    return self.resolve_pending_cr(&mut buf[0]);
                }
                buf[0] = byte;
                len = 1;
            }

            let n = self.read_inner(&mut buf[len..])?;
            let eof = n == 0;
            len += n;

            let mut out = 0;
            let mut i = 0;
            while i < len {
                let byte = buf[i];
                if byte == b'\r' {
                    if i + 1 < len {
                        if buf[i + 1] == b'\n' {
                            buf[out] = b'\n';
                            out += 1;
                            i += 2;
                            continue;
                        }
                    } else if !eof {
                        self.pending = Some(byte);
                        i += 1;
                        continue;
                    }
                }
                buf[out] = byte;
                out += 1;
                i += 1;
            }

            // Only a held `\r` came through; 0 would read as end of stream.
            if out == 0 && !eof {
                continue;
            }
            return Ok(out);
        }
    }
}

/// Sink for the output of a shell command
pub trait OutputReceiver {
    fn add_output(&mut self, data: &[u8]);

    fn flush(&mut self) {}

    /// Polled between reads; true stops the command
    fn is_cancelled(&self) -> bool {
        false
    }

    /// True disables the failure phrase scan on the output
    fn parses_errors_itself(&self) -> bool {
        false
    }
}

/// Collects all output in memory
#[derive(Debug, Default)]
pub struct CollectingReceiver {
    output: Vec<u8>,
}

impl CollectingReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.output
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl OutputReceiver for CollectingReceiver {
    fn add_output(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data);
    }
}

/// Calls back once per complete line; an unterminated tail is delivered on flush
pub struct MultiLineReceiver<F: FnMut(&str)> {
    on_line: F,
    partial: Vec<u8>,
    parses_errors: bool,
}

impl<F: FnMut(&str)> MultiLineReceiver<F> {
    pub fn new(on_line: F) -> Self {
        Self {
            on_line,
            partial: Vec::new(),
            parses_errors: false,
        }
    }

    pub fn parsing_errors_itself(mut self) -> Self {
        self.parses_errors = true;
        self
    }

    fn emit(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        (self.on_line)(&String::from_utf8_lossy(line));
    }
}

impl<F: FnMut(&str)> OutputReceiver for MultiLineReceiver<F> {
    fn add_output(&mut self, data: &[u8]) {
        self.partial.extend_from_slice(data);
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1]);
        }
    }

    fn flush(&mut self) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.emit(&line);
        }
    }

    fn parses_errors_itself(&self) -> bool {
        self.parses_errors
    }
}

/// Discards all output
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReceiver;

impl OutputReceiver for NullReceiver {
    fn add_output(&mut self, _data: &[u8]) {}
}

fn line_containing<'a>(text: &'a str, needle: &'a str) -> &'a str {
    text.lines()
        .find(|line| line.contains(needle))
        .unwrap_or(needle)
        .trim()
}

/// Scan complete shell output for well-known failure phrases
pub fn check_shell_output(command: &str, output: &str) -> Result<()> {
    scan_failure_phrases(command, output)?;
    check_aborting(output.lines().rev().map(str::trim).find(|line| !line.is_empty()))
}

fn check_aborting(last_line: Option<&str>) -> Result<()> {
    match last_line {
        Some(line) if line.ends_with("Aborting.") => {
            Err(AdbError::CommandAborting(line.to_string()))
        }
        _ => Ok(()),
    }
}

fn scan_failure_phrases(command: &str, output: &str) -> Result<()> {
    let program = command.split_whitespace().next().unwrap_or(command);

    if !program.is_empty() && output.contains(&format!("{}: not found", program)) {
        return Err(AdbError::CommandNotFound(program.to_string()));
    }
    if output.contains("applet not found") {
        return Err(AdbError::CommandNotFound(program.to_string()));
    }
    if output.contains("No such file or directory") {
        return Err(AdbError::FileNotFound(
            line_containing(output, "No such file or directory").to_string(),
        ));
    }
    if output.contains("Unknown option") {
        return Err(AdbError::UnknownOption(
            line_containing(output, "Unknown option").to_string(),
        ));
    }

    let lower = output.to_ascii_lowercase();
    for phrase in ["permission denied", "access denied"] {
        if let Some(line) = output
            .lines()
            .zip(lower.lines())
            .find(|(_, lower)| lower.contains(phrase))
            .map(|(line, _)| line.trim())
        {
            return Err(AdbError::PermissionDenied(line.to_string()));
        }
    }

    Ok(())
}

/// Longest run without a newline held back before it is scanned anyway
const MAX_PENDING_LINE: usize = 64 * 1024;
/// Bytes kept after scanning an over-long line, so a phrase cut there is still seen
const PENDING_OVERLAP: usize = 256;

/// Failure-phrase scanner over output that arrives in arbitrary pieces.
///
/// Only complete lines are scanned; the trailing partial line waits for more
/// output or for `finish`.
struct FailureScanner<'a> {
    command: &'a str,
    pending: Vec<u8>,
    last_line: Option<String>,
}

impl<'a> FailureScanner<'a> {
    fn new(command: &'a str) -> Self {
        Self {
            command,
            pending: Vec::new(),
            last_line: None,
        }
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        if let Some(end) = self.pending.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = self.pending.drain(..=end).collect();
            self.scan(&complete)?;
        }
        if self.pending.len() > MAX_PENDING_LINE {
            scan_failure_phrases(self.command, &String::from_utf8_lossy(&self.pending))?;
            let keep = self.pending.len() - PENDING_OVERLAP;
            self.pending.drain(..keep);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let rest = std::mem::take(&mut self.pending);
        self.scan(&rest)?;
        check_aborting(self.last_line.as_deref())
    }

    fn scan(&mut self, bytes: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(bytes);
        if let Some(line) = text.lines().rev().map(str::trim).find(|line| !line.is_empty()) {
            self.last_line = Some(line.to_string());
        }
        scan_failure_phrases(self.command, &text)
    }
}

/// Run `command` on a socket already scoped to a device, feeding decoded output to `receiver`.
///
/// `idle_timeout` bounds the wait for each read; `None` waits indefinitely.
pub fn execute_shell_command(
    socket: ProtocolSocket,
    command: &str,
    receiver: &mut dyn OutputReceiver,
    cancel: &CancelToken,
    idle_timeout: Option<Duration>,
) -> Result<()> {
    info!("Executing shell command: {}", command);
    let mut raw = socket.open_raw_stream(&AdbRequest::Shell(command.to_string()))?;
    raw.set_read_timeout(idle_timeout)?;
    let mut stream = ShellStream::new(raw);
    let mut buffer = vec![0u8; SHELL_CHUNK_SIZE];
    let mut scanner = (!receiver.parses_errors_itself()).then(|| FailureScanner::new(command));

    loop {
        if cancel.is_cancelled() || receiver.is_cancelled() {
            debug!("Shell command cancelled: {}", command);
            let _ = stream.get_mut().close();
            return Err(AdbError::Cancelled);
        }

        let n = match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(AdbError::from_socket(e)),
        };
        let chunk = &buffer[..n];

        if let Some(scanner) = scanner.as_mut() {
            scanner.feed(chunk)?;
        }
        receiver.add_output(chunk);
    }

    if let Some(scanner) = scanner.as_mut() {
        scanner.finish()?;
    }
    receiver.flush();
    debug!("Shell command finished: {}", command);
    Ok(())
}
