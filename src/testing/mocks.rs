use crate::adb::transport::{Endpoint, Interrupter, Transport, TransportFactory};
use crate::error::{AdbError, Result};
use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Shared {
    written: Mutex<Vec<u8>>,
    closed: Mutex<bool>,
    wake: Condvar,
    read_timeouts: Mutex<Vec<Option<Duration>>>,
}

impl Shared {
    fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

/// Test-side view of a `MockTransport` after it has been handed to the code under test
#[derive(Clone, Default)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    pub fn written(&self) -> Vec<u8> {
        self.shared.written.lock().unwrap().clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.lock().unwrap()
    }

    pub fn read_timeouts(&self) -> Vec<Option<Duration>> {
        self.shared.read_timeouts.lock().unwrap().clone()
    }
}

/// Transport replaying scripted input and recording everything written
pub struct MockTransport {
    input: Cursor<Vec<u8>>,
    shared: Arc<Shared>,
    /// Once the script runs out, park reads until closed (a live idle socket)
    block_at_end: bool,
    /// Once the script runs out, fail reads with this kind
    error_at_end: Option<io::ErrorKind>,
    /// Input offsets no single read crosses
    read_breaks: Vec<usize>,
}

impl MockTransport {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: Cursor::new(input.into()),
            shared: Arc::new(Shared::default()),
            block_at_end: false,
            error_at_end: None,
            read_breaks: Vec::new(),
        }
    }

    /// End reads at each of `offsets` into the script, as a network might split it
    pub fn split_reads_at(mut self, offsets: &[usize]) -> Self {
        self.read_breaks = offsets.to_vec();
        self.read_breaks.sort_unstable();
        self
    }

    pub fn blocking(mut self) -> Self {
        self.block_at_end = true;
        self
    }

    pub fn failing_with(mut self, kind: io::ErrorKind) -> Self {
        self.error_at_end = Some(kind);
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn exhausted(&self) -> bool {
        self.input.position() as usize >= self.input.get_ref().len()
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.shared.closed.lock().unwrap() {
            return Ok(0);
        }
        if !self.exhausted() {
            let position = self.input.position() as usize;
            let limit = self
                .read_breaks
                .iter()
                .copied()
                .find(|&offset| offset > position)
                .unwrap_or(usize::MAX);
            let n = buf.len().min(limit - position);
            return self.input.read(&mut buf[..n]);
        }
        if let Some(kind) = self.error_at_end {
            return Err(io::Error::new(kind, "scripted failure"));
        }
        if self.block_at_end {
            let mut closed = self.shared.closed.lock().unwrap();
            while !*closed {
                closed = self.shared.wake.wait(closed).unwrap();
            }
        }
        Ok(0)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if *self.shared.closed.lock().unwrap() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.shared.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.shared.read_timeouts.lock().unwrap().push(timeout);
        Ok(())
    }

    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        Err(AdbError::Connection(io::Error::new(
            io::ErrorKind::Unsupported,
            "mock transports cannot reconnect",
        )))
    }

    fn close(&mut self) -> Result<()> {
        self.shared.close();
        Ok(())
    }

    fn interrupter(&self) -> Result<Interrupter> {
        let shared = Arc::clone(&self.shared);
        Ok(Interrupter::new(move || shared.close()))
    }
}

/// Hands out queued transports in order; refuses once the queue is empty
#[derive(Default)]
pub struct MockTransportFactory {
    queue: Mutex<VecDeque<Option<MockTransport>>>,
    created: AtomicUsize,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, transport: MockTransport) -> MockHandle {
        let handle = transport.handle();
        self.queue.lock().unwrap().push_back(Some(transport));
        handle
    }

    pub fn push_refusal(&self) {
        self.queue.lock().unwrap().push_back(None);
    }

    /// Number of `create` calls so far, refused ones included
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(Some(transport)) => Ok(Box::new(transport)),
            _ => Err(AdbError::Connection(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection to {} refused", endpoint),
            ))),
        }
    }
}
