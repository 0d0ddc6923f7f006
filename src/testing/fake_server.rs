//! In-process stand-in for the host server, listening on a loopback port.
//!
//! Devices answer `host:transport:`, `shell:` from a table of scripted
//! outputs and `sync:` from an in-memory filesystem shared by all of them.

use crate::adb::sync::MAX_CHUNK_SIZE;
use crate::adb::transport::Endpoint;
use log::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

const DIR_MODE: u32 = 0o040755;
const FILE_TYPE: u32 = 0o100000;

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub data: Vec<u8>,
    pub mode: u32,
    pub mtime: u32,
}

#[derive(Default)]
struct FakeState {
    version: u32,
    devices: Vec<(String, String)>,
    files: BTreeMap<String, FakeFile>,
    dirs: BTreeSet<String>,
    shell: HashMap<String, Vec<u8>>,
    forwards: Vec<String>,
    oversized_pulls: BTreeSet<String>,
    requests: Vec<String>,
}

impl FakeState {
    fn add_dir(&mut self, path: &str) {
        let mut current = path.trim_end_matches('/').to_string();
        while !current.is_empty() {
            self.dirs.insert(current.clone());
            current = match current.rsplit_once('/') {
                Some((parent, _)) => parent.to_string(),
                None => String::new(),
            };
        }
        self.dirs.insert("/".to_string());
    }

    fn add_file(&mut self, path: &str, file: FakeFile) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir(parent);
        }
        self.files.insert(path.to_string(), file);
    }

    fn stat(&self, path: &str) -> (u32, u32, u32) {
        let path = normalize(path);
        if let Some(file) = self.files.get(&path) {
            (file.mode, file.data.len() as u32, file.mtime)
        } else if self.dirs.contains(&path) {
            (DIR_MODE, 4096, 1_700_000_000)
        } else {
            (0, 0, 0)
        }
    }

    fn children(&self, dir: &str) -> Vec<(String, (u32, u32, u32))> {
        let dir = normalize(dir);
        let is_child = |path: &str| match path.rsplit_once('/') {
            Some((parent, name)) => {
                !name.is_empty() && (parent == dir || (parent.is_empty() && dir == "/"))
            }
            None => false,
        };
        let mut entries = vec![
            (".".to_string(), (DIR_MODE, 4096, 0)),
            ("..".to_string(), (DIR_MODE, 4096, 0)),
        ];
        for path in self.dirs.iter().chain(self.files.keys()) {
            if path != "/" && is_child(path) {
                let name = path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path);
                entries.push((name.to_string(), self.stat(path)));
            }
        }
        entries
    }
}

fn normalize(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }
    path.trim_end_matches('/').to_string()
}

/// Loopback fake server; shut down on drop
pub struct FakeAdbServer {
    endpoint: Endpoint,
    state: Arc<Mutex<FakeState>>,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeAdbServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(FakeState {
            version: 41,
            ..FakeState::default()
        }));
        state.lock().unwrap().add_dir("/sdcard");
        let stopping = Arc::new(AtomicBool::new(false));

        let handle = {
            let state = Arc::clone(&state);
            let stopping = Arc::clone(&stopping);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let state = Arc::clone(&state);
                    thread::spawn(move || {
                        if let Err(e) = serve(stream, &state) {
                            debug!("Fake server connection ended: {}", e);
                        }
                    });
                }
            })
        };

        Self {
            endpoint: Endpoint::new("127.0.0.1", port),
            state,
            stopping,
            handle: Some(handle),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    pub fn with_device(self, serial: &str, state: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .devices
            .push((serial.to_string(), state.to_string()));
        self
    }

    pub fn with_file(self, path: &str, data: &[u8], mode: u32) -> Self {
        self.state.lock().unwrap().add_file(
            path,
            FakeFile {
                data: data.to_vec(),
                mode: FILE_TYPE | mode,
                mtime: 1_600_000_000,
            },
        );
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().add_dir(path);
        self
    }

    /// Scripted output for `shell:<command>`, written with `\n` turned into `\r\n`
    pub fn with_shell(self, command: &str, output: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .shell
            .insert(command.to_string(), output.replace('\n', "\r\n").into_bytes());
        self
    }

    /// RECV of `path` answers with a DATA frame larger than a chunk
    pub fn with_oversized_pull(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .oversized_pulls
            .insert(path.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<FakeFile> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn forwards(&self) -> Vec<String> {
        self.state.lock().unwrap().forwards.clone()
    }

    /// Every host request received, in order
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Drop for FakeAdbServer {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        // Wake the accept loop.
        let _ = TcpStream::connect(("127.0.0.1", self.endpoint.port));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_request(stream: &mut TcpStream) -> io::Result<String> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len)?;
    let len = usize::from_str_radix(&String::from_utf8_lossy(&len), 16)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

fn write_framed(stream: &mut TcpStream, status: &[u8], payload: &str) -> io::Result<()> {
    let mut reply = status.to_vec();
    reply.extend_from_slice(format!("{:04x}", payload.len()).as_bytes());
    reply.extend_from_slice(payload.as_bytes());
    stream.write_all(&reply)
}

fn serve(mut stream: TcpStream, state: &Mutex<FakeState>) -> io::Result<()> {
    let mut serial: Option<String> = None;

    loop {
        let request = read_request(&mut stream)?;
        state.lock().unwrap().requests.push(request.clone());

        if request == "host:version" {
            let version = state.lock().unwrap().version;
            return write_framed(&mut stream, b"OKAY", &format!("{:04x}", version));
        }
        if request == "host:devices" || request == "host:devices-l" {
            let body: String = state
                .lock()
                .unwrap()
                .devices
                .iter()
                .map(|(serial, state)| format!("{}\t{}\n", serial, state))
                .collect();
            return write_framed(&mut stream, b"OKAY", &body);
        }
        if request == "host:kill" {
            return stream.write_all(b"OKAY");
        }
        if let Some(address) = request.strip_prefix("host:connect:") {
            return write_framed(&mut stream, b"OKAY", &format!("connected to {}", address));
        }
        if let Some(address) = request.strip_prefix("host:disconnect:") {
            return write_framed(&mut stream, b"OKAY", &format!("disconnected {}", address));
        }
        if let Some(wanted) = request.strip_prefix("host:transport:") {
            let known = state.lock().unwrap().devices.iter().any(|(s, _)| s == wanted);
            if !known {
                return write_framed(
                    &mut stream,
                    b"FAIL",
                    &format!("device '{}' not found", wanted),
                );
            }
            stream.write_all(b"OKAY")?;
            serial = Some(wanted.to_string());
            continue;
        }
        if let Some(rest) = request.strip_prefix("host-serial:") {
            return serve_forward(&mut stream, state, rest);
        }
        if request == "host:list-forward" {
            let body: String = state.lock().unwrap().forwards.iter().map(|f| format!("{}\n", f)).collect();
            return write_framed(&mut stream, b"OKAY", &body);
        }

        if serial.is_none() {
            return write_framed(&mut stream, b"FAIL", "no device selected");
        }
        if request == "sync:" {
            stream.write_all(b"OKAY")?;
            return serve_sync(&mut stream, state);
        }
        if let Some(command) = request.strip_prefix("shell:") {
            stream.write_all(b"OKAY")?;
            let output = state.lock().unwrap().shell.get(command).cloned();
            let output = output.unwrap_or_else(|| {
                let program = command.split_whitespace().next().unwrap_or(command);
                format!("/system/bin/sh: {}: not found\r\n", program).into_bytes()
            });
            return stream.write_all(&output);
        }
        if request.starts_with("reboot:") {
            return stream.write_all(b"OKAY");
        }
        return write_framed(&mut stream, b"FAIL", &format!("unknown request: {}", request));
    }
}

fn serve_forward(stream: &mut TcpStream, state: &Mutex<FakeState>, rest: &str) -> io::Result<()> {
    let Some((serial, command)) = rest.split_once(':') else {
        return write_framed(stream, b"FAIL", "bad request");
    };

    if let Some(spec) = command.strip_prefix("forward:") {
        let spec = spec.strip_prefix("norebind:").unwrap_or(spec);
        let Some((local, remote)) = spec.split_once(';') else {
            return write_framed(stream, b"FAIL", "bad forward");
        };
        let local = if local == "tcp:0" { "tcp:41234" } else { local };
        state
            .lock()
            .unwrap()
            .forwards
            .push(format!("{} {} {}", serial, local, remote));
        stream.write_all(b"OKAYOKAY")?;
        if spec.starts_with("tcp:0;") {
            return write_framed(stream, b"", "41234");
        }
        return Ok(());
    }
    if command == "list-forward" {
        let body: String = state
            .lock()
            .unwrap()
            .forwards
            .iter()
            .filter(|f| f.starts_with(&format!("{} ", serial)))
            .map(|f| format!("{}\n", f))
            .collect();
        return write_framed(stream, b"OKAY", &body);
    }
    if let Some(local) = command.strip_prefix("killforward:") {
        let mut state = state.lock().unwrap();
        let before = state.forwards.len();
        let prefix = format!("{} {} ", serial, local);
        state.forwards.retain(|f| !f.starts_with(&prefix));
        if state.forwards.len() == before {
            return write_framed(stream, b"FAIL", &format!("listener '{}' not found", local));
        }
        return stream.write_all(b"OKAY");
    }
    if command == "killforward-all" {
        let prefix = format!("{} ", serial);
        state.lock().unwrap().forwards.retain(|f| !f.starts_with(&prefix));
        return stream.write_all(b"OKAY");
    }
    write_framed(stream, b"FAIL", "unknown host-serial request")
}

fn read_u32(stream: &mut TcpStream) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_sync_request(stream: &mut TcpStream) -> io::Result<([u8; 4], String)> {
    let mut id = [0u8; 4];
    stream.read_exact(&mut id)?;
    let len = read_u32(stream)? as usize;
    let mut path = vec![0u8; len];
    stream.read_exact(&mut path)?;
    Ok((id, String::from_utf8_lossy(&path).into_owned()))
}

fn write_u32s(stream: &mut TcpStream, id: &[u8; 4], values: &[u32]) -> io::Result<()> {
    let mut frame = id.to_vec();
    for value in values {
        frame.extend_from_slice(&value.to_le_bytes());
    }
    stream.write_all(&frame)
}

fn sync_fail(stream: &mut TcpStream, message: &str) -> io::Result<()> {
    write_u32s(stream, b"FAIL", &[message.len() as u32])?;
    stream.write_all(message.as_bytes())
}

fn serve_sync(stream: &mut TcpStream, state: &Mutex<FakeState>) -> io::Result<()> {
    loop {
        let (id, path) = read_sync_request(stream)?;
        match &id {
            b"STAT" => {
                let (mode, size, mtime) = state.lock().unwrap().stat(&path);
                write_u32s(stream, b"STAT", &[mode, size, mtime])?;
            }
            b"LIST" => {
                let entries = state.lock().unwrap().children(&path);
                for (name, (mode, size, mtime)) in entries {
                    write_u32s(stream, b"DENT", &[mode, size, mtime, name.len() as u32])?;
                    stream.write_all(name.as_bytes())?;
                }
                write_u32s(stream, b"DONE", &[0, 0, 0, 0])?;
            }
            b"SEND" => {
                let Some((target, mode)) = path.rsplit_once(',') else {
                    return sync_fail(stream, "missing mode");
                };
                let mode: u32 = mode.parse().unwrap_or(0o644);
                let mut data = Vec::new();
                let mtime = loop {
                    let mut frame_id = [0u8; 4];
                    stream.read_exact(&mut frame_id)?;
                    let value = read_u32(stream)?;
                    match &frame_id {
                        b"DATA" => {
                            let mut chunk = vec![0u8; value as usize];
                            stream.read_exact(&mut chunk)?;
                            data.extend_from_slice(&chunk);
                        }
                        b"DONE" => break value,
                        b"QUIT" => return Ok(()),
                        _ => return sync_fail(stream, "unexpected frame"),
                    }
                };
                if target.starts_with("/readonly") {
                    sync_fail(stream, "Read-only file system")?;
                    continue;
                }
                state.lock().unwrap().add_file(
                    target,
                    FakeFile {
                        data,
                        mode: FILE_TYPE | (mode & 0o7777),
                        mtime,
                    },
                );
                write_u32s(stream, b"OKAY", &[0])?;
            }
            b"RECV" => {
                let (file, oversized) = {
                    let state = state.lock().unwrap();
                    (state.files.get(&path).cloned(), state.oversized_pulls.contains(&path))
                };
                if oversized {
                    write_u32s(stream, b"DATA", &[(MAX_CHUNK_SIZE + 1) as u32])?;
                    continue;
                }
                let Some(file) = file else {
                    sync_fail(stream, "No such file or directory")?;
                    continue;
                };
                for chunk in file.data.chunks(MAX_CHUNK_SIZE) {
                    write_u32s(stream, b"DATA", &[chunk.len() as u32])?;
                    stream.write_all(chunk)?;
                }
                write_u32s(stream, b"DONE", &[0])?;
            }
            b"QUIT" => return Ok(()),
            _ => return sync_fail(stream, "unknown sync command"),
        }
    }
}
