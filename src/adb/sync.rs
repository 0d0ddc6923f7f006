//! File sync sub-protocol (`sync:` mode): stat, list, push and pull.
//!
//! Every frame starts with a 4 byte ASCII id followed by little-endian u32
//! fields:
//!
//! ```text
//! STAT/LIST/RECV  id | len(path) | path
//! SEND            id | len(path,mode) | path "," mode
//! DATA            id | len | bytes (<= 64 KiB)
//! DONE            id | mtime            (push) / id | 0  (pull)
//! STAT reply      id | mode | size | mtime
//! DENT            id | mode | size | mtime | namelen | name
//! OKAY/FAIL       id | len | message
//! ```

use crate::adb::protocol::{AdbRequest, ProtocolSocket};
use crate::core::cancel::CancelToken;
use crate::error::{AdbError, Result};
use crate::progress::ProgressReporter;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Largest payload of a single DATA frame
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;
/// Longest remote path accepted, in encoded bytes
pub const MAX_REMOTE_PATH_LENGTH: usize = 1024;
/// Mode used when the local file carries no permission bits
pub const DEFAULT_FILE_MODE: u32 = 0o644;

// File type bits (from stat.h)
const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Opcodes of the sync protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncCommand {
    Stat,
    List,
    Dent,
    Send,
    Recv,
    Data,
    Done,
    Okay,
    Fail,
    Quit,
}

impl SyncCommand {
    pub fn id(&self) -> &'static [u8; 4] {
        match self {
            SyncCommand::Stat => b"STAT",
            SyncCommand::List => b"LIST",
            SyncCommand::Dent => b"DENT",
            SyncCommand::Send => b"SEND",
            SyncCommand::Recv => b"RECV",
            SyncCommand::Data => b"DATA",
            SyncCommand::Done => b"DONE",
            SyncCommand::Okay => b"OKAY",
            SyncCommand::Fail => b"FAIL",
            SyncCommand::Quit => b"QUIT",
        }
    }

    pub fn from_id(id: &[u8]) -> Option<Self> {
        Some(match id {
            b"STAT" => SyncCommand::Stat,
            b"LIST" => SyncCommand::List,
            b"DENT" => SyncCommand::Dent,
            b"SEND" => SyncCommand::Send,
            b"RECV" => SyncCommand::Recv,
            b"DATA" => SyncCommand::Data,
            b"DONE" => SyncCommand::Done,
            b"OKAY" => SyncCommand::Okay,
            b"FAIL" => SyncCommand::Fail,
            b"QUIT" => SyncCommand::Quit,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Socket,
    Symlink,
    Regular,
    BlockDevice,
    CharDevice,
    Directory,
    Fifo,
    Unknown,
}

/// Result of a STAT request, or the metadata part of a DENT entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RemoteFileStat {
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

impl RemoteFileStat {
    fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            mode: le_u32(&bytes[0..4]),
            size: le_u32(&bytes[4..8]),
            mtime: le_u32(&bytes[8..12]),
        }
    }

    /// False for the all-zero reply the remote sends for a missing path
    pub fn exists(&self) -> bool {
        !(self.mode & S_IFMT == 0 && self.size == 0 && self.mtime == 0)
    }

    pub fn file_type(&self) -> FileType {
        match self.mode & S_IFMT {
            S_IFSOCK => FileType::Socket,
            S_IFLNK => FileType::Symlink,
            S_IFREG => FileType::Regular,
            S_IFBLK => FileType::BlockDevice,
            S_IFDIR => FileType::Directory,
            S_IFCHR => FileType::CharDevice,
            S_IFIFO => FileType::Fifo,
            _ => FileType::Unknown,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type() == FileType::Regular
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.mtime), 0)
    }

    /// `ls -l` style mode string, e.g. `drwxr-x--x`
    pub fn permissions_string(&self) -> String {
        let mode = self.mode;
        let file_type = match mode & S_IFMT {
            S_IFIFO => "p",
            S_IFCHR => "c",
            S_IFDIR => "d",
            S_IFBLK => "b",
            S_IFREG => "-",
            S_IFLNK => "l",
            S_IFSOCK => "s",
            _ => "?",
        };
        format!(
            "{}{}{}{}",
            file_type,
            permission_triplet(mode >> 6, mode & 0o4000 != 0, 's'),
            permission_triplet(mode >> 3, mode & 0o2000 != 0, 's'),
            permission_triplet(mode, mode & 0o1000 != 0, 't'),
        )
    }
}

fn permission_triplet(bits: u32, special: bool, special_char: char) -> String {
    let mut triplet = String::with_capacity(3);
    triplet.push(if bits & 4 != 0 { 'r' } else { '-' });
    triplet.push(if bits & 2 != 0 { 'w' } else { '-' });
    triplet.push(match (bits & 1 != 0, special) {
        (false, false) => '-',
        (true, false) => 'x',
        (false, true) => special_char.to_ascii_uppercase(),
        (true, true) => special_char,
    });
    triplet
}

/// One entry of a LIST reply, in server order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(flatten)]
    pub stat: RemoteFileStat,
}

/// Totals for a recursive transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: usize,
    pub bytes: u64,
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn id_text(id: &[u8]) -> String {
    String::from_utf8_lossy(id).into_owned()
}

pub(crate) fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Reports cumulative bytes of a multi-file transfer through a per-file sink
struct OffsetProgress<'a> {
    inner: &'a dyn ProgressReporter,
    base: u64,
}

impl ProgressReporter for OffsetProgress<'_> {
    fn start(&self, _total: u64) {}
    fn update(&self, current: u64) {
        self.inner.update(self.base + current);
    }
    fn finish(&self) {}
    fn set_message(&self, msg: &str) {
        self.inner.set_message(msg);
    }
    fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }
}

/// A socket in sync mode. Owns the socket for its whole lifetime.
pub struct SyncSession {
    socket: Option<ProtocolSocket>,
}

impl SyncSession {
    /// Switch `socket` (already scoped to a device) into sync mode
    pub fn open(mut socket: ProtocolSocket) -> Result<Self> {
        socket.send(&AdbRequest::Sync)?;
        socket.read_okay()?;
        debug!("Sync session opened");
        Ok(Self {
            socket: Some(socket),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn socket(&mut self) -> Result<&mut ProtocolSocket> {
        self.socket.as_mut().ok_or(AdbError::SessionClosed)
    }

    fn check_path(path: &str) -> Result<()> {
        let length = path.len();
        if length > MAX_REMOTE_PATH_LENGTH {
            return Err(AdbError::RemotePathTooLong {
                length,
                max: MAX_REMOTE_PATH_LENGTH,
            });
        }
        Ok(())
    }

    fn send_request(&mut self, command: SyncCommand, payload: &str) -> Result<()> {
        debug!("Sending sync request: {} {}", id_text(command.id()), payload);
        let mut frame = BytesMut::with_capacity(8 + payload.len());
        frame.put_slice(command.id());
        frame.put_u32_le(payload.len() as u32);
        frame.put_slice(payload.as_bytes());
        self.write_all(&frame)
    }

    /// Socket errors leave the stream out of step with the server, so they end the session
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let result = self.socket()?.read_exact(buf);
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let result = self.socket()?.write_all(bytes);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Read a length field and check it against `max` before anything is allocated
    fn read_length(&mut self, max: usize, what: &str) -> Result<usize> {
        let len = self.read_u32()? as usize;
        if len > max {
            let message = format!("{} of {} bytes exceeds limit of {}", what, len, max);
            warn!("{}", message);
            self.abort();
            return Err(AdbError::Protocol(message));
        }
        Ok(len)
    }

    fn read_id(&mut self) -> Result<[u8; 4]> {
        let mut id = [0u8; 4];
        self.read_exact(&mut id)?;
        Ok(id)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read the `len | message` tail of a FAIL frame
    fn read_failure(&mut self) -> Result<AdbError> {
        let len = self.read_length(MAX_CHUNK_SIZE, "Failure message")?;
        let mut message = vec![0u8; len];
        self.read_exact(&mut message)?;
        let message = String::from_utf8_lossy(&message).into_owned();
        debug!("Sync request failed: {}", message);
        Ok(AdbError::Protocol(message))
    }

    fn unexpected(&mut self, id: &[u8], expected: &str) -> AdbError {
        self.abort();
        AdbError::Protocol(format!(
            "Expected {} but got {:?}",
            expected,
            id_text(id)
        ))
    }

    /// Stat a remote path. A missing path yields a stat with `exists() == false`.
    pub fn stat(&mut self, remote_path: &str) -> Result<RemoteFileStat> {
        Self::check_path(remote_path)?;
        self.send_request(SyncCommand::Stat, remote_path)?;

        let id = self.read_id()?;
        match SyncCommand::from_id(&id) {
            Some(SyncCommand::Stat) => {
                let mut body = [0u8; 12];
                self.read_exact(&mut body)?;
                Ok(RemoteFileStat::from_le_bytes(&body))
            }
            Some(SyncCommand::Fail) => Err(self.read_failure()?),
            _ => Err(self.unexpected(&id, "STAT")),
        }
    }

    /// List a remote directory
    pub fn list(&mut self, remote_path: &str) -> Result<Vec<FileEntry>> {
        Self::check_path(remote_path)?;
        self.send_request(SyncCommand::List, remote_path)?;

        let mut entries = Vec::new();
        loop {
            let id = self.read_id()?;
            match SyncCommand::from_id(&id) {
                Some(SyncCommand::Dent) => {
                    let mut body = [0u8; 16];
                    self.read_exact(&mut body)?;
                    let stat = RemoteFileStat::from_le_bytes(&body[..12]);
                    let name_len = le_u32(&body[12..16]) as usize;
                    if name_len > MAX_CHUNK_SIZE {
                        self.abort();
                        return Err(AdbError::Protocol(format!(
                            "Directory entry name of {} bytes exceeds limit of {}",
                            name_len, MAX_CHUNK_SIZE
                        )));
                    }
                    let mut name = vec![0u8; name_len];
                    self.read_exact(&mut name)?;
                    entries.push(FileEntry {
                        name: String::from_utf8_lossy(&name).into_owned(),
                        stat,
                    });
                }
                Some(SyncCommand::Done) => {
                    // DONE carries an all-zero dent body
                    let mut body = [0u8; 16];
                    self.read_exact(&mut body)?;
                    break;
                }
                Some(SyncCommand::Fail) => return Err(self.read_failure()?),
                _ => return Err(self.unexpected(&id, "DENT or DONE")),
            }
        }

        debug!("Listed {} entries in {}", entries.len(), remote_path);
        Ok(entries)
    }

    /// Stream `source` to `remote_path`, returning the number of bytes sent
    pub fn push<R: Read>(
        &mut self,
        source: &mut R,
        remote_path: &str,
        mode: u32,
        mtime: u32,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<u64> {
        Self::check_path(remote_path)?;
        if cancel.is_cancelled() {
            return Err(AdbError::Cancelled);
        }
        self.socket()?;

        info!("Pushing to {}", remote_path);
        let header = format!("{},{}", remote_path, mode & 0o777);
        self.send_request(SyncCommand::Send, &header)?;

        let mut buffer = vec![0u8; MAX_CHUNK_SIZE];
        let mut bytes_sent = 0u64;

        loop {
            let bytes_read = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.abort();
                    return Err(AdbError::from_local(e));
                }
            };

            let mut frame = BytesMut::with_capacity(8 + bytes_read);
            frame.put_slice(SyncCommand::Data.id());
            frame.put_u32_le(bytes_read as u32);
            frame.put_slice(&buffer[..bytes_read]);
            self.write_all(&frame)?;

            bytes_sent += bytes_read as u64;
            progress.update(bytes_sent);

            if cancel.is_cancelled() {
                info!("Push to {} cancelled after {} bytes", remote_path, bytes_sent);
                self.abort();
                return Err(AdbError::Cancelled);
            }
        }

        let mut done = BytesMut::with_capacity(8);
        done.put_slice(SyncCommand::Done.id());
        done.put_u32_le(mtime);
        self.write_all(&done)?;

        let id = self.read_id()?;
        match SyncCommand::from_id(&id) {
            Some(SyncCommand::Okay) => {
                // OKAY carries a zero length field
                self.read_u32()?;
                info!("Pushed {} bytes to {}", bytes_sent, remote_path);
                Ok(bytes_sent)
            }
            Some(SyncCommand::Fail) => Err(self.read_failure()?),
            _ => Err(self.unexpected(&id, "OKAY or FAIL")),
        }
    }

    /// Stream `remote_path` into `sink`, returning the number of bytes received.
    ///
    /// On error or cancellation whatever was already written to `sink` stays there.
    pub fn pull<W: Write>(
        &mut self,
        remote_path: &str,
        sink: &mut W,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<u64> {
        Self::check_path(remote_path)?;
        if cancel.is_cancelled() {
            return Err(AdbError::Cancelled);
        }

        info!("Pulling {}", remote_path);
        self.send_request(SyncCommand::Recv, remote_path)?;

        let mut buffer = vec![0u8; MAX_CHUNK_SIZE];
        let mut bytes_received = 0u64;

        loop {
            let id = self.read_id()?;
            match SyncCommand::from_id(&id) {
                Some(SyncCommand::Data) => {
                    let len = self.read_u32()? as usize;
                    if len > MAX_CHUNK_SIZE {
                        warn!("DATA frame of {} bytes exceeds chunk limit", len);
                        self.abort();
                        return Err(AdbError::BufferOverrun {
                            size: len,
                            max: MAX_CHUNK_SIZE,
                        });
                    }
                    self.read_exact(&mut buffer[..len])?;
                    sink.write_all(&buffer[..len]).map_err(AdbError::from_local)?;

                    bytes_received += len as u64;
                    progress.update(bytes_received);

                    if cancel.is_cancelled() {
                        info!(
                            "Pull of {} cancelled after {} bytes",
                            remote_path, bytes_received
                        );
                        self.abort();
                        return Err(AdbError::Cancelled);
                    }
                }
                Some(SyncCommand::Done) => {
                    self.read_u32()?;
                    break;
                }
                Some(SyncCommand::Fail) => return Err(self.read_failure()?),
                _ => return Err(self.unexpected(&id, "DATA or DONE")),
            }
        }

        sink.flush().map_err(AdbError::from_local)?;
        info!("Pulled {} bytes from {}", bytes_received, remote_path);
        Ok(bytes_received)
    }

    /// Push a local regular file, keeping its permission bits and mtime
    pub fn push_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let metadata = fs::metadata(local_path).map_err(AdbError::from_local)?;
        if !metadata.is_file() {
            return Err(AdbError::from_local(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", local_path.display()),
            )));
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut file = File::open(local_path).map_err(AdbError::from_local)?;
        progress.start(metadata.len());
        let sent = self.push(
            &mut file,
            remote_path,
            local_mode(&metadata),
            mtime,
            progress,
            cancel,
        )?;
        progress.finish();
        Ok(sent)
    }

    /// Pull a remote file into `local_path`, creating or truncating it
    pub fn pull_file(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let stat = self.stat(remote_path)?;
        if !stat.exists() {
            return Err(AdbError::FileNotFound(remote_path.to_string()));
        }
        if stat.is_directory() {
            return Err(AdbError::from_local(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", remote_path),
            )));
        }

        let mut file = File::create(local_path).map_err(AdbError::from_local)?;
        progress.start(u64::from(stat.size));
        let received = self.pull(remote_path, &mut file, progress, cancel)?;
        progress.finish();
        Ok(received)
    }

    /// Push every regular file below `local_dir` into `remote_dir`
    pub fn push_dir(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<TransferSummary> {
        let mut summary = TransferSummary::default();

        for entry in WalkDir::new(local_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| AdbError::from_local(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|e| AdbError::from_local(io::Error::new(io::ErrorKind::Other, e)))?;
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let remote_path = join_remote(remote_dir, &relative);

            let offset = OffsetProgress {
                inner: progress,
                base: summary.bytes,
            };
            summary.bytes += self.push_file(entry.path(), &remote_path, &offset, cancel)?;
            summary.files += 1;
        }

        Ok(summary)
    }

    /// Pull the remote tree below `remote_dir` into `local_dir`
    pub fn pull_dir(
        &mut self,
        remote_dir: &str,
        local_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<TransferSummary> {
        let mut summary = TransferSummary::default();
        self.pull_dir_into(remote_dir, local_dir, progress, cancel, &mut summary)?;
        Ok(summary)
    }

    fn pull_dir_into(
        &mut self,
        remote_dir: &str,
        local_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancelToken,
        summary: &mut TransferSummary,
    ) -> Result<()> {
        fs::create_dir_all(local_dir).map_err(AdbError::from_local)?;

        for entry in self.list(remote_dir)? {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            let remote_path = join_remote(remote_dir, &entry.name);
            let local_path = local_dir.join(&entry.name);

            match entry.stat.file_type() {
                FileType::Directory => {
                    self.pull_dir_into(&remote_path, &local_path, progress, cancel, summary)?;
                }
                FileType::Regular => {
                    let mut file = File::create(&local_path).map_err(AdbError::from_local)?;
                    let offset = OffsetProgress {
                        inner: progress,
                        base: summary.bytes,
                    };
                    summary.bytes += self.pull(&remote_path, &mut file, &offset, cancel)?;
                    summary.files += 1;
                }
                other => debug!("Skipping {} ({:?})", remote_path, other),
            }
        }

        Ok(())
    }

    /// Best-effort end of the remote command, then drop the socket
    fn abort(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let mut quit = BytesMut::with_capacity(8);
            quit.put_slice(SyncCommand::Quit.id());
            quit.put_u32_le(0);
            let _ = socket.write_all(&quit);
            let _ = socket.close();
        }
    }

    /// End the session. Safe to call more than once.
    pub fn close(&mut self) {
        if self.socket.is_some() {
            debug!("Closing sync session");
            self.abort();
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Permission bits of a local file
#[cfg(unix)]
fn local_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    match metadata.permissions().mode() & 0o777 {
        0 => DEFAULT_FILE_MODE,
        mode => mode,
    }
}

#[cfg(not(unix))]
fn local_mode(_metadata: &fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}
