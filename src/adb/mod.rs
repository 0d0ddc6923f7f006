pub mod client;
pub mod forward;
pub mod protocol;
pub mod server;
pub mod shell;
pub mod sync;
pub mod tracker;
pub mod transport;


pub use client::AdbClient;
pub use forward::{ForwardEntry, ForwardSpec};
pub use protocol::{AdbRequest, AdbResponse, ProtocolSocket, RawStream};
pub use server::AdbServer;
pub use shell::{
    CollectingReceiver, MultiLineReceiver, NullReceiver, OutputReceiver, ShellStream,
};
pub use sync::{FileEntry, FileType, RemoteFileStat, SyncCommand, SyncSession, TransferSummary};
pub use tracker::{DeviceEvent, DeviceSet, DeviceTracker, ServerRestartHook, TrackerSettings, TrackerState};
pub use transport::{Endpoint, TcpTransport, TcpTransportFactory, Timeouts, Transport, TransportFactory};
