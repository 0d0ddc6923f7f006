pub mod fake_server;
pub mod fixtures;
pub mod mocks;

pub use fake_server::FakeAdbServer;
pub use mocks::{MockHandle, MockTransport, MockTransportFactory};
