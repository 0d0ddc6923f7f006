pub mod cancel;
pub mod context;
pub mod types;

pub use cancel::CancelToken;
pub use context::{CommandContext, CommandContextBuilder};
pub use types::{Device, DeviceState, OutputFormat};
