pub mod parser;

pub use parser::{parse_device_line, parse_device_list};
