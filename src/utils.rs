use crate::error::Result;
use colored::*;
use serde::Serialize;

pub fn print_colored_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", colorize_json(&serde_json::to_string_pretty(data)?));
    Ok(())
}

/// Color the keys of pretty-printed JSON, line by line
pub fn colorize_json(json: &str) -> String {
    json.lines()
        .map(|line| {
            let indent = line.len() - line.trim_start().len();
            let trimmed = line.trim_start();
            // Keys are the only quoted strings directly followed by ": "
            match trimmed.strip_prefix('"').and_then(|rest| rest.split_once("\": ")) {
                Some((key, value)) => format!(
                    "{}{}: {}",
                    " ".repeat(indent),
                    format!("\"{}\"", key).cyan(),
                    value
                ),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Local path for a pulled file: `dst` itself, or `dst/<basename>` when `dst`
/// is an existing directory
pub fn local_destination(remote_path: &str, dst: &std::path::Path) -> std::path::PathBuf {
    if dst.is_dir() {
        let name = remote_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(remote_path);
        dst.join(name)
    } else {
        dst.to_path_buf()
    }
}
