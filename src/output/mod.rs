use crate::core::types::OutputFormat;
use crate::error::Result;
use colored::*;
use comfy_table::Table;
use serde::Serialize;

/// Unified output formatter for all commands
pub struct OutputFormatter {
    color_enabled: bool,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {
            color_enabled: true,
            quiet: false,
        }
    }

    pub fn with_color(mut self, enabled: bool) -> Self {
        self.color_enabled = enabled;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Print `items` in the requested format
    pub fn print<T>(&self, format: OutputFormat, items: &[T]) -> Result<()>
    where
        T: TableFormat + PlainFormat + Serialize,
    {
        match format {
            OutputFormat::Table => self.table(items),
            OutputFormat::Json => self.json(&items),
            OutputFormat::Plain => self.plain(items),
        }
    }

    /// Format items as a table
    pub fn table<T: TableFormat>(&self, items: &[T]) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        println!("{}", render_table(items));
        Ok(())
    }

    /// Format items as JSON
    pub fn json<T: Serialize + ?Sized>(&self, items: &T) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if self.color_enabled {
            crate::utils::print_colored_json(items)?;
        } else {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        Ok(())
    }

    /// Format items as plain text
    pub fn plain<T: PlainFormat>(&self, items: &[T]) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        for item in items {
            println!("{}", item.plain());
        }
        Ok(())
    }

    /// Print a message (respecting quiet mode)
    pub fn message(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    pub fn success(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if self.color_enabled {
            println!("{} {}", "✓".green(), msg);
        } else {
            println!("{}", msg);
        }
    }

    pub fn warning(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if self.color_enabled {
            eprintln!("{}", msg.bright_yellow());
        } else {
            eprintln!("WARNING: {}", msg);
        }
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, msg: &str) {
        if self.color_enabled {
            eprintln!("{} {}", "Error:".bright_red(), msg);
        } else {
            eprintln!("ERROR: {}", msg);
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the borderless table the CLI prints
pub fn render_table<T: TableFormat>(items: &[T]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Trait for types that can be formatted as a table
pub trait TableFormat {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Trait for types that can be formatted as plain text
pub trait PlainFormat {
    fn plain(&self) -> String;
}

pub mod device;
pub mod file;

pub use file::format_size;

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, u32);

    impl TableFormat for Row {
        fn headers() -> Vec<&'static str> {
            vec!["NAME", "COUNT"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.0.to_string(), self.1.to_string()]
        }
    }

    #[test]
    fn test_render_table() {
        let table = render_table(&[Row("alpha", 1), Row("beta", 22)]).to_string();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("NAME"));
        assert!(lines[2].contains("beta"));
        assert!(lines[2].contains("22"));
    }
}
