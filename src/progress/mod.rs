use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Trait for progress reporting
pub trait ProgressReporter: Send + Sync {
    fn start(&self, total: u64);
    fn update(&self, current: u64);
    fn finish(&self);
    fn set_message(&self, msg: &str);
    fn inc(&self, delta: u64);
}

/// Indicatif-based progress reporter
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Byte counting bar for a file transfer
    pub fn transfer(label: &str, total: u64) -> Self {
        let template = format!(
            "{{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}})",
            label
        );
        Self::with_template(total, &template)
    }

    /// Create a progress bar with custom template
    pub fn with_template(total: u64, template: &str) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);

        Self { bar }
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn update(&self, current: u64) {
        self.bar.set_position(current);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn set_message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }
}

/// No-op progress reporter for when progress reporting is disabled
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    fn start(&self, _total: u64) {}
    fn update(&self, _current: u64) {}
    fn finish(&self) {}
    fn set_message(&self, _msg: &str) {}
    fn inc(&self, _delta: u64) {}
}

/// Build the reporter for a transfer, honouring `--quiet`
pub fn transfer_progress(enabled: bool, label: &str) -> Box<dyn ProgressReporter> {
    if enabled {
        Box::new(IndicatifProgress::transfer(label, 0))
    } else {
        Box::new(NoOpProgress)
    }
}
