use indicatif::{ProgressBar, ProgressStyle};

/// Percentage bar for long-running, CPU-bound work.
#[derive(Debug)]
pub(crate) struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Creates a bar that renders only when `enabled`.
    pub(crate) fn new(enabled: bool, message: &str) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(100);
            bar.set_style(progress_style());
            bar.set_message(message.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub(crate) fn set_percent(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} [{bar:32.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_error| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
