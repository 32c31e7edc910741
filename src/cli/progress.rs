//! Transfer progress display for the download command.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Single byte-count bar for the transfer in flight.
///
/// Messages printed through [`TransferProgress::println`] are written above the
/// bar so they do not corrupt it. With the bar disabled they go to stdout.
pub struct TransferProgress {
    bar: ProgressBar,
    enabled: bool,
}

impl TransferProgress {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        Self { bar, enabled }
    }

    /// Reset the bar for a new transfer of `label`.
    pub fn start(&self, label: &str) {
        if !self.enabled {
            return;
        }
        self.bar.reset();
        self.bar.set_length(0);
        self.bar.set_style(spinner_style());
        self.bar.set_message(truncate_label(label, 40));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    pub fn update(&self, bytes: u64, total: Option<u64>) {
        if !self.enabled {
            return;
        }
        if let Some(total) = total {
            if self.bar.length() != Some(total) {
                self.bar.set_style(bar_style());
                self.bar.set_length(total);
            }
        }
        self.bar.set_position(bytes);
    }

    /// Stop and hide the bar until the next transfer starts.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }

    pub fn println(&self, message: &str) {
        if self.enabled {
            self.bar.suspend(|| println!("{}", message));
        } else {
            println!("{}", message);
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.cyan} {wide_msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("  {spinner:.cyan} {wide_msg} {bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Last path segment of a URL, shortened for display.
pub fn truncate_label(label: &str, max_len: usize) -> String {
    let name = label.rsplit('/').next().unwrap_or(label);
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    let kept: String = name.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Human-readable retry delay, e.g. `2s` or `4.5s`.
pub fn format_delay(delay: Duration) -> String {
    let secs = delay.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}s", delay.as_secs())
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_label() {
        assert_eq!(
            truncate_label("https://download.geofabrik.de/north-america/us/texas-latest.osm.pbf", 40),
            "texas-latest.osm.pbf"
        );
        assert_eq!(truncate_label("a-very-long-region-name-latest.osm.pbf", 12), "a-very-lo...");
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_millis(2_000)), "2s");
        assert_eq!(format_delay(Duration::from_millis(4_500)), "4.5s");
    }

    #[test]
    fn test_disabled_progress_is_silent() {
        let progress = TransferProgress::new(false);
        progress.start("texas-latest.osm.pbf");
        progress.update(10, Some(100));
        progress.finish();
    }
}
