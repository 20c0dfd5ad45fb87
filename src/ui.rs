//! Terminal rendering for the command line front end.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    fn spinner(&self) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    /// A startup step, reported with its duration when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = self.spinner();
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live view of the session status line.
    pub fn status_view(&self) -> StatusView {
        let spinner = if self.use_pretty() {
            Some(self.spinner())
        } else {
            None
        };
        StatusView {
            spinner,
            last: String::new(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Prints status changes. Pretty mode redraws one spinner line; plain mode
/// prints a line per change.
pub struct StatusView {
    spinner: Option<ProgressBar>,
    last: String,
}

impl StatusView {
    /// Show `status` if it differs from what is displayed. Returns true on change.
    pub fn update(&mut self, status: &str) -> bool {
        if self.last == status {
            return false;
        }
        self.last = status.to_string();
        match &self.spinner {
            Some(spinner) => spinner.set_message(self.last.clone()),
            None => eprintln!("{}", self.last),
        }
        true
    }

    pub fn finish(self) {
        if let Some(spinner) = self.spinner {
            spinner.finish_with_message(self.last);
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_flag_disables_spinners() {
        let ui = Ui::from_args(Some("plain"), true);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(None, true);
        assert!(ui.use_pretty());
        let ui = Ui::from_args(Some("pretty"), false);
        assert!(!ui.use_pretty());
    }

    #[test]
    fn status_view_reports_only_changes() {
        let mut view = Ui::new(UiMode::Plain, false).status_view();
        assert!(view.update("Status: Stopped"));
        assert!(!view.update("Status: Stopped"));
        assert!(view.update("Status: Detecting..."));
        view.finish();
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
