//! Small collaborator seams: the progress indicator and the host environment.
//!
//! Both are injected so the controller can be driven in tests without a
//! terminal and without depending on the machine the tests run on.

use crate::conversation::ShellTarget;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Cosmetic start/stop signal around each model request.
pub trait StatusIndicator: Send {
    fn start(&mut self, message: &str);
    fn stop(&mut self);
}

/// Spinner on stderr.
#[derive(Default)]
pub struct SpinnerStatus {
    bar: Option<ProgressBar>,
}

impl SpinnerStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusIndicator for SpinnerStatus {
    fn start(&mut self, message: &str) {
        self.stop();
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.dim} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.bar = Some(bar);
    }

    fn stop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for SpinnerStatus {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Indicator that shows nothing.
#[derive(Debug, Default)]
pub struct SilentStatus;

impl StatusIndicator for SilentStatus {
    fn start(&mut self, _message: &str) {}
    fn stop(&mut self) {}
}

/// The shell and platform this process runs on.
pub trait EnvironmentProvider {
    /// Value of `$SHELL`, if set.
    fn shell(&self) -> Option<String>;
    /// Operating system name, e.g. `linux` or `macos`.
    fn platform(&self) -> String;

    /// Target for generated commands. Unknown shells default to `sh`.
    fn shell_target(&self) -> ShellTarget {
        let shell = self
            .shell()
            .and_then(|path| {
                std::path::Path::new(&path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "sh".to_string());
        ShellTarget::new(shell, self.platform())
    }

    /// Diagnostic dump printed by `--debug`.
    fn debug_report(&self) -> String {
        format!(
            "{{ shell: {}, platform: '{}' }}",
            self.shell()
                .map(|s| format!("'{}'", s))
                .unwrap_or_else(|| "undefined".to_string()),
            self.platform()
        )
    }
}

/// Reads the real process environment.
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn shell(&self) -> Option<String> {
        std::env::var("SHELL").ok()
    }

    fn platform(&self) -> String {
        std::env::consts::OS.to_string()
    }
}
