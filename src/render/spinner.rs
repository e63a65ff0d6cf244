//! Terminal spinner driven by a background tick task.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Spinner animation frames.
pub const FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

/// Delay between frames.
pub const TICK: Duration = Duration::from_millis(100);

/// Return to column zero and erase the line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Output shared between a sink and its spinner task.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A running spinner.
///
/// Frames are written under the output lock and only while the spinner is
/// live, so nothing is drawn after [`Spinner::stop`] returns.
pub struct Spinner {
    cancel: CancellationToken,
    out: SharedWriter,
}

impl Spinner {
    /// Start ticking `label` on `out`. Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(label: Option<&str>, out: SharedWriter) -> Self {
        let cancel = CancellationToken::new();
        let suffix = label.map(|l| format!("  -- {l}")).unwrap_or_default();

        let token = cancel.clone();
        let writer = Arc::clone(&out);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            for frame in FRAMES.iter().cycle() {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
                if token.is_cancelled() {
                    break;
                }
                let _ = write!(out, "{CLEAR_LINE}{frame}{suffix}");
                let _ = out.flush();
            }
        });

        Self { cancel, out }
    }

    /// Stop ticking, erase the spinner and optionally leave `final_line`.
    pub fn stop(self, final_line: Option<&str>) {
        self.cancel.cancel();

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write!(out, "{CLEAR_LINE}");
        if let Some(line) = final_line {
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
