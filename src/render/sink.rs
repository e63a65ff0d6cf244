//! Output targets for the stage renderer.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use super::spinner::{SharedWriter, Spinner};

/// Where rendered build output goes.
///
/// The renderer calls `begin_stage`/`finish_stage` only in interactive mode,
/// always in pairs, and never begins a stage while one is live.
pub trait RenderSink {
    /// Show a live indicator for a stage. `None` is an unlabeled wait.
    fn begin_stage(&mut self, label: Option<&str>);

    /// Resolve the live indicator, leaving `final_line` if given.
    fn finish_stage(&mut self, final_line: Option<&str>);

    /// Write a complete line.
    fn line(&mut self, text: &str);
}

/// Terminal sink: a spinner per stage plus plain lines.
pub struct Console {
    out: SharedWriter,
    spinner: Option<Spinner>,
}

impl Console {
    /// Console writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Console writing to any output.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
            spinner: None,
        }
    }
}

impl RenderSink for Console {
    fn begin_stage(&mut self, label: Option<&str>) {
        if let Some(previous) = self.spinner.take() {
            previous.stop(None);
        }
        self.spinner = Some(Spinner::start(label, Arc::clone(&self.out)));
    }

    fn finish_stage(&mut self, final_line: Option<&str>) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(final_line),
            None => {
                if let Some(line) = final_line {
                    self.line(line);
                }
            }
        }
    }

    fn line(&mut self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(None);
        }
    }
}
