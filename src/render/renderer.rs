//! Staged rendering of a build log.
//!
//! Each stage event opens a stage shown as a spinner (interactive) or a
//! single printed line (plain). At most one stage is open at a time, and
//! every stage that was opened is finalized exactly once: with a check when
//! the build moves on, with a cross when a stage fails or the log ends
//! abruptly.

use std::io::IsTerminal;

use futures_core::Stream;
use futures_util::StreamExt;
use owo_colors::OwoColorize;

use super::sink::{Console, RenderSink};
use crate::buildlog::{BuildLogError, LogEvent, LogKind};

/// Glyph for a stage that completed.
pub const CHECK: &str = "✅";

/// Glyph for a stage that failed.
pub const FAILURE: &str = "❌";

/// Errors that end a render session.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The feed produced an event kind this client does not know.
    #[error("unknown buildlog type: {0}")]
    UnknownKind(String),
    /// The event stream failed.
    #[error(transparent)]
    Stream(#[from] BuildLogError),
    /// The event stream ended without a done event.
    #[error("Build log ended before the build finished")]
    Incomplete,
}

/// Whether rendering continues after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for more events.
    Continue,
    /// The build finished.
    Finished,
}

/// Counts of what a session rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Stage events seen.
    pub stages: usize,
    /// Error events seen.
    pub errors: usize,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn glyph(self) -> &'static str {
        match self {
            Self::Success => CHECK,
            Self::Failure => FAILURE,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenStage {
    /// `None` for the wait opened after an error.
    label: Option<String>,
}

/// State of one render session.
#[derive(Debug, Clone)]
pub struct RenderState {
    open_stage: Option<OpenStage>,
    interactive: bool,
}

impl RenderState {
    /// Fresh state; `interactive` is fixed for the session.
    #[must_use]
    pub fn new(interactive: bool) -> Self {
        Self {
            open_stage: None,
            interactive,
        }
    }

    /// Whether spinners are drawn.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Whether a stage is waiting to be finalized.
    #[must_use]
    pub fn has_open_stage(&self) -> bool {
        self.open_stage.is_some()
    }
}

/// Renders build log events to a [`RenderSink`].
pub struct StageRenderer<S> {
    sink: S,
    state: RenderState,
    summary: RenderSummary,
}

impl StageRenderer<Console> {
    /// Renderer on stdout, interactive when stdout is a terminal.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Console::stdout(), std::io::stdout().is_terminal())
    }

    /// Renderer on stdout that never draws spinners.
    #[must_use]
    pub fn stdout_plain() -> Self {
        Self::new(Console::stdout(), false)
    }
}

impl<S: RenderSink> StageRenderer<S> {
    /// Create a renderer over `sink`.
    #[must_use]
    pub fn new(sink: S, interactive: bool) -> Self {
        Self {
            sink,
            state: RenderState::new(interactive),
            summary: RenderSummary::default(),
        }
    }

    /// Current render state.
    #[must_use]
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Counts so far.
    #[must_use]
    pub fn summary(&self) -> RenderSummary {
        self.summary
    }

    /// Borrow the sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Render events until done.
    ///
    /// On any failure the open stage is finalized with the failure glyph
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the stream's error, `RenderError::UnknownKind` for an
    /// unrecognized event, or `RenderError::Incomplete` if the stream ends
    /// without a done event.
    pub async fn render<St>(&mut self, mut events: St) -> Result<RenderSummary, RenderError>
    where
        St: Stream<Item = Result<LogEvent, BuildLogError>> + Unpin,
    {
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    self.abort();
                    return Err(e.into());
                }
            };

            if self.handle(&event)? == Progress::Finished {
                return Ok(self.summary);
            }
        }

        self.abort();
        Err(RenderError::Incomplete)
    }

    /// Apply a single event.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::UnknownKind` for an unrecognized event; the open
    /// stage has been finalized as failed.
    pub fn handle(&mut self, event: &LogEvent) -> Result<Progress, RenderError> {
        match &event.kind {
            // Only appended to, so there is nothing to reset.
            LogKind::Start => tracing::debug!("Build log started"),
            LogKind::Stage => self.open_stage(event),
            LogKind::Substage => {}
            LogKind::Error => self.fail_stage(event),
            LogKind::Done => {
                self.finalize(Outcome::Success);
                tracing::debug!(
                    stages = self.summary.stages,
                    errors = self.summary.errors,
                    "Build log done"
                );
                return Ok(Progress::Finished);
            }
            LogKind::Unknown(kind) => {
                self.abort();
                return Err(RenderError::UnknownKind(kind.clone()));
            }
        }
        Ok(Progress::Continue)
    }

    fn open_stage(&mut self, event: &LogEvent) {
        self.summary.stages += 1;
        let label = event.stage_label();

        if !self.state.interactive {
            self.sink.line(&label);
            return;
        }

        self.finalize(Outcome::Success);
        self.sink.begin_stage(Some(&label));
        self.state.open_stage = Some(OpenStage { label: Some(label) });
    }

    fn fail_stage(&mut self, event: &LogEvent) {
        self.summary.errors += 1;
        let text = format!("\t{}", event.message);

        if !self.state.interactive {
            self.sink.line(&text);
            return;
        }

        self.finalize(Outcome::Failure);
        self.sink.line(&text.red().to_string());
        self.sink.begin_stage(None);
        self.state.open_stage = Some(OpenStage { label: None });
    }

    fn finalize(&mut self, outcome: Outcome) {
        let Some(stage) = self.state.open_stage.take() else {
            return;
        };
        let final_line = stage
            .label
            .map(|label| format!("{} -- {label}", outcome.glyph()));
        self.sink.finish_stage(final_line.as_deref());
    }

    fn abort(&mut self) {
        self.finalize(Outcome::Failure);
    }
}
