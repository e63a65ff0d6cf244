//! Lazy stream of build log events over a newline-delimited JSON body.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::io::StreamReader;

use super::LogEvent;

/// Error type for build log streams.
#[derive(thiserror::Error, Debug)]
pub enum BuildLogError {
    /// Reading the feed failed.
    #[error("Build log transport error: {0}")]
    Transport(#[from] std::io::Error),
    /// A line was not a build log event.
    #[error("Failed to decode build log event {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    /// The feed ended without a done event.
    #[error("Build log closed before the build finished")]
    ClosedBeforeDone,
}

/// Parse a single line of the feed.
///
/// # Errors
///
/// Returns `BuildLogError::Decode` if the line is not a build log event.
pub fn parse_event(line: &str) -> Result<LogEvent, BuildLogError> {
    serde_json::from_str(line).map_err(|source| BuildLogError::Decode {
        line: line.to_string(),
        source,
    })
}

/// Ordered build log events of one build.
///
/// The stream ends right after the done event. Any error is the last
/// item: a decode failure, a transport failure, or the body ending before
/// done. It cannot be restarted; open a new one to retry.
pub struct BuildLogStream {
    inner: Pin<Box<dyn Stream<Item = Result<LogEvent, BuildLogError>> + Send>>,
}

impl BuildLogStream {
    /// Read events from any byte source.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let lines = BufReader::new(reader).lines();

        let inner = futures_util::stream::unfold(Some(lines), |state| async move {
            let mut lines = state?;
            loop {
                let next = match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => parse_event(&line),
                    Ok(None) => Err(BuildLogError::ClosedBeforeDone),
                    Err(e) => Err(BuildLogError::Transport(e)),
                };

                let more = matches!(&next, Ok(event) if !event.kind.is_terminal());
                return Some((next, more.then_some(lines)));
            }
        });

        Self {
            inner: Box::pin(inner),
        }
    }

    /// Read events from a streaming HTTP response body.
    #[must_use]
    pub fn from_response(response: reqwest::Response) -> Self {
        let body = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        Self::from_reader(StreamReader::new(body))
    }
}

impl Stream for BuildLogStream {
    type Item = Result<LogEvent, BuildLogError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for BuildLogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLogStream").finish_non_exhaustive()
    }
}
