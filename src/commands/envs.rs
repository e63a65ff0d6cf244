//! `envs rebuild` and `envs watch-build` commands.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;

use super::CommandError;
use crate::api::EnvironmentsApi;
use crate::display;
use crate::render::{RenderSink, RenderSummary, StageRenderer};

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns true only on an explicit yes.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    async fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Prompt on stderr, answer on stdin. A non-terminal stdin never confirms.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> io::Result<bool> {
        if !io::stdin().is_terminal() {
            tracing::debug!("stdin is not a terminal, not prompting");
            return Ok(false);
        }

        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            ask(&prompt, &mut io::stdin().lock(), &mut io::stderr())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Write `prompt` to `output` and read one answer line from `input`.
fn ask<R, W>(prompt: &str, input: &mut R, output: &mut W) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Options for `envs rebuild`.
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    /// Environment name.
    pub name: String,
    /// Owner of the environment.
    pub user: String,
    /// Render the build log after starting the rebuild.
    pub follow: bool,
    /// Skip the confirmation prompt.
    pub force: bool,
}

/// What `envs rebuild` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The rebuild was started and not followed.
    Started,
    /// The rebuild was followed to completion.
    Followed(RenderSummary),
}

/// Rebuild an environment, optionally following its build log.
///
/// A running environment is only rebuilt after confirmation unless
/// `force` is set.
///
/// # Errors
///
/// Returns an error if the environment cannot be found, the prompt is
/// declined, the rebuild request fails, or rendering fails.
pub async fn rebuild<A, S>(
    api: &A,
    options: &RebuildOptions,
    confirm: &dyn Confirm,
    renderer: &mut StageRenderer<S>,
) -> Result<RebuildOutcome, CommandError>
where
    A: EnvironmentsApi + ?Sized,
    S: RenderSink,
{
    let env = api.find_environment(&options.user, &options.name).await?;

    if !options.force && env.is_on() {
        let prompt = format!(
            "Rebuild environment \"{}\"? (will destroy any work outside of /home)",
            env.name
        );
        if !confirm.confirm(&prompt).await.map_err(CommandError::Prompt)? {
            return Err(CommandError::NotConfirmed);
        }
    }

    api.rebuild_environment(&env.id).await?;

    if options.follow {
        let summary = trail_build_log(api, &env.id, renderer).await?;
        return Ok(RebuildOutcome::Followed(summary));
    }

    display::print_success("successfully started rebuild");
    display::print_tip(&format!(
        "run \"devenv envs watch-build {}\" to follow the build logs",
        env.name
    ));
    Ok(RebuildOutcome::Started)
}

/// Render the build log of a named environment.
///
/// # Errors
///
/// Returns an error if the environment cannot be found or rendering fails.
pub async fn watch_build<A, S>(
    api: &A,
    user: &str,
    name: &str,
    renderer: &mut StageRenderer<S>,
) -> Result<RenderSummary, CommandError>
where
    A: EnvironmentsApi + ?Sized,
    S: RenderSink,
{
    let env = api.find_environment(user, name).await?;
    trail_build_log(api, &env.id, renderer).await
}

/// Follow the build log of an environment to completion.
async fn trail_build_log<A, S>(
    api: &A,
    env_id: &str,
    renderer: &mut StageRenderer<S>,
) -> Result<RenderSummary, CommandError>
where
    A: EnvironmentsApi + ?Sized,
    S: RenderSink,
{
    let events = api.follow_build_log(env_id).await?;
    let summary = renderer.render(events).await?;
    tracing::info!(
        env_id = %env_id,
        stages = summary.stages,
        errors = summary.errors,
        "Build log finished"
    );
    Ok(summary)
}
