//! Terminal rendering of build logs.

mod renderer;
mod sink;
mod spinner;

pub use renderer::{
    Progress, RenderError, RenderState, RenderSummary, StageRenderer, CHECK, FAILURE,
};
pub use sink::{Console, RenderSink};
pub use spinner::{Spinner, FRAMES, TICK};
