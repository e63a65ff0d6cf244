//! Command implementations behind the CLI.

mod envs;
mod error;
mod login;

pub use envs::*;
pub use error::CommandError;
pub use login::*;
