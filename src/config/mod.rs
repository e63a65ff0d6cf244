//! Configuration module.

mod settings;
mod store;

pub use settings::*;
pub use store::*;
