//! Remote build log feed: event types and the event stream.

mod events;
mod stream;

pub use events::*;
pub use stream::*;
