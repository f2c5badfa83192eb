//! Campaign execution engine.
//!
//! Given the campaigns due at a point in time, resolves each audience, splits
//! it across the campaign's email variants by ratio, sends provider-sized
//! batches and tracks progress through a single serialized status writer.

pub mod audience;
pub mod batcher;
pub mod content;
pub mod dispatcher;
pub mod partition;
pub mod progress;
pub mod status;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_support;

pub use audience::AudiencePager;
pub use batcher::{BatchOutcome, DispatchBatcher};
pub use content::ContentResolver;
pub use dispatcher::{DispatchServices, Dispatcher};
pub use partition::partition;
pub use progress::ProgressEmitter;
pub use status::{StatusActor, StatusHandle};
