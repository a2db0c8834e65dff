//! Core shared types for the page bridge.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod message;
mod origin;

/// Error type and result alias shared across the bridge crates.
pub use error::{Error, Result};
/// Correlation identifiers and child addressing.
pub use ids::{ChildIndex, RequestId, RequestIdGenerator};
/// Messages exchanged over the shared channel and the targets receiving them.
pub use message::{ChannelError, ChannelMessage, ChannelResult, MessageTarget};
/// Target origin used when posting a message to another context.
pub use origin::TargetOrigin;
