//! Channels exposed to application code.
//!
//! # Channel Set
//!
//! - Lifecycle channels `pending`, `start`, `progress`, `stop`, each wired to
//!   the host event of the same kind and yielding its payload.
//! - Custom channels registered by name (by default `pointer_changed`), fed
//!   only by the application through `emit`.

pub mod channels;

pub use channels::{Channel, ChannelPayload, POINTER_CHANGED};
