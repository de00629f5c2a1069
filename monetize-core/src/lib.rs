#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod ledger;
pub mod router;
pub mod scheduler;
pub mod signal;

pub use error::MonetizeError;
pub use ledger::{GrandTotal, Ledger, LedgerEntry, SharedLedger};
pub use router::ChannelRouter;
pub use scheduler::{Activation, DestinationScheduler};
pub use signal::{RepeatableSignal, Settler, SignalState};
