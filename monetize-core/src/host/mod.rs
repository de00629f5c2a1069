//! The host boundary: the payment-stream API the core observes.
//!
//! The core never touches host globals directly. Everything goes through
//! [`MonetizationHost`], so a [`SimulatedHost`] can stand in for the real
//! boundary in tests and in the simulator binary, and a [`DisabledHost`]
//! models a host without payment streaming.

mod simulated;

pub use simulated::{SimulatedHost, StreamSimulator};

use monetize_sdk::objects::{Destination, LifecycleEvent, LifecycleEventKind, LifecycleState};
use std::sync::Arc;

/// Handler invoked for every lifecycle event of the subscribed kind.
pub type EventHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Identifies one host subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Capabilities the core needs from the payment-stream host.
pub trait MonetizationHost: Send + Sync {
    /// Whether the host supports payment streaming at all.
    fn is_supported(&self) -> bool;

    /// Current lifecycle state, if the host has reported one.
    fn state(&self) -> Option<LifecycleState>;

    fn subscribe(&self, kind: LifecycleEventKind, handler: EventHandler) -> SubscriptionId;

    /// Returns `false` when the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// The destination currently published on the host, whoever published it.
    fn detect_current_destination(&self) -> Option<Destination>;

    /// Replace any previous publication with `destination`.
    fn publish_destination(&self, destination: &Destination);
}

/// Host stand-in without payment streaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledHost;

impl MonetizationHost for DisabledHost {
    fn is_supported(&self) -> bool {
        false
    }

    fn state(&self) -> Option<LifecycleState> {
        None
    }

    fn subscribe(&self, _kind: LifecycleEventKind, _handler: EventHandler) -> SubscriptionId {
        SubscriptionId::new(0)
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }

    fn detect_current_destination(&self) -> Option<Destination> {
        None
    }

    fn publish_destination(&self, _destination: &Destination) {}
}
