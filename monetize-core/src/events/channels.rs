//! Channel names and the payloads they carry.

use monetize_sdk::objects::{LifecycleEvent, LifecycleEventKind};

/// Custom channel notified whenever the active destination is swapped.
pub const POINTER_CHANGED: &str = "pointer_changed";

/// A resolved channel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Lifecycle(LifecycleEventKind),
    Custom(String),
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Lifecycle(kind) => write!(f, "{}", kind.channel_name()),
            Channel::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// What a channel subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPayload {
    /// Raw payload of a host lifecycle event.
    Lifecycle(LifecycleEvent),
    /// Application data passed to `emit`.
    Custom(serde_json::Value),
}

impl ChannelPayload {
    pub fn as_lifecycle(&self) -> Option<&LifecycleEvent> {
        match self {
            ChannelPayload::Lifecycle(event) => Some(event),
            ChannelPayload::Custom(_) => None,
        }
    }

    pub fn as_custom(&self) -> Option<&serde_json::Value> {
        match self {
            ChannelPayload::Lifecycle(_) => None,
            ChannelPayload::Custom(value) => Some(value),
        }
    }
}
