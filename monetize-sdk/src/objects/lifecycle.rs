//! Lifecycle events delivered by the payment-stream host.
//!
//! The host emits four events for the whole duration of a stream. Their
//! payloads arrive as `{ "type": "...", "detail": { ... } }` records and are
//! validated here before anything inside the core sees them.

use super::{Destination, PayloadError};
use compact_str::CompactString;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Largest currency scale that can still be represented as a fixed-point amount.
pub const MAX_CURRENCY_SCALE: u32 = 28;

/// The fixed set of host lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEventKind {
    Pending,
    Start,
    Progress,
    Stop,
}

impl LifecycleEventKind {
    pub const ALL: [LifecycleEventKind; 4] = [
        LifecycleEventKind::Pending,
        LifecycleEventKind::Start,
        LifecycleEventKind::Progress,
        LifecycleEventKind::Stop,
    ];

    /// Name of the channel application code subscribes to.
    pub fn channel_name(self) -> &'static str {
        match self {
            LifecycleEventKind::Pending => "pending",
            LifecycleEventKind::Start => "start",
            LifecycleEventKind::Progress => "progress",
            LifecycleEventKind::Stop => "stop",
        }
    }

    /// Name of the event on the host side.
    pub fn host_event_name(self) -> &'static str {
        match self {
            LifecycleEventKind::Pending => "monetizationpending",
            LifecycleEventKind::Start => "monetizationstart",
            LifecycleEventKind::Progress => "monetizationprogress",
            LifecycleEventKind::Stop => "monetizationstop",
        }
    }

    pub fn from_channel_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.channel_name() == name)
    }

    pub fn from_host_event_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.host_event_name() == name)
    }

    /// The host state observed right after this event fired.
    pub fn resulting_state(self) -> LifecycleState {
        match self {
            LifecycleEventKind::Pending => LifecycleState::Pending,
            LifecycleEventKind::Start | LifecycleEventKind::Progress => LifecycleState::Started,
            LifecycleEventKind::Stop => LifecycleState::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.channel_name())
    }
}

/// Current state of the host stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Pending,
    Started,
    Stopped,
}

/// Payload shared by the pending and start events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDetail {
    #[serde(rename = "paymentPointer", default)]
    pub destination: Destination,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Payload of a progress event: one incremental payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    #[serde(rename = "paymentPointer", default)]
    pub destination: Destination,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Received amount in minor units of the currency.
    #[serde(rename = "amount", deserialize_with = "deserialize_amount")]
    pub amount_delta: u64,
    #[serde(rename = "assetCode", default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<CompactString>,
    #[serde(rename = "assetScale", default, skip_serializing_if = "Option::is_none")]
    pub currency_scale: Option<u32>,
}

/// Payload of a stop event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDetail {
    #[serde(rename = "paymentPointer", default)]
    pub destination: Destination,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub finalized: bool,
}

/// A validated lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum LifecycleEvent {
    #[serde(rename = "monetizationpending")]
    Pending(StreamDetail),
    #[serde(rename = "monetizationstart")]
    Start(StreamDetail),
    #[serde(rename = "monetizationprogress")]
    Progress(ProgressDetail),
    #[serde(rename = "monetizationstop")]
    Stop(StopDetail),
}

impl LifecycleEvent {
    /// Parse and validate a raw host record.
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        let event: LifecycleEvent = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if let LifecycleEvent::Progress(detail) = self {
            if let Some(scale) = detail.currency_scale {
                if scale > MAX_CURRENCY_SCALE {
                    return Err(PayloadError::ScaleOutOfRange(scale));
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> LifecycleEventKind {
        match self {
            LifecycleEvent::Pending(_) => LifecycleEventKind::Pending,
            LifecycleEvent::Start(_) => LifecycleEventKind::Start,
            LifecycleEvent::Progress(_) => LifecycleEventKind::Progress,
            LifecycleEvent::Stop(_) => LifecycleEventKind::Stop,
        }
    }

    pub fn destination(&self) -> &Destination {
        match self {
            LifecycleEvent::Pending(detail) | LifecycleEvent::Start(detail) => &detail.destination,
            LifecycleEvent::Progress(detail) => &detail.destination,
            LifecycleEvent::Stop(detail) => &detail.destination,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            LifecycleEvent::Pending(detail) | LifecycleEvent::Start(detail) => {
                detail.request_id.as_deref()
            }
            LifecycleEvent::Progress(detail) => detail.request_id.as_deref(),
            LifecycleEvent::Stop(detail) => detail.request_id.as_deref(),
        }
    }

    /// Fill in the destination when the host left it blank.
    pub fn with_default_destination(mut self, destination: &Destination) -> Self {
        let slot = match &mut self {
            LifecycleEvent::Pending(detail) | LifecycleEvent::Start(detail) => {
                &mut detail.destination
            }
            LifecycleEvent::Progress(detail) => &mut detail.destination,
            LifecycleEvent::Stop(detail) => &mut detail.destination,
        };
        if slot.is_empty() {
            *slot = destination.clone();
        }
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(u64),
    Text(String),
}

/// Amounts arrive either as integers or as numeric strings.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawAmount::deserialize(deserializer) {
        Ok(RawAmount::Number(value)) => Ok(value),
        Ok(RawAmount::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| D::Error::custom(format!("invalid amount {text:?}: {e}"))),
        Err(_) => Err(D::Error::custom(
            "amount must be a non-negative integer or numeric string",
        )),
    }
}
