//! ChannelRouter: turns host lifecycle events into named channels.
//!
//! The router is responsible for:
//! - Handing out a [`RepeatableSignal`] per channel subscription
//! - Relaying host lifecycle events to lifecycle channels
//! - Fanning application payloads out to every subscriber of a custom channel
//! - Feeding progress events into the [`Ledger`](crate::ledger::Ledger) once bound

use crate::error::MonetizeError;
use crate::events::{Channel, ChannelPayload};
use crate::host::{EventHandler, MonetizationHost, SubscriptionId};
use crate::ledger::SharedLedger;
use crate::signal::RepeatableSignal;
use indexmap::IndexMap;
use monetize_sdk::objects::{LifecycleEvent, LifecycleEventKind};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signal returned for a channel subscription.
pub type ChannelSignal = RepeatableSignal<ChannelPayload, MonetizeError>;

type Listener = Arc<dyn Fn(ChannelPayload) + Send + Sync>;

/// Maps lifecycle events and custom channels to subscriber signals.
pub struct ChannelRouter {
    host: Arc<dyn MonetizationHost>,
    /// The start event of the activation this router is bound to.
    start_event: RwLock<Option<LifecycleEvent>>,
    ledger: RwLock<Option<SharedLedger>>,
    progress_subscription: Mutex<Option<SubscriptionId>>,
    /// Registered custom channels and their listeners, in registration order.
    custom: RwLock<IndexMap<String, Vec<Listener>>>,
}

impl ChannelRouter {
    pub fn new<I, S>(host: Arc<dyn MonetizationHost>, custom_channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let custom = custom_channels
            .into_iter()
            .map(|name| (name.into(), Vec::new()))
            .collect();
        Self {
            host,
            start_event: RwLock::new(None),
            ledger: RwLock::new(None),
            progress_subscription: Mutex::new(None),
            custom: RwLock::new(custom),
        }
    }

    /// Register a custom channel. Returns `false` if it already existed.
    pub fn register_channel(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut custom = self.custom.write();
        if custom.contains_key(&name) {
            return false;
        }
        debug!(channel = %name, "Registered custom channel");
        custom.insert(name, Vec::new());
        true
    }

    pub fn is_custom_channel(&self, name: &str) -> bool {
        self.custom.read().contains_key(name)
    }

    /// Resolve a channel name; custom channels shadow lifecycle names.
    pub fn resolve(&self, name: &str) -> Option<Channel> {
        if self.is_custom_channel(name) {
            return Some(Channel::Custom(name.to_string()));
        }
        LifecycleEventKind::from_channel_name(name).map(Channel::Lifecycle)
    }

    /// Attach the router to an activation.
    ///
    /// Stores the start event and routes every progress event into `ledger`.
    /// Binding again replaces the previous progress subscription.
    pub fn bind(&self, start_event: LifecycleEvent, ledger: SharedLedger) -> &Self {
        info!(
            destination = %start_event.destination(),
            request_id = ?start_event.request_id(),
            "Binding router to stream"
        );

        let progress_ledger = Arc::clone(&ledger);
        let handler: EventHandler = Arc::new(move |event: &LifecycleEvent| {
            if let LifecycleEvent::Progress(detail) = event {
                progress_ledger.write().record_payment(
                    &detail.destination,
                    detail.amount_delta,
                    detail.currency_code.as_deref(),
                    detail.currency_scale,
                );
            }
        });
        let id = self.host.subscribe(LifecycleEventKind::Progress, handler);

        if let Some(previous) = self.progress_subscription.lock().replace(id) {
            self.host.unsubscribe(previous);
        }
        *self.start_event.write() = Some(start_event);
        *self.ledger.write() = Some(ledger);
        self
    }

    pub fn start_event(&self) -> Option<LifecycleEvent> {
        self.start_event.read().clone()
    }

    /// The ledger this router feeds, once bound.
    pub fn ledger(&self) -> Option<SharedLedger> {
        self.ledger.read().clone()
    }

    /// Subscribe to a channel.
    ///
    /// The signal succeeds every time the channel fires. An unknown channel
    /// yields a signal that has already failed with
    /// [`MonetizeError::UnsupportedChannel`].
    pub fn on(&self, name: &str) -> ChannelSignal {
        match self.resolve(name) {
            Some(Channel::Custom(name)) => RepeatableSignal::new(|settler| {
                let listener: Listener = Arc::new(move |payload| settler.succeed(payload));
                if let Some(listeners) = self.custom.write().get_mut(&name) {
                    listeners.push(listener);
                }
                false
            }),
            Some(Channel::Lifecycle(kind)) => RepeatableSignal::new(|settler| {
                self.host.subscribe(
                    kind,
                    Arc::new(move |event: &LifecycleEvent| {
                        settler.succeed(ChannelPayload::Lifecycle(event.clone()));
                    }),
                );
                false
            }),
            None => {
                warn!(channel = name, "Requested unsupported channel");
                RepeatableSignal::failed(MonetizeError::UnsupportedChannel(name.to_string()))
            }
        }
    }

    /// Deliver `payload` to every subscriber of a custom channel, in registration order.
    pub fn emit(&self, name: &str, payload: serde_json::Value) {
        let listeners: Vec<Listener> = match self.custom.read().get(name) {
            Some(listeners) => listeners.iter().map(Arc::clone).collect(),
            None => return,
        };
        debug!(channel = name, subscribers = listeners.len(), "Emitting custom event");
        for listener in listeners {
            listener(ChannelPayload::Custom(payload.clone()));
        }
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.custom.read().get(name).map_or(0, Vec::len)
    }
}
