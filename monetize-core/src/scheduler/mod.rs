//! DestinationScheduler: decides which destination is published on the host.
//!
//! The scheduler is responsible for:
//! - Publishing a destination and resolving an [`Activation`] once the host
//!   reports that the stream started
//! - Cycling through destinations on a timer, either in order or by weight
//! - One-shot picks and mid-stream swaps that keep the accumulated ledger
//! - Tearing everything down into a fresh router and ledger
//!
//! All state lives behind an `Arc`, so the scheduler is a cheap handle that
//! can be cloned into timer tasks and host callbacks. Timer tasks only hold a
//! weak reference and stop once the last handle is dropped.

mod activation;
pub mod selection;

pub use activation::Activation;
pub use selection::{Candidates, SequentialCursor, WeightMap};

use crate::config::SchedulerConfig;
use crate::error::MonetizeError;
use crate::events::{ChannelPayload, POINTER_CHANGED};
use crate::host::{MonetizationHost, SubscriptionId};
use crate::ledger::{Ledger, SharedLedger};
use crate::router::{ChannelRouter, ChannelSignal};
use monetize_sdk::objects::{Destination, LifecycleEvent, LifecycleEventKind, LifecycleState};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Overrides the cursor-based pick of a sequential cycle for one tick.
pub type Picker = Arc<dyn Fn(&[Destination]) -> Option<Destination> + Send + Sync>;

/// Publishes destinations on the host according to a selection policy.
#[derive(Clone)]
pub struct DestinationScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    host: RwLock<Arc<dyn MonetizationHost>>,
    /// The destination this scheduler published last.
    active: RwLock<Option<Destination>>,
    router: RwLock<Arc<ChannelRouter>>,
    ledger: RwLock<SharedLedger>,
    /// The most recently started cycle timer.
    timer: Mutex<Option<JoinHandle<()>>>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl DestinationScheduler {
    /// Create a scheduler. Selection is seeded from `config.rng_seed` when set.
    pub fn new(host: Arc<dyn MonetizationHost>, config: SchedulerConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(host, config, rng)
    }

    /// Create a scheduler drawing from the given random source.
    pub fn with_rng<R>(host: Arc<dyn MonetizationHost>, config: SchedulerConfig, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        let router = Arc::new(ChannelRouter::new(
            Arc::clone(&host),
            config.custom_channels.iter().cloned(),
        ));
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                host: RwLock::new(host),
                active: RwLock::new(None),
                router: RwLock::new(router),
                ledger: RwLock::new(Ledger::shared()),
                timer: Mutex::new(None),
                rng: Mutex::new(Box::new(rng)),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn host(&self) -> Arc<dyn MonetizationHost> {
        Arc::clone(&self.inner.host.read())
    }

    pub fn router(&self) -> Arc<ChannelRouter> {
        Arc::clone(&self.inner.router.read())
    }

    pub fn ledger(&self) -> SharedLedger {
        Arc::clone(&self.inner.ledger.read())
    }

    // -- Activation ---------------------------------------------------------

    /// Publish `destination` and wait for the host to start streaming.
    ///
    /// Without a destination, the one already published on the host is used.
    /// Fails right away with [`MonetizeError::NotSupported`] when the host
    /// cannot stream, then with [`MonetizeError::MissingDestination`] when
    /// there is nothing to publish.
    pub fn activate(&self, destination: Option<Destination>) -> Activation {
        let host = self.host();
        if !host.is_supported() {
            warn!("Activation requested but the host does not support monetization");
            return Activation::failed(MonetizeError::NotSupported);
        }

        let destination = destination
            .filter(|destination| !destination.is_empty())
            .or_else(|| host.detect_current_destination());
        match destination {
            Some(destination) => self.publish_and_wait(host, destination),
            None => {
                warn!("Activation requested without a destination");
                Activation::failed(MonetizeError::MissingDestination)
            }
        }
    }

    /// Activate a destination chosen by a selection policy.
    ///
    /// Unlike [`activate`](Self::activate), an empty pick never falls back to
    /// the destination published on the host.
    fn activate_pick(&self, pick: Option<Destination>) -> Activation {
        let host = self.host();
        if !host.is_supported() {
            warn!("Activation requested but the host does not support monetization");
            return Activation::failed(MonetizeError::NotSupported);
        }
        match pick {
            Some(destination) => self.publish_and_wait(host, destination),
            None => {
                warn!("Selection produced no destination");
                Activation::failed(MonetizeError::MissingDestination)
            }
        }
    }

    fn publish_and_wait(
        &self,
        host: Arc<dyn MonetizationHost>,
        destination: Destination,
    ) -> Activation {
        self.publish(host.as_ref(), &destination);

        let (started_tx, started_rx) = oneshot::channel();
        let started_tx = Mutex::new(Some(started_tx));
        let router = self.router();
        let ledger = self.ledger();
        // Filled once the host hands out the id; the handler removes itself after firing.
        let subscription: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let own_subscription = Arc::clone(&subscription);
        let weak_host: Weak<dyn MonetizationHost> = Arc::downgrade(&host);
        let id = host.subscribe(
            LifecycleEventKind::Start,
            Arc::new(move |event: &LifecycleEvent| {
                let Some(started_tx) = started_tx.lock().take() else {
                    return;
                };
                router.bind(event.clone(), Arc::clone(&ledger));
                if started_tx.send(Arc::clone(&router)).is_err() {
                    debug!("Activation was dropped before the stream started");
                }
                let id = own_subscription.lock().take();
                if let (Some(host), Some(id)) = (weak_host.upgrade(), id) {
                    host.unsubscribe(id);
                }
            }),
        );
        *subscription.lock() = Some(id);

        info!(%destination, "Waiting for stream to start");
        Activation::waiting(started_rx)
    }

    fn publish(&self, host: &dyn MonetizationHost, destination: &Destination) {
        *self.inner.active.write() = Some(destination.clone());
        host.publish_destination(destination);
        debug!(%destination, "Published destination");
    }

    // -- Selection ----------------------------------------------------------

    /// Publish `destination` right away, keeping the current ledger.
    ///
    /// Subscribers of the `pointer_changed` channel receive the new destination.
    pub fn select(&self, destination: Destination) -> &Self {
        let host = self.host();
        self.publish(host.as_ref(), &destination);
        self.router().emit(
            POINTER_CHANGED,
            serde_json::Value::String(destination.to_string()),
        );
        self
    }

    /// Activate the first destination now, then move to the next one every `interval`.
    ///
    /// When `picker` returns a non-empty destination, it replaces the cursor's
    /// pick for that tick; the cursor advances regardless.
    pub fn cycle_sequential(
        &self,
        destinations: Vec<Destination>,
        interval: Duration,
        picker: Option<Picker>,
    ) -> Activation {
        self.cancel_timer();

        let mut cursor = SequentialCursor::new(destinations);
        let activation = self.activate_pick(cursor.current().cloned());
        if activation.immediate_error().is_some() {
            return activation;
        }

        self.spawn_timer(interval, move |scheduler| {
            let next = cursor.advance().cloned();
            let picked = picker
                .as_ref()
                .and_then(|picker| picker(cursor.destinations()))
                .filter(|destination| !destination.is_empty())
                .or(next);
            if let Some(destination) = picked {
                debug!(%destination, "Sequential cycle tick");
                scheduler.select(destination);
            }
        });
        activation
    }

    /// Activate a weighted pick now, then draw again every `interval`.
    pub fn cycle_weighted(&self, weights: WeightMap, interval: Duration) -> Activation {
        self.cancel_timer();

        let activation = self.activate_pick(self.draw_weighted(&weights));
        if activation.immediate_error().is_some() {
            return activation;
        }

        self.spawn_timer(interval, move |scheduler| {
            if let Some(destination) = scheduler.draw_weighted(&weights) {
                debug!(%destination, "Weighted cycle tick");
                scheduler.select(destination);
            }
        });
        activation
    }

    /// Activate one destination picked from `candidates`, without a timer.
    pub fn pluck(&self, candidates: impl Into<Candidates>) -> Activation {
        let pick = match candidates.into() {
            Candidates::Sequence(destinations) => {
                let mut rng = self.inner.rng.lock();
                selection::draw_uniform(&destinations, &mut *rng).cloned()
            }
            Candidates::Weighted(weights) => self.draw_weighted(&weights),
        };
        self.activate_pick(pick)
    }

    fn draw_weighted(&self, weights: &WeightMap) -> Option<Destination> {
        let mut rng = self.inner.rng.lock();
        selection::draw_weighted(weights, &mut *rng).cloned()
    }

    // -- Timer --------------------------------------------------------------

    fn spawn_timer<F>(&self, interval: Duration, mut tick: F)
    where
        F: FnMut(&DestinationScheduler) + Send + 'static,
    {
        let period = interval.max(self.inner.config.min_interval());
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No Tokio runtime available, cycling is disabled");
            return;
        };

        let weak: Weak<SchedulerInner> = Arc::downgrade(&self.inner);
        let timer = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Scheduler dropped, stopping cycle timer");
                    break;
                };
                tick(&DestinationScheduler { inner });
            }
        });

        if let Some(previous) = self.inner.timer.lock().replace(timer) {
            previous.abort();
        }
        debug!(?period, "Started cycle timer");
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
            debug!("Cancelled cycle timer");
        }
    }

    // -- Teardown -----------------------------------------------------------

    /// Cancel the cycle timer and start over with a fresh router and ledger.
    ///
    /// Host subscriptions made so far stay attached to the host.
    pub fn teardown(&self) -> &Self {
        self.cancel_timer();
        let host = self.host();
        *self.inner.router.write() = Arc::new(ChannelRouter::new(
            host,
            self.inner.config.custom_channels.iter().cloned(),
        ));
        *self.inner.ledger.write() = Ledger::shared();
        *self.inner.active.write() = None;
        info!("Scheduler state reset");
        self
    }

    /// Swap the host boundary and reset all state.
    pub fn replace_host(&self, host: Arc<dyn MonetizationHost>) -> &Self {
        *self.inner.host.write() = host;
        self.teardown()
    }

    // -- Queries ------------------------------------------------------------

    /// The active destination.
    ///
    /// A destination published on the host by someone else is adopted.
    pub fn active_destination(&self) -> Option<Destination> {
        let host = self.host();
        if host.is_supported() {
            if let Some(detected) = host.detect_current_destination() {
                let mut active = self.inner.active.write();
                if active.as_ref() != Some(&detected) {
                    debug!(destination = %detected, "Adopting destination published on the host");
                    *active = Some(detected.clone());
                }
                return Some(detected);
            }
        }
        self.inner.active.read().clone()
    }

    pub fn is_supported(&self) -> bool {
        self.host().is_supported()
    }

    pub fn is_sending(&self) -> bool {
        self.host_state() == Some(LifecycleState::Started)
    }

    pub fn is_stopped(&self) -> bool {
        self.host_state() == Some(LifecycleState::Stopped)
    }

    pub fn is_pending(&self) -> bool {
        self.host_state() == Some(LifecycleState::Pending)
    }

    fn host_state(&self) -> Option<LifecycleState> {
        let host = self.host();
        if host.is_supported() {
            host.state()
        } else {
            None
        }
    }

    // -- Channels -----------------------------------------------------------

    /// Subscribe to a channel on the current router.
    pub fn on(&self, channel: &str) -> ChannelSignal {
        self.router().on(channel)
    }

    /// Emit on a custom channel of the current router.
    pub fn emit(&self, channel: &str, payload: serde_json::Value) {
        self.router().emit(channel, payload);
    }
}

/// Extract the destination carried by a `pointer_changed` payload.
pub fn changed_destination(payload: &ChannelPayload) -> Option<Destination> {
    payload
        .as_custom()
        .and_then(serde_json::Value::as_str)
        .map(Destination::from)
}
