//! In-memory host boundary and a driver that plays a payment stream on it.

use super::{EventHandler, MonetizationHost, SubscriptionId};
use crate::config::StreamConfig;
use compact_str::CompactString;
use monetize_sdk::objects::{
    Destination, LifecycleEvent, LifecycleEventKind, LifecycleState, PayloadError,
    ProgressDetail, StopDetail, StreamDetail,
};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

struct Subscription {
    id: SubscriptionId,
    kind: LifecycleEventKind,
    handler: EventHandler,
}

/// A host boundary that lives entirely in memory.
///
/// Events are delivered with [`dispatch`](SimulatedHost::dispatch). The
/// lifecycle state follows the last dispatched event, and a payload without
/// a destination is attributed to the currently published one.
pub struct SimulatedHost {
    supported: bool,
    state: RwLock<Option<LifecycleState>>,
    published: RwLock<Option<Destination>>,
    publications: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
    next_subscription: AtomicU64,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self {
            supported: true,
            state: RwLock::new(Some(LifecycleState::Pending)),
            published: RwLock::new(None),
            publications: AtomicU64::new(0),
            subscriptions: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// A host that reports no support but still records everything.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Deliver `event` to every subscriber of its kind, in subscription order.
    pub fn dispatch(&self, event: LifecycleEvent) {
        let kind = event.kind();
        *self.state.write() = Some(kind.resulting_state());

        let event = match self.published.read().as_ref() {
            Some(published) => event.with_default_destination(published),
            None => event,
        };

        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|subscription| subscription.kind == kind)
            .map(|subscription| Arc::clone(&subscription.handler))
            .collect();

        debug!(
            event = kind.host_event_name(),
            destination = %event.destination(),
            handlers = handlers.len(),
            "Dispatching lifecycle event"
        );

        for handler in handlers {
            handler(&event);
        }
    }

    /// Validate a raw `{type, detail}` record and dispatch it.
    pub fn dispatch_json(&self, raw: &str) -> Result<(), PayloadError> {
        let event = LifecycleEvent::from_json(raw)?;
        self.dispatch(event);
        Ok(())
    }

    /// Publish a destination from outside the core, as another script on the page would.
    pub fn publish_externally(&self, destination: &Destination) {
        self.publish_destination(destination);
    }

    /// Remove the current publication.
    ///
    /// Dropping a live publication stops the stream, so a stop event carrying
    /// the removed destination is dispatched.
    pub fn clear_destination(&self) {
        let removed = self.published.write().take();
        if let Some(destination) = removed {
            debug!(%destination, "Publication removed");
            self.dispatch(LifecycleEvent::Stop(StopDetail {
                destination,
                request_id: None,
                finalized: false,
            }));
        }
    }

    pub fn subscriber_count(&self, kind: LifecycleEventKind) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|subscription| subscription.kind == kind)
            .count()
    }

    /// Number of times a destination has been published.
    pub fn publication_count(&self) -> u64 {
        self.publications.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MonetizationHost for SimulatedHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn state(&self) -> Option<LifecycleState> {
        *self.state.read()
    }

    fn subscribe(&self, kind: LifecycleEventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .push(Subscription { id, kind, handler });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    fn detect_current_destination(&self) -> Option<Destination> {
        self.published.read().clone()
    }

    fn publish_destination(&self, destination: &Destination) {
        // At most one publication: the new one replaces the old.
        *self.published.write() = Some(destination.clone());
        self.publications.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// StreamSimulator
// ---------------------------------------------------------------------------

/// Plays a payment stream on a [`SimulatedHost`].
///
/// Emits `pending`, then `start` after a random delay, then `progress` on a
/// fixed interval until the host is stopped or shutdown is signaled.
pub struct StreamSimulator {
    host: Arc<SimulatedHost>,
    config: StreamConfig,
    request_id: String,
}

impl StreamSimulator {
    pub fn new(host: Arc<SimulatedHost>, config: StreamConfig) -> Self {
        Self {
            host,
            config,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run the stream until shutdown is signaled, then emit a stop event.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        self.host.dispatch(self.event(LifecycleEventKind::Pending));

        let start_delay = self.start_delay();
        debug!(delay_ms = start_delay.as_millis() as u64, "Waiting before start");

        let start_at = tokio::time::sleep(start_delay);
        tokio::pin!(start_at);
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        self.stop();
                        return;
                    }
                }

                _ = &mut start_at => {
                    self.host.dispatch(self.event(LifecycleEventKind::Start));
                    info!(request_id = %self.request_id, "Simulated stream started");
                    break;
                }
            }
        }

        let mut ticker = tokio::time::interval(self.config.progress_interval());
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if self.host.state() == Some(LifecycleState::Stopped) {
                        info!(request_id = %self.request_id, "Simulated stream was stopped");
                        return;
                    }
                    self.host.dispatch(self.event(LifecycleEventKind::Progress));
                }
            }
        }

        self.stop();
    }

    /// Emit a stop event.
    pub fn stop(&self) {
        self.host.dispatch(self.event(LifecycleEventKind::Stop));
        info!(request_id = %self.request_id, "Simulated stream stopped");
    }

    fn start_delay(&self) -> std::time::Duration {
        let min = self.config.start_delay_min_ms;
        let max = self.config.start_delay_max_ms.max(min);
        std::time::Duration::from_millis(rand::rng().random_range(min..=max))
    }

    fn event(&self, kind: LifecycleEventKind) -> LifecycleEvent {
        let destination = self.host.detect_current_destination().unwrap_or_default();
        let request_id = Some(self.request_id.clone());
        match kind {
            LifecycleEventKind::Pending => LifecycleEvent::Pending(StreamDetail {
                destination,
                request_id,
            }),
            LifecycleEventKind::Start => LifecycleEvent::Start(StreamDetail {
                destination,
                request_id,
            }),
            LifecycleEventKind::Progress => LifecycleEvent::Progress(ProgressDetail {
                destination,
                request_id,
                amount_delta: self.config.amount_per_progress,
                currency_code: Some(CompactString::from(self.config.currency_code.as_str())),
                currency_scale: Some(self.config.currency_scale),
            }),
            LifecycleEventKind::Stop => LifecycleEvent::Stop(StopDetail {
                destination,
                request_id,
                finalized: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(host: &SimulatedHost, kind: LifecycleEventKind) -> Arc<Mutex<Vec<LifecycleEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        host.subscribe(
            kind,
            Arc::new(move |event: &LifecycleEvent| sink.lock().push(event.clone())),
        );
        seen
    }

    #[test]
    fn test_state_follows_dispatched_events() {
        let host = SimulatedHost::new();
        assert_eq!(host.state(), Some(LifecycleState::Pending));

        host.dispatch(LifecycleEvent::Start(StreamDetail::default()));
        assert_eq!(host.state(), Some(LifecycleState::Started));

        host.dispatch(LifecycleEvent::Stop(StopDetail::default()));
        assert_eq!(host.state(), Some(LifecycleState::Stopped));
    }

    #[test]
    fn test_clearing_publication_stops_stream() {
        let host = SimulatedHost::new();
        let stops = recorder(&host, LifecycleEventKind::Stop);
        host.publish_destination(&Destination::from("$wallet"));
        host.dispatch(LifecycleEvent::Start(StreamDetail::default()));

        host.clear_destination();
        host.clear_destination();

        let stops = stops.lock();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].destination().as_str(), "$wallet");
        assert_eq!(host.state(), Some(LifecycleState::Stopped));
    }

    #[test]
    fn test_publication_replaces_previous() {
        let host = SimulatedHost::new();
        host.publish_destination(&Destination::from("$first"));
        host.publish_destination(&Destination::from("$second"));
        assert_eq!(
            host.detect_current_destination(),
            Some(Destination::from("$second"))
        );
        assert_eq!(host.publication_count(), 2);

        host.clear_destination();
        assert_eq!(host.detect_current_destination(), None);
    }

    #[test]
    fn test_blank_payload_destination_is_filled() {
        let host = SimulatedHost::new();
        let seen = recorder(&host, LifecycleEventKind::Pending);
        host.publish_destination(&Destination::from("$wallet"));

        host.dispatch(LifecycleEvent::Pending(StreamDetail::default()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].destination().as_str(), "$wallet");
    }

    #[test]
    fn test_only_matching_kind_is_delivered_and_unsubscribe_works() {
        let host = SimulatedHost::new();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let id = host.subscribe(
            LifecycleEventKind::Stop,
            Arc::new(move |_: &LifecycleEvent| *sink.lock() += 1),
        );

        host.dispatch(LifecycleEvent::Pending(StreamDetail::default()));
        host.dispatch(LifecycleEvent::Stop(StopDetail::default()));
        assert_eq!(*seen.lock(), 1);

        assert!(host.unsubscribe(id));
        assert!(!host.unsubscribe(id));
        host.dispatch(LifecycleEvent::Stop(StopDetail::default()));
        assert_eq!(*seen.lock(), 1);
        assert_eq!(host.subscriber_count(LifecycleEventKind::Stop), 0);
    }

    #[test]
    fn test_dispatch_json_validates() {
        let host = SimulatedHost::new();
        let seen = recorder(&host, LifecycleEventKind::Progress);
        host.dispatch_json(
            r#"{"type":"monetizationprogress","detail":{"paymentPointer":"$w","amount":"10"}}"#,
        )
        .unwrap();
        assert!(host.dispatch_json(r#"{"type":"monetizationprogress"}"#).is_err());
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_ignores_false_shutdown_before_start() {
        let host = Arc::new(SimulatedHost::new());
        host.publish_destination(&Destination::from("$wallet"));
        let start = recorder(&host, LifecycleEventKind::Start);

        let config = StreamConfig {
            start_delay_min_ms: 500,
            start_delay_max_ms: 500,
            ..Default::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(StreamSimulator::new(Arc::clone(&host), config).run(shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        shutdown_tx.send(false).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(start.lock().len(), 1);
        assert_eq!(host.state(), Some(LifecycleState::Started));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(host.state(), Some(LifecycleState::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulator_plays_pending_start_progress_stop() {
        let host = Arc::new(SimulatedHost::new());
        host.publish_destination(&Destination::from("$wallet.example.com/alice"));
        let pending = recorder(&host, LifecycleEventKind::Pending);
        let start = recorder(&host, LifecycleEventKind::Start);
        let progress = recorder(&host, LifecycleEventKind::Progress);
        let stop = recorder(&host, LifecycleEventKind::Stop);

        let config = StreamConfig {
            start_delay_min_ms: 100,
            start_delay_max_ms: 100,
            progress_interval_ms: 1000,
            ..Default::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let simulator = StreamSimulator::new(Arc::clone(&host), config);
        let task = tokio::spawn(simulator.run(shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_millis(2_500)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(pending.lock().len(), 1);
        assert_eq!(start.lock().len(), 1);
        // Progress fires at 100ms, 1100ms and 2100ms.
        assert_eq!(progress.lock().len(), 3);
        assert_eq!(stop.lock().len(), 1);
        assert_eq!(host.state(), Some(LifecycleState::Stopped));

        let progress = progress.lock();
        let LifecycleEvent::Progress(detail) = &progress[0] else {
            panic!("expected a progress event");
        };
        assert_eq!(detail.amount_delta, 5421);
        assert_eq!(detail.destination.as_str(), "$wallet.example.com/alice");
    }
}
