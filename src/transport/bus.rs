//! Tenant-scoped publish/subscribe over periodic polling.
//!
//! The poll loop fetches every load visible to the viewer and publishes a
//! `location_update` whenever a load's signature (last update + revision)
//! differs from the one seen on the previous poll.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::TripApi;
use crate::error::AppError;
use crate::models::event::{EventOrigin, LocationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEvent {
    LocationUpdate,
}

impl BusEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusEvent::LocationUpdate => "location_update",
        }
    }
}

pub type Handler = Arc<dyn Fn(&LocationEvent) + Send + Sync>;

pub struct LocationBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    feed: Arc<dyn TripApi>,
    period: Duration,
    subscribers: DashMap<BusEvent, Vec<Handler>>,
    signatures: DashMap<Uuid, String>,
    channel: Mutex<Option<Uuid>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl LocationBus {
    pub fn new(feed: Arc<dyn TripApi>, period: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                feed,
                period,
                subscribers: DashMap::new(),
                signatures: DashMap::new(),
                channel: Mutex::new(None),
                poller: Mutex::new(None),
            }),
        }
    }

    /// Starts polling for `scope_id`'s channel. Calling it again while connected is a no-op.
    pub fn connect(&self, scope_id: Uuid) {
        let mut poller = lock(&self.inner.poller);
        *lock(&self.inner.channel) = Some(scope_id);

        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *poller = Some(tokio::spawn(inner.run()));
        info!(channel = %format!("tenant:{scope_id}"), "transport connected");
    }

    /// Stops polling and forgets every subscription and cached signature.
    pub fn disconnect(&self) {
        if let Some(handle) = lock(&self.inner.poller).take() {
            handle.abort();
        }
        self.inner.subscribers.clear();
        self.inner.signatures.clear();
        if lock(&self.inner.channel).take().is_some() {
            info!("transport disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner.poller)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn channel(&self) -> Option<Uuid> {
        *lock(&self.inner.channel)
    }

    pub fn subscribe(&self, event: BusEvent, handler: Handler) {
        self.inner.subscribers.entry(event).or_default().push(handler);
    }

    /// Removes `handler` by identity; other handlers for the event stay registered.
    pub fn unsubscribe(&self, event: BusEvent, handler: &Handler) {
        if let Some(mut handlers) = self.inner.subscribers.get_mut(&event) {
            handlers.retain(|existing| !Arc::ptr_eq(existing, handler));
        }
    }

    pub fn subscriber_count(&self, event: BusEvent) -> usize {
        self.inner
            .subscribers
            .get(&event)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Notifies local subscribers straight away. Durable writes go through the trip API.
    pub fn emit(&self, event: BusEvent, payload: &LocationEvent) {
        debug!(event = event.as_str(), load_id = %payload.load_id, "transport emit");
        self.inner.notify(event, payload);
    }

    /// Runs one diff pass and returns how many updates were published.
    pub async fn poll_once(&self) -> Result<usize, AppError> {
        self.inner.poll_once().await
    }
}

impl Drop for LocationBus {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.inner.poller).take() {
            handle.abort();
        }
    }
}

impl BusInner {
    async fn run(self: Arc<Self>) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(0) => {}
                Ok(published) => debug!(published, "transport poll published updates"),
                Err(err) => warn!(error = %err, "transport poll failed"),
            }
        }
    }

    async fn poll_once(&self) -> Result<usize, AppError> {
        let listening = self
            .subscribers
            .get(&BusEvent::LocationUpdate)
            .is_some_and(|handlers| !handlers.is_empty());
        if !listening {
            return Ok(0);
        }

        let loads = self.feed.list_loads().await?;
        let mut published = 0;

        for load in &loads {
            let signature = load.signature();
            let previous = self.signatures.insert(load.id, signature.clone());
            if previous.as_deref() == Some(signature.as_str()) {
                continue;
            }

            self.notify(
                BusEvent::LocationUpdate,
                &LocationEvent::from_load(load, EventOrigin::Poll),
            );
            published += 1;
        }

        Ok(published)
    }

    fn notify(&self, event: BusEvent, payload: &LocationEvent) {
        let handlers: Vec<Handler> = match self.subscribers.get(&event) {
            Some(handlers) => handlers.clone(),
            None => return,
        };

        for handler in handlers {
            handler(payload);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
