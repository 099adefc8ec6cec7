//! Push + poll reconciliation shared by every synchronizer.
//!
//! A subscription instance runs as one task that owns its push handle, its poll timer and its
//! in-flight fetches. Results are published in completion order into a `watch` channel. Each
//! instance carries a generation number; retiring an instance bumps the generation under the
//! channel's write lock, so a completion belonging to an older instance can never publish.

use crate::data_sync::ledger::PushSubscription;
use crate::error::LedgerError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Shortest poll period a subscription will run with. `interval_at` rejects a zero period.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Published value plus whether a fetch is outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot<V> {
    pub value: V,
    pub loading: bool,
}

impl<V> SyncSnapshot<V> {
    pub fn loading(value: V) -> Self {
        Self { value, loading: true }
    }

    pub fn ready(value: V) -> Self {
        Self { value, loading: false }
    }
}

/// What a push event turns into.
pub(crate) enum PushAction<V> {
    /// The event carried enough to publish directly.
    Publish(V),
    /// The event only signalled a change; fetch again.
    Refetch,
}

/// One reconciled view of the ledger: how to fetch it and how to listen for changes.
#[async_trait]
pub(crate) trait SyncSource: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;
    type Push: Send + 'static;

    /// Human-readable name for logs.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Self::Value, LedgerError>;

    async fn register_push(&self) -> Result<PushSubscription<Self::Push>, LedgerError>;

    fn on_push(&self, event: Self::Push) -> PushAction<Self::Value>;
}

/// Write access to the channel for exactly one subscription instance.
pub(crate) struct Publisher<V> {
    tx: Arc<watch::Sender<SyncSnapshot<V>>>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl<V> Publisher<V> {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Swaps in a whole new value. `false` if this instance has been retired.
    pub(crate) fn publish(&self, value: V) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if !self.is_current() {
                return false;
            }
            snapshot.value = value;
            snapshot.loading = false;
            true
        })
    }

    /// Clears the loading flag and keeps the last good value.
    pub(crate) fn finish_loading(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if !self.is_current() || !snapshot.loading {
                return false;
            }
            snapshot.loading = false;
            true
        })
    }
}

struct ActiveSync {
    task: JoinHandle<()>,
    refresh: Arc<Notify>,
}

/// Owner of a published value and of at most one live subscription instance feeding it.
pub(crate) struct SyncSlot<V> {
    tx: Arc<watch::Sender<SyncSnapshot<V>>>,
    generation: Arc<AtomicU64>,
    active: Option<ActiveSync>,
}

impl<V: Clone + Send + Sync + 'static> SyncSlot<V> {
    pub(crate) fn new(initial: SyncSnapshot<V>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx), generation: Arc::new(AtomicU64::new(0)), active: None }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SyncSnapshot<V>> {
        self.tx.subscribe()
    }

    pub(crate) fn snapshot(&self) -> SyncSnapshot<V> {
        self.tx.borrow().clone()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Tears down the running instance, publishes `initial` and starts a new instance.
    pub(crate) async fn start<S>(&mut self, source: S, poll_interval: Duration, initial: SyncSnapshot<V>)
    where
        S: SyncSource<Value = V>,
    {
        self.retire().await;
        self.tx.send_replace(initial);

        if poll_interval < MIN_POLL_INTERVAL {
            warn!("Poll interval {:?} raised to {:?}", poll_interval, MIN_POLL_INTERVAL);
        }
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

        let publisher = self.publisher();
        let refresh = Arc::new(Notify::new());
        let task = tokio::spawn(run(Arc::new(source), publisher, Arc::clone(&refresh), poll_interval));
        self.active = Some(ActiveSync { task, refresh });
    }

    /// Tears down the running instance and publishes `idle`.
    pub(crate) async fn stop(&mut self, idle: SyncSnapshot<V>) {
        self.retire().await;
        self.tx.send_replace(idle);
    }

    /// Marks the view loading and fetches immediately. No-op when nothing is running.
    pub(crate) fn refresh(&self) {
        if let Some(active) = &self.active {
            self.tx.send_if_modified(|snapshot| !std::mem::replace(&mut snapshot.loading, true));
            active.refresh.notify_one();
        }
    }

    fn publisher(&self) -> Publisher<V> {
        Publisher {
            tx: Arc::clone(&self.tx),
            current: Arc::clone(&self.generation),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    /// Invalidates the current instance, then aborts its task and waits until the task (with
    /// its push handle, timer and fetches) has been dropped.
    async fn retire(&mut self) {
        let generation = &self.generation;
        self.tx.send_if_modified(|_| {
            generation.fetch_add(1, Ordering::SeqCst);
            false
        });

        if let Some(active) = self.active.take() {
            active.task.abort();
            let _ = active.task.await;
        }
    }
}

impl<V> Drop for SyncSlot<V> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

async fn run<S: SyncSource>(
    source: Arc<S>,
    publisher: Publisher<S::Value>,
    refresh: Arc<Notify>,
    poll_interval: Duration,
) {
    let name = source.describe();
    info!("Sync started: {}", name);

    let mut fetches = JoinSet::new();
    spawn_fetch(&mut fetches, &source);

    let mut push = register(source.as_ref(), &name).await;

    let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                match joined {
                    Ok(Ok(value)) => {
                        publisher.publish(value);
                    }
                    Ok(Err(e)) => {
                        warn!("Fetch failed for {}: {}", name, e);
                        publisher.finish_loading();
                    }
                    Err(e) => {
                        warn!("Fetch task for {} did not complete: {}", name, e);
                        publisher.finish_loading();
                    }
                }
            }

            _ = ticker.tick() => {
                debug!("Poll tick for {}", name);
                spawn_fetch(&mut fetches, &source);
                if push.is_none() {
                    push = register(source.as_ref(), &name).await;
                }
            }

            _ = refresh.notified() => {
                debug!("Manual refresh for {}", name);
                spawn_fetch(&mut fetches, &source);
            }

            event = next_push(&mut push) => {
                match event {
                    Some(event) => match source.on_push(event) {
                        PushAction::Publish(value) => {
                            publisher.publish(value);
                        }
                        PushAction::Refetch => spawn_fetch(&mut fetches, &source),
                    },
                    None => {
                        warn!("Push channel closed for {}, falling back to polling", name);
                        push = None;
                    }
                }
            }
        }
    }
}

fn spawn_fetch<S: SyncSource>(fetches: &mut JoinSet<Result<S::Value, LedgerError>>, source: &Arc<S>) {
    let source = Arc::clone(source);
    fetches.spawn(async move { source.fetch().await });
}

async fn register<S: SyncSource>(source: &S, name: &str) -> Option<PushSubscription<S::Push>> {
    match source.register_push().await {
        Ok(subscription) => {
            debug!("Push registered for {}", name);
            Some(subscription)
        }
        Err(e) => {
            warn!("Push registration failed for {}: {}", name, e);
            None
        }
    }
}

async fn next_push<T>(push: &mut Option<PushSubscription<T>>) -> Option<T> {
    match push {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
