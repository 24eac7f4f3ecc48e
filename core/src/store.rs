//! Local item state kept in step with the to-do service.
//!
//! # Design
//! `ItemStore` owns the `{items, filter}` pair and is the only code that
//! mutates it. Every operation follows the same shape:
//!
//! 1. validate against local state (no request for unknown ids or empty text)
//! 2. send the request through the `Transport` (the only suspension point)
//! 3. on a confirmed response, commit the mutation and notify listeners;
//!    on any error, leave state untouched and return the error
//!
//! Nothing is applied optimistically. Operations targeting the same id are
//! queued behind a FIFO async lock, so a toggle always negates the value the
//! previous toggle committed. Refreshes carry a ticket; a listing that comes
//! back after a newer one has been applied is dropped.
//!
//! Snapshots are queued for listeners while the state lock is held, and a
//! single caller at a time drains that queue, so listeners see commits in
//! the order they happened even when commits race on several threads.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::client::TodoClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Filter, Item, ItemId, Snapshot};

/// Callback invoked with the new snapshot after every commit.
pub type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Handle returned by `ItemStore::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A user request forwarded from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add(String),
    Remove(ItemId),
    Toggle(ItemId),
    SetFilter(Filter),
}

struct State {
    snapshot: Snapshot,
    /// Ticket of the last refresh whose listing was applied.
    applied_refresh: u64,
}

/// Committed snapshots not yet handed to listeners.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Snapshot>,
    draining: bool,
}

type IdLocks = Mutex<HashMap<ItemId, Arc<AsyncMutex<()>>>>;

pub struct ItemStore<T> {
    client: TodoClient,
    transport: T,
    state: Mutex<State>,
    id_locks: IdLocks,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    outbox: Mutex<Outbox>,
    next_subscription: AtomicU64,
    refresh_tickets: AtomicU64,
    in_flight: AtomicUsize,
}

impl ItemStore<UreqTransport> {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(TodoClient::new(&config.base_url), UreqTransport::new(config))
    }
}

impl<T: Transport> ItemStore<T> {
    /// Creates a store with an empty collection and the `All` filter. Call
    /// `refresh` to load the initial listing.
    pub fn new(client: TodoClient, transport: T) -> Self {
        Self {
            client,
            transport,
            state: Mutex::new(State {
                snapshot: Snapshot::default(),
                applied_refresh: 0,
            }),
            id_locks: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            outbox: Mutex::new(Outbox::default()),
            next_subscription: AtomicU64::new(0),
            refresh_tickets: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot.clone()
    }

    pub fn filter(&self) -> Filter {
        self.state().snapshot.filter
    }

    pub fn items(&self) -> Arc<[Item]> {
        Arc::clone(&self.state().snapshot.items)
    }

    /// Number of operations sent and not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<Snapshot, ApiError> {
        match intent {
            Intent::Add(text) => self.add(&text).await,
            Intent::Remove(id) => self.remove(&id).await,
            Intent::Toggle(id) => self.toggle_done(&id).await,
            Intent::SetFilter(filter) => self.set_filter(filter).await,
        }
    }

    /// Replaces the collection with the service's listing for `filter` and
    /// makes `filter` active, both in one commit. On failure neither changes.
    pub async fn refresh(&self, filter: Filter) -> Result<Snapshot, ApiError> {
        let ticket = self.refresh_tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let _pending = self.begin();
        tracing::debug!(%filter, ticket, "refreshing items");

        let request = self.client.build_list_items(filter);
        let result = self.send(request).await.and_then(|response| self.client.parse_list_items(response));
        let items = settle("refresh", result)?;

        let snapshot = {
            let mut state = self.state();
            if ticket < state.applied_refresh {
                tracing::debug!(ticket, applied = state.applied_refresh, "dropping superseded listing");
                return Ok(state.snapshot.clone());
            }
            state.applied_refresh = ticket;
            state.snapshot = Snapshot {
                items: items.into(),
                filter,
            };
            self.enqueue(&state.snapshot);
            state.snapshot.clone()
        };
        tracing::info!(%filter, count = snapshot.len(), "items refreshed");
        self.deliver();
        Ok(snapshot)
    }

    /// Changing the filter always goes through a refresh.
    pub async fn set_filter(&self, filter: Filter) -> Result<Snapshot, ApiError> {
        self.refresh(filter).await
    }

    /// Creates an item and appends the service's copy once it has an id.
    pub async fn add(&self, text: &str) -> Result<Snapshot, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::EmptyText);
        }
        let _pending = self.begin();
        tracing::debug!(text, "creating item");

        let request = self.client.build_create_item(text)?;
        let result = self.send(request).await.and_then(|response| self.client.parse_create_item(response));
        let item = settle("add", result)?;

        let id = item.id.clone();
        let snapshot = settle(
            "add",
            self.commit(|items, filter| {
                if items.iter().any(|existing| existing.id == item.id) {
                    return Err(ApiError::MalformedResponse(format!(
                        "created item reuses existing id {}",
                        item.id
                    )));
                }
                if filter.matches(&item) {
                    items.push(item);
                }
                Ok(())
            }),
        )?;
        tracing::info!(%id, "item created");
        Ok(snapshot)
    }

    /// Deletes an item; it leaves the collection only after the service
    /// confirms.
    pub async fn remove(&self, id: &ItemId) -> Result<Snapshot, ApiError> {
        let _permit = self.lock_id(id).await;
        if self.state().snapshot.find(id).is_none() {
            return Err(ApiError::UnknownItem(id.clone()));
        }
        let _pending = self.begin();
        tracing::debug!(%id, "deleting item");

        let request = self.client.build_delete_item(id);
        let result = self.send(request).await.and_then(|response| self.client.parse_delete_item(response));
        settle("remove", result)?;

        let snapshot = self.commit(|items, _| {
            items.retain(|item| &item.id != id);
            Ok(())
        })?;
        tracing::info!(%id, "item deleted");
        Ok(snapshot)
    }

    /// Flips `done`. The new value is computed from local state after any
    /// earlier operation on the same id has resolved.
    pub async fn toggle_done(&self, id: &ItemId) -> Result<Snapshot, ApiError> {
        let _permit = self.lock_id(id).await;
        let done = match self.state().snapshot.find(id) {
            Some(item) => !item.done,
            None => return Err(ApiError::UnknownItem(id.clone())),
        };
        let _pending = self.begin();
        tracing::debug!(%id, done, "updating item");

        let request = self.client.build_update_done(id, done);
        let result = self.send(request).await.and_then(|response| self.client.parse_update_done(response));
        settle("toggle", result)?;

        let snapshot = self.commit(|items, filter| {
            if let Some(pos) = items.iter().position(|item| &item.id == id) {
                items[pos].done = done;
                // The service would no longer list it under this filter.
                if !filter.matches(&items[pos]) {
                    items.remove(pos);
                }
            }
            Ok(())
        })?;
        tracing::info!(%id, done, "item updated");
        Ok(snapshot)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.transport.execute(request).await
    }

    /// Applies `mutate` to a copy of the collection and publishes it. If
    /// `mutate` fails nothing is published.
    fn commit<F>(&self, mutate: F) -> Result<Snapshot, ApiError>
    where
        F: FnOnce(&mut Vec<Item>, Filter) -> Result<(), ApiError>,
    {
        let snapshot = {
            let mut state = self.state();
            let filter = state.snapshot.filter;
            let mut items = state.snapshot.items.to_vec();
            mutate(&mut items, filter)?;
            state.snapshot = Snapshot {
                items: items.into(),
                filter,
            };
            self.enqueue(&state.snapshot);
            state.snapshot.clone()
        };
        self.deliver();
        Ok(snapshot)
    }

    /// Must be called with the state lock held so queue order is commit order.
    fn enqueue(&self, snapshot: &Snapshot) {
        lock(&self.outbox).queue.push_back(snapshot.clone());
    }

    /// Hands queued snapshots to listeners in order. If another caller is
    /// already draining, it picks up what we queued and we return at once.
    fn deliver(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _draining = Draining(&self.outbox);

        loop {
            let snapshot = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        // Cleared under the same lock as the empty check so a
                        // concurrent enqueue cannot be stranded.
                        outbox.draining = false;
                        return;
                    }
                }
            };
            // Cloned out so listeners may subscribe or unsubscribe re-entrantly.
            let listeners: Vec<Listener> = lock(&self.listeners)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&snapshot);
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    fn begin(&self) -> Pending<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Pending(&self.in_flight)
    }

    async fn lock_id(&self, id: &ItemId) -> IdPermit<'_> {
        let slot = Arc::clone(lock(&self.id_locks).entry(id.clone()).or_default());
        let guard = slot.lock_owned().await;
        IdPermit {
            table: &self.id_locks,
            id: id.clone(),
            guard: Some(guard),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn settle<V>(op: &'static str, result: Result<V, ApiError>) -> Result<V, ApiError> {
    if let Err(e) = &result {
        tracing::warn!(op, error = %e, "operation rejected");
    }
    result
}

/// Clears the draining flag if a listener panics mid-drain.
struct Draining<'a>(&'a Mutex<Outbox>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

/// Marks an operation as pending until dropped.
struct Pending<'a>(&'a AtomicUsize);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive turn on one id. Drops its lock-table entry when nobody else is
/// queued on it.
struct IdPermit<'a> {
    table: &'a IdLocks,
    id: ItemId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdPermit<'_> {
    fn drop(&mut self) {
        let mut table = lock(self.table);
        drop(self.guard.take());
        if table.get(&self.id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            table.remove(&self.id);
        }
    }
}
