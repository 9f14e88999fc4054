use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::persistence::{PersistenceError, SnapshotFile};
use super::visibility::{visible, Visibility};
use crate::data::{BlackoutWindow, WindowError};

/// Durable collection of blackout windows
///
/// Implementations must give each call a consistent view: a read sees
/// either all or none of any single write.
pub trait WindowStore: Send + Sync + 'static {
    /// Persist a normalized window and return its id
    fn create(
        &self,
        window: BlackoutWindow,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Point lookup; invisible windows are reported as `NotFound`
    fn get(
        &self,
        id: &str,
        visibility: &Visibility,
    ) -> impl Future<Output = Result<Arc<BlackoutWindow>, StorageError>> + Send;

    /// Every visible window, including expired ones, ordered by start time
    fn list(
        &self,
        visibility: &Visibility,
    ) -> impl Future<Output = Result<Vec<Arc<BlackoutWindow>>, StorageError>> + Send;

    /// Pending and active windows visible to `customer`, ordered by start time
    fn list_active_for_customer(
        &self,
        customer: Option<&str>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Arc<BlackoutWindow>>, StorageError>> + Send;

    /// Remove a visible window; absent or invisible ids are `NotFound`
    fn delete(
        &self,
        id: &str,
        visibility: &Visibility,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remove windows that ended at or before `cutoff`, returning how many
    fn purge_expired(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StorageError>> + Send;
}

/// Windows of one owner keyed by `(instant, id)`
type Bucket = BTreeMap<(DateTime<Utc>, String), Arc<BlackoutWindow>>;

/// Immutable view of all windows, indexed per customer by start and by end time
#[derive(Debug, Clone, Default)]
struct WindowSet {
    by_id: HashMap<String, Arc<BlackoutWindow>>,
    by_start: HashMap<Option<String>, Bucket>,
    by_end: HashMap<Option<String>, Bucket>,
}

impl WindowSet {
    fn insert(&mut self, window: Arc<BlackoutWindow>) {
        self.by_start
            .entry(window.customer.clone())
            .or_default()
            .insert((window.start_time, window.id.clone()), Arc::clone(&window));
        self.by_end
            .entry(window.customer.clone())
            .or_default()
            .insert((window.end_time, window.id.clone()), Arc::clone(&window));
        self.by_id.insert(window.id.clone(), window);
    }

    fn remove(&mut self, id: &str) -> Option<Arc<BlackoutWindow>> {
        let window = self.by_id.remove(id)?;
        remove_from(&mut self.by_start, &window, window.start_time);
        remove_from(&mut self.by_end, &window, window.end_time);
        Some(window)
    }

    fn bucket(&self, customer: Option<&str>) -> impl Iterator<Item = &Arc<BlackoutWindow>> {
        self.by_start
            .get(&customer.map(str::to_string))
            .into_iter()
            .flat_map(|bucket| bucket.values())
    }

    /// Windows of one owner with `end_time > now`; expired entries are not visited
    fn unexpired(
        &self,
        customer: Option<&str>,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &Arc<BlackoutWindow>> {
        self.by_end
            .get(&customer.map(str::to_string))
            .into_iter()
            .flat_map(move |bucket| {
                bucket
                    .range((now, String::new())..)
                    .skip_while(move |((end, _), _)| *end <= now)
                    .map(|(_, window)| window)
            })
    }

    /// Ids of windows with `end_time <= cutoff`
    fn ended_by(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.by_end
            .values()
            .flat_map(|bucket| {
                bucket
                    .keys()
                    .take_while(move |(end, _)| *end <= cutoff)
                    .map(|(_, id)| id.clone())
            })
            .collect()
    }

    /// All windows in (start_time, id) order
    fn ordered(&self) -> Vec<Arc<BlackoutWindow>> {
        let mut all: Vec<_> = self.by_id.values().cloned().collect();
        sort_by_start(&mut all);
        all
    }
}

fn remove_from(index: &mut HashMap<Option<String>, Bucket>, window: &BlackoutWindow, at: DateTime<Utc>) {
    if let Some(bucket) = index.get_mut(&window.customer) {
        bucket.remove(&(at, window.id.clone()));
        if bucket.is_empty() {
            index.remove(&window.customer);
        }
    }
}

fn sort_by_start(windows: &mut [Arc<BlackoutWindow>]) {
    windows.sort_by(|a, b| (a.start_time, &a.id).cmp(&(b.start_time, &b.id)));
}

/// In-memory window store with optional snapshot persistence
///
/// Readers take the current `Arc<WindowSet>` and work on it without
/// holding any lock. Writers are serialized, build the next set from a
/// copy, persist it, and only then publish it.
pub struct MemoryWindowStore {
    state: Arc<StoreState>,
}

struct StoreState {
    current: RwLock<Arc<WindowSet>>,
    writer: tokio::sync::Mutex<()>,
    snapshot: Option<SnapshotFile>,
}

impl StoreState {
    fn new(set: WindowSet, snapshot: Option<SnapshotFile>) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
            writer: tokio::sync::Mutex::new(()),
            snapshot,
        }
    }

    fn view(&self) -> Arc<WindowSet> {
        Arc::clone(&self.current.read())
    }

    /// Apply `mutate` to a copy of the current set and publish it once persisted.
    ///
    /// If `mutate` or the snapshot write fails, nothing is published.
    async fn commit<T, F>(&self, mutate: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut WindowSet) -> Result<T, StorageError>,
    {
        let _writer = self.writer.lock().await;

        let mut next = WindowSet::clone(&self.view());
        let result = mutate(&mut next)?;

        if let Some(snapshot) = &self.snapshot {
            snapshot.save(&next.ordered()).await?;
        }

        *self.current.write() = Arc::new(next);
        Ok(result)
    }
}

impl MemoryWindowStore {
    /// Store without durability, for tests and ephemeral deployments
    pub fn new() -> Self {
        Self {
            state: Arc::new(StoreState::new(WindowSet::default(), None)),
        }
    }

    /// Open a store persisted under `data_dir`, loading any existing snapshot
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StorageError> {
        let snapshot = SnapshotFile::new(data_dir);
        let mut set = WindowSet::default();

        for window in snapshot.load().await? {
            if let Err(e) = window.validate() {
                tracing::warn!(
                    blackout_id = %window.id,
                    error = %e,
                    "Skipping invalid blackout in snapshot"
                );
                continue;
            }
            set.insert(Arc::new(window));
        }

        Ok(Self {
            state: Arc::new(StoreState::new(set, Some(snapshot))),
        })
    }

    /// Number of stored windows, expired ones included
    pub fn len(&self) -> usize {
        self.view().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn view(&self) -> Arc<WindowSet> {
        self.state.view()
    }

    /// Run a commit on its own task.
    ///
    /// Once started, the commit runs to completion even if the caller is
    /// dropped, so the published set always matches the snapshot on disk.
    async fn commit<T, F>(&self, mutate: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut WindowSet) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move { state.commit(mutate).await })
            .await
            .map_err(|e| StorageError::Backend(format!("Commit task failed: {}", e)))?
    }
}

impl Default for MemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore for MemoryWindowStore {
    async fn create(&self, window: BlackoutWindow) -> Result<String, StorageError> {
        window.validate()?;
        let window = Arc::new(window);

        self.commit(move |set| {
            if set.by_id.contains_key(&window.id) {
                return Err(StorageError::Conflict(window.id.clone()));
            }
            let id = window.id.clone();
            set.insert(window);
            Ok(id)
        })
        .await
    }

    async fn get(&self, id: &str, visibility: &Visibility) -> Result<Arc<BlackoutWindow>, StorageError> {
        self.view()
            .by_id
            .get(id)
            .filter(|w| visible(w, visibility))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn list(&self, visibility: &Visibility) -> Result<Vec<Arc<BlackoutWindow>>, StorageError> {
        let set = self.view();

        let mut windows: Vec<Arc<BlackoutWindow>> = match visibility {
            Visibility::Unrestricted => set.by_id.values().cloned().collect(),
            Visibility::Customers(customers) => set
                .bucket(None)
                .chain(customers.iter().flat_map(|c| set.bucket(Some(c.as_str()))))
                .filter(|w| visible(w, visibility))
                .cloned()
                .collect(),
        };
        sort_by_start(&mut windows);
        windows.dedup_by(|a, b| a.id == b.id);
        Ok(windows)
    }

    async fn list_active_for_customer(
        &self,
        customer: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Arc<BlackoutWindow>>, StorageError> {
        let set = self.view();
        let visibility = Visibility::for_customer(customer);

        let global = set.unexpired(None, now);
        let owned = customer.into_iter().flat_map(|c| set.unexpired(Some(c), now));

        let mut windows: Vec<Arc<BlackoutWindow>> = global
            .chain(owned)
            .filter(|w| visible(w, &visibility))
            .cloned()
            .collect();
        sort_by_start(&mut windows);
        Ok(windows)
    }

    async fn delete(&self, id: &str, visibility: &Visibility) -> Result<bool, StorageError> {
        // Cheap rejection without taking the writer lock
        self.get(id, visibility).await?;

        let visibility = visibility.clone();
        let id = id.to_string();
        self.commit(move |set| match set.by_id.get(&id) {
            Some(w) if visible(w, &visibility) => {
                set.remove(&id);
                Ok(true)
            }
            _ => Err(StorageError::NotFound(id)),
        })
        .await
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        if self.view().ended_by(cutoff).is_empty() {
            return Ok(0);
        }

        self.commit(move |set| {
            let ids = set.ended_by(cutoff);
            for id in &ids {
                set.remove(id);
            }
            Ok(ids.len())
        })
        .await
    }
}

/// Run a store call with a deadline; an elapsed deadline is `Timeout`
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Blackout '{0}' not found")]
    NotFound(String),

    #[error("Blackout '{0}' already exists")]
    Conflict(String),

    #[error("Invalid blackout: {0}")]
    Invalid(#[from] WindowError),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
