use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    sync::{Mutex, PoisonError},
    thread::{self, ThreadId},
};

use log::debug;

use crate::{
    BatchError,
    core::{
        item::{ItemWriter, ItemWriterResult},
        transaction::TransactionManager,
    },
};

/// Item carrying the key it is persisted under.
pub trait Identifiable {
    type Id: Ord + Clone + Debug;

    fn id(&self) -> Self::Id;
}

/// Destination store of items.
///
/// `save` is an upsert keyed by the item identifier: saving an item whose id
/// already exists replaces the stored one.
pub trait Repository<T> {
    fn save(&self, item: &T) -> Result<(), BatchError>;
}

/// Writer calling [`Repository::save`] for every item of a chunk, in order.
///
/// The writer stops at the first failing save; the chunk transaction is then
/// rolled back by the step.
pub struct RepositoryItemWriter<'a, T> {
    repository: &'a dyn Repository<T>,
}

impl<'a, T> RepositoryItemWriter<'a, T> {
    pub fn new(repository: &'a dyn Repository<T>) -> Self {
        Self { repository }
    }
}

impl<T> ItemWriter<T> for RepositoryItemWriter<'_, T> {
    fn write(&self, items: &[T]) -> ItemWriterResult {
        for (position, item) in items.iter().enumerate() {
            self.repository.save(item).map_err(|error| {
                BatchError::ItemWriter(format!(
                    "save of item {} of {} failed: {}",
                    position + 1,
                    items.len(),
                    error
                ))
            })?;
        }
        Ok(())
    }
}

struct StoreState<T: Identifiable> {
    committed: BTreeMap<T::Id, T>,
    /// Saves of the open transaction of each thread
    pending: HashMap<ThreadId, Vec<T>>,
    /// Ids saved by each committed transaction
    commit_log: Vec<Vec<T::Id>>,
    rollback_count: usize,
}

/// Transactional repository kept in process memory.
///
/// Saves made between [`begin`](TransactionManager::begin) and
/// [`commit`](TransactionManager::commit) stay invisible until the commit and
/// are discarded by a rollback. A save outside a transaction is applied
/// immediately.
///
/// Transactions are bound to the calling thread, so steps running on
/// different threads can share one repository without seeing each other's
/// uncommitted saves.
pub struct InMemoryRepository<T: Identifiable> {
    state: Mutex<StoreState<T>>,
}

impl<T: Identifiable> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState {
                committed: BTreeMap::new(),
                pending: HashMap::new(),
                commit_log: Vec::new(),
                rollback_count: 0,
            }),
        }
    }
}

impl<T: Identifiable + Clone> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn find_by_id(&self, id: &T::Id) -> Option<T> {
        self.lock().committed.get(id).cloned()
    }

    /// Committed items, sorted by id.
    pub fn find_all(&self) -> Vec<T> {
        self.lock().committed.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().committed.len()
    }

    /// Ids saved by each committed transaction, in commit order.
    pub fn commit_log(&self) -> Vec<Vec<T::Id>> {
        self.lock().commit_log.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commit_log.len()
    }

    pub fn rollback_count(&self) -> usize {
        self.lock().rollback_count
    }
}

impl<T: Identifiable + Clone> Repository<T> for InMemoryRepository<T> {
    fn save(&self, item: &T) -> Result<(), BatchError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.pending.get_mut(&thread::current().id()) {
            Some(pending) => pending.push(item.clone()),
            None => {
                state.committed.insert(item.id(), item.clone());
            }
        }
        Ok(())
    }
}

impl<T: Identifiable + Clone> TransactionManager for InMemoryRepository<T> {
    fn begin(&self) -> Result<(), BatchError> {
        let mut state = self.lock();
        let thread = thread::current().id();
        if state.pending.contains_key(&thread) {
            return Err(BatchError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        state.pending.insert(thread, Vec::new());
        Ok(())
    }

    fn commit(&self) -> Result<(), BatchError> {
        let mut state = self.lock();
        let pending = state
            .pending
            .remove(&thread::current().id())
            .ok_or_else(|| BatchError::Transaction("no active transaction".to_string()))?;

        let ids: Vec<T::Id> = pending.iter().map(Identifiable::id).collect();
        for item in pending {
            state.committed.insert(item.id(), item);
        }
        debug!("Committed {} items", ids.len());
        state.commit_log.push(ids);
        Ok(())
    }

    fn rollback(&self) -> Result<(), BatchError> {
        let mut state = self.lock();
        if let Some(pending) = state.pending.remove(&thread::current().id()) {
            debug!("Discarded {} pending items", pending.len());
            state.rollback_count += 1;
        }
        Ok(())
    }
}
