use log::debug;

use crate::BatchError;

/// Transactional scope around the write of one chunk.
///
/// A step calls [`begin`](TransactionManager::begin) before handing a chunk to
/// its writer, then [`commit`](TransactionManager::commit) when every item was
/// written or [`rollback`](TransactionManager::rollback) on the first failure.
/// Writers that take part in the transaction (see
/// [`InMemoryRepository`](crate::item::repository::InMemoryRepository)) must
/// not make a chunk's writes visible before `commit`.
pub trait TransactionManager {
    fn begin(&self) -> Result<(), BatchError>;

    fn commit(&self) -> Result<(), BatchError>;

    fn rollback(&self) -> Result<(), BatchError>;
}

/// Transaction manager for writers without transactional resources.
///
/// Every call succeeds and nothing is undone on rollback.
#[derive(Default)]
pub struct ResourcelessTransactionManager;

impl TransactionManager for ResourcelessTransactionManager {
    fn begin(&self) -> Result<(), BatchError> {
        debug!("Begin resourceless transaction");
        Ok(())
    }

    fn commit(&self) -> Result<(), BatchError> {
        debug!("Commit resourceless transaction");
        Ok(())
    }

    fn rollback(&self) -> Result<(), BatchError> {
        debug!("Rollback resourceless transaction");
        Ok(())
    }
}
