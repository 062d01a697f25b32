use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

use log::{debug, error};
use sqlx::{Pool, QueryBuilder, Sqlite, Transaction};

use crate::{
    BatchError,
    core::transaction::TransactionManager,
    item::{rdbc::DatabaseItemBinder, repository::Repository},
};

/// Runs a future to completion from synchronous step code.
///
/// Requires a multi-threaded tokio runtime.
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Upsert repository over a SQLite table.
///
/// Each save is an `INSERT OR REPLACE` keyed on the table primary key. The
/// repository is also the transaction manager of the chunk: between `begin`
/// and `commit` every save goes through one SQLx transaction, so a rollback
/// leaves no row of the chunk behind. Transactions are bound to the calling
/// thread.
///
/// # Examples
///
/// ```no_run
/// use batch_import::item::rdbc::{DatabaseItemBinder, SqliteRepositoryBuilder};
/// use batch_import::item::repository::Repository;
/// use sqlx::{query_builder::Separated, Sqlite, SqlitePool};
///
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// struct TagBinder;
/// impl DatabaseItemBinder<Tag, Sqlite> for TagBinder {
///     fn bind(&self, item: &Tag, mut query_builder: Separated<Sqlite, &str>) {
///         query_builder.push_bind(item.id);
///         query_builder.push_bind(item.label.clone());
///     }
/// }
///
/// # #[tokio::main(flavor = "multi_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite://tags.db").await?;
/// let binder = TagBinder;
///
/// let repository = SqliteRepositoryBuilder::new()
///     .pool(&pool)
///     .table("tags")
///     .add_column("id")
///     .add_column("label")
///     .item_binder(&binder)
///     .build()?;
///
/// repository.save(&Tag { id: 1, label: "rust".to_string() })?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteRepository<'a, O> {
    pool: &'a Pool<Sqlite>,
    table: &'a str,
    columns: Vec<&'a str>,
    item_binder: &'a (dyn DatabaseItemBinder<O, Sqlite> + Sync),
    /// Open transaction of each thread
    transactions: Mutex<HashMap<ThreadId, Transaction<'static, Sqlite>>>,
}

impl<O> SqliteRepository<'_, O> {
    fn transactions(&self) -> MutexGuard<'_, HashMap<ThreadId, Transaction<'static, Sqlite>>> {
        self.transactions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_transaction(&self) -> Option<Transaction<'static, Sqlite>> {
        self.transactions().remove(&thread::current().id())
    }
}

impl<O> Repository<O> for SqliteRepository<'_, O> {
    fn save(&self, item: &O) -> Result<(), BatchError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new("INSERT OR REPLACE INTO ");
        query_builder.push(self.table);
        query_builder.push(" (");
        query_builder.push(self.columns.join(","));
        query_builder.push(") ");
        query_builder.push_values(std::iter::once(item), |b, item| {
            self.item_binder.bind(item, b);
        });

        let query = query_builder.build();

        let result = match self.take_transaction() {
            Some(mut transaction) => {
                let result = block_on(query.execute(&mut *transaction));
                self.transactions()
                    .insert(thread::current().id(), transaction);
                result
            }
            None => block_on(query.execute(self.pool)),
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to save item into SQLite table {}: {}", self.table, e);
                Err(BatchError::ItemWriter(format!("SQLite save failed: {}", e)))
            }
        }
    }
}

impl<O> TransactionManager for SqliteRepository<'_, O> {
    fn begin(&self) -> Result<(), BatchError> {
        if self.transactions().contains_key(&thread::current().id()) {
            return Err(BatchError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }

        let transaction = block_on(self.pool.begin())
            .map_err(|e| BatchError::Transaction(format!("SQLite begin failed: {}", e)))?;
        self.transactions()
            .insert(thread::current().id(), transaction);

        debug!("SQLite transaction started on table {}", self.table);
        Ok(())
    }

    fn commit(&self) -> Result<(), BatchError> {
        let transaction = self
            .take_transaction()
            .ok_or_else(|| BatchError::Transaction("no active transaction".to_string()))?;

        block_on(transaction.commit())
            .map_err(|e| BatchError::Transaction(format!("SQLite commit failed: {}", e)))?;

        debug!("SQLite transaction committed on table {}", self.table);
        Ok(())
    }

    fn rollback(&self) -> Result<(), BatchError> {
        if let Some(transaction) = self.take_transaction() {
            block_on(transaction.rollback())
                .map_err(|e| BatchError::Transaction(format!("SQLite rollback failed: {}", e)))?;
            debug!("SQLite transaction rolled back on table {}", self.table);
        }
        Ok(())
    }
}

/// Builder for [`SqliteRepository`].
pub struct SqliteRepositoryBuilder<'a, O> {
    pool: Option<&'a Pool<Sqlite>>,
    table: Option<&'a str>,
    columns: Vec<&'a str>,
    item_binder: Option<&'a (dyn DatabaseItemBinder<O, Sqlite> + Sync)>,
}

impl<O> Default for SqliteRepositoryBuilder<'_, O> {
    fn default() -> Self {
        Self {
            pool: None,
            table: None,
            columns: Vec::new(),
            item_binder: None,
        }
    }
}

impl<'a, O> SqliteRepositoryBuilder<'a, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(mut self, pool: &'a Pool<Sqlite>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn add_column(mut self, column: &'a str) -> Self {
        self.columns.push(column);
        self
    }

    pub fn item_binder(
        mut self,
        item_binder: &'a (dyn DatabaseItemBinder<O, Sqlite> + Sync),
    ) -> Self {
        self.item_binder = Some(item_binder);
        self
    }

    pub fn build(self) -> Result<SqliteRepository<'a, O>, BatchError> {
        let pool = self
            .pool
            .ok_or_else(|| BatchError::Configuration("Pool is mandatory".to_string()))?;
        let table = self
            .table
            .ok_or_else(|| BatchError::Configuration("Table name is mandatory".to_string()))?;
        let item_binder = self
            .item_binder
            .ok_or_else(|| BatchError::Configuration("Item binder is mandatory".to_string()))?;

        if self.columns.is_empty() {
            return Err(BatchError::Configuration(
                "One or more columns are required".to_string(),
            ));
        }

        Ok(SqliteRepository {
            pool,
            table,
            columns: self.columns,
            item_binder,
            transactions: Mutex::new(HashMap::new()),
        })
    }
}
