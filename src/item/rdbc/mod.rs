use sqlx::{Database, query_builder::Separated};

/// This module contains the SQLite repository implementation.
pub mod sqlite_repository;

/// Trait for binding item data to database query parameters.
///
/// This trait is generic over the database type so the same binder shape is
/// used whatever the SQLx driver.
///
/// # Type Parameters
///
/// * `O` - The item type to bind
/// * `DB` - The SQLx database type (e.g. `Sqlite`)
///
/// # Examples
///
/// ```no_run
/// use batch_import::item::rdbc::DatabaseItemBinder;
/// use sqlx::{query_builder::Separated, Sqlite};
///
/// struct Product {
///     id: i64,
///     name: String,
/// }
///
/// struct ProductBinder;
/// impl DatabaseItemBinder<Product, Sqlite> for ProductBinder {
///     fn bind(&self, item: &Product, mut query_builder: Separated<Sqlite, &str>) {
///         query_builder.push_bind(item.id);
///         query_builder.push_bind(item.name.clone());
///     }
/// }
/// ```
pub trait DatabaseItemBinder<O, DB: Database> {
    /// Binds the properties of an item to a separated query builder, in the
    /// order of the repository columns.
    fn bind(&self, item: &O, query_builder: Separated<DB, &str>);
}

pub use sqlite_repository::{SqliteRepository, SqliteRepositoryBuilder};
