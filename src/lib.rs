//! Map plain Rust structs onto Google Cloud Datastore entities.
//!
//! ```ignore
//! use datastorers::{DatastoreClient, DatastoreManaged, DatastorersUpdatable, Key};
//!
//! #[derive(DatastoreManaged, Clone, Debug)]
//! #[kind = "Book"]
//! pub struct Book {
//!     #[key]
//!     pub key: Option<Key>,
//!     #[version]
//!     pub version: Option<i64>,
//!     #[indexed]
//!     #[property = "Title"]
//!     pub title: String,
//! }
//!
//! let connection = DatastoreClient::from_env()?;
//! let book = Book { key: None, version: None, title: "Dune".into() }
//!     .commit(&connection)
//!     .await?;
//! let same = Book::get_one_by_title("Dune".to_string(), &connection).await?;
//! ```

// Lets code generated by the derive macro name this crate as `::datastorers`
// from inside the crate too.
extern crate self as datastorers;

pub mod cli;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod load_config;
pub mod query;
pub mod schema;
pub mod transaction;
pub mod update;

pub use datastorers_derive::DatastoreManaged;

pub use config::ConnectionConfig;
#[cfg(any(test, feature = "test-export-mocks"))]
pub use connection::MockDatastoreConnection;
pub use connection::{DatastoreClient, DatastoreConnection};
pub use entity::{
    DatastoreEntity, DatastoreManaged, DatastoreProperties, FromDatastoreValue, IntoDatastoreValue,
};
pub use error::{DatastoreClientError, DatastoreParseError, DatastorersError};
pub use query::ResultCollection;
pub use schema::{Key, Value};
pub use transaction::TransactionConnection;
pub use update::DatastorersUpdatable;
