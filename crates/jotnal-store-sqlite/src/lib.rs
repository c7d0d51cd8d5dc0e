//! SQLCipher-encrypted SQLite backend for the Jotnal data store.
//!
//! [`LifecycleManager`] opens or creates the store file, verifies the key and
//! applies pending [`migration`]s. Once it is ready, consumers query the
//! schema directly through [`StoreHandle::connection`]. Everything here is
//! synchronous and runs on the caller's thread.

mod encode;
mod handle;
mod lifecycle;

pub mod error;
pub mod migration;

pub use encode::{FromRow, decode_dt, employees_reporting_to, encode_dt, find_by_id, select_all};
pub use error::{Error, Result};
pub use handle::{SchemaVersionRecord, StoreHandle};
pub use lifecycle::{Failure, LifecycleManager, LifecycleState, OpenReport};
pub use migration::{Registry, SchemaMigration};
