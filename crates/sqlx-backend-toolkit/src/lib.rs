//! # sqlx-backend-toolkit
//!
//! Serialized statement execution over a `sqlx::AnyPool`.
//!
//! - **[`QueryExecutor`]**: one statement at a time, positional binding of JSON values,
//!   fail-fast [`Error::NotInitialized`] when no pool exists
//! - **[`Snapshot`]**: result rows drained into owned values before the connection
//!   returns to the pool
//! - **[`Diagnostic`] / [`FailureKind`]**: backend error details and the coarse
//!   classes (duplicate index, unindexable column, missing table) callers act on

mod decode;
mod error;
mod executor;
mod snapshot;

pub use error::{Diagnostic, Error, FailureKind, Result};
pub use executor::{QueryExecutor, WriteQueryResult};
pub use snapshot::{Snapshot, SnapshotRow};
