//! `db` crate: Postgres persistence for the status parameter.
//!
//! Provides a connection pool, typed row structs, repository functions, and
//! [`PgStatusStore`], the `StatusStore` implementation backed by them.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;
pub mod store;

pub use pool::DbPool;
pub use error::DbError;
pub use store::PgStatusStore;
