//! SQLite persistence layer for the parkd parking engine.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread
//! - Database migrations
//! - Model types for all tables
//! - Query helpers for seed data, sessions, assignments, and the ledger
//!
//! # Architecture
//!
//! The `AsyncDatabase` uses a single dedicated thread for all SQLite
//! operations. Queries are sent through a channel and executed in FIFO
//! order; a multi-step transition wrapped in one transaction inside one
//! `call` is therefore atomic with respect to every other caller.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let lots = db.call(|conn| queries::list_lots(conn)).await?;
//! ```

mod error;
mod executor;
pub mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::run_migrations;
pub use models::*;
