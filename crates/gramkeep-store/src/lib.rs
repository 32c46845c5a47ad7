//! # gramkeep-store
//!
//! Local storage for the Gramkeep archive, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for favorites, the
//! tag ledger, and stored Telegram accounts.  A favorite's type-dependent
//! payload and its tag list live in JSON columns queried through SQLite's
//! json functions, which keeps the schema stable while the payload shape
//! varies per content kind.

pub mod accounts;
pub mod database;
pub mod favorites;
pub mod migrations;
pub mod models;
pub mod tags;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
