//! # gramkeep-shared
//!
//! Types and helpers shared across the Gramkeep crates: the credential
//! vault that protects Telegram session strings at rest, the content
//! classifier that buckets saved messages into categories, and the
//! domain types both the store and the sync engine speak.

pub mod classify;
pub mod constants;
pub mod types;
pub mod vault;

mod error;

pub use error::{UnknownVariant, VaultError};
pub use types::{Category, ContentKind, FavoriteContent, UserProfile};
