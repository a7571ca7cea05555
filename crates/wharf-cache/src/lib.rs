//! # wharf-cache
//!
//! In-memory mirror of the entities the gateway announces.
//!
//! ## Features
//!
//! - **Get-or-create**: repeated inserts return the cached `Arc`
//! - **Dual index**: guild-owned collections and flat lookup tables move together
//! - **Cascading removal**: dropping a guild drops its channels, roles and members
//! - **Backfill**: fetch a new guild's dependents through a [`GuildSource`]
//!
//! [`GuildSource`]: wharf_core::GuildSource

pub mod backfill;
pub mod error;
pub mod memory;

pub use backfill::BackfillReport;
pub use error::BackfillError;
pub use memory::{CacheResult, CacheStats, InMemoryCache};
