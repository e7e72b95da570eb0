//! Domain model for workout programs and user vaults.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep structural edits pure: they return new values and never touch
//!   storage.
//!
//! # Invariants
//! - Programs, users and memberships are identified by stable UUIDs.
//! - Structural elements (days, exercises, sets) use positive `i64` ids
//!   issued by `ids::IdAllocator`.

pub mod ids;
pub mod program;
pub mod rating;
pub mod structure;
pub mod vault;
