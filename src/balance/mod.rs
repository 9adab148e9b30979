//! The materialized per-category, per-year balance tables and the
//! synchronizer that keeps them consistent with the ledger.
//!
//! Nothing outside [sync] writes these tables. Reading is plain lookup
//! queries over already-computed rows.

pub mod account;
pub mod saving;
pub mod sync;
