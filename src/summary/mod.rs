//! Wide per-category summary rows and the balance formulas computed from
//! them.
//!
//! Each scope has a fixed struct with one named column pair per record kind
//! and side, populated by a compile-time accumulation table instead of the
//! stringly-keyed rows a dynamic language would use.

pub mod account;
pub mod saving;
