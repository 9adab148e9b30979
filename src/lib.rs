//! Ledgerbook is a bookkeeping engine that materializes year-over-year
//! balances for accounts and saving funds.
//!
//! The ledger itself is a flat list of [record::Record]s between
//! [category::Category]s, partitioned per [journal::Journal]. Every record or
//! [worth::Worth] mutation re-synchronizes the per-category, per-year rows in
//! the [balance] tables inside the same database transaction, so readers only
//! ever see fully-computed balances. [report] shapes the materialized rows
//! into chart-ready series.

#![warn(missing_docs)]

pub mod balance;
pub mod category;
pub mod db;
mod error;
pub mod journal;
pub mod money;
pub mod record;
pub mod report;
pub mod summary;
pub mod worth;

pub use error::Error;
