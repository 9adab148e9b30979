//! The unified ledger: record kinds, the validated write path and the grouped
//! totals that feed balance aggregation.

mod core;
pub mod totals;

pub use core::{
    Record, RecordBuilder, RecordId, RecordKind, Sides, create_record, create_record_table,
    delete_record, get_record, map_record_row, records_for_year, update_record,
};
