//! The saving-fund wide summary row and its invested/profit formulas.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error,
    category::CategoryId,
    journal::JournalId,
    money,
    record::{
        RecordKind,
        totals::{KindTotals, Side, kind_totals},
    },
};

/// One wide row per saving fund: contributions, fund-to-fund changes and
/// payouts, with their fees, as decimal amounts.
///
/// Fees ride the side of the record that pays them: a contribution's fee
/// counts against the receiving fund, a change's fee against the fund the
/// money left.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SavingSummary {
    /// The saving fund the row describes.
    pub category_id: CategoryId,
    /// Contributions received before the collection year.
    pub contributions_past: f64,
    /// Contributions received in the collection year.
    pub contributions_now: f64,
    /// Fees on contributions before the collection year.
    pub contribution_fees_past: f64,
    /// Fees on contributions in the collection year.
    pub contribution_fees_now: f64,
    /// Fund-to-fund amounts received before the collection year.
    pub change_to_past: f64,
    /// Fund-to-fund amounts received in the collection year.
    pub change_to_now: f64,
    /// Fund-to-fund amounts sent before the collection year.
    pub change_from_past: f64,
    /// Fund-to-fund amounts sent in the collection year.
    pub change_from_now: f64,
    /// Fees on outgoing changes before the collection year.
    pub change_from_fees_past: f64,
    /// Fees on outgoing changes in the collection year.
    pub change_from_fees_now: f64,
    /// Payouts into accounts before the collection year.
    pub close_from_past: f64,
    /// Payouts into accounts in the collection year.
    pub close_from_now: f64,
    /// Fees on payouts before the collection year.
    pub close_from_fees_past: f64,
    /// Fees on payouts in the collection year.
    pub close_from_fees_now: f64,
}

impl SavingSummary {
    /// Contributions and incoming changes carried from earlier years.
    pub fn past_amount(&self) -> f64 {
        self.contributions_past + self.change_to_past
    }

    /// Contribution fees carried from earlier years.
    pub fn past_fee(&self) -> f64 {
        self.contribution_fees_past
    }

    /// Contributions and incoming changes within the collection year.
    pub fn per_year_incomes(&self) -> f64 {
        self.contributions_now + self.change_to_now
    }

    /// Contribution fees within the collection year.
    pub fn per_year_fee(&self) -> f64 {
        self.contribution_fees_now
    }

    /// Cumulative money put in: carried plus this year's contributions.
    pub fn incomes(&self) -> f64 {
        self.past_amount() + self.per_year_incomes()
    }

    /// Cumulative contribution fees.
    pub fn fee(&self) -> f64 {
        self.past_fee() + self.per_year_fee()
    }

    /// Cumulative money taken out via payouts and outgoing changes.
    pub fn sold(&self) -> f64 {
        self.close_from_past + self.close_from_now + self.change_from_past + self.change_from_now
    }

    /// Cumulative fees on money taken out.
    pub fn sold_fee(&self) -> f64 {
        self.close_from_fees_past
            + self.close_from_fees_now
            + self.change_from_fees_past
            + self.change_from_fees_now
    }

    /// Net money still in the fund, floored at zero.
    ///
    /// Withdrawing more than was put in (profit taken as cash) would drive
    /// this negative; the fund then simply has nothing invested.
    pub fn invested(&self) -> f64 {
        (self.incomes() - self.fee() - self.sold() - self.sold_fee()).max(0.0)
    }

    /// The gain or loss against an externally supplied market value.
    pub fn profit_sum(&self, market_value: f64) -> f64 {
        market_value - self.invested()
    }

    /// The gain or loss as a percentage of the invested amount.
    ///
    /// Zero when nothing is invested, never a division error.
    pub fn profit_percent(&self, market_value: f64) -> f64 {
        let invested = self.invested();

        if invested == 0.0 {
            0.0
        } else {
            ((market_value * 100.0) / invested) - 100.0
        }
    }
}

type Accumulate = fn(&mut SavingSummary, totals: &KindTotals);

/// Which ledger queries feed the saving scope, and into which columns.
const SAVING_QUERIES: [(RecordKind, Side, Accumulate); 4] = [
    (RecordKind::Saving, Side::Dest, |row, totals| {
        row.contributions_past += money::from_cents(totals.past);
        row.contributions_now += money::from_cents(totals.current);
        row.contribution_fees_past += money::from_cents(totals.fee_past);
        row.contribution_fees_now += money::from_cents(totals.fee_current);
    }),
    (RecordKind::SavingChange, Side::Dest, |row, totals| {
        row.change_to_past += money::from_cents(totals.past);
        row.change_to_now += money::from_cents(totals.current);
    }),
    (RecordKind::SavingChange, Side::Source, |row, totals| {
        row.change_from_past += money::from_cents(totals.past);
        row.change_from_now += money::from_cents(totals.current);
        row.change_from_fees_past += money::from_cents(totals.fee_past);
        row.change_from_fees_now += money::from_cents(totals.fee_current);
    }),
    (RecordKind::SavingClose, Side::Source, |row, totals| {
        row.close_from_past += money::from_cents(totals.past);
        row.close_from_now += money::from_cents(totals.current);
        row.close_from_fees_past += money::from_cents(totals.fee_past);
        row.close_from_fees_now += money::from_cents(totals.fee_current);
    }),
];

/// Collect one [SavingSummary] per requested saving fund for `year`.
///
/// Same contract as [crate::summary::account::collect]: one row per entry of
/// `categories` in order, unknown categories skipped and logged, empty input
/// returns empty without querying.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn collect(
    journal_id: JournalId,
    year: i32,
    categories: &[CategoryId],
    connection: &Connection,
) -> Result<Vec<SavingSummary>, Error> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows: Vec<SavingSummary> = categories
        .iter()
        .map(|&category_id| SavingSummary {
            category_id,
            ..SavingSummary::default()
        })
        .collect();
    let index: HashMap<CategoryId, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, &category_id)| (category_id, i))
        .collect();

    for (kind, side, accumulate) in SAVING_QUERIES {
        for totals in kind_totals(journal_id, kind, side, year, connection)? {
            let Some(&i) = index.get(&totals.category_id) else {
                tracing::warn!(
                    category_id = totals.category_id,
                    kind = %kind,
                    "skipping totals for a category outside the requested set"
                );
                continue;
            };

            accumulate(&mut rows[i], &totals);
        }
    }

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
