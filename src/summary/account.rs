//! The account-scope wide summary row and its balance formulas.

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
        totals::{Side, kind_totals},
    },
};

/// One wide row per account: every record kind's past and current-year sums,
/// as decimal amounts.
///
/// `*_past` columns sum all years strictly before the collection year,
/// `*_now` columns sum the collection year itself. The derived balance
/// figures are computed by the methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AccountSummary {
    /// The account the row describes.
    pub category_id: CategoryId,
    /// Incomes earned before the collection year.
    pub incomes_past: f64,
    /// Incomes earned in the collection year.
    pub incomes_now: f64,
    /// Expenses paid before the collection year.
    pub expenses_past: f64,
    /// Expenses paid in the collection year.
    pub expenses_now: f64,
    /// Saving contributions made before the collection year.
    pub savings_past: f64,
    /// Saving contributions made in the collection year.
    pub savings_now: f64,
    /// Transfers received before the collection year.
    pub transfers_to_past: f64,
    /// Transfers received in the collection year.
    pub transfers_to_now: f64,
    /// Transfers sent before the collection year.
    pub transfers_from_past: f64,
    /// Transfers sent in the collection year.
    pub transfers_from_now: f64,
    /// Saving-fund payouts received before the collection year.
    pub saving_close_to_past: f64,
    /// Saving-fund payouts received in the collection year.
    pub saving_close_to_now: f64,
    /// Money lent out before the collection year.
    pub debt_lend_past: f64,
    /// Money lent out in the collection year.
    pub debt_lend_now: f64,
    /// Money borrowed before the collection year.
    pub debt_borrow_past: f64,
    /// Money borrowed in the collection year.
    pub debt_borrow_now: f64,
    /// Debt repayments received before the collection year.
    pub debt_return_to_past: f64,
    /// Debt repayments received in the collection year.
    pub debt_return_to_now: f64,
    /// Debt repayments sent before the collection year.
    pub debt_return_from_past: f64,
    /// Debt repayments sent in the collection year.
    pub debt_return_from_now: f64,
}

impl AccountSummary {
    /// The opening balance carried from all years before the collection year.
    ///
    /// The kind-to-sign mapping here is the accounting convention the whole
    /// crate is built around; reordering or "simplifying" it changes every
    /// materialized row.
    pub fn past(&self) -> f64 {
        self.incomes_past + self.transfers_to_past + self.saving_close_to_past
            + self.debt_lend_past
            + self.debt_return_to_past
            - self.expenses_past
            - self.savings_past
            - self.transfers_from_past
            - self.debt_borrow_past
            - self.debt_return_from_past
    }

    /// Total inflows within the collection year.
    pub fn incomes(&self) -> f64 {
        self.incomes_now
            + self.transfers_to_now
            + self.saving_close_to_now
            + self.debt_lend_now
            + self.debt_return_to_now
    }

    /// Total outflows within the collection year, as a non-negative magnitude.
    pub fn expenses(&self) -> f64 {
        (self.expenses_now
            + self.savings_now
            + self.transfers_from_now
            + self.debt_borrow_now
            + self.debt_return_from_now)
            .abs()
    }

    /// The closing balance: `past + incomes - expenses`.
    pub fn balance(&self) -> f64 {
        self.past() + self.incomes() - self.expenses()
    }
}

type Accumulate = fn(&mut AccountSummary, past: f64, now: f64);

/// Which ledger queries feed the account scope, and into which columns.
const ACCOUNT_QUERIES: [(RecordKind, Side, Accumulate); 10] = [
    (RecordKind::Income, Side::Dest, |row, past, now| {
        row.incomes_past += past;
        row.incomes_now += now;
    }),
    (RecordKind::Expense, Side::Source, |row, past, now| {
        row.expenses_past += past;
        row.expenses_now += now;
    }),
    (RecordKind::Saving, Side::Source, |row, past, now| {
        row.savings_past += past;
        row.savings_now += now;
    }),
    (RecordKind::Transfer, Side::Dest, |row, past, now| {
        row.transfers_to_past += past;
        row.transfers_to_now += now;
    }),
    (RecordKind::Transfer, Side::Source, |row, past, now| {
        row.transfers_from_past += past;
        row.transfers_from_now += now;
    }),
    (RecordKind::SavingClose, Side::Dest, |row, past, now| {
        row.saving_close_to_past += past;
        row.saving_close_to_now += now;
    }),
    (RecordKind::DebtLend, Side::Dest, |row, past, now| {
        row.debt_lend_past += past;
        row.debt_lend_now += now;
    }),
    (RecordKind::DebtBorrow, Side::Source, |row, past, now| {
        row.debt_borrow_past += past;
        row.debt_borrow_now += now;
    }),
    (RecordKind::DebtReturn, Side::Dest, |row, past, now| {
        row.debt_return_to_past += past;
        row.debt_return_to_now += now;
    }),
    (RecordKind::DebtReturn, Side::Source, |row, past, now| {
        row.debt_return_from_past += past;
        row.debt_return_from_now += now;
    }),
];

/// Collect one [AccountSummary] per requested account for `year`.
///
/// The result has exactly one row per entry of `categories`, in the same
/// order, even when a row is all zeros. Totals for categories outside the
/// requested set are skipped and logged; an empty `categories` returns
/// empty without querying.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn collect(
    journal_id: JournalId,
    year: i32,
    categories: &[CategoryId],
    connection: &Connection,
) -> Result<Vec<AccountSummary>, Error> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows: Vec<AccountSummary> = categories
        .iter()
        .map(|&category_id| AccountSummary {
            category_id,
            ..AccountSummary::default()
        })
        .collect();
    let index: HashMap<CategoryId, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, &category_id)| (category_id, i))
        .collect();

    for (kind, side, accumulate) in ACCOUNT_QUERIES {
        for totals in kind_totals(journal_id, kind, side, year, connection)? {
            let Some(&i) = index.get(&totals.category_id) else {
                tracing::warn!(
                    category_id = totals.category_id,
                    kind = %kind,
                    "skipping totals for a category outside the requested set"
                );
                continue;
            };

            accumulate(
                &mut rows[i],
                money::from_cents(totals.past),
                money::from_cents(totals.current),
            );
        }
    }

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod collect_tests {
    use rusqlite::Connection;

    use crate::{
        category::{CategoryKind, create_category},
        db::initialize,
        journal::create_journal,
    };

    use super::collect;

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn insert_record(
        journal_id: i64,
        kind: &str,
        date: &str,
        amount: i64,
        source_id: Option<i64>,
        dest_id: Option<i64>,
        connection: &Connection,
    ) {
        connection
            .execute(
                "INSERT INTO record (journal_id, kind, date, amount, source_id, dest_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (journal_id, kind, date, amount, source_id, dest_id),
            )
            .unwrap();
    }

    #[test]
    fn empty_category_set_returns_empty() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();

        let got = collect(journal.id, 1999, &[], &connection).unwrap();

        assert!(got.is_empty());
    }

    #[test]
    fn accounts_without_records_get_zero_rows() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();

        let got = collect(journal.id, 1999, &[wallet.id], &connection).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].category_id, wallet.id);
        assert_eq!(got[0].balance(), 0.0);
    }

    #[test]
    fn every_kind_lands_in_its_column() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        let fund =
            create_category(journal.id, CategoryKind::SavingFund, "Fund", &connection).unwrap();

        insert_record(journal.id, "income", "1998-01-01", 10000, None, Some(wallet.id), &connection);
        insert_record(journal.id, "income", "1999-01-01", 2000, None, Some(wallet.id), &connection);
        insert_record(journal.id, "expense", "1999-02-01", 500, Some(wallet.id), None, &connection);
        insert_record(journal.id, "saving", "1999-03-01", 300, Some(wallet.id), Some(fund.id), &connection);
        insert_record(journal.id, "transfer", "1999-04-01", 700, Some(wallet.id), Some(bank.id), &connection);
        insert_record(journal.id, "saving_close", "1999-05-01", 150, Some(fund.id), Some(wallet.id), &connection);
        insert_record(journal.id, "debt_lend", "1999-06-01", 80, None, Some(wallet.id), &connection);
        insert_record(journal.id, "debt_borrow", "1999-07-01", 60, Some(wallet.id), None, &connection);
        insert_record(journal.id, "debt_return", "1999-08-01", 40, Some(bank.id), Some(wallet.id), &connection);

        let got = collect(journal.id, 1999, &[wallet.id, bank.id], &connection).unwrap();

        let wallet_row = &got[0];
        assert_eq!(wallet_row.incomes_past, 100.0);
        assert_eq!(wallet_row.incomes_now, 20.0);
        assert_eq!(wallet_row.expenses_now, 5.0);
        assert_eq!(wallet_row.savings_now, 3.0);
        assert_eq!(wallet_row.transfers_from_now, 7.0);
        assert_eq!(wallet_row.saving_close_to_now, 1.5);
        assert_eq!(wallet_row.debt_lend_now, 0.8);
        assert_eq!(wallet_row.debt_borrow_now, 0.6);
        assert_eq!(wallet_row.debt_return_to_now, 0.4);

        let bank_row = &got[1];
        assert_eq!(bank_row.transfers_to_now, 7.0);
        assert_eq!(bank_row.debt_return_from_now, 0.4);
    }

    #[test]
    fn skips_totals_for_categories_outside_the_set() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        insert_record(journal.id, "income", "1999-01-01", 100, None, Some(wallet.id), &connection);
        insert_record(journal.id, "income", "1999-01-01", 900, None, Some(bank.id), &connection);

        let got = collect(journal.id, 1999, &[wallet.id], &connection).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].incomes_now, 1.0);
    }
}
