//! The materialized account balance table: one row per account and year.

use std::collections::HashMap;

use rusqlite::{Connection, Row, ToSql};
use serde::Serialize;
use time::Date;

use crate::{Error, category::CategoryId, journal::JournalId, money};

// ============================================================================
// MODELS
// ============================================================================

/// A materialized yearly balance for one account, in decimal amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalanceRow {
    /// The ID of the row.
    pub id: i64,
    /// The account the row belongs to.
    pub category_id: CategoryId,
    /// The calendar year the row describes.
    pub year: i32,
    /// The opening balance carried from all earlier years.
    pub past: f64,
    /// Inflows within the year.
    pub incomes: f64,
    /// Outflows within the year, as a non-negative magnitude.
    pub expenses: f64,
    /// The closing balance: `past + incomes - expenses`.
    pub balance: f64,
    /// The worth snapshot in effect at year end, zero when none exists.
    pub have: f64,
    /// `have - balance`: how far the books drift from reality.
    pub delta: f64,
    /// The date of the snapshot behind `have`, if any.
    pub latest_check: Option<Date>,
}

/// The computed column values of one row, in cents.
///
/// The synchronizer diffs these against stored rows; integer cents make that
/// comparison exact.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AccountBalanceValues {
    pub past: i64,
    pub incomes: i64,
    pub expenses: i64,
    pub balance: i64,
    pub have: i64,
    pub delta: i64,
    pub latest_check: Option<Date>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the account balance table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_account_balance_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_balance (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL,
                year INTEGER NOT NULL,
                past INTEGER NOT NULL,
                incomes INTEGER NOT NULL,
                expenses INTEGER NOT NULL,
                balance INTEGER NOT NULL,
                have INTEGER NOT NULL,
                delta INTEGER NOT NULL,
                latest_check TEXT,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
                UNIQUE(category_id, year)
                )",
        (),
    )?;

    Ok(())
}

/// Retrieve an account's balance rows across all years, earliest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn rows_for_category(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Vec<AccountBalanceRow>, Error> {
    connection
        .prepare(
            "SELECT id, category_id, year, past, incomes, expenses, balance, have, delta, latest_check
             FROM account_balance
             WHERE category_id = :category_id
             ORDER BY year ASC",
        )?
        .query_map(&[(":category_id", &category_id)], map_account_balance_row)?
        .map(|maybe_row| maybe_row.map_err(|error| error.into()))
        .collect()
}

/// Retrieve one account's balance row for one year.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if no row is materialized for that account and year,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn row_for_year(
    category_id: CategoryId,
    year: i32,
    connection: &Connection,
) -> Result<AccountBalanceRow, Error> {
    let row = connection
        .prepare(
            "SELECT id, category_id, year, past, incomes, expenses, balance, have, delta, latest_check
             FROM account_balance
             WHERE category_id = :category_id AND year = :year",
        )?
        .query_row(
            &[(":category_id", &category_id as &dyn ToSql), (":year", &year)],
            map_account_balance_row,
        )?;

    Ok(row)
}

/// Retrieve a journal's account balance rows for one year, ordered by
/// account title.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn rows_for_year(
    journal_id: JournalId,
    year: i32,
    connection: &Connection,
) -> Result<Vec<AccountBalanceRow>, Error> {
    connection
        .prepare(
            "SELECT account_balance.id, category_id, year, past, incomes, expenses, balance,
                    have, delta, latest_check
             FROM account_balance
             JOIN category ON category.id = account_balance.category_id
             WHERE category.journal_id = :journal_id AND year = :year
             ORDER BY category.title ASC",
        )?
        .query_map(
            &[(":journal_id", &journal_id as &dyn ToSql), (":year", &year)],
            map_account_balance_row,
        )?
        .map(|maybe_row| maybe_row.map_err(|error| error.into()))
        .collect()
}

/// Map a database row to an [AccountBalanceRow], converting cents to decimal.
pub fn map_account_balance_row(row: &Row) -> Result<AccountBalanceRow, rusqlite::Error> {
    Ok(AccountBalanceRow {
        id: row.get(0)?,
        category_id: row.get(1)?,
        year: row.get(2)?,
        past: money::from_cents(row.get(3)?),
        incomes: money::from_cents(row.get(4)?),
        expenses: money::from_cents(row.get(5)?),
        balance: money::from_cents(row.get(6)?),
        have: money::from_cents(row.get(7)?),
        delta: money::from_cents(row.get(8)?),
        latest_check: row.get(9)?,
    })
}

/// Load the stored rows for the given accounts, keyed by (category, year),
/// with raw cent values for exact diffing.
pub(crate) fn rows_by_key(
    categories: &[CategoryId],
    connection: &Connection,
) -> Result<HashMap<(CategoryId, i32), (i64, AccountBalanceValues)>, Error> {
    let mut statement = connection.prepare(
        "SELECT id, year, past, incomes, expenses, balance, have, delta, latest_check
         FROM account_balance
         WHERE category_id = :category_id",
    )?;

    let mut rows = HashMap::new();
    for &category_id in categories {
        let mapped = statement.query_map(&[(":category_id", &category_id)], |row| {
            let id: i64 = row.get(0)?;
            let year: i32 = row.get(1)?;
            let values = AccountBalanceValues {
                past: row.get(2)?,
                incomes: row.get(3)?,
                expenses: row.get(4)?,
                balance: row.get(5)?,
                have: row.get(6)?,
                delta: row.get(7)?,
                latest_check: row.get(8)?,
            };
            Ok((id, year, values))
        })?;

        for result in mapped {
            let (id, year, values) = result?;
            rows.insert((category_id, year), (id, values));
        }
    }

    Ok(rows)
}

pub(crate) fn insert_row(
    category_id: CategoryId,
    year: i32,
    values: &AccountBalanceValues,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO account_balance
            (category_id, year, past, incomes, expenses, balance, have, delta, latest_check)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            category_id,
            year,
            values.past,
            values.incomes,
            values.expenses,
            values.balance,
            values.have,
            values.delta,
            values.latest_check,
        ),
    )?;

    Ok(())
}

pub(crate) fn update_row(
    id: i64,
    values: &AccountBalanceValues,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account_balance
         SET past = ?1, incomes = ?2, expenses = ?3, balance = ?4, have = ?5, delta = ?6,
             latest_check = ?7
         WHERE id = ?8",
        (
            values.past,
            values.incomes,
            values.expenses,
            values.balance,
            values.have,
            values.delta,
            values.latest_check,
            id,
        ),
    )?;

    Ok(())
}

pub(crate) fn delete_row(id: i64, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM account_balance WHERE id = ?1", [id])?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod create_account_balance_table_tests {
    use rusqlite::Connection;

    use super::create_account_balance_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_account_balance_table(&connection));
    }
}

#[cfg(test)]
mod account_balance_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        category::{CategoryKind, create_category},
        db::initialize,
        journal::create_journal,
    };

    use super::{row_for_year, rows_for_category, rows_for_year};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn insert_row(
        category_id: i64,
        year: i32,
        past: i64,
        incomes: i64,
        expenses: i64,
        balance: i64,
        connection: &Connection,
    ) {
        connection
            .execute(
                "INSERT INTO account_balance
                    (category_id, year, past, incomes, expenses, balance, have, delta, latest_check)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, NULL)",
                (category_id, year, past, incomes, expenses, balance, -balance),
            )
            .unwrap();
    }

    #[test]
    fn rows_for_category_converts_cents_and_sorts_by_year() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        insert_row(wallet.id, 2000, 400, 200, 0, 600, &connection);
        insert_row(wallet.id, 1999, 0, 400, 0, 400, &connection);

        let got = rows_for_category(wallet.id, &connection).unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].year, 1999);
        assert_eq!(got[0].incomes, 4.0);
        assert_eq!(got[1].year, 2000);
        assert_eq!(got[1].past, 4.0);
        assert_eq!(got[1].balance, 6.0);
        assert_eq!(got[1].latest_check, None);
    }

    #[test]
    fn row_for_year_returns_not_found_when_absent() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();

        let result = row_for_year(wallet.id, 1999, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn rows_for_year_orders_by_account_title() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        insert_row(wallet.id, 1999, 0, 100, 0, 100, &connection);
        insert_row(bank.id, 1999, 0, 200, 0, 200, &connection);
        insert_row(bank.id, 2000, 200, 0, 0, 200, &connection);

        let got = rows_for_year(journal.id, 1999, &connection).unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].category_id, bank.id);
        assert_eq!(got[1].category_id, wallet.id);
    }
}
