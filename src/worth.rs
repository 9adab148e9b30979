//! Valuation snapshots: dated checks of how much money a category actually
//! holds.
//!
//! A snapshot is the only externally supplied figure in the balance tables.
//! Account rows show it as `have` (with `delta` against the computed
//! balance); saving rows use it as the `market_value` that profit is measured
//! against. The value carries forward as-of each year's end until a newer
//! snapshot exists.

use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    balance::sync::on_worth_change,
    category::{CategoryId, CategoryKind},
    journal::JournalId,
};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a worth snapshot.
pub type WorthId = i64;

/// A dated check of how much a category actually holds, in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worth {
    /// The ID of the snapshot.
    pub id: WorthId,
    /// The category that was checked.
    pub category_id: CategoryId,
    /// When the check was made.
    pub date: Date,
    /// The amount found, in cents. Never negative.
    pub amount: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the worth table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_worth_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS worth (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK(amount >= 0),
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_worth_category_date ON worth(category_id, date);",
    )?;

    Ok(())
}

/// Record a worth snapshot and re-synchronize the category's balance rows.
///
/// The insert and the balance maintenance run in one transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if `amount` is negative,
/// - or [Error::InvalidCategory] if `category_id` does not refer to a valid
///   category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_worth(
    category_id: CategoryId,
    date: Date,
    amount: i64,
    connection: &Connection,
) -> Result<Worth, Error> {
    if amount < 0 {
        return Err(Error::NegativeAmount(amount));
    }

    let transaction = connection.unchecked_transaction()?;

    let worth = transaction
        .prepare(
            "INSERT INTO worth (category_id, date, amount)
             VALUES (?1, ?2, ?3)
             RETURNING id, category_id, date, amount",
        )?
        .query_row((category_id, date, amount), map_worth_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(Some(category_id)),
            error => error.into(),
        })?;

    on_worth_change(category_id, date.year(), &transaction)?;

    transaction.commit()?;

    Ok(worth)
}

/// Retrieve the latest snapshot per category of a journal, ordered by
/// category title.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn latest_worths(
    journal_id: JournalId,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Vec<Worth>, Error> {
    connection
        .prepare(
            "SELECT worth.id, worth.category_id, worth.date, worth.amount
             FROM worth
             JOIN category ON category.id = worth.category_id
             WHERE category.journal_id = :journal_id
               AND category.kind = :kind
               AND worth.id = (SELECT id FROM worth AS latest
                               WHERE latest.category_id = worth.category_id
                               ORDER BY latest.date DESC, latest.id DESC
                               LIMIT 1)
             ORDER BY category.title ASC",
        )?
        .query_map(
            &[
                (":journal_id", &journal_id as &dyn ToSql),
                (":kind", &kind),
            ],
            map_worth_row,
        )?
        .map(|maybe_worth| maybe_worth.map_err(|error| error.into()))
        .collect()
}

/// The snapshot in effect at the end of `year`: the latest one dated within
/// or before that year, if any.
pub(crate) fn as_of_year_end(
    category_id: CategoryId,
    year: i32,
    connection: &Connection,
) -> Result<Option<(Date, i64)>, Error> {
    let result = connection
        .prepare(
            "SELECT date, amount FROM worth
             WHERE category_id = :category_id
               AND CAST(strftime('%Y', date) AS INTEGER) <= :year
             ORDER BY date DESC, id DESC
             LIMIT 1",
        )?
        .query_row(
            &[(":category_id", &category_id as &dyn ToSql), (":year", &year)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

    match result {
        Ok(pair) => Ok(Some(pair)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn map_worth_row(row: &Row) -> Result<Worth, rusqlite::Error> {
    let id = row.get(0)?;
    let category_id = row.get(1)?;
    let date = row.get(2)?;
    let amount = row.get(3)?;

    Ok(Worth {
        id,
        category_id,
        date,
        amount,
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod worth_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        category::{CategoryKind, create_category},
        db::initialize,
        journal::create_journal,
    };

    use super::{as_of_year_end, latest_worths, record_worth};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    #[test]
    fn latest_worths_picks_the_newest_snapshot_per_category() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        record_worth(wallet.id, date!(1999 - 01 - 01), 100, &connection).unwrap();
        record_worth(wallet.id, date!(2000 - 01 - 01), 200, &connection).unwrap();
        record_worth(bank.id, date!(1999 - 06 - 01), 300, &connection).unwrap();

        let got = latest_worths(journal.id, CategoryKind::Account, &connection).unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].category_id, bank.id);
        assert_eq!(got[0].amount, 300);
        assert_eq!(got[1].category_id, wallet.id);
        assert_eq!(got[1].amount, 200);
    }

    #[test]
    fn as_of_year_end_carries_forward_across_gap_years() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let fund =
            create_category(journal.id, CategoryKind::SavingFund, "Fund", &connection).unwrap();
        record_worth(fund.id, date!(1999 - 06 - 01), 500, &connection).unwrap();

        assert_eq!(
            as_of_year_end(fund.id, 2002, &connection).unwrap(),
            Some((date!(1999 - 06 - 01), 500))
        );
        assert_eq!(as_of_year_end(fund.id, 1998, &connection).unwrap(), None);
    }

    #[test]
    fn as_of_year_end_prefers_the_latest_snapshot_in_range() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let fund =
            create_category(journal.id, CategoryKind::SavingFund, "Fund", &connection).unwrap();
        record_worth(fund.id, date!(1999 - 01 - 01), 100, &connection).unwrap();
        record_worth(fund.id, date!(1999 - 12 - 01), 150, &connection).unwrap();
        record_worth(fund.id, date!(2001 - 01 - 01), 999, &connection).unwrap();

        assert_eq!(
            as_of_year_end(fund.id, 2000, &connection).unwrap(),
            Some((date!(1999 - 12 - 01), 150))
        );
    }
}
