//! The materialized saving balance table: one row per saving fund and year.

use std::collections::HashMap;

use rusqlite::{Connection, Row, ToSql};
use serde::Serialize;
use time::Date;

use crate::{Error, category::CategoryId, journal::JournalId, money, report::YearRecord};

// ============================================================================
// MODELS
// ============================================================================

/// A materialized yearly balance for one saving fund, in decimal amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingBalanceRow {
    /// The ID of the row.
    pub id: i64,
    /// The saving fund the row belongs to.
    pub category_id: CategoryId,
    /// The calendar year the row describes.
    pub year: i32,
    /// Contributions carried from all earlier years.
    pub past_amount: f64,
    /// Contribution fees carried from all earlier years.
    pub past_fee: f64,
    /// Contributions within the year.
    pub per_year_incomes: f64,
    /// Contribution fees within the year.
    pub per_year_fee: f64,
    /// Cumulative contribution fees through the year.
    pub fee: f64,
    /// Cumulative contributions through the year.
    pub incomes: f64,
    /// Cumulative money taken out through the year.
    pub sold: f64,
    /// Cumulative fees on money taken out.
    pub sold_fee: f64,
    /// Net money still in the fund, floored at zero.
    pub invested: f64,
    /// The worth snapshot in effect at year end, zero when none exists.
    pub market_value: f64,
    /// `market_value - invested`.
    pub profit_sum: f64,
    /// The profit as a percentage of `invested`, zero when nothing is
    /// invested.
    pub profit_proc: f64,
    /// The date of the snapshot behind `market_value`, if any.
    pub latest_check: Option<Date>,
}

/// The computed column values of one row; money in cents, percentage as-is.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SavingBalanceValues {
    pub past_amount: i64,
    pub past_fee: i64,
    pub per_year_incomes: i64,
    pub per_year_fee: i64,
    pub fee: i64,
    pub incomes: i64,
    pub sold: i64,
    pub sold_fee: i64,
    pub invested: i64,
    pub market_value: i64,
    pub profit_sum: i64,
    pub profit_proc: f64,
    pub latest_check: Option<Date>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the saving balance table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_saving_balance_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS saving_balance (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL,
                year INTEGER NOT NULL,
                past_amount INTEGER NOT NULL,
                past_fee INTEGER NOT NULL,
                per_year_incomes INTEGER NOT NULL,
                per_year_fee INTEGER NOT NULL,
                fee INTEGER NOT NULL,
                incomes INTEGER NOT NULL,
                sold INTEGER NOT NULL,
                sold_fee INTEGER NOT NULL,
                invested INTEGER NOT NULL,
                market_value INTEGER NOT NULL,
                profit_sum INTEGER NOT NULL,
                profit_proc REAL NOT NULL,
                latest_check TEXT,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
                UNIQUE(category_id, year)
                )",
        (),
    )?;

    Ok(())
}

/// Retrieve a saving fund's balance rows across all years, earliest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn rows_for_category(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Vec<SavingBalanceRow>, Error> {
    connection
        .prepare(&format!(
            "SELECT {COLUMNS} FROM saving_balance
             WHERE category_id = :category_id
             ORDER BY year ASC"
        ))?
        .query_map(&[(":category_id", &category_id)], map_saving_balance_row)?
        .map(|maybe_row| maybe_row.map_err(|error| error.into()))
        .collect()
}

/// Retrieve one saving fund's balance row for one year.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if no row is materialized for that fund and year,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn row_for_year(
    category_id: CategoryId,
    year: i32,
    connection: &Connection,
) -> Result<SavingBalanceRow, Error> {
    let row = connection
        .prepare(&format!(
            "SELECT {COLUMNS} FROM saving_balance
             WHERE category_id = :category_id AND year = :year"
        ))?
        .query_row(
            &[(":category_id", &category_id as &dyn ToSql), (":year", &year)],
            map_saving_balance_row,
        )?;

    Ok(row)
}

/// Retrieve a journal's saving balance rows for one year, ordered by fund
/// title.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn rows_for_year(
    journal_id: JournalId,
    year: i32,
    connection: &Connection,
) -> Result<Vec<SavingBalanceRow>, Error> {
    connection
        .prepare(&format!(
            "SELECT {COLUMNS} FROM saving_balance
             JOIN category ON category.id = saving_balance.category_id
             WHERE category.journal_id = :journal_id AND year = :year
             ORDER BY category.title ASC"
        ))?
        .query_map(
            &[(":journal_id", &journal_id as &dyn ToSql), (":year", &year)],
            map_saving_balance_row,
        )?
        .map(|maybe_row| maybe_row.map_err(|error| error.into()))
        .collect()
}

/// Sum a journal's invested and profit amounts per year across all saving
/// funds, earliest year first.
///
/// This is the series [crate::report::chart_series] merges.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn sum_by_year(
    journal_id: JournalId,
    connection: &Connection,
) -> Result<Vec<YearRecord>, Error> {
    connection
        .prepare(
            "SELECT year, SUM(invested), SUM(profit_sum)
             FROM saving_balance
             JOIN category ON category.id = saving_balance.category_id
             WHERE category.journal_id = :journal_id
             GROUP BY year
             ORDER BY year ASC",
        )?
        .query_map(&[(":journal_id", &journal_id)], |row| {
            Ok(YearRecord {
                year: row.get(0)?,
                invested: money::from_cents(row.get(1)?),
                profit: money::from_cents(row.get(2)?),
            })
        })?
        .map(|maybe_record| maybe_record.map_err(|error| error.into()))
        .collect()
}

const COLUMNS: &str = "saving_balance.id, category_id, year, past_amount, past_fee, \
     per_year_incomes, per_year_fee, fee, incomes, sold, sold_fee, invested, \
     market_value, profit_sum, profit_proc, latest_check";

/// Map a database row to a [SavingBalanceRow], converting cents to decimal.
pub fn map_saving_balance_row(row: &Row) -> Result<SavingBalanceRow, rusqlite::Error> {
    Ok(SavingBalanceRow {
        id: row.get(0)?,
        category_id: row.get(1)?,
        year: row.get(2)?,
        past_amount: money::from_cents(row.get(3)?),
        past_fee: money::from_cents(row.get(4)?),
        per_year_incomes: money::from_cents(row.get(5)?),
        per_year_fee: money::from_cents(row.get(6)?),
        fee: money::from_cents(row.get(7)?),
        incomes: money::from_cents(row.get(8)?),
        sold: money::from_cents(row.get(9)?),
        sold_fee: money::from_cents(row.get(10)?),
        invested: money::from_cents(row.get(11)?),
        market_value: money::from_cents(row.get(12)?),
        profit_sum: money::from_cents(row.get(13)?),
        profit_proc: row.get(14)?,
        latest_check: row.get(15)?,
    })
}

/// Load the stored rows for the given funds, keyed by (category, year), with
/// raw cent values for exact diffing.
pub(crate) fn rows_by_key(
    categories: &[CategoryId],
    connection: &Connection,
) -> Result<HashMap<(CategoryId, i32), (i64, SavingBalanceValues)>, Error> {
    let mut statement = connection.prepare(
        "SELECT id, year, past_amount, past_fee, per_year_incomes, per_year_fee, fee,
                incomes, sold, sold_fee, invested, market_value, profit_sum, profit_proc,
                latest_check
         FROM saving_balance
         WHERE category_id = :category_id",
    )?;

    let mut rows = HashMap::new();
    for &category_id in categories {
        let mapped = statement.query_map(&[(":category_id", &category_id)], |row| {
            let id: i64 = row.get(0)?;
            let year: i32 = row.get(1)?;
            let values = SavingBalanceValues {
                past_amount: row.get(2)?,
                past_fee: row.get(3)?,
                per_year_incomes: row.get(4)?,
                per_year_fee: row.get(5)?,
                fee: row.get(6)?,
                incomes: row.get(7)?,
                sold: row.get(8)?,
                sold_fee: row.get(9)?,
                invested: row.get(10)?,
                market_value: row.get(11)?,
                profit_sum: row.get(12)?,
                profit_proc: row.get(13)?,
                latest_check: row.get(14)?,
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
    values: &SavingBalanceValues,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO saving_balance
            (category_id, year, past_amount, past_fee, per_year_incomes, per_year_fee, fee,
             incomes, sold, sold_fee, invested, market_value, profit_sum, profit_proc,
             latest_check)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        (
            category_id,
            year,
            values.past_amount,
            values.past_fee,
            values.per_year_incomes,
            values.per_year_fee,
            values.fee,
            values.incomes,
            values.sold,
            values.sold_fee,
            values.invested,
            values.market_value,
            values.profit_sum,
            values.profit_proc,
            values.latest_check,
        ),
    )?;

    Ok(())
}

pub(crate) fn update_row(
    id: i64,
    values: &SavingBalanceValues,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE saving_balance
         SET past_amount = ?1, past_fee = ?2, per_year_incomes = ?3, per_year_fee = ?4,
             fee = ?5, incomes = ?6, sold = ?7, sold_fee = ?8, invested = ?9,
             market_value = ?10, profit_sum = ?11, profit_proc = ?12, latest_check = ?13
         WHERE id = ?14",
        (
            values.past_amount,
            values.past_fee,
            values.per_year_incomes,
            values.per_year_fee,
            values.fee,
            values.incomes,
            values.sold,
            values.sold_fee,
            values.invested,
            values.market_value,
            values.profit_sum,
            values.profit_proc,
            values.latest_check,
            id,
        ),
    )?;

    Ok(())
}

pub(crate) fn delete_row(id: i64, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM saving_balance WHERE id = ?1", [id])?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
