//! Defines categories, the money holders that balances are kept for.
//!
//! A category is either an account (wallet, bank account, cash) or a saving
//! fund (pension pot, index fund). Both live in one table discriminated by
//! [CategoryKind] so that records can reference either side uniformly.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, journal::JournalId};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a category.
pub type CategoryId = i64;

/// Distinguishes accounts from saving funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    /// Everyday money: wallets, bank accounts, cash.
    Account,
    /// Long-term money: pension pots, funds, shares.
    SavingFund,
}

impl CategoryKind {
    /// The string stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Account => "account",
            CategoryKind::SavingFund => "saving_fund",
        }
    }
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for CategoryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for CategoryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "account" => Ok(CategoryKind::Account),
            "saving_fund" => Ok(CategoryKind::SavingFund),
            other => Err(FromSqlError::Other(
                format!("unknown category kind \"{other}\"").into(),
            )),
        }
    }
}

/// An account or saving fund that records move money in and out of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The journal the category belongs to.
    pub journal_id: JournalId,
    /// Whether this is an account or a saving fund.
    pub kind: CategoryKind,
    /// The display title, unique per journal and kind.
    pub title: String,
    /// The last year the category is shown in listings, if it was closed.
    ///
    /// Closing only hides the category from listings after that year. Its
    /// records stay in the ledger and its balance rows keep being maintained,
    /// otherwise transfers out of a closed account would unbalance the books.
    pub closed: Option<i32>,
}

impl Category {
    /// Whether the category should appear in listings for `year`.
    pub fn is_active(&self, year: i32) -> bool {
        self.closed.is_none_or(|closed| closed >= year)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                journal_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                closed INTEGER,
                FOREIGN KEY(journal_id) REFERENCES journal(id) ON UPDATE CASCADE ON DELETE CASCADE,
                UNIQUE(journal_id, kind, title)
            );

            CREATE INDEX IF NOT EXISTS idx_category_journal_kind ON category(journal_id, kind);",
    )?;

    Ok(())
}

/// Create a category and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyTitle] if `title` is empty or whitespace,
/// - or [Error::DuplicateTitle] if the journal already has a category of this
///   kind with the same title,
/// - or [Error::NotFound] if `journal_id` does not refer to a valid journal,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    journal_id: JournalId,
    kind: CategoryKind,
    title: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let title = title.trim();

    if title.is_empty() {
        return Err(Error::EmptyTitle);
    }

    connection
        .prepare(
            "INSERT INTO category (journal_id, kind, title)
             VALUES (?1, ?2, ?3)
             RETURNING id, journal_id, kind, title, closed",
        )?
        .query_row((journal_id, kind, title), map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateTitle(title.to_owned()),
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })
}

/// Retrieve a category from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare("SELECT id, journal_id, kind, title, closed FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], map_category_row)?;

    Ok(category)
}

/// Set or clear the year a category was closed.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_category_closed(
    id: CategoryId,
    closed: Option<i32>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected =
        connection.execute("UPDATE category SET closed = ?1 WHERE id = ?2", (closed, id))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Retrieve the accounts of a journal that are active in `year`, ordered by
/// title.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn accounts(
    journal_id: JournalId,
    year: i32,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    active_of_kind(journal_id, CategoryKind::Account, year, connection)
}

/// Retrieve the saving funds of a journal that are active in `year`, ordered
/// by title.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn saving_funds(
    journal_id: JournalId,
    year: i32,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    active_of_kind(journal_id, CategoryKind::SavingFund, year, connection)
}

/// Retrieve every category of a journal with the given kind, closed ones
/// included.
///
/// Aggregation always runs over this set: a closed account still holds the
/// history that later balances carry forward.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn get_all_of_kind(
    journal_id: JournalId,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, journal_id, kind, title, closed FROM category
             WHERE journal_id = :journal_id AND kind = :kind
             ORDER BY title ASC",
        )?
        .query_map(
            &[
                (":journal_id", &journal_id as &dyn ToSql),
                (":kind", &kind),
            ],
            map_category_row,
        )?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

fn active_of_kind(
    journal_id: JournalId,
    kind: CategoryKind,
    year: i32,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, journal_id, kind, title, closed FROM category
             WHERE journal_id = :journal_id AND kind = :kind
               AND (closed IS NULL OR closed >= :year)
             ORDER BY title ASC",
        )?
        .query_map(
            &[
                (":journal_id", &journal_id as &dyn ToSql),
                (":kind", &kind),
                (":year", &year),
            ],
            map_category_row,
        )?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let journal_id = row.get(1)?;
    let kind = row.get(2)?;
    let title = row.get(3)?;
    let closed = row.get(4)?;

    Ok(Category {
        id,
        journal_id,
        kind,
        title,
        closed,
    })
}

// ============================================================================
// TESTS
// ============================================================================
