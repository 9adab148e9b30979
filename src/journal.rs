//! Defines the journal, the owner scope for categories, records and balances.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::Error;

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a journal.
pub type JournalId = i64;

/// A self-contained set of books.
///
/// Every category, record and materialized balance row belongs to exactly one
/// journal. Queries never cross journals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// The ID of the journal.
    pub id: JournalId,
    /// The display title of the journal.
    pub title: String,
    /// The date of the earliest record in the journal, if any.
    ///
    /// Maintained by the record write path so that reporting pages know how
    /// far back the books go without scanning the ledger.
    pub first_record: Option<Date>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the journal table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_journal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS journal (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL UNIQUE,
                first_record TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Create a journal and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyTitle] if `title` is empty or whitespace,
/// - or [Error::DuplicateTitle] if a journal with the same title already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_journal(title: &str, connection: &Connection) -> Result<Journal, Error> {
    let title = title.trim();

    if title.is_empty() {
        return Err(Error::EmptyTitle);
    }

    connection
        .prepare(
            "INSERT INTO journal (title)
             VALUES (?1)
             RETURNING id, title, first_record",
        )?
        .query_row((title,), map_journal_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateTitle(title.to_owned()),
            error => error.into(),
        })
}

/// Retrieve a journal from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid journal,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_journal(id: JournalId, connection: &Connection) -> Result<Journal, Error> {
    let journal = connection
        .prepare("SELECT id, title, first_record FROM journal WHERE id = :id")?
        .query_row(&[(":id", &id)], map_journal_row)?;

    Ok(journal)
}

/// Recompute a journal's `first_record` from the ledger.
///
/// Called by the record write path after every mutation so the stored date
/// tracks creates, edits and deletes alike.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `journal_id` does not refer to a valid journal,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn refresh_first_record(journal_id: JournalId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE journal
         SET first_record = (SELECT MIN(date) FROM record WHERE journal_id = ?1)
         WHERE id = ?1",
        [journal_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_journal_row(row: &Row) -> Result<Journal, rusqlite::Error> {
    let id = row.get(0)?;
    let title = row.get(1)?;
    let first_record = row.get(2)?;

    Ok(Journal {
        id,
        title,
        first_record,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod create_journal_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::{create_journal, create_journal_table};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_journal_table(&connection).unwrap();
        connection
    }

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_journal_table(&connection));
    }

    #[test]
    fn create_journal_succeeds() {
        let connection = get_test_connection();

        let journal = create_journal("Household", &connection).expect("Could not create journal");

        assert!(journal.id > 0);
        assert_eq!(journal.title, "Household");
        assert_eq!(journal.first_record, None);
    }

    #[test]
    fn create_journal_trims_whitespace() {
        let connection = get_test_connection();

        let journal = create_journal("  Household  ", &connection).unwrap();

        assert_eq!(journal.title, "Household");
    }

    #[test]
    fn create_journal_fails_on_empty_title() {
        let connection = get_test_connection();

        assert_eq!(create_journal("", &connection), Err(Error::EmptyTitle));
        assert_eq!(
            create_journal("\n\t \r", &connection),
            Err(Error::EmptyTitle)
        );
    }

    #[test]
    fn create_journal_fails_on_duplicate_title() {
        let connection = get_test_connection();
        create_journal("Household", &connection).expect("Could not create journal");

        let result = create_journal("Household", &connection);

        assert_eq!(
            result,
            Err(Error::DuplicateTitle("Household".to_owned()))
        );
    }
}
