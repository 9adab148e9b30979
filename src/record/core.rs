//! Defines the core data model and the validated write path for ledger
//! records.
//!
//! All nine record kinds live in one table. The write path validates the
//! sides a kind requires, performs the mutation and re-synchronizes the
//! materialized balance tables in the same SQLite transaction, so a caller
//! never observes a ledger that disagrees with its balances.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    balance::sync::on_record_change,
    category::{CategoryId, CategoryKind, get_category},
    journal::{JournalId, refresh_first_record},
};

// ============================================================================
// MODELS
// ============================================================================

/// Database identifier for a record.
pub type RecordId = i64;

/// The kind of money movement a record describes.
///
/// The kind determines which sides a record must reference and with which
/// sign each side enters the balance formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Money earned into an account.
    Income,
    /// Money spent from an account.
    Expense,
    /// A contribution from an account into a saving fund.
    Saving,
    /// Money moved between two accounts.
    Transfer,
    /// A saving fund paid out into an account.
    SavingClose,
    /// Money moved between two saving funds.
    SavingChange,
    /// Money lent out, expected back into an account.
    DebtLend,
    /// Money borrowed out of an account's books.
    DebtBorrow,
    /// A debt paid back, from one account to another.
    DebtReturn,
}

/// The categories a record kind must reference, by side.
///
/// `None` means the side must be absent; `Some(kind)` means the side must
/// reference a category of that kind in the record's journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sides {
    /// The category money leaves, if the kind has one.
    pub source: Option<CategoryKind>,
    /// The category money arrives in, if the kind has one.
    pub dest: Option<CategoryKind>,
}

impl RecordKind {
    /// The string stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Income => "income",
            RecordKind::Expense => "expense",
            RecordKind::Saving => "saving",
            RecordKind::Transfer => "transfer",
            RecordKind::SavingClose => "saving_close",
            RecordKind::SavingChange => "saving_change",
            RecordKind::DebtLend => "debt_lend",
            RecordKind::DebtBorrow => "debt_borrow",
            RecordKind::DebtReturn => "debt_return",
        }
    }

    /// Which sides records of this kind carry.
    pub fn sides(&self) -> Sides {
        use CategoryKind::{Account, SavingFund};

        let (source, dest) = match self {
            RecordKind::Income => (None, Some(Account)),
            RecordKind::Expense => (Some(Account), None),
            RecordKind::Saving => (Some(Account), Some(SavingFund)),
            RecordKind::Transfer => (Some(Account), Some(Account)),
            RecordKind::SavingClose => (Some(SavingFund), Some(Account)),
            RecordKind::SavingChange => (Some(SavingFund), Some(SavingFund)),
            RecordKind::DebtLend => (None, Some(Account)),
            RecordKind::DebtBorrow => (Some(Account), None),
            RecordKind::DebtReturn => (Some(Account), Some(Account)),
        };

        Sides { source, dest }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "income" => Ok(RecordKind::Income),
            "expense" => Ok(RecordKind::Expense),
            "saving" => Ok(RecordKind::Saving),
            "transfer" => Ok(RecordKind::Transfer),
            "saving_close" => Ok(RecordKind::SavingClose),
            "saving_change" => Ok(RecordKind::SavingChange),
            "debt_lend" => Ok(RecordKind::DebtLend),
            "debt_borrow" => Ok(RecordKind::DebtBorrow),
            "debt_return" => Ok(RecordKind::DebtReturn),
            other => Err(Error::UnknownRecordKind(other.to_owned())),
        }
    }
}

impl ToSql for RecordKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RecordKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(error.to_string().into()))
    }
}

/// A single dated money movement in a journal's ledger.
///
/// To create a new `Record`, use [Record::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The ID of the record.
    pub id: RecordId,
    /// The journal the record belongs to.
    pub journal_id: JournalId,
    /// What kind of money movement this is.
    pub kind: RecordKind,
    /// When the money moved.
    pub date: Date,
    /// The amount moved, in cents. Never negative.
    pub amount: i64,
    /// An optional fee in cents, meaningful for saving-related kinds.
    pub fee: Option<i64>,
    /// The category money left, for kinds that have one.
    pub source_id: Option<CategoryId>,
    /// The category money arrived in, for kinds that have one.
    pub dest_id: Option<CategoryId>,
}

impl Record {
    /// Create a new record.
    ///
    /// Shortcut for [RecordBuilder] for discoverability.
    pub fn build(kind: RecordKind, date: Date, amount: i64) -> RecordBuilder {
        RecordBuilder {
            kind,
            date,
            amount,
            fee: None,
            source_id: None,
            dest_id: None,
        }
    }
}

/// A builder for creating [Record] instances.
///
/// Set the sides the kind requires with [RecordBuilder::source] and
/// [RecordBuilder::dest], then pass the builder to [create_record] or
/// [update_record].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBuilder {
    /// What kind of money movement this is.
    pub kind: RecordKind,
    /// When the money moved.
    pub date: Date,
    /// The amount moved, in cents.
    pub amount: i64,
    /// An optional fee in cents.
    pub fee: Option<i64>,
    /// The category money leaves.
    pub source_id: Option<CategoryId>,
    /// The category money arrives in.
    pub dest_id: Option<CategoryId>,
}

impl RecordBuilder {
    /// Set the fee, in cents.
    pub fn fee(mut self, fee: i64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Set the category money leaves.
    pub fn source(mut self, category_id: CategoryId) -> Self {
        self.source_id = Some(category_id);
        self
    }

    /// Set the category money arrives in.
    pub fn dest(mut self, category_id: CategoryId) -> Self {
        self.dest_id = Some(category_id);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the record table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_record_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS record (
                id INTEGER PRIMARY KEY,
                journal_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                date TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK(amount >= 0),
                fee INTEGER CHECK(fee >= 0),
                source_id INTEGER,
                dest_id INTEGER,
                FOREIGN KEY(journal_id) REFERENCES journal(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(source_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(dest_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_record_journal_kind_date ON record(journal_id, kind, date);
            CREATE INDEX IF NOT EXISTS idx_record_source ON record(source_id);
            CREATE INDEX IF NOT EXISTS idx_record_dest ON record(dest_id);",
    )?;

    Ok(())
}

/// Create a record and synchronize the balance tables it affects.
///
/// The insert and the balance maintenance run in one transaction, so either
/// both are visible or neither is. The journal's `first_record` date is
/// refreshed as part of the same transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if the amount or fee is negative,
/// - or [Error::MissingSide] / [Error::UnexpectedSide] if the builder's sides
///   do not match what the kind requires,
/// - or [Error::InvalidCategory] if a side references a category that does
///   not exist, belongs to another journal or has the wrong kind,
/// - or [Error::SameCategory] if both sides reference one category,
/// - or [Error::NotFound] if `journal_id` does not refer to a valid journal,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_record(
    journal_id: JournalId,
    builder: RecordBuilder,
    connection: &Connection,
) -> Result<Record, Error> {
    validate_builder(&builder, journal_id, connection)?;

    let transaction = connection.unchecked_transaction()?;

    let record = transaction
        .prepare(
            "INSERT INTO record (journal_id, kind, date, amount, fee, source_id, dest_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, journal_id, kind, date, amount, fee, source_id, dest_id",
        )?
        .query_row(
            (
                journal_id,
                builder.kind,
                builder.date,
                builder.amount,
                builder.fee,
                builder.source_id,
                builder.dest_id,
            ),
            map_record_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    on_record_change(None, Some(&record), &transaction)?;
    refresh_first_record(journal_id, &transaction)?;

    transaction.commit()?;

    Ok(record)
}

/// Overwrite a record with the builder's state and synchronize the balance
/// tables both the old and the new state affect.
///
/// Moving a record to another category or year cleans up the rows the old
/// state had claimed.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid record,
/// - or any validation error listed on [create_record],
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_record(
    id: RecordId,
    builder: RecordBuilder,
    connection: &Connection,
) -> Result<Record, Error> {
    let old = get_record(id, connection)?;
    validate_builder(&builder, old.journal_id, connection)?;

    let transaction = connection.unchecked_transaction()?;

    let new = transaction
        .prepare(
            "UPDATE record
             SET kind = ?1, date = ?2, amount = ?3, fee = ?4, source_id = ?5, dest_id = ?6
             WHERE id = ?7
             RETURNING id, journal_id, kind, date, amount, fee, source_id, dest_id",
        )?
        .query_row(
            (
                builder.kind,
                builder.date,
                builder.amount,
                builder.fee,
                builder.source_id,
                builder.dest_id,
                id,
            ),
            map_record_row,
        )?;

    on_record_change(Some(&old), Some(&new), &transaction)?;
    refresh_first_record(old.journal_id, &transaction)?;

    transaction.commit()?;

    Ok(new)
}

/// Delete a record and synchronize the balance tables it affected.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid record,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_record(id: RecordId, connection: &Connection) -> Result<(), Error> {
    let old = get_record(id, connection)?;

    let transaction = connection.unchecked_transaction()?;

    transaction.execute("DELETE FROM record WHERE id = ?1", [id])?;
    on_record_change(Some(&old), None, &transaction)?;
    refresh_first_record(old.journal_id, &transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Retrieve a record from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid record,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_record(id: RecordId, connection: &Connection) -> Result<Record, Error> {
    let record = connection
        .prepare(
            "SELECT id, journal_id, kind, date, amount, fee, source_id, dest_id
             FROM record WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_record_row)?;

    Ok(record)
}

/// Retrieve a journal's records for one calendar year, ordered by date.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn records_for_year(
    journal_id: JournalId,
    year: i32,
    connection: &Connection,
) -> Result<Vec<Record>, Error> {
    connection
        .prepare(
            "SELECT id, journal_id, kind, date, amount, fee, source_id, dest_id
             FROM record
             WHERE journal_id = :journal_id
               AND CAST(strftime('%Y', date) AS INTEGER) = :year
             ORDER BY date ASC, id ASC",
        )?
        .query_map(
            &[
                (":journal_id", &journal_id as &dyn ToSql),
                (":year", &year),
            ],
            map_record_row,
        )?
        .map(|maybe_record| maybe_record.map_err(|error| error.into()))
        .collect()
}

/// Map a database row to a [Record].
pub fn map_record_row(row: &Row) -> Result<Record, rusqlite::Error> {
    let id = row.get(0)?;
    let journal_id = row.get(1)?;
    let kind = row.get(2)?;
    let date = row.get(3)?;
    let amount = row.get(4)?;
    let fee = row.get(5)?;
    let source_id = row.get(6)?;
    let dest_id = row.get(7)?;

    Ok(Record {
        id,
        journal_id,
        kind,
        date,
        amount,
        fee,
        source_id,
        dest_id,
    })
}

fn validate_builder(
    builder: &RecordBuilder,
    journal_id: JournalId,
    connection: &Connection,
) -> Result<(), Error> {
    if builder.amount < 0 {
        return Err(Error::NegativeAmount(builder.amount));
    }

    if let Some(fee) = builder.fee {
        if fee < 0 {
            return Err(Error::NegativeAmount(fee));
        }
    }

    let sides = builder.kind.sides();
    validate_side(sides.source, builder.source_id, "source", journal_id, connection)?;
    validate_side(sides.dest, builder.dest_id, "destination", journal_id, connection)?;

    if let (Some(source_id), Some(dest_id)) = (builder.source_id, builder.dest_id) {
        if source_id == dest_id {
            return Err(Error::SameCategory(source_id));
        }
    }

    Ok(())
}

fn validate_side(
    required: Option<CategoryKind>,
    category_id: Option<CategoryId>,
    label: &'static str,
    journal_id: JournalId,
    connection: &Connection,
) -> Result<(), Error> {
    match (required, category_id) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(Error::UnexpectedSide(label)),
        (Some(_), None) => Err(Error::MissingSide(label)),
        (Some(kind), Some(id)) => {
            let category = get_category(id, connection).map_err(|error| match error {
                Error::NotFound => Error::InvalidCategory(Some(id)),
                error => error,
            })?;

            if category.journal_id != journal_id || category.kind != kind {
                return Err(Error::InvalidCategory(Some(id)));
            }

            Ok(())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================



#[cfg(test)]
mod record_query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        category::{CategoryKind, create_category},
        db::initialize,
        journal::create_journal,
    };

    use super::{
        Record, RecordKind, create_record, delete_record, get_record, records_for_year,
        update_record,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    #[test]
    fn get_record_succeeds() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let inserted = create_record(
            journal.id,
            Record::build(RecordKind::Income, date!(1999 - 01 - 01), 200).dest(wallet.id),
            &connection,
        )
        .unwrap();

        let got = get_record(inserted.id, &connection);

        assert_eq!(Ok(inserted), got);
    }

    #[test]
    fn get_record_with_invalid_id_returns_not_found() {
        let connection = get_test_connection();

        assert_eq!(get_record(999, &connection), Err(Error::NotFound));
    }

    #[test]
    fn update_record_overwrites_fields() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        let inserted = create_record(
            journal.id,
            Record::build(RecordKind::Income, date!(1999 - 01 - 01), 200).dest(wallet.id),
            &connection,
        )
        .unwrap();

        let updated = update_record(
            inserted.id,
            Record::build(RecordKind::Income, date!(1999 - 02 - 01), 300).dest(bank.id),
            &connection,
        )
        .expect("Could not update record");

        assert_eq!(updated.id, inserted.id);
        assert_eq!(updated.amount, 300);
        assert_eq!(updated.dest_id, Some(bank.id));
        assert_eq!(updated.date, date!(1999 - 02 - 01));
        assert_eq!(Ok(updated), get_record(inserted.id, &connection));
    }

    #[test]
    fn delete_record_removes_the_record() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let inserted = create_record(
            journal.id,
            Record::build(RecordKind::Income, date!(1999 - 01 - 01), 200).dest(wallet.id),
            &connection,
        )
        .unwrap();

        assert_eq!(Ok(()), delete_record(inserted.id, &connection));
        assert_eq!(get_record(inserted.id, &connection), Err(Error::NotFound));
        assert_eq!(delete_record(inserted.id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn records_for_year_filters_and_sorts() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        for (date, amount) in [
            (date!(1999 - 06 - 01), 200),
            (date!(1999 - 01 - 01), 100),
            (date!(2000 - 01 - 01), 300),
        ] {
            create_record(
                journal.id,
                Record::build(RecordKind::Income, date, amount).dest(wallet.id),
                &connection,
            )
            .unwrap();
        }

        let got = records_for_year(journal.id, 1999, &connection).unwrap();

        assert_eq!(
            vec![100, 200],
            got.iter().map(|record| record.amount).collect::<Vec<_>>()
        );
    }
}
