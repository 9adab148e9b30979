//! Defines the crate level error type and conversions from SQLite errors.

use crate::category::CategoryId;

/// The errors that may occur while maintaining a ledger and its balances.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create a journal or category title.
    #[error("title cannot be empty")]
    EmptyTitle,

    /// The title already exists in the journal for the same kind of category.
    #[error("the title \"{0}\" already exists in the journal")]
    DuplicateTitle(String),

    /// A record referenced a category that does not exist, belongs to another
    /// journal, or has the wrong kind for the record's side.
    #[error("the category ID {0:?} does not refer to a valid category for this record")]
    InvalidCategory(Option<CategoryId>),

    /// A two-sided record referenced the same category on both sides.
    ///
    /// Transfers, debt returns and saving changes move money between two
    /// categories. Both sides pointing at one category is a caller bug rather
    /// than a zero-sum no-op, so it is rejected outright.
    #[error("both sides of the record refer to category {0}")]
    SameCategory(CategoryId),

    /// A record was missing the source or destination its kind requires.
    #[error("record is missing its {0} category")]
    MissingSide(&'static str),

    /// A record carried a source or destination its kind forbids.
    #[error("record must not have a {0} category")]
    UnexpectedSide(&'static str),

    /// A record was created with a negative amount or fee, in cents.
    #[error("amounts are stored as non-negative cents, got {0}")]
    NegativeAmount(i64),

    /// A stored record kind string could not be decoded.
    ///
    /// This only happens when the database was written by something other
    /// than this crate, so it is surfaced instead of being skipped.
    #[error("unknown record kind \"{0}\"")]
    UnknownRecordKind(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JsonError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
