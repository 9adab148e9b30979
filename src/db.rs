//! Database schema setup.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    balance::{account::create_account_balance_table, saving::create_saving_balance_table},
    category::create_category_table,
    journal::create_journal_table,
    record::create_record_table,
    worth::create_worth_table,
};

/// Create all the tables the crate needs, if they do not exist yet.
///
/// Also turns on foreign key enforcement for the connection, which SQLite
/// leaves off by default.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_journal_table(&transaction)?;
    create_category_table(&transaction)?;
    create_record_table(&transaction)?;
    create_worth_table(&transaction)?;
    create_account_balance_table(&transaction)?;
    create_saving_balance_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
