//! The ledger query layer: grouped cent sums per record kind and side, split
//! into "past" (years before the requested year) and "current" (the requested
//! year itself).
//!
//! One SQL query per (kind, side) delivers both splits at once, so a balance
//! recomputation touches the record table a fixed number of times per year.

use rusqlite::{Connection, ToSql};

use crate::{Error, category::CategoryId, journal::JournalId, record::RecordKind};

/// Which category reference of a record to group by.
///
/// A two-sided record is an outflow for its source and an inflow for its
/// destination, so both sides are queried separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Group by the category money left.
    Source,
    /// Group by the category money arrived in.
    Dest,
}

impl Side {
    fn column(&self) -> &'static str {
        match self {
            Side::Source => "source_id",
            Side::Dest => "dest_id",
        }
    }
}

/// Cent sums of one record kind for one category, split around a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindTotals {
    /// The category the sums are grouped under.
    pub category_id: CategoryId,
    /// Sum of amounts dated strictly before the requested year.
    pub past: i64,
    /// Sum of amounts dated within the requested year.
    pub current: i64,
    /// Sum of fees dated strictly before the requested year.
    pub fee_past: i64,
    /// Sum of fees dated within the requested year.
    pub fee_current: i64,
}

/// Sum one kind's amounts and fees per category on the given side.
///
/// Categories without any matching record are absent from the result; an
/// empty ledger yields an empty vector, never an error.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn kind_totals(
    journal_id: JournalId,
    kind: RecordKind,
    side: Side,
    year: i32,
    connection: &Connection,
) -> Result<Vec<KindTotals>, Error> {
    let column = side.column();
    let query = format!(
        "SELECT category_id,
                COALESCE(SUM(CASE WHEN year < :year THEN amount END), 0),
                COALESCE(SUM(CASE WHEN year = :year THEN amount END), 0),
                COALESCE(SUM(CASE WHEN year < :year THEN fee END), 0),
                COALESCE(SUM(CASE WHEN year = :year THEN fee END), 0)
         FROM (SELECT {column} AS category_id,
                      amount,
                      COALESCE(fee, 0) AS fee,
                      CAST(strftime('%Y', date) AS INTEGER) AS year
               FROM record
               WHERE journal_id = :journal_id AND kind = :kind AND {column} IS NOT NULL)
         GROUP BY category_id
         ORDER BY category_id ASC"
    );

    connection
        .prepare(&query)?
        .query_map(
            &[
                (":journal_id", &journal_id as &dyn ToSql),
                (":kind", &kind),
                (":year", &year),
            ],
            |row| {
                Ok(KindTotals {
                    category_id: row.get(0)?,
                    past: row.get(1)?,
                    current: row.get(2)?,
                    fee_past: row.get(3)?,
                    fee_current: row.get(4)?,
                })
            },
        )?
        .map(|maybe_totals| maybe_totals.map_err(|error| error.into()))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod kind_totals_tests {
    use rusqlite::Connection;

    use crate::{
        category::{CategoryKind, create_category},
        db::initialize,
        journal::create_journal,
        record::RecordKind,
    };

    use super::{KindTotals, Side, kind_totals};

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
        fee: Option<i64>,
        source_id: Option<i64>,
        dest_id: Option<i64>,
        connection: &Connection,
    ) {
        connection
            .execute(
                "INSERT INTO record (journal_id, kind, date, amount, fee, source_id, dest_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (journal_id, kind, date, amount, fee, source_id, dest_id),
            )
            .unwrap();
    }

    #[test]
    fn splits_sums_around_the_year() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        insert_record(journal.id, "income", "1998-01-01", 400, None, None, Some(wallet.id), &connection);
        insert_record(journal.id, "income", "1998-06-01", 100, None, None, Some(wallet.id), &connection);
        insert_record(journal.id, "income", "1999-01-01", 200, None, None, Some(wallet.id), &connection);
        insert_record(journal.id, "income", "2000-01-01", 999, None, None, Some(wallet.id), &connection);

        let got = kind_totals(journal.id, RecordKind::Income, Side::Dest, 1999, &connection)
            .expect("Could not sum incomes");

        assert_eq!(
            got,
            vec![KindTotals {
                category_id: wallet.id,
                past: 500,
                current: 200,
                fee_past: 0,
                fee_current: 0,
            }]
        );
    }

    #[test]
    fn sums_fees_alongside_amounts() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let fund =
            create_category(journal.id, CategoryKind::SavingFund, "Fund", &connection).unwrap();
        insert_record(journal.id, "saving", "1998-01-01", 1000, Some(10), None, Some(fund.id), &connection);
        insert_record(journal.id, "saving", "1999-03-01", 500, Some(5), None, Some(fund.id), &connection);
        insert_record(journal.id, "saving", "1999-09-01", 500, None, None, Some(fund.id), &connection);

        let got = kind_totals(journal.id, RecordKind::Saving, Side::Dest, 1999, &connection).unwrap();

        assert_eq!(
            got,
            vec![KindTotals {
                category_id: fund.id,
                past: 1000,
                current: 1000,
                fee_past: 10,
                fee_current: 5,
            }]
        );
    }

    #[test]
    fn sides_of_a_transfer_group_separately() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();
        let wallet =
            create_category(journal.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let bank = create_category(journal.id, CategoryKind::Account, "Bank", &connection).unwrap();
        insert_record(
            journal.id, "transfer", "1999-01-01", 20000, None, Some(wallet.id), Some(bank.id), &connection,
        );

        let from = kind_totals(journal.id, RecordKind::Transfer, Side::Source, 1999, &connection).unwrap();
        let to = kind_totals(journal.id, RecordKind::Transfer, Side::Dest, 1999, &connection).unwrap();

        assert_eq!(from.len(), 1);
        assert_eq!(from[0].category_id, wallet.id);
        assert_eq!(from[0].current, 20000);
        assert_eq!(to.len(), 1);
        assert_eq!(to[0].category_id, bank.id);
        assert_eq!(to[0].current, 20000);
    }

    #[test]
    fn scopes_by_journal_and_kind() {
        let connection = get_test_connection();
        let ours = create_journal("Ours", &connection).unwrap();
        let theirs = create_journal("Theirs", &connection).unwrap();
        let our_wallet =
            create_category(ours.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        let their_wallet =
            create_category(theirs.id, CategoryKind::Account, "Wallet", &connection).unwrap();
        insert_record(ours.id, "income", "1999-01-01", 100, None, None, Some(our_wallet.id), &connection);
        insert_record(ours.id, "expense", "1999-01-01", 70, None, Some(our_wallet.id), None, &connection);
        insert_record(theirs.id, "income", "1999-01-01", 999, None, None, Some(their_wallet.id), &connection);

        let got = kind_totals(ours.id, RecordKind::Income, Side::Dest, 1999, &connection).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].category_id, our_wallet.id);
        assert_eq!(got[0].current, 100);
    }

    #[test]
    fn empty_ledger_yields_empty_totals() {
        let connection = get_test_connection();
        let journal = create_journal("Household", &connection).unwrap();

        let got = kind_totals(journal.id, RecordKind::Income, Side::Dest, 1999, &connection).unwrap();

        assert_eq!(got, Vec::new());
    }
}
