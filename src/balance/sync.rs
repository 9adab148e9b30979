//! Keeps the materialized balance tables consistent with the ledger.
//!
//! The write path calls [on_record_change] (or [on_worth_change]) inside the
//! transaction that performed the mutation. The synchronizer recomputes the
//! affected categories from the ledger and diffs the result against the
//! stored rows, so re-running it without further mutations changes nothing.
//!
//! A category's materialized years are its *anchor years* (years with at
//! least one record on either side, or a worth snapshot) plus one carry row
//! at the latest anchor plus one, holding the opening state of the next
//! year. Rows outside that set are deleted on every pass; rows computing to
//! zero inside it are kept, since zero is a value and absence means "not
//! relevant".

use std::collections::{BTreeSet, HashMap};

use rusqlite::Connection;

use crate::{
    Error,
    balance::{
        account::{self as account_balance, AccountBalanceValues},
        saving::{self as saving_balance, SavingBalanceValues},
    },
    category::{self, CategoryId, CategoryKind},
    journal::JournalId,
    money,
    record::Record,
    summary::{account::AccountSummary, saving::SavingSummary},
    worth,
};

/// Re-synchronize every balance row affected by one record mutation.
///
/// Pass the record's state before and after: `(None, Some)` for a create,
/// `(Some, Some)` for an update and `(Some, None)` for a delete. Every
/// category referenced by either state is recomputed from the earliest
/// touched year onward, in both scopes the record's sides belong to.
///
/// Must run inside the same transaction as the mutation itself so that a
/// failure rolls back both.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn on_record_change(
    old: Option<&Record>,
    new: Option<&Record>,
    connection: &Connection,
) -> Result<(), Error> {
    let Some(any) = new.or(old) else {
        return Ok(());
    };
    let journal_id = any.journal_id;

    let min_year = [old, new]
        .into_iter()
        .flatten()
        .map(|record| record.date.year())
        .min()
        .unwrap_or(i32::MIN);

    let mut accounts = BTreeSet::new();
    let mut funds = BTreeSet::new();
    for record in [old, new].into_iter().flatten() {
        for category_id in [record.source_id, record.dest_id].into_iter().flatten() {
            match category::get_category(category_id, connection) {
                Ok(category) => match category.kind {
                    CategoryKind::Account => {
                        accounts.insert(category.id);
                    }
                    CategoryKind::SavingFund => {
                        funds.insert(category.id);
                    }
                },
                // A side can dangle when its category was deleted between
                // the mutation and this sync; its rows are already gone via
                // the cascading foreign key.
                Err(Error::NotFound) => {
                    tracing::warn!(
                        record_id = record.id,
                        category_id,
                        "skipping sync for a missing category"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    let accounts: Vec<CategoryId> = accounts.into_iter().collect();
    let funds: Vec<CategoryId> = funds.into_iter().collect();

    sync_accounts(journal_id, &accounts, min_year, connection)?;
    sync_savings(journal_id, &funds, min_year, connection)?;

    Ok(())
}

/// Re-synchronize one category's balance rows after a worth snapshot landed
/// in `year`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `category_id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn on_worth_change(
    category_id: CategoryId,
    year: i32,
    connection: &Connection,
) -> Result<(), Error> {
    let category = category::get_category(category_id, connection)?;

    match category.kind {
        CategoryKind::Account => {
            sync_accounts(category.journal_id, &[category.id], year, connection)
        }
        CategoryKind::SavingFund => {
            sync_savings(category.journal_id, &[category.id], year, connection)
        }
    }
}

/// Rebuild every balance row of a journal from the ledger, in both scopes.
///
/// Regenerates rows that were lost out-of-band (for example a manually
/// emptied balance table) and prunes any leftovers. Runs in its own
/// transaction.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is some SQL error.
pub fn rebuild_journal(journal_id: JournalId, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    let accounts: Vec<CategoryId> =
        category::get_all_of_kind(journal_id, CategoryKind::Account, &transaction)?
            .into_iter()
            .map(|category| category.id)
            .collect();
    let funds: Vec<CategoryId> =
        category::get_all_of_kind(journal_id, CategoryKind::SavingFund, &transaction)?
            .into_iter()
            .map(|category| category.id)
            .collect();

    sync_accounts(journal_id, &accounts, i32::MIN, &transaction)?;
    sync_savings(journal_id, &funds, i32::MIN, &transaction)?;

    transaction.commit()?;

    Ok(())
}

fn sync_accounts(
    journal_id: JournalId,
    categories: &[CategoryId],
    min_year: i32,
    connection: &Connection,
) -> Result<(), Error> {
    if categories.is_empty() {
        return Ok(());
    }

    let (targets, years) = collect_targets(categories, min_year, connection)?;
    let existing = account_balance::rows_by_key(categories, connection)?;
    let (mut inserted, mut updated, mut deleted) = (0, 0, 0);

    for &year in &years {
        let summaries = crate::summary::account::collect(journal_id, year, categories, connection)?;

        for summary in summaries {
            let category_id = summary.category_id;
            if !targets[&category_id].contains(&year) {
                continue;
            }

            let values = account_values(&summary, year, connection)?;
            match existing.get(&(category_id, year)) {
                None => {
                    account_balance::insert_row(category_id, year, &values, connection)?;
                    inserted += 1;
                }
                Some((id, stored)) if *stored != values => {
                    account_balance::update_row(*id, &values, connection)?;
                    updated += 1;
                }
                Some(_) => {}
            }
        }
    }

    for ((category_id, year), (id, _)) in &existing {
        if !targets[category_id].contains(year) {
            account_balance::delete_row(*id, connection)?;
            deleted += 1;
        }
    }

    tracing::debug!(
        scope = "accounts",
        inserted,
        updated,
        deleted,
        "synchronized balance rows"
    );

    Ok(())
}

fn sync_savings(
    journal_id: JournalId,
    categories: &[CategoryId],
    min_year: i32,
    connection: &Connection,
) -> Result<(), Error> {
    if categories.is_empty() {
        return Ok(());
    }

    let (targets, years) = collect_targets(categories, min_year, connection)?;
    let existing = saving_balance::rows_by_key(categories, connection)?;
    let (mut inserted, mut updated, mut deleted) = (0, 0, 0);

    for &year in &years {
        let summaries = crate::summary::saving::collect(journal_id, year, categories, connection)?;

        for summary in summaries {
            let category_id = summary.category_id;
            if !targets[&category_id].contains(&year) {
                continue;
            }

            let values = saving_values(&summary, year, connection)?;
            match existing.get(&(category_id, year)) {
                None => {
                    saving_balance::insert_row(category_id, year, &values, connection)?;
                    inserted += 1;
                }
                Some((id, stored)) if *stored != values => {
                    saving_balance::update_row(*id, &values, connection)?;
                    updated += 1;
                }
                Some(_) => {}
            }
        }
    }

    for ((category_id, year), (id, _)) in &existing {
        if !targets[category_id].contains(year) {
            saving_balance::delete_row(*id, connection)?;
            deleted += 1;
        }
    }

    tracing::debug!(
        scope = "savings",
        inserted,
        updated,
        deleted,
        "synchronized balance rows"
    );

    Ok(())
}

/// The target years per category, and the union of those at or after
/// `min_year` that need recomputing.
fn collect_targets(
    categories: &[CategoryId],
    min_year: i32,
    connection: &Connection,
) -> Result<(HashMap<CategoryId, BTreeSet<i32>>, BTreeSet<i32>), Error> {
    let mut targets = HashMap::new();
    let mut years = BTreeSet::new();

    for &category_id in categories {
        let target = target_years(category_id, connection)?;
        years.extend(target.iter().copied().filter(|&year| year >= min_year));
        targets.insert(category_id, target);
    }

    Ok((targets, years))
}

/// A category's anchor years plus the carry year after the latest anchor.
fn target_years(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<BTreeSet<i32>, Error> {
    let mut years: BTreeSet<i32> = connection
        .prepare(
            "SELECT DISTINCT CAST(strftime('%Y', date) AS INTEGER) FROM record
             WHERE source_id = :category_id OR dest_id = :category_id
             UNION
             SELECT DISTINCT CAST(strftime('%Y', date) AS INTEGER) FROM worth
             WHERE category_id = :category_id",
        )?
        .query_map(&[(":category_id", &category_id)], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    if let Some(&last) = years.iter().next_back() {
        years.insert(last + 1);
    }

    Ok(years)
}

fn account_values(
    summary: &AccountSummary,
    year: i32,
    connection: &Connection,
) -> Result<AccountBalanceValues, Error> {
    let balance = money::to_cents_rounded(summary.balance());
    let (have, latest_check) = match worth::as_of_year_end(summary.category_id, year, connection)? {
        Some((date, amount)) => (amount, Some(date)),
        None => (0, None),
    };

    Ok(AccountBalanceValues {
        past: money::to_cents_rounded(summary.past()),
        incomes: money::to_cents_rounded(summary.incomes()),
        expenses: money::to_cents_rounded(summary.expenses()),
        balance,
        have,
        delta: have - balance,
        latest_check,
    })
}

fn saving_values(
    summary: &SavingSummary,
    year: i32,
    connection: &Connection,
) -> Result<SavingBalanceValues, Error> {
    let invested = money::to_cents_rounded(summary.invested());
    let (market_value, latest_check) =
        match worth::as_of_year_end(summary.category_id, year, connection)? {
            Some((date, amount)) => (amount, Some(date)),
            None => (0, None),
        };

    Ok(SavingBalanceValues {
        past_amount: money::to_cents_rounded(summary.past_amount()),
        past_fee: money::to_cents_rounded(summary.past_fee()),
        per_year_incomes: money::to_cents_rounded(summary.per_year_incomes()),
        per_year_fee: money::to_cents_rounded(summary.per_year_fee()),
        fee: money::to_cents_rounded(summary.fee()),
        incomes: money::to_cents_rounded(summary.incomes()),
        sold: money::to_cents_rounded(summary.sold()),
        sold_fee: money::to_cents_rounded(summary.sold_fee()),
        invested,
        market_value,
        profit_sum: market_value - invested,
        profit_proc: summary.profit_percent(money::from_cents(market_value)),
        latest_check,
    })
}

// ============================================================================
// TESTS
// ============================================================================
