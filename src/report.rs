//! Chart-ready views over the materialized balance tables.
//!
//! These are pure transforms: they read nothing from the database and never
//! mutate anything. Feed them the per-year series produced by
//! [crate::balance::saving::sum_by_year].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::Error;

/// One year's invested amount and profit within a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearRecord {
    /// The calendar year.
    pub year: i32,
    /// The amount invested as of that year.
    pub invested: f64,
    /// The profit as of that year.
    pub profit: f64,
}

/// Per-year series merged across categories, shaped for a stacked chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    /// The years on the x-axis, ascending.
    pub categories: Vec<i32>,
    /// The summed invested amount per year.
    pub invested: Vec<f64>,
    /// The summed profit per year.
    pub profit: Vec<f64>,
    /// `invested + profit` per year.
    pub total: Vec<f64>,
    /// The y-axis ceiling: the largest invested plus the largest profit.
    pub max: f64,
}

/// Merge per-year series into one chart-ready set of aligned arrays.
///
/// Years are the ascending union of the input years, dropping years after
/// `current_year` and years where every input is zero. A year where the
/// merged sums cancel out to zero is kept, since its series still carry
/// activity. `max` is the largest profit plus the largest invested amount
/// over the kept years, `0.0` when nothing remains.
pub fn chart_series(groups: &[Vec<YearRecord>], current_year: i32) -> ChartSeries {
    let mut by_year: BTreeMap<i32, (f64, f64, bool)> = BTreeMap::new();
    for group in groups {
        for record in group {
            if record.year > current_year {
                continue;
            }

            let (invested, profit, nonzero) =
                by_year.entry(record.year).or_insert((0.0, 0.0, false));
            *invested += record.invested;
            *profit += record.profit;
            *nonzero |= record.invested != 0.0 || record.profit != 0.0;
        }
    }

    let mut series = ChartSeries {
        categories: Vec::new(),
        invested: Vec::new(),
        profit: Vec::new(),
        total: Vec::new(),
        max: 0.0,
    };

    for (year, (invested, profit, nonzero)) in by_year {
        if !nonzero {
            continue;
        }

        series.categories.push(year);
        series.invested.push(invested);
        series.profit.push(profit);
        series.total.push(invested + profit);
    }

    let max_of = |values: &[f64]| values.iter().copied().fold(f64::MIN, f64::max);
    if !series.categories.is_empty() {
        series.max = max_of(&series.profit) + max_of(&series.invested);
    }

    series
}

/// Serialize a [ChartSeries] for embedding into a chart configuration.
///
/// # Errors
/// This function will return an [Error::JsonError] if serialization fails.
pub fn chart_series_json(series: &ChartSeries) -> Result<String, Error> {
    serde_json::to_string(series).map_err(|error| Error::JsonError(error.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================
