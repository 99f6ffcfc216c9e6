//! Chart aggregation over ledger entries.
//!
//! Everything here is a pure function of already-fetched rows. Callers pick
//! the scope and date range through `transaction::fetch_scope`, then bucket
//! the rows in a single pass. Sums saturate at the `i64` bounds.

use std::collections::HashMap;
use std::fmt;

use time::{Date, Month};
use uuid::Uuid;

use super::transaction::{EntryKind, LedgerEntry};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const DEFAULT_TREND_MONTHS: u32 = 12;
pub const MAX_TREND_MONTHS: u32 = 36;

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl YearMonth {
    #[must_use]
    pub fn of(date: Date) -> Self {
        Self { year: date.year(), month: u8::from(date.month()) }
    }

    /// Months since year 0; consecutive months differ by one.
    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_index(index: i64) -> Self {
        Self { year: index.div_euclid(12) as i32, month: (index.rem_euclid(12) + 1) as u8 }
    }

    #[must_use]
    pub fn first_day(self) -> Option<Date> {
        Date::from_calendar_date(self.year, Month::try_from(self.month).ok()?, 1).ok()
    }

    /// Parse `YYYY-MM`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u8 = month.parse().ok()?;
        Month::try_from(month).ok()?;
        Some(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl serde::Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategorySlice {
    /// `None` groups uncategorized entries.
    pub category_id: Option<Uuid>,
    pub name: String,
    pub total_cents: i64,
    pub count: usize,
    /// Fraction of the kind's total, in `0.0..=1.0`.
    pub share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MonthBucket {
    pub month: YearMonth,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SavingsPoint {
    pub month: YearMonth,
    pub income_cents: i64,
    pub net_cents: i64,
    /// `net / income`; `None` for a month without income.
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SavingsRate {
    pub months: Vec<SavingsPoint>,
    pub overall: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub income_cents: i64,
    pub expense_cents: i64,
    pub net_cents: i64,
    pub count: usize,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: i64, whole: i64) -> Option<f64> {
    (whole != 0).then(|| part as f64 / whole as f64)
}

/// Totals per category for one kind, largest first.
#[must_use]
pub fn category_breakdown(rows: &[LedgerEntry], kind: EntryKind) -> Vec<CategorySlice> {
    let mut groups: HashMap<Option<Uuid>, CategorySlice> = HashMap::new();
    let mut kind_total = 0_i64;

    for row in rows.iter().filter(|r| r.kind == kind) {
        kind_total = kind_total.saturating_add(row.amount_cents);
        let slice = groups.entry(row.category_id).or_insert_with(|| CategorySlice {
            category_id: row.category_id,
            name: match row.category_id {
                Some(_) => row.category_name.clone().unwrap_or_else(|| UNCATEGORIZED.to_owned()),
                None => UNCATEGORIZED.to_owned(),
            },
            total_cents: 0,
            count: 0,
            share: 0.0,
        });
        slice.total_cents = slice.total_cents.saturating_add(row.amount_cents);
        slice.count += 1;
    }

    let mut slices: Vec<CategorySlice> = groups
        .into_values()
        .map(|mut slice| {
            slice.share = ratio(slice.total_cents, kind_total).unwrap_or(0.0);
            slice
        })
        .collect();
    slices.sort_by(|a, b| {
        b.total_cents
            .cmp(&a.total_cents)
            .then_with(|| a.name.cmp(&b.name))
    });
    slices
}

/// Clamp a requested window length to `1..=MAX_TREND_MONTHS`.
#[must_use]
pub fn clamp_months(months: Option<u32>) -> u32 {
    months
        .unwrap_or(DEFAULT_TREND_MONTHS)
        .clamp(1, MAX_TREND_MONTHS)
}

/// First month of a `months`-long window ending at `end`.
#[must_use]
pub fn window_start(end: YearMonth, months: u32) -> YearMonth {
    YearMonth::from_index(end.index() - i64::from(clamp_months(Some(months))) + 1)
}

/// Income and expense per month for the window ending at `end`,
/// zero-filled. Rows outside the window are ignored.
#[must_use]
pub fn monthly_trend(rows: &[LedgerEntry], end: YearMonth, months: u32) -> Vec<MonthBucket> {
    let months = clamp_months(Some(months));
    let start = window_start(end, months).index();

    let mut buckets: Vec<MonthBucket> = (0..i64::from(months))
        .map(|offset| MonthBucket {
            month: YearMonth::from_index(start + offset),
            income_cents: 0,
            expense_cents: 0,
            net_cents: 0,
        })
        .collect();

    for row in rows {
        let Ok(slot) = usize::try_from(YearMonth::of(row.occurred_on).index() - start) else {
            continue;
        };
        let Some(bucket) = buckets.get_mut(slot) else {
            continue;
        };
        match row.kind {
            EntryKind::Income => bucket.income_cents = bucket.income_cents.saturating_add(row.amount_cents),
            EntryKind::Expense => bucket.expense_cents = bucket.expense_cents.saturating_add(row.amount_cents),
        }
    }
    for bucket in &mut buckets {
        bucket.net_cents = bucket.income_cents.saturating_sub(bucket.expense_cents);
    }
    buckets
}

#[must_use]
pub fn savings_rate(trend: &[MonthBucket]) -> SavingsRate {
    let months = trend
        .iter()
        .map(|b| SavingsPoint {
            month: b.month,
            income_cents: b.income_cents,
            net_cents: b.net_cents,
            rate: ratio(b.net_cents, b.income_cents),
        })
        .collect();
    let income = trend.iter().fold(0_i64, |acc, b| acc.saturating_add(b.income_cents));
    let net = trend.iter().fold(0_i64, |acc, b| acc.saturating_add(b.net_cents));
    SavingsRate { months, overall: ratio(net, income) }
}

#[must_use]
pub fn summary(rows: &[LedgerEntry]) -> Summary {
    let mut out = rows.iter().fold(Summary::default(), |mut acc, row| {
        match row.kind {
            EntryKind::Income => acc.income_cents = acc.income_cents.saturating_add(row.amount_cents),
            EntryKind::Expense => acc.expense_cents = acc.expense_cents.saturating_add(row.amount_cents),
        }
        acc.count += 1;
        acc
    });
    out.net_cents = out.income_cents.saturating_sub(out.expense_cents);
    out
}

#[cfg(test)]
#[path = "charts_test.rs"]
mod tests;
