use std::collections::HashMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QuerySelect, Statement, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine, TransactionKind, accounts, categories,
    categories::{DEFAULT_COLOR, DEFAULT_ICON},
    transactions,
};

use super::Engine;

const UNCATEGORIZED: &str = "Uncategorized";
const FULL_BP: i64 = 10_000;

/// Income or expense total of one category over a period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// `None` for the "Uncategorized" bucket.
    pub category_id: Option<String>,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub total_minor: i64,
    pub count: u64,
    /// Share of the kind's total, in basis points (1/100 of a percent).
    pub share_bp: i64,
}

/// Income and expense over an inclusive range of days.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: i64,
    pub total_income_minor: i64,
    pub total_expense_minor: i64,
    pub net_minor: i64,
    pub daily_average_income_minor: i64,
    pub daily_average_expense_minor: i64,
    pub income_by_category: Vec<CategoryTotal>,
    pub expense_by_category: Vec<CategoryTotal>,
}

/// Headline numbers for the current month against the previous one.
///
/// Rates and changes are in basis points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_balance_minor: i64,
    pub month_income_minor: i64,
    pub month_expense_minor: i64,
    pub last_month_income_minor: i64,
    pub last_month_expense_minor: i64,
    pub savings_rate_bp: i64,
    pub income_change_bp: i64,
    pub expense_change_bp: i64,
}

/// Window of the dashboard chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartRange {
    /// The current month.
    Month,
    /// The current month and the five before it.
    SixMonths,
    /// The current month and the eleven before it.
    Year,
    /// One point covering `from..=to`.
    Custom { from: NaiveDate, to: NaiveDate },
}

/// Income, expenses and what is left of them over one chart bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// `Oct 2026` for a month, `Oct 1, 2026 - Oct 19, 2026` for a custom range.
    pub label: String,
    pub from: NaiveDate,
    /// Last day of the bucket, included.
    pub to: NaiveDate,
    pub income_minor: i64,
    pub expense_minor: i64,
    pub savings_minor: i64,
}

/// A row fed to [`summarize`].
struct ReportRow {
    kind: TransactionKind,
    amount_minor: i64,
    category: Option<categories::Model>,
}

impl Engine {
    /// Summarize the caller's income and expenses between `from` and `to`,
    /// both days included.
    ///
    /// Transfers and initial balances are not income.
    pub async fn monthly_summary(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<MonthlySummary> {
        if from > to {
            return Err(EngineError::Validation(
                "invalid range: from must be <= to".to_string(),
            ));
        }
        let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = day_after(to)?.and_time(chrono::NaiveTime::MIN).and_utc();

        let owned = self.owned_account_ids(user_id).await?;
        let rows = transactions::Entity::find()
            .find_also_related(categories::Entity)
            .filter(transactions::Column::AccountId.is_in(owned))
            .filter(transactions::Column::IsInitialBalance.eq(false))
            .filter(transactions::Column::Kind.is_in([
                TransactionKind::Income.as_str(),
                TransactionKind::Expense.as_str(),
            ]))
            .filter(transactions::Column::OccurredAt.gte(start))
            .filter(transactions::Column::OccurredAt.lt(end))
            .all(&self.database)
            .await?;

        let rows = rows
            .into_iter()
            .map(|(tx, category)| {
                Ok(ReportRow {
                    kind: TransactionKind::try_from(tx.kind.as_str())?,
                    amount_minor: tx.amount_minor,
                    category,
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        Ok(summarize(from, to, rows))
    }

    /// Balance and month-over-month figures for the month containing `now`.
    pub async fn dashboard_stats(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<DashboardStats> {
        let this_month = now
            .date_naive()
            .with_day(1)
            .ok_or_else(|| EngineError::Validation("invalid date".to_string()))?;
        let next_month = add_months(this_month, 1)?;
        let last_month = this_month
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| EngineError::Validation("date out of range".to_string()))?;

        let backend = self.database.get_database_backend();
        let total_balance_minor = {
            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COALESCE(SUM(balance), 0) AS sum FROM accounts WHERE user_id = ?;",
                vec![user_id.into()],
            );
            let row = self.database.query_one(stmt).await?;
            row.and_then(|r| r.try_get::<i64>("", "sum").ok())
                .unwrap_or(0)
        };

        let month_income_minor = self
            .period_total(user_id, TransactionKind::Income, this_month, next_month)
            .await?;
        let month_expense_minor = self
            .period_total(user_id, TransactionKind::Expense, this_month, next_month)
            .await?;
        let last_month_income_minor = self
            .period_total(user_id, TransactionKind::Income, last_month, this_month)
            .await?;
        let last_month_expense_minor = self
            .period_total(user_id, TransactionKind::Expense, last_month, this_month)
            .await?;

        let savings_rate_bp = if month_income_minor > 0 {
            ratio_bp(month_income_minor - month_expense_minor, month_income_minor)
        } else {
            0
        };

        Ok(DashboardStats {
            total_balance_minor,
            month_income_minor,
            month_expense_minor,
            last_month_income_minor,
            last_month_expense_minor,
            savings_rate_bp,
            income_change_bp: change_bp(month_income_minor, last_month_income_minor),
            expense_change_bp: change_bp(month_expense_minor, last_month_expense_minor),
        })
    }

    /// Income and expense series for the dashboard chart, oldest first.
    ///
    /// Preset ranges give one point per calendar month ending with the month
    /// of `now`; a custom range gives a single aggregated point. Transfers and
    /// initial balances are left out.
    pub async fn chart_series(
        &self,
        user_id: &str,
        range: ChartRange,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<ChartPoint>> {
        let today = now.date_naive();
        let buckets = match range {
            ChartRange::Month => month_buckets(today, 1)?,
            ChartRange::SixMonths => month_buckets(today, 6)?,
            ChartRange::Year => month_buckets(today, 12)?,
            ChartRange::Custom { from, to } => {
                if from > to {
                    return Err(EngineError::Validation(
                        "invalid range: start date must be <= end date".to_string(),
                    ));
                }
                let label = format!("{} - {}", from.format("%b %-d, %Y"), to.format("%b %-d, %Y"));
                vec![(label, from, day_after(to)?)]
            }
        };

        let mut points = Vec::with_capacity(buckets.len());
        for (label, from, until) in buckets {
            let income_minor = self
                .period_total(user_id, TransactionKind::Income, from, until)
                .await?;
            let expense_minor = self
                .period_total(user_id, TransactionKind::Expense, from, until)
                .await?;
            points.push(ChartPoint {
                label,
                from,
                to: until.pred_opt().unwrap_or(from),
                income_minor,
                expense_minor,
                savings_minor: income_minor - expense_minor,
            });
        }
        Ok(points)
    }

    async fn owned_account_ids(&self, user_id: &str) -> ResultEngine<Vec<String>> {
        Ok(accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .filter(accounts::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.database)
            .await?)
    }

    /// Sum of `kind` amounts on the caller's accounts in `[from, to)`.
    async fn period_total(
        &self,
        user_id: &str,
        kind: TransactionKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<i64> {
        let stmt = Statement::from_sql_and_values(
            self.database.get_database_backend(),
            "SELECT COALESCE(SUM(t.amount_minor), 0) AS sum \
             FROM transactions t \
             JOIN accounts a ON a.id = t.account_id \
             WHERE a.user_id = ? AND t.kind = ? AND t.is_initial_balance = ? \
             AND t.occurred_at >= ? AND t.occurred_at < ?;",
            vec![
                user_id.into(),
                kind.as_str().into(),
                false.into(),
                from.and_time(chrono::NaiveTime::MIN).and_utc().into(),
                to.and_time(chrono::NaiveTime::MIN).and_utc().into(),
            ],
        );
        let row = self.database.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get::<i64>("", "sum").ok()).unwrap_or(0))
    }
}

fn day_after(date: NaiveDate) -> ResultEngine<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| EngineError::Validation("date out of range".to_string()))
}

fn add_months(date: NaiveDate, months: u32) -> ResultEngine<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| EngineError::Validation("date out of range".to_string()))
}

/// `(label, first day, first day after)` for the `months` calendar months
/// ending with the month of `today`, oldest first.
fn month_buckets(today: NaiveDate, months: u32) -> ResultEngine<Vec<(String, NaiveDate, NaiveDate)>> {
    let current = today
        .with_day(1)
        .ok_or_else(|| EngineError::Validation("invalid date".to_string()))?;
    let first = current
        .checked_sub_months(Months::new(months.saturating_sub(1)))
        .ok_or_else(|| EngineError::Validation("date out of range".to_string()))?;

    (0..months)
        .map(|offset| {
            let start = add_months(first, offset)?;
            Ok((start.format("%b %Y").to_string(), start, add_months(start, 1)?))
        })
        .collect()
}

/// `part / whole` in basis points, rounded half away from zero.
fn ratio_bp(part: i64, whole: i64) -> i64 {
    div_round(i128::from(part) * i128::from(FULL_BP), i128::from(whole))
}

/// Change from `previous` to `current` in basis points. Growth from zero
/// counts as 100%.
fn change_bp(current: i64, previous: i64) -> i64 {
    match previous {
        0 if current > 0 => FULL_BP,
        0 => 0,
        previous => ratio_bp(current - previous, previous),
    }
}

fn div_round(numerator: i128, denominator: i128) -> i64 {
    if denominator == 0 {
        return 0;
    }
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = if 2 * remainder.abs() >= denominator.abs() {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    };
    i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN })
}

fn summarize(from: NaiveDate, to: NaiveDate, rows: Vec<ReportRow>) -> MonthlySummary {
    let days = (to - from).num_days() + 1;
    let mut income: Vec<CategoryTotal> = Vec::new();
    let mut expense: Vec<CategoryTotal> = Vec::new();
    let mut income_index: HashMap<Option<String>, usize> = HashMap::new();
    let mut expense_index: HashMap<Option<String>, usize> = HashMap::new();

    for row in rows {
        let (totals, index) = match row.kind {
            TransactionKind::Income => (&mut income, &mut income_index),
            TransactionKind::Expense => (&mut expense, &mut expense_index),
            TransactionKind::Transfer => continue,
        };
        let key = row.category.as_ref().map(|c| c.id.clone());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            totals.push(match &row.category {
                Some(category) => CategoryTotal {
                    category_id: key,
                    name: category.name.clone(),
                    icon: category.icon.clone(),
                    color: category.color.clone(),
                    total_minor: 0,
                    count: 0,
                    share_bp: 0,
                },
                None => CategoryTotal {
                    category_id: None,
                    name: UNCATEGORIZED.to_string(),
                    icon: DEFAULT_ICON.to_string(),
                    color: DEFAULT_COLOR.to_string(),
                    total_minor: 0,
                    count: 0,
                    share_bp: 0,
                },
            });
            totals.len() - 1
        });
        totals[slot].total_minor += row.amount_minor;
        totals[slot].count += 1;
    }

    let total_income_minor = finish_breakdown(&mut income);
    let total_expense_minor = finish_breakdown(&mut expense);

    MonthlySummary {
        from,
        to,
        days,
        total_income_minor,
        total_expense_minor,
        net_minor: total_income_minor - total_expense_minor,
        daily_average_income_minor: div_round(total_income_minor.into(), days.into()),
        daily_average_expense_minor: div_round(total_expense_minor.into(), days.into()),
        income_by_category: income,
        expense_by_category: expense,
    }
}

/// Sorts a breakdown by amount (largest first), fills in shares and returns
/// the total.
fn finish_breakdown(totals: &mut [CategoryTotal]) -> i64 {
    let sum: i64 = totals.iter().map(|t| t.total_minor).sum();
    totals.sort_by(|a, b| {
        b.total_minor
            .cmp(&a.total_minor)
            .then_with(|| a.name.cmp(&b.name))
    });
    for total in totals.iter_mut() {
        total.share_bp = if sum > 0 {
            ratio_bp(total.total_minor, sum)
        } else {
            0
        };
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, name: &str, kind: TransactionKind) -> categories::Model {
        categories::Model {
            id: id.to_string(),
            user_id: Some("alice".to_string()),
            name: name.to_string(),
            name_norm: name.to_lowercase(),
            kind: kind.as_str().to_string(),
            icon: "circle".to_string(),
            color: "#123456".to_string(),
            is_system: false,
            created_at: Utc::now(),
        }
    }

    fn row(kind: TransactionKind, amount_minor: i64, category: Option<categories::Model>) -> ReportRow {
        ReportRow {
            kind,
            amount_minor,
            category,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn summary_groups_by_category_largest_first() {
        let food = category("c-food", "Food", TransactionKind::Expense);
        let rent = category("c-rent", "Rent", TransactionKind::Expense);
        let salary = category("c-salary", "Salary", TransactionKind::Income);
        let rows = vec![
            row(TransactionKind::Expense, 1_000, Some(food.clone())),
            row(TransactionKind::Expense, 3_000, Some(rent)),
            row(TransactionKind::Expense, 2_000, Some(food)),
            row(TransactionKind::Income, 12_000, Some(salary)),
        ];

        let summary = summarize(date(2026, 9, 1), date(2026, 9, 30), rows);

        assert_eq!(summary.days, 30);
        assert_eq!(summary.total_expense_minor, 6_000);
        assert_eq!(summary.total_income_minor, 12_000);
        assert_eq!(summary.net_minor, 6_000);
        assert_eq!(summary.daily_average_expense_minor, 200);
        assert_eq!(summary.daily_average_income_minor, 400);

        let names: Vec<_> = summary
            .expense_by_category
            .iter()
            .map(|t| (t.name.as_str(), t.total_minor, t.count, t.share_bp))
            .collect();
        assert_eq!(
            names,
            vec![("Food", 3_000, 2, 5_000), ("Rent", 3_000, 1, 5_000)]
        );
        assert_eq!(summary.income_by_category[0].share_bp, FULL_BP);
    }

    #[test]
    fn missing_category_lands_in_uncategorized() {
        let rows = vec![
            row(TransactionKind::Expense, 500, None),
            row(TransactionKind::Expense, 250, None),
        ];
        let summary = summarize(date(2026, 10, 1), date(2026, 10, 1), rows);

        assert_eq!(summary.days, 1);
        assert_eq!(summary.expense_by_category.len(), 1);
        let bucket = &summary.expense_by_category[0];
        assert_eq!(bucket.name, UNCATEGORIZED);
        assert_eq!(bucket.category_id, None);
        assert_eq!(bucket.total_minor, 750);
        assert_eq!(bucket.color, DEFAULT_COLOR);
    }

    #[test]
    fn empty_period_has_zero_shares() {
        let summary = summarize(date(2026, 2, 1), date(2026, 2, 28), Vec::new());
        assert_eq!(summary.total_income_minor, 0);
        assert_eq!(summary.daily_average_expense_minor, 0);
        assert!(summary.expense_by_category.is_empty());
    }

    #[test]
    fn month_buckets_end_with_the_current_month() {
        let buckets = month_buckets(date(2026, 2, 14), 6).unwrap();
        let labels: Vec<_> = buckets.iter().map(|(label, _, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Sep 2025", "Oct 2025", "Nov 2025", "Dec 2025", "Jan 2026", "Feb 2026"]
        );
        assert_eq!(buckets[0].1, date(2025, 9, 1));
        assert_eq!(buckets[5].2, date(2026, 3, 1));

        let single = month_buckets(date(2026, 10, 31), 1).unwrap();
        assert_eq!(single, vec![("Oct 2026".to_string(), date(2026, 10, 1), date(2026, 11, 1))]);
    }

    #[test]
    fn change_from_zero_is_full_growth() {
        assert_eq!(change_bp(1_000, 0), FULL_BP);
        assert_eq!(change_bp(0, 0), 0);
        assert_eq!(change_bp(1_500, 1_000), 5_000);
        assert_eq!(change_bp(500, 1_000), -5_000);
    }

    #[test]
    fn ratios_round_half_away_from_zero() {
        assert_eq!(ratio_bp(1, 3), 3_333);
        assert_eq!(ratio_bp(2, 3), 6_667);
        assert_eq!(ratio_bp(-2, 3), -6_667);
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
    }
}
