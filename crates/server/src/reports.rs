//! Reports and dashboard endpoints.

use api_types::report::{
    CategoryTotalView, ChartPointView, ChartQuery, ChartView, DashboardStatsView, MonthlyQuery,
    MonthlySummaryView,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::Utc;
use engine::{ChartRange, EngineError};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

fn map_total(total: engine::CategoryTotal) -> Result<CategoryTotalView, ServerError> {
    let category_id = total
        .category_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|err| EngineError::Persistence(format!("invalid category id: {err}")))?;

    Ok(CategoryTotalView {
        category_id,
        name: total.name,
        icon: total.icon,
        color: total.color,
        total_minor: total.total_minor,
        count: total.count,
        share_bp: total.share_bp,
    })
}

fn map_totals(totals: Vec<engine::CategoryTotal>) -> Result<Vec<CategoryTotalView>, ServerError> {
    totals.into_iter().map(map_total).collect()
}

pub async fn monthly(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<MonthlySummaryView>, ServerError> {
    let summary = state
        .engine
        .monthly_summary(&user_id, query.from, query.to)
        .await?;

    Ok(Json(MonthlySummaryView {
        from: summary.from,
        to: summary.to,
        days: summary.days,
        total_income_minor: summary.total_income_minor,
        total_expense_minor: summary.total_expense_minor,
        net_minor: summary.net_minor,
        daily_average_income_minor: summary.daily_average_income_minor,
        daily_average_expense_minor: summary.daily_average_expense_minor,
        income_by_category: map_totals(summary.income_by_category)?,
        expense_by_category: map_totals(summary.expense_by_category)?,
    }))
}

pub async fn dashboard(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<DashboardStatsView>, ServerError> {
    let stats = state.engine.dashboard_stats(&user_id, Utc::now()).await?;

    Ok(Json(DashboardStatsView {
        total_balance_minor: stats.total_balance_minor,
        month_income_minor: stats.month_income_minor,
        month_expense_minor: stats.month_expense_minor,
        last_month_income_minor: stats.last_month_income_minor,
        last_month_expense_minor: stats.last_month_expense_minor,
        savings_rate_bp: stats.savings_rate_bp,
        income_change_bp: stats.income_change_bp,
        expense_change_bp: stats.expense_change_bp,
    }))
}

fn chart_range(query: &ChartQuery) -> Result<ChartRange, EngineError> {
    match query.range.as_deref().map(str::trim) {
        Some("1m") => Ok(ChartRange::Month),
        Some("1y") => Ok(ChartRange::Year),
        Some("custom") => match (query.start_date, query.end_date) {
            (Some(from), Some(to)) => Ok(ChartRange::Custom { from, to }),
            _ => Err(EngineError::Validation(
                "custom range requires start_date and end_date".to_string(),
            )),
        },
        // Anything else falls back to the six month view.
        _ => Ok(ChartRange::SixMonths),
    }
}

pub async fn chart(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartView>, ServerError> {
    let range = chart_range(&query)?;
    let points = state
        .engine
        .chart_series(&user_id, range, Utc::now())
        .await?
        .into_iter()
        .map(|point| ChartPointView {
            label: point.label,
            from: point.from,
            to: point.to,
            income_minor: point.income_minor,
            expense_minor: point.expense_minor,
            savings_minor: point.savings_minor,
        })
        .collect();

    Ok(Json(ChartView { points }))
}
