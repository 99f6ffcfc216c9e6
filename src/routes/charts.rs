//! Chart routes. Each handler fetches one scope of ledger rows and hands
//! them to the pure aggregators in `services::charts`.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::ApiError;
use super::categories::parse_kind_param;
use super::goals::goal_error_to_api;
use super::transactions::{ScopeQuery, transaction_error_to_api};
use crate::routes::auth::AuthUser;
use crate::services::charts::{self, CategorySlice, MonthBucket, SavingsRate, Summary, YearMonth};
use crate::services::goal::{self, GoalView};
use crate::services::transaction::{self, EntryKind, LedgerEntry, TransactionFilter, today};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub family_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub months: Option<u32>,
}

impl ChartQuery {
    fn scope(&self) -> ScopeQuery {
        ScopeQuery {
            family_id: self.family_id,
            from: self.from.clone(),
            to: self.to.clone(),
            ..ScopeQuery::default()
        }
    }

    /// Window for trend charts: `months` months ending at the month of `to`
    /// (or the current month).
    fn trend_window(&self) -> Result<(YearMonth, u32, TransactionFilter), ApiError> {
        let mut filter = self.scope().to_filter()?;
        let end = YearMonth::of(filter.to.unwrap_or_else(today));
        let months = charts::clamp_months(self.months);
        let start = charts::window_start(end, months)
            .first_day()
            .ok_or_else(|| ApiError::bad_request("date out of range"))?;
        filter.from = Some(filter.from.map_or(start, |from: Date| from.max(start)));
        Ok((end, months, filter))
    }
}

async fn fetch_rows(state: &AppState, user_id: Uuid, filter: &TransactionFilter) -> Result<Vec<LedgerEntry>, ApiError> {
    transaction::fetch_scope(&state.pool, user_id, filter, None)
        .await
        .map_err(transaction_error_to_api)
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub totals: Summary,
    pub goals: Vec<GoalView>,
}

/// `GET /api/charts/summary`: totals plus goal progress for the scope.
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChartQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let filter = query.scope().to_filter()?;
    let rows = fetch_rows(&state, auth.user.id, &filter);
    let goals = async {
        goal::list_goals(&state.pool, auth.user.id, query.family_id)
            .await
            .map_err(goal_error_to_api)
    };
    let (rows, goals) = futures::try_join!(rows, goals)?;

    let today = today();
    Ok(Json(SummaryResponse {
        totals: charts::summary(&rows),
        goals: goals.into_iter().map(|g| goal::view(g, today)).collect(),
    }))
}

/// `GET /api/charts/categories?kind=`: defaults to expenses.
pub async fn categories(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Vec<CategorySlice>>, ApiError> {
    let kind = parse_kind_param(query.kind.as_deref())?.unwrap_or(EntryKind::Expense);
    let mut filter = query.scope().to_filter()?;
    filter.kind = Some(kind);
    let rows = fetch_rows(&state, auth.user.id, &filter).await?;
    Ok(Json(charts::category_breakdown(&rows, kind)))
}

/// `GET /api/charts/monthly?months=`
pub async fn monthly(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Vec<MonthBucket>>, ApiError> {
    let (end, months, filter) = query.trend_window()?;
    let rows = fetch_rows(&state, auth.user.id, &filter).await?;
    Ok(Json(charts::monthly_trend(&rows, end, months)))
}

/// `GET /api/charts/savings?months=`
pub async fn savings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChartQuery>,
) -> Result<Json<SavingsRate>, ApiError> {
    let (end, months, filter) = query.trend_window()?;
    let rows = fetch_rows(&state, auth.user.id, &filter).await?;
    Ok(Json(charts::savings_rate(&charts::monthly_trend(&rows, end, months))))
}
