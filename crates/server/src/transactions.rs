//! Transactions API endpoints

use api_types::{
    TransactionKind as ApiKind,
    transaction::{
        TransactionCreated, TransactionListQuery, TransactionListResponse, TransactionPayload,
        TransactionView,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Money, TransactionDraft, TransactionFields, TransactionListFilter};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

pub(crate) fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Income => ApiKind::Income,
        engine::TransactionKind::Expense => ApiKind::Expense,
        engine::TransactionKind::Transfer => ApiKind::Transfer,
    }
}

pub(crate) fn map_api_kind(kind: ApiKind) -> engine::TransactionKind {
    match kind {
        ApiKind::Income => engine::TransactionKind::Income,
        ApiKind::Expense => engine::TransactionKind::Expense,
        ApiKind::Transfer => engine::TransactionKind::Transfer,
    }
}

fn map_transaction(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        kind: map_kind(tx.kind),
        amount_minor: tx.amount_minor,
        amount: Money::new(tx.amount_minor).to_string(),
        account_id: tx.account_id,
        to_account_id: tx.to_account_id,
        category_id: tx.category_id,
        description: tx.description,
        date: tx.occurred_at,
        is_initial_balance: tx.is_initial_balance,
        created_at: tx.created_at,
    }
}

/// Turns the loose request body into a validated draft.
///
/// `amount_minor` wins over the decimal `amount` when both are present.
fn draft_from_payload(payload: TransactionPayload) -> Result<TransactionDraft, ServerError> {
    let amount_minor = match (payload.amount_minor, payload.amount.as_deref()) {
        (Some(minor), _) => Some(minor),
        (None, Some(amount)) => Some(amount.parse::<Money>()?.minor()),
        (None, None) => None,
    };

    let fields = TransactionFields {
        kind: payload.kind,
        amount_minor,
        account_id: payload.account_id,
        to_account_id: payload.to_account_id,
        category_id: payload.category_id,
        description: payload.description,
        occurred_at: payload.date,
    };
    Ok(TransactionDraft::try_from(fields)?)
}

fn parse_kinds(raw: &str) -> Result<Vec<engine::TransactionKind>, ServerError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| engine::TransactionKind::try_from(part).map_err(ServerError::from))
        .collect()
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionPayload>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let draft = draft_from_payload(payload)?;
    let id = state.engine.create_transaction(&user_id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionCreated { success: true, id }),
    ))
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let kinds = query.kinds.as_deref().map(parse_kinds).transpose()?;
    let mut filter = TransactionListFilter {
        account_id: query.account_id,
        from: query.from,
        to: query.to,
        kinds,
        cursor: query.cursor,
        ..TransactionListFilter::default()
    };
    if let Some(limit) = query.limit {
        filter.limit = limit;
    }

    let page = state.engine.list_transactions(&user_id, &filter).await?;

    Ok(Json(TransactionListResponse {
        transactions: page.items.into_iter().map(map_transaction).collect(),
        next_cursor: page.next_cursor,
    }))
}

pub async fn get(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state.engine.transaction(id, &user_id).await?;
    Ok(Json(map_transaction(tx)))
}

pub async fn update(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransactionPayload>,
) -> Result<Json<TransactionView>, ServerError> {
    let draft = draft_from_payload(payload)?;
    let tx = state.engine.update_transaction(id, &user_id, draft).await?;
    Ok(Json(map_transaction(tx)))
}

pub async fn delete(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_transaction(id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
