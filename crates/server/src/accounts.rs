//! Accounts API endpoints.

use api_types::{
    account::{
        AccountDeleted, AccountNew, AccountRemoval, AccountType, AccountUpdate, AccountView,
        AccountsResponse, HiddenAccountView,
    },
    visibility::VisibilityChanged,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{AccountPatch, CreateAccountCmd, HiddenResource, Money, ResourceKind};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

fn map_type(account_type: engine::AccountType) -> AccountType {
    match account_type {
        engine::AccountType::Cash => AccountType::Cash,
        engine::AccountType::Bank => AccountType::Bank,
        engine::AccountType::Credit => AccountType::Credit,
        engine::AccountType::Investment => AccountType::Investment,
        engine::AccountType::Loan => AccountType::Loan,
        engine::AccountType::Other => AccountType::Other,
    }
}

fn map_api_type(account_type: AccountType) -> engine::AccountType {
    match account_type {
        AccountType::Cash => engine::AccountType::Cash,
        AccountType::Bank => engine::AccountType::Bank,
        AccountType::Credit => engine::AccountType::Credit,
        AccountType::Investment => engine::AccountType::Investment,
        AccountType::Loan => engine::AccountType::Loan,
        AccountType::Other => engine::AccountType::Other,
    }
}

fn map_account(account: engine::Account) -> AccountView {
    AccountView {
        id: account.id,
        name: account.name,
        account_type: account.account_type.map(map_type),
        balance_minor: account.balance_minor,
        balance: Money::new(account.balance_minor).to_string(),
        is_system: account.is_system,
        created_at: account.created_at,
    }
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<AccountsResponse>, ServerError> {
    let accounts = state.engine.list_accounts(&user_id).await?;
    Ok(Json(AccountsResponse {
        accounts: accounts.into_iter().map(map_account).collect(),
    }))
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let opening = match (payload.balance_minor, payload.balance.as_deref()) {
        (Some(minor), _) => minor,
        (None, Some(balance)) => balance.parse::<Money>()?.minor(),
        (None, None) => 0,
    };

    let mut cmd = CreateAccountCmd::new(user_id, payload.name, opening);
    if let Some(account_type) = payload.account_type {
        cmd = cmd.account_type(map_api_type(account_type));
    }
    let account = state.engine.create_account(cmd).await?;

    Ok((StatusCode::CREATED, Json(map_account(account))))
}

pub async fn update(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccountUpdate>,
) -> Result<Json<AccountView>, ServerError> {
    let patch = AccountPatch {
        name: payload.name,
        account_type: payload.account_type.map(map_api_type),
        balance_minor: payload.balance_minor,
    };
    let account = state.engine.update_account(id, patch, &user_id).await?;
    Ok(Json(map_account(account)))
}

pub async fn delete(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountDeleted>, ServerError> {
    let removal = match state.engine.delete_account(id, &user_id).await? {
        engine::AccountRemoval::Deleted => AccountRemoval::Deleted,
        engine::AccountRemoval::Hidden => AccountRemoval::Hidden,
    };
    Ok(Json(AccountDeleted {
        success: true,
        removal,
    }))
}

pub async fn hidden(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<HiddenAccountView>>, ServerError> {
    let hidden = state
        .engine
        .list_hidden(ResourceKind::Account, &user_id)
        .await?;

    let views = hidden
        .into_iter()
        .filter_map(|resource| match resource {
            HiddenResource::Account { account, hidden_at } => Some(HiddenAccountView {
                account: map_account(account),
                hidden_at,
            }),
            HiddenResource::Category { .. } => None,
        })
        .collect();
    Ok(Json(views))
}

pub async fn hide(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityChanged>, ServerError> {
    let changed = state
        .engine
        .hide_resource(ResourceKind::Account, id, &user_id)
        .await?;
    Ok(Json(VisibilityChanged {
        success: true,
        changed,
    }))
}

pub async fn unhide(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityChanged>, ServerError> {
    let changed = state
        .engine
        .unhide_resource(ResourceKind::Account, id, &user_id)
        .await?;
    Ok(Json(VisibilityChanged {
        success: true,
        changed,
    }))
}
