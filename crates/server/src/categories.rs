//! Categories API endpoints.

use api_types::{
    category::{
        CategoriesResponse, CategoryNew, CategoryUpdate, CategoryView, HiddenCategoryView,
    },
    visibility::VisibilityChanged,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{CategoryPatch, CreateCategoryCmd, HiddenResource, ResourceKind};
use uuid::Uuid;

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
    transactions::{map_api_kind, map_kind},
};

fn map_category(category: engine::Category) -> CategoryView {
    CategoryView {
        id: category.id,
        name: category.name,
        kind: map_kind(category.kind),
        icon: category.icon,
        color: category.color,
        is_system: category.is_system,
        created_at: category.created_at,
    }
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<CategoriesResponse>, ServerError> {
    let categories = state.engine.list_categories(&user_id).await?;
    Ok(Json(CategoriesResponse {
        categories: categories.into_iter().map(map_category).collect(),
    }))
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<(StatusCode, Json<CategoryView>), ServerError> {
    let mut cmd = CreateCategoryCmd::new(user_id, payload.name, map_api_kind(payload.kind));
    if let Some(icon) = payload.icon {
        cmd = cmd.icon(icon);
    }
    if let Some(color) = payload.color {
        cmd = cmd.color(color);
    }
    let category = state.engine.create_category(cmd).await?;

    Ok((StatusCode::CREATED, Json(map_category(category))))
}

pub async fn update(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<CategoryView>, ServerError> {
    let patch = CategoryPatch {
        name: payload.name,
        icon: payload.icon,
        color: payload.color,
    };
    let category = state.engine.update_category(id, patch, &user_id).await?;
    Ok(Json(map_category(category)))
}

pub async fn delete(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_category(id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hidden(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<HiddenCategoryView>>, ServerError> {
    let hidden = state
        .engine
        .list_hidden(ResourceKind::Category, &user_id)
        .await?;

    let views = hidden
        .into_iter()
        .filter_map(|resource| match resource {
            HiddenResource::Category {
                category,
                hidden_at,
            } => Some(HiddenCategoryView {
                category: map_category(category),
                hidden_at,
            }),
            HiddenResource::Account { .. } => None,
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
        .hide_resource(ResourceKind::Category, id, &user_id)
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
        .unhide_resource(ResourceKind::Category, id, &user_id)
        .await?;
    Ok(Json(VisibilityChanged {
        success: true,
        changed,
    }))
}
