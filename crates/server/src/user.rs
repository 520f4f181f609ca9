//! First-login setup of a user.

use api_types::user::UserInitialized;
use axum::{Extension, Json, extract::State};

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

/// Seed the caller with the configured template accounts and categories.
/// Calling it again is harmless.
pub async fn initialize(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<UserInitialized>, ServerError> {
    let outcome = state
        .engine
        .initialize_user(&user_id, &state.templates)
        .await?;

    Ok(Json(UserInitialized {
        already_initialized: outcome.already_initialized,
        accounts_created: outcome.accounts_created,
        categories_created: outcome.categories_created,
    }))
}
