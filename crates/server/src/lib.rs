use api_types::ErrorBody;
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use engine::{EngineError, ErrorKind};

pub use rate_limit::{RateDecision, RateLimiter, TokenBucketLimiter};
pub use server::{ServerConfig, ServerState, router, run, run_with_listener, spawn_with_listener};

mod accounts;
mod categories;
mod rate_limit;
mod reports;
mod server;
mod transactions;
mod user;

pub mod types {
    pub mod account {
        pub use api_types::account::{
            AccountDeleted, AccountNew, AccountRemoval, AccountType, AccountUpdate, AccountView,
            AccountsResponse, HiddenAccountView,
        };
    }

    pub mod category {
        pub use api_types::category::{
            CategoriesResponse, CategoryNew, CategoryUpdate, CategoryView, HiddenCategoryView,
        };
    }

    pub mod transaction {
        pub use api_types::TransactionKind;
        pub use api_types::transaction::{
            TransactionCreated, TransactionListQuery, TransactionListResponse, TransactionPayload,
            TransactionView,
        };
    }

    pub mod report {
        pub use api_types::report::{
            CategoryTotalView, DashboardStatsView, MonthlyQuery, MonthlySummaryView,
        };
    }

    pub mod user {
        pub use api_types::user::UserInitialized;
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    /// No user id reached the server through the identity header.
    Unauthenticated,
    RateLimited(RateDecision),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err.kind() {
        ErrorKind::Persistence => {
            tracing::error!(error = %err, "persistence failure");
            "internal server error".to_string()
        }
        _ => err.to_string(),
    }
}

/// `X-RateLimit-*` headers describing `decision`.
pub(crate) fn rate_limit_headers(decision: &RateDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_after.as_secs()),
    );
    headers
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "unauthenticated".to_string())
            }
            ServerError::RateLimited(decision) => {
                let retry_after = decision.retry_after_secs();
                let mut headers = rate_limit_headers(&decision);
                headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
                let body = ErrorBody {
                    error: format!("too many requests, retry in {retry_after} seconds"),
                };
                return (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response();
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn engine_unauthorized_maps_to_403() {
        let res = ServerError::from(EngineError::Unauthorized("no".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::Conflict("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = ServerError::from(EngineError::StaleBalance("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_and_insufficient_map_to_422() {
        let res = ServerError::from(EngineError::Validation("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let res =
            ServerError::from(EngineError::InsufficientBalance("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn persistence_maps_to_500() {
        let res = ServerError::from(EngineError::Persistence("disk".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthenticated_maps_to_401() {
        let res = ServerError::Unauthenticated.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rate_limited_carries_retry_headers() {
        let res = ServerError::RateLimited(RateDecision {
            allowed: false,
            limit: 20,
            remaining: 0,
            reset_after: Duration::from_secs(30),
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["retry-after"], "30");
        assert_eq!(res.headers()["x-ratelimit-limit"], "20");
        assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
