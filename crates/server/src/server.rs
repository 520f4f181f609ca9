use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderName, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use engine::{Engine, SeedTemplates};
use serde::Serialize;

use std::sync::Arc;

use crate::{
    ServerError, accounts, categories, rate_limit::RateLimiter, rate_limit_headers, reports,
    transactions, user,
};

/// Where to listen and how to recognise the caller.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Header the upstream identity provider puts the user id in.
    pub identity_header: String,
    pub templates: SeedTemplates,
}

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub limiter: Arc<dyn RateLimiter>,
    pub templates: Arc<SeedTemplates>,
    identity_header: HeaderName,
}

impl ServerState {
    pub fn new(
        engine: Engine,
        limiter: Arc<dyn RateLimiter>,
        identity_header: &str,
        templates: SeedTemplates,
    ) -> Result<Self, ServerError> {
        let identity_header = HeaderName::try_from(identity_header).map_err(|_| {
            ServerError::Generic(format!("invalid identity header name: {identity_header}"))
        })?;
        Ok(Self {
            engine: Arc::new(engine),
            limiter,
            templates: Arc::new(templates),
            identity_header,
        })
    }
}

/// The authenticated caller, as reported by the identity provider.
#[derive(Clone, Debug)]
pub(crate) struct CurrentUser(pub String);

async fn auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let user_id = request
        .headers()
        .get(&state.identity_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    let Some(user_id) = user_id else {
        tracing::warn!(path = %request.uri().path(), "request without user identity");
        return Err(ServerError::Unauthenticated);
    };

    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

/// Throttles writes per user. Reads pass through.
async fn throttle(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if request.method() == Method::GET {
        return Ok(next.run(request).await);
    }
    let Some(CurrentUser(user_id)) = request.extensions().get::<CurrentUser>().cloned() else {
        return Err(ServerError::Unauthenticated);
    };

    let decision = state.limiter.check(&format!("user:{user_id}"));
    if !decision.allowed {
        tracing::warn!(user_id, "rate limit exceeded");
        return Err(ServerError::RateLimited(decision));
    }

    let mut response = next.run(request).await;
    response.headers_mut().extend(rate_limit_headers(&decision));
    Ok(response)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get)
                .put(transactions::update)
                .delete(transactions::delete),
        )
        .route("/accounts", get(accounts::list).post(accounts::create))
        .route("/accounts/hidden", get(accounts::hidden))
        .route(
            "/accounts/{id}",
            axum::routing::patch(accounts::update).delete(accounts::delete),
        )
        .route("/accounts/{id}/hide", post(accounts::hide))
        .route("/accounts/{id}/unhide", post(accounts::unhide))
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route("/categories/hidden", get(categories::hidden))
        .route(
            "/categories/{id}",
            axum::routing::patch(categories::update).delete(categories::delete),
        )
        .route("/categories/{id}/hide", post(categories::hide))
        .route("/categories/{id}/unhide", post(categories::unhide))
        .route("/user/initialize", post(user::initialize))
        .route("/reports/monthly", get(reports::monthly))
        .route("/dashboard/stats", get(reports::dashboard))
        .route("/dashboard/chart", get(reports::chart))
        .route_layer(middleware::from_fn_with_state(state.clone(), throttle))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run(engine: Engine, limiter: Arc<dyn RateLimiter>, config: ServerConfig) {
    let state = match ServerState::new(engine, limiter, &config.identity_header, config.templates)
    {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("invalid server configuration: {err:?}");
            return;
        }
    };

    let address = format!("{}:{}", config.bind, config.port);
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {address}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(state, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
