//! Example of wiring `limitcore` into an Axum middleware.
//!
//! Each request is keyed by client IP + path, so different routes and
//! different callers get independent token-bucket allowances from a single
//! shared `Dispatcher`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use limitcore::{Algorithm, Dispatcher, MemoryCache, RateLimitReq};

#[derive(Clone)]
struct AppState {
    limiter: Arc<Dispatcher>,
}

enum AppError {
    RateLimitExceeded,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
            }
        }
    }
}

async fn rate_limiter_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("{}:{}", addr.ip(), request.uri().path());
    let req = RateLimitReq::new(key, Algorithm::TokenBucket, 5, 1_000, 1);
    let resp = state
        .limiter
        .decide(&req)
        .map_err(|_| AppError::RateLimitExceeded)?;

    if !resp.is_under_limit() {
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

async fn hello_world() -> &'static str {
    "Hello, World!"
}

async fn status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> String {
    let key = format!("{}:/status", addr.ip());
    let inspect = RateLimitReq::new(key, Algorithm::TokenBucket, 5, 1_000, 0);
    match state.limiter.decide(&inspect) {
        Ok(resp) => format!("Remaining: {}/{}", resp.remaining, resp.limit),
        Err(e) => format!("error: {e}"),
    }
}

#[tokio::main]
async fn main() {
    let state = AppState {
        limiter: Arc::new(Dispatcher::new(Arc::new(MemoryCache::new()))),
    };

    let app = Router::new()
        .route("/", get(hello_world))
        .route("/status", get(status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limiter_middleware,
        ))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Server running on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
