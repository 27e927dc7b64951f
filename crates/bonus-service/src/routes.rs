//! 路由配置模块

use axum::{
    Router, middleware,
    routing::{get, post},
};
use bonus_shared::observability::middleware as obs_middleware;

use crate::{handlers, state::AppState};

/// 积分账本路由，挂载在 `/api/v1/bonus` 下
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/earn", post(handlers::bonus::earn))
        .route("/users/{user_id}/apply", post(handlers::bonus::apply))
        .route("/users/{user_id}/adjust", post(handlers::bonus::adjust))
        .route("/users/{user_id}/balance", get(handlers::bonus::get_balance))
        .route("/users/{user_id}/history", get(handlers::bonus::get_history))
        .route(
            "/operations/{operation_id}",
            get(handlers::bonus::get_operation),
        )
}

/// 组装完整应用：业务路由、探针和可观测性中间件
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/bonus", api_routes())
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
