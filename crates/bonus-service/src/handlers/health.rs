//! 健康检查处理器

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

const SERVICE_NAME: &str = "bonus-service";

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// 就绪探针：检查数据库连接是否可用
///
/// 内存存储模式下没有外部依赖，数据库检查标记为 skipped
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.db {
        Some(db) => {
            if db.health_check().await.is_ok() {
                "ok"
            } else {
                "fail"
            }
        }
        None => "skipped",
    };
    let ready = database != "fail";

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ok" } else { "degraded" },
            "service": SERVICE_NAME,
            "checks": {
                "database": database
            }
        })),
    )
}
