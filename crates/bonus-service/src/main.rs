//! 积分账本服务
//!
//! 提供积分获得、使用、调整和查询的 REST API。

use std::sync::Arc;

use axum::http::HeaderValue;
use bonus_service::{
    BonusLedgerService, InMemoryLedgerStore, LedgerStore, PgLedgerRepository, repository::MIGRATOR,
    routes, state::AppState,
};
use bonus_shared::{
    config::{AppConfig, StorageBackend},
    database::Database,
    observability,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "bonus-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let _guard = observability::init(&config.observability()).await?;

    info!(
        environment = %config.environment,
        storage = ?config.ledger.storage,
        "Starting {} on {}",
        SERVICE_NAME,
        config.server_addr()
    );

    let (store, db): (Arc<dyn LedgerStore>, Option<Database>) = match config.ledger.storage {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            db.run_migrations(&MIGRATOR).await?;
            let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerRepository::new(db.pool().clone()));
            (store, Some(db))
        }
        StorageBackend::Memory => {
            if config.is_production() {
                warn!("内存存储不会持久化积分流水，不应在生产环境使用");
            }
            let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
            (store, None)
        }
    };

    let ledger = Arc::new(BonusLedgerService::from_config(store, &config.ledger));
    let state = AppState::new(ledger, db.clone());

    let app = routes::build_router(state).layer(cors_layer(&config));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }

    info!("Server shutdown complete");

    Ok(())
}

/// CORS 配置，"*" 表示允许任意来源
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allowed_origins = config.server.cors_origins.trim();

    if allowed_origins == "*" {
        if config.is_production() {
            warn!("cors_origins=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("注册 Ctrl+C 处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("注册 SIGTERM 处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
