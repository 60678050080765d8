//! 服务启动：加载配置、初始化运行时、组装依赖、启动 HTTP 服务器

mod infrastructure;
mod runtime;

pub use infrastructure::*;
pub use runtime::*;

use std::net::SocketAddr;
use std::sync::Arc;

use cardgate_config::AppConfig;
use tracing::{info, warn};

use crate::api::http::{AppState, HttpOptions, build_router};

/// 运行卡片激活服务直到收到关闭信号
pub async fn run(config_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载配置
    let config = AppConfig::load(config_dir)?;

    // 2. 初始化运行时
    init_runtime(&config);
    info!("Starting {} card activation service", config.app_name);

    // 3. Prometheus 指标
    let metrics = match cardgate_telemetry::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed, /metrics disabled");
            None
        }
    };

    // 4. 组装基础设施与领域服务
    let infra = Infrastructure::from_config(&config).await?;

    let mut state = AppState::new(Arc::clone(&infra.service))
        .with_health_checks(infra.health_checks.clone());
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    let router = build_router(state, &HttpOptions::from(&config.server));

    // 5. 启动服务器
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Service stopped");
    Ok(())
}
