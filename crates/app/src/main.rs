use std::path::Path;
use std::sync::Arc;

use candlescope_api::server::{AppState, start_server};
use candlescope_core::common::Credential;
use candlescope_core::common::time::RealTimeProvider;
use candlescope_core::config::AppConfig;
use candlescope_feed::tinkoff::TinkoffProvider;
use candlescope_market::client::{CandleClient, ClientOptions};
use candlescope_market::pipeline::CandlePipeline;
use candlescope_render::svg::SvgChartRenderer;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// # Summary
/// 分层加载配置。
///
/// # Logic
/// 1. 代码内默认值（`AppConfig` 各字段的 `serde(default)`）。
/// 2. 可选的 `candlescope.toml`。
/// 3. 可选的 `secrets.toml`，存放不入库的 Token。
/// 4. 环境变量 `CANDLESCOPE__*`，例如 `CANDLESCOPE__SERVER__PORT=8080`。
///
/// # Arguments
/// * `dir`: 配置文件所在目录。
///
/// # Returns
/// 合并后的配置，文件格式错误时返回 `ConfigError`。
fn load_config(dir: &Path) -> Result<AppConfig, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(dir.join("candlescope.toml")).required(false))
        .add_source(config::File::from(dir.join("secrets.toml")).required(false))
        .add_source(
            config::Environment::with_prefix("CANDLESCOPE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// 初始化全局日志，返回的 guard 需要持有到进程退出
fn init_logging() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received. Exiting...");
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
///
/// # Logic
/// 1. 初始化全局日志与 TLS 加密后端。
/// 2. 加载分层配置。
/// 3. 实例化基础设施层（T-Invest 行情源、系统时钟、SVG 渲染器）。
/// 4. 组装 `CandleClient` 与 `CandlePipeline`。
/// 5. 启动 HTTP 服务，等待 Ctrl-C 优雅退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 日志与 TLS
    let _log_guard = init_logging();
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }
    info!("Candlescope starting...");

    // 2. 配置
    let config = load_config(Path::new("."))?;
    let credential = Credential::from_optional(config.token.clone());
    if credential.is_none() {
        warn!("No upstream token configured; every query will fail until one is provided");
    }

    // 3. 基础设施层
    let feed = Arc::new(TinkoffProvider::new(&config.upstream)?);
    info!("Upstream endpoint: {}", feed.endpoint());
    let clock = Arc::new(RealTimeProvider);
    let renderer = Arc::new(SvgChartRenderer::default());

    // 4. 领域服务
    let client = CandleClient::new(feed, clock, ClientOptions::from(&config));
    let pipeline = Arc::new(CandlePipeline::new(client));

    let state = AppState {
        pipeline,
        renderer,
        credential,
        form: Arc::new(config.form.clone()),
    };

    // 5. HTTP 服务
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    start_server(state, &bind_addr, shutdown_signal()).await?;

    info!("Candlescope stopped");
    Ok(())
}
