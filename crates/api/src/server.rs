//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的 DI 容器持有并调用。

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use candlescope_core::common::Credential;
use candlescope_core::config::FormDefaults;
use candlescope_core::render::port::ChartRenderer;
use candlescope_market::pipeline::CandlePipeline;

use crate::error::ApiError;
use crate::routes::{market, web};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - 所有字段在服务启动前由 DI 容器注入，生命周期与进程等同。
/// - 凭证只读，请求之间不共享任何可变状态。
#[derive(Clone)]
pub struct AppState {
    /// 检索 + 规整管线
    pub pipeline: Arc<CandlePipeline>,
    /// 图表渲染器
    pub renderer: Arc<dyn ChartRenderer>,
    /// 上游凭证，未配置时为 `None`
    pub credential: Option<Credential>,
    /// 表单与查询参数的默认值
    pub form: Arc<FormDefaults>,
}

impl AppState {
    /// 取出凭证，未配置时返回 `ApiError::MissingToken`
    pub fn require_credential(&self) -> Result<&Credential, ApiError> {
        self.credential.as_ref().ok_or_else(ApiError::missing_token)
    }
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Candlescope API",
        version = "0.1.0",
        description = "从 T-Invest 拉取历史 K 线，规整后以 JSON 或图表形式返回。",
        license(name = "MIT")
    ),
    tags(
        (name = "行情 (Market)", description = "K 线检索与支持的周期")
    )
)]
pub struct ApiDoc;

// ============================================================
//  服务构建与启动
// ============================================================

/// # Summary
/// 构建完整的 axum 应用路由树。
///
/// # Logic
/// 1. JSON 接口经 `OpenApiRouter` 注册，自动收集 OpenAPI 文档。
/// 2. HTML 表单页面不进入文档。
/// 3. 挂载 Swagger UI 与 CORS。
pub fn build_router(state: AppState) -> Router {
    let (api_router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(market::get_candles))
        .routes(routes!(market::list_intervals))
        .with_state(state.clone())
        .split_for_parts();

    let web_router = Router::new()
        .route("/", get(web::index))
        .route("/run", post(web::run))
        .with_state(state);

    // 开发阶段允许所有来源
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_router
        .merge(web_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// # Summary
/// 绑定端口并启动 HTTP 服务，直到 `shutdown` 完成。
///
/// # Arguments
/// * `state` - 由外部 DI 容器注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"127.0.0.1:5000"`
/// * `shutdown` - 完成时触发优雅退出
///
/// # Returns
/// 绑定或服务失败时返回 IO 错误。
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Candlescope listening on http://{}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
