//! # `candlescope-api` - HTTP 展示层
//!
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 浏览器表单：`GET /` 与 `POST /run`，返回内联图表的 HTML
//! - JSON 接口：`/api/v1/candles/{instrument_id}` 与 `/api/v1/intervals`
//! - 调用下层 `CandlePipeline` 与 `ChartRenderer`，将领域错误映射为 HTTP 状态码

pub mod error;
pub mod routes;
pub mod server;
pub mod types;
