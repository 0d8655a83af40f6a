//! # 行情路由控制器
//!
//! 实现 `/api/v1/candles/{instrument_id}` 与 `/api/v1/intervals` 两个 JSON 接口。

use axum::Json;
use axum::extract::{Path, Query, State};
use candlescope_core::common::interval::Granularity;
use candlescope_core::market::request::CandleRequest;
use serde::Deserialize;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, CandleTableResponse, IntervalResponse};

/// K 线查询参数，缺省时取表单默认值
#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    /// 回溯天数
    pub days_back: Option<String>,
    /// 周期，例如 `4h`
    pub interval: Option<String>,
}

/// 获取规整后的历史 K 线
///
/// 回溯窗口以服务端当前时间为终点，返回严格按时间升序、时间戳唯一的 K 线。
#[utoipa::path(
    get,
    path = "/api/v1/candles/{instrument_id}",
    tag = "行情 (Market)",
    params(
        ("instrument_id" = String, Path, description = "标的代码 (FIGI 或 instrument uid)"),
        ("days_back" = Option<String>, Query, description = "回溯天数，缺省为表单默认值"),
        ("interval" = Option<String>, Query, description = "周期 (e.g., 4h, 1d)，缺省为表单默认值")
    ),
    responses(
        (status = 200, description = "成功获取 K 线", body = ApiResponse<CandleTableResponse>),
        (status = 400, description = "参数不合法、上游拒绝或结果为空"),
        (status = 401, description = "上游拒绝凭证"),
        (status = 500, description = "未配置上游 Token"),
        (status = 503, description = "上游暂时不可用")
    )
)]
pub async fn get_candles(
    State(state): State<AppState>,
    Path(instrument_id): Path<String>,
    Query(query): Query<CandlesQuery>,
) -> Result<Json<ApiResponse<CandleTableResponse>>, ApiError> {
    let credential = state.require_credential()?;
    let days_back = query
        .days_back
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.form.days_back.to_string());
    let interval = query
        .interval
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.form.interval.clone());

    let request = CandleRequest::build(&instrument_id, &days_back, &interval)?;
    let table = state.pipeline.run(Some(credential), &request).await?;

    let response = CandleTableResponse::new(
        request.instrument_id(),
        request.days_back(),
        state.pipeline.source_name(),
        &table,
    );
    Ok(Json(ApiResponse::ok(response)))
}

/// 列出支持的周期
#[utoipa::path(
    get,
    path = "/api/v1/intervals",
    tag = "行情 (Market)",
    responses(
        (status = 200, description = "支持的周期，按桶时长升序", body = ApiResponse<Vec<IntervalResponse>>)
    )
)]
pub async fn list_intervals() -> Json<ApiResponse<Vec<IntervalResponse>>> {
    let intervals = Granularity::ALL
        .iter()
        .map(|g| IntervalResponse::from(*g))
        .collect();
    Json(ApiResponse::ok(intervals))
}
