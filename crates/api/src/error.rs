//! # API 统一错误处理
//!
//! 将管线与渲染的错误类型统一映射到 HTTP 状态码与 JSON 响应体。
//! HTML 页面复用同一套状态码，见 `routes::web::ErrorPage`。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use candlescope_core::market::error::CandleError;
use candlescope_core::render::error::RenderError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 输入不合法或上游拒绝请求 (400)
    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },

    /// 上游拒绝凭证 (401)
    #[error("{0}")]
    Unauthorized(String),

    /// 服务端未配置上游 Token (500)
    #[error("{0}")]
    MissingToken(String),

    /// 上游暂时不可用，重试耗尽 (503)
    #[error("{0}")]
    Unavailable(String),

    /// 内部错误，如渲染失败 (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// 未配置 Token 时的统一提示
    pub fn missing_token() -> Self {
        ApiError::MissingToken(
            "No upstream API token configured. Put `token = \"...\"` into secrets.toml \
             or set CANDLESCOPE__TOKEN."
                .to_string(),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::MissingToken(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// 机器可读的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest { kind, .. } => *kind,
            ApiError::Unauthorized(_) => "authentication",
            ApiError::MissingToken(_) => "missing_token",
            ApiError::Unavailable(_) => "upstream_unavailable",
            ApiError::Internal(_) => "internal",
        }
    }

    /// # Summary
    /// 面向客户端的错误信息。
    ///
    /// # Logic
    /// 内部错误只记录日志，不向客户端透传细节。
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse::from_msg(self.kind(), self.public_message()));
        (self.status(), body).into_response()
    }
}

/// 从 `CandleError` 转换，每个变体都有确定的状态码
impl From<CandleError> for ApiError {
    fn from(err: CandleError) -> Self {
        let kind = err.kind();
        match err {
            CandleError::Validation { .. }
            | CandleError::UnsupportedInterval(_)
            | CandleError::UpstreamRejected(_)
            | CandleError::EmptyResult(_) => ApiError::BadRequest {
                kind,
                message: err.to_string(),
            },
            CandleError::Authentication(_) => ApiError::Unauthorized(err.to_string()),
            CandleError::UpstreamUnavailable(_) => ApiError::Unavailable(err.to_string()),
        }
    }
}

/// 从 `RenderError` 转换
impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Internal(format!("chart rendering failed: {}", err))
    }
}
