use std::time::Duration;
use thiserror::Error;

/// # Summary
/// K 线管线对调用方暴露的唯一错误类型，封闭的分类集合。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 每个变体都携带可直接展示给用户的说明文字。
/// - 管线从不在返回错误的同时返回部分数据。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandleError {
    // 用户输入不合法，在任何网络访问之前发现
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    // 凭证缺失或被上游拒绝
    #[error("Authentication error: {0}")]
    Authentication(String),
    // 周期字符串不在支持集合内
    #[error("Unsupported interval: {0}")]
    UnsupportedInterval(String),
    // 上游永久性拒绝（无效标的、无效窗口等），不重试
    #[error("Upstream rejected the request: {0}")]
    UpstreamRejected(String),
    // 暂时性故障在重试预算耗尽后仍未恢复
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    // 规整后没有任何 K 线
    #[error("No candles: {0}")]
    EmptyResult(String),
}

impl CandleError {
    /// # Summary
    /// 稳定的机器可读错误类别，供展示层做 JSON 错误码。
    pub fn kind(&self) -> &'static str {
        match self {
            CandleError::Validation { .. } => "validation",
            CandleError::Authentication(_) => "authentication",
            CandleError::UnsupportedInterval(_) => "unsupported_interval",
            CandleError::UpstreamRejected(_) => "upstream_rejected",
            CandleError::UpstreamUnavailable(_) => "upstream_unavailable",
            CandleError::EmptyResult(_) => "empty_result",
        }
    }
}

/// # Summary
/// 上游行情源单次分页请求的失败分类。
///
/// # Invariants
/// - 只有 `Transient` 允许重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    // 限流、网络抖动、5xx 等可重试故障
    #[error("Transient upstream failure: {reason}")]
    Transient {
        reason: String,
        // 上游建议的最短等待时间（如 Retry-After / ratelimit-reset）
        retry_after: Option<Duration>,
    },
    // 上游明确拒绝请求，附带上游给出的原因
    #[error("Upstream rejected: {0}")]
    Rejected(String),
    // 上游拒绝凭证
    #[error("Upstream refused credential: {0}")]
    Unauthenticated(String),
}

impl UpstreamError {
    /// 构造不带等待建议的暂时性错误
    pub fn transient(reason: impl Into<String>) -> Self {
        UpstreamError::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }
}
