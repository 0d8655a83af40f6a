//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use candlescope_core::common::interval::Granularity;
use candlescope_core::market::entity::{Candle, CandleTable, Diagnostic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================
//  行情相关 DTO
// ============================================================

/// 单根 K 线 DTO，价格以字符串承载以保留精度
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandleResponse {
    /// K 线开始时间 (UTC, RFC 3339)
    #[schema(example = "2025-03-10T07:00:00Z")]
    pub open_time: DateTime<Utc>,
    #[schema(example = "280.5")]
    pub open: String,
    #[schema(example = "283")]
    pub high: String,
    #[schema(example = "279.9")]
    pub low: String,
    #[schema(example = "282.1")]
    pub close: String,
    /// 成交量 (手)
    #[schema(example = 48211)]
    pub volume: u64,
    /// 是否已收盘
    pub is_complete: bool,
    /// OHLC 关系是否可疑
    pub ohlc_suspect: bool,
}

impl From<&Candle> for CandleResponse {
    fn from(candle: &Candle) -> Self {
        Self {
            open_time: candle.open_time,
            open: candle.open.to_string(),
            high: candle.high.to_string(),
            low: candle.low.to_string(),
            close: candle.close.to_string(),
            volume: candle.volume,
            is_complete: candle.is_complete,
            ohlc_suspect: candle.ohlc_suspect,
        }
    }
}

/// 规整过程中的诊断信息 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiagnosticResponse {
    /// 诊断类别 (duplicate_dropped, gap, ohlc_violation, incomplete)
    #[schema(example = "gap")]
    pub kind: String,
    /// 可读描述
    pub detail: String,
}

impl From<&Diagnostic> for DiagnosticResponse {
    fn from(diagnostic: &Diagnostic) -> Self {
        let kind = match diagnostic {
            Diagnostic::DuplicateDropped { .. } => "duplicate_dropped",
            Diagnostic::Gap { .. } => "gap",
            Diagnostic::OhlcViolation { .. } => "ohlc_violation",
            Diagnostic::Incomplete { .. } => "incomplete",
        };
        Self {
            kind: kind.to_string(),
            detail: diagnostic.to_string(),
        }
    }
}

/// K 线表 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CandleTableResponse {
    #[schema(example = "BBG004730N88")]
    pub instrument_id: String,
    /// 规范化后的周期写法
    #[schema(example = "4h")]
    pub interval: String,
    /// 上游粒度编码
    #[schema(example = "CANDLE_INTERVAL_4_HOUR")]
    pub granularity_code: String,
    #[schema(example = 10)]
    pub days_back: u32,
    /// 数据来源
    #[schema(example = "T-Invest REST")]
    pub source: String,
    /// 按时间严格升序
    pub candles: Vec<CandleResponse>,
    pub diagnostics: Vec<DiagnosticResponse>,
}

impl CandleTableResponse {
    pub fn new(instrument_id: &str, days_back: u32, source: &str, table: &CandleTable) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            interval: table.interval().token().to_string(),
            granularity_code: table.interval().granularity_code().to_string(),
            days_back,
            source: source.to_string(),
            candles: table.candles().iter().map(CandleResponse::from).collect(),
            diagnostics: table
                .diagnostics()
                .iter()
                .map(DiagnosticResponse::from)
                .collect(),
        }
    }
}

/// 支持的周期 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntervalResponse {
    #[schema(example = "4h")]
    pub token: String,
    #[schema(example = "CANDLE_INTERVAL_4_HOUR")]
    pub code: String,
    /// 单桶时长 (秒)
    #[schema(example = 14400)]
    pub bucket_seconds: i64,
}

impl From<Granularity> for IntervalResponse {
    fn from(granularity: Granularity) -> Self {
        Self {
            token: granularity.token().to_string(),
            code: granularity.code().to_string(),
            bucket_seconds: granularity.bucket().num_seconds(),
        }
    }
}

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 机器可读的错误类别
    #[schema(example = "validation")]
    pub kind: String,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误类别与信息构建
    pub fn from_msg(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.into(),
            error: msg.into(),
        }
    }
}
