use crate::common::Credential;
use crate::common::interval::Granularity;
use crate::market::entity::RawCandle;
use crate::market::error::UpstreamError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// # Summary
/// 一次分页请求的参数。
///
/// # Invariants
/// - `from < to`。
/// - `page` 从 1 开始，仅用于日志与诊断。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    // 交易所标的代码（FIGI / instrument uid）
    pub instrument_id: String,
    // 上游粒度
    pub granularity: Granularity,
    // 本页起始时间（含）
    pub from: DateTime<Utc>,
    // 整个窗口的结束时间
    pub to: DateTime<Utc>,
    // 单页最多返回的记录数
    pub limit: usize,
    // 页序号
    pub page: u32,
}

/// # Summary
/// 上游返回的一页数据。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandlePage {
    // 本页 K 线，上游约定按时间升序
    pub candles: Vec<RawCandle>,
    // 上游给出的续传位置；存在时下一页必须从该时间继续
    pub next_cursor: Option<DateTime<Utc>>,
}

/// # Summary
/// 上游行情数据源接口（原始数据源）。
///
/// # Invariants
/// - 每次调用只发起一次逻辑请求，重试与分页由调用方负责。
/// - 不得在不同凭证之间共享限流状态。
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 数据源名称，用于页面展示与日志
    fn name(&self) -> &str;

    /// # Summary
    /// 单次请求允许覆盖的最大时间跨度。
    ///
    /// # Returns
    /// `None` 表示不限制跨度，只受 `limit` 约束。
    fn max_span(&self, _granularity: Granularity) -> Option<Duration> {
        None
    }

    /// # Summary
    /// 抓取一页 K 线。
    ///
    /// # Logic
    /// 1. 以凭证鉴权。
    /// 2. 请求 `[from, to)` 内最多 `limit` 条记录。
    /// 3. 将上游错误归类为 `UpstreamError`。
    ///
    /// # Arguments
    /// * `credential`: 非空白的 Bearer 凭证。
    /// * `query`: 分页参数。
    ///
    /// # Returns
    /// 成功返回一页数据。
    async fn fetch_page(
        &self,
        credential: &Credential,
        query: &PageQuery,
    ) -> Result<CandlePage, UpstreamError>;
}
