use crate::client::CandleClient;
use candlescope_core::common::Credential;
use candlescope_core::market::entity::CandleTable;
use candlescope_core::market::error::CandleError;
use candlescope_core::market::normalize::CandleNormalizer;
use candlescope_core::market::request::CandleRequest;
use tracing::info;

/// # Summary
/// 检索 + 规整管线，展示层的唯一入口。
///
/// # Invariants
/// - 请求校验在任何网络访问之前完成。
/// - 每次调用产出独立的 `CandleTable`，不跨请求共享。
pub struct CandlePipeline {
    client: CandleClient,
}

impl CandlePipeline {
    pub fn new(client: CandleClient) -> Self {
        Self { client }
    }

    /// 上游数据源名称
    pub fn source_name(&self) -> &str {
        self.client.source_name()
    }

    /// # Summary
    /// 从原始表单输入执行完整管线。
    ///
    /// # Logic
    /// 1. `CandleRequest::build` 校验输入，失败直接返回，不触发抓取。
    /// 2. 调用 `run` 抓取并规整。
    ///
    /// # Arguments
    /// * `credential`: 可选的上游凭证。
    /// * `raw_instrument` / `raw_days_back` / `raw_interval`: 未经校验的输入。
    ///
    /// # Returns
    /// 成功返回 `CandleTable`。
    pub async fn run_raw(
        &self,
        credential: Option<&Credential>,
        raw_instrument: &str,
        raw_days_back: &str,
        raw_interval: &str,
    ) -> Result<CandleTable, CandleError> {
        let request = CandleRequest::build(raw_instrument, raw_days_back, raw_interval)?;
        self.run(credential, &request).await
    }

    /// # Summary
    /// 对已校验的请求执行抓取与规整。
    pub async fn run(
        &self,
        credential: Option<&Credential>,
        request: &CandleRequest,
    ) -> Result<CandleTable, CandleError> {
        let raw = self.client.fetch(credential, request).await?;
        let table = CandleNormalizer::normalize(raw, request.interval())?;
        info!(
            "{} {}: {} candle(s), {} diagnostic(s)",
            request.instrument_id(),
            request.interval().token(),
            table.len(),
            table.diagnostics().len()
        );
        Ok(table)
    }
}
