use candlescope_core::common::Credential;
use candlescope_core::common::time::TimeProvider;
use candlescope_core::config::AppConfig;
use candlescope_core::market::entity::{RawCandle, TimeWindow};
use candlescope_core::market::error::{CandleError, UpstreamError};
use candlescope_core::market::port::{CandlePage, CandleSource, PageQuery};
use candlescope_core::market::request::CandleRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// # Summary
/// 暂时性故障的指数退避策略。
///
/// # Invariants
/// - `max_attempts` 包含首次请求，至少按 1 次处理。
/// - 任意一次等待都不超过 `max_delay`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 只尝试一次，不重试
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// # Summary
    /// 第 `failures` 次失败后的等待时间。
    ///
    /// # Logic
    /// `base_delay * 2^(failures - 1)`，溢出时饱和，最后截断到 `max_delay`。
    /// 上游给出的等待建议更长时取建议值，同样不超过 `max_delay`。
    pub fn delay_after(&self, failures: u32, hint: Option<Duration>) -> Duration {
        let factor = 2_u32
            .checked_pow(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor);
        backoff.max(hint.unwrap_or_default()).min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// # Summary
/// `CandleClient` 的可调参数。
#[derive(Debug, Clone)]
pub struct ClientOptions {
    // 单页记录上限
    pub page_limit: usize,
    // 单次抓取允许的最大页数，防止上游游标异常导致死循环
    pub max_pages: u32,
    pub retry: RetryPolicy,
    // 整次抓取（全部分页与重试）的超时
    pub fetch_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_limit: 1000,
            max_pages: 500,
            retry: RetryPolicy::default(),
            fetch_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl From<&AppConfig> for ClientOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_limit: config.upstream.page_limit,
            max_pages: config.upstream.max_pages,
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                base_delay: Duration::from_millis(config.retry.base_delay_ms),
                max_delay: Duration::from_millis(config.retry.max_delay_ms),
            },
            fetch_timeout: config.fetch_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// # Summary
/// 上游行情 API 客户端：鉴权检查、顺序分页、重试，产出按时间升序的原始 K 线。
///
/// # Invariants
/// - 分页严格顺序执行，第 N+1 页的起点依赖第 N 页的结果。
/// - 一次 `fetch` 要么返回完整序列，要么返回错误，不返回截断的数据。
/// - 不缓存任何数据，不跨调用保留状态。
pub struct CandleClient {
    // 上游数据源驱动
    source: Arc<dyn CandleSource>,
    // 计算抓取窗口用的时钟
    clock: Arc<dyn TimeProvider>,
    options: ClientOptions,
}

impl CandleClient {
    pub fn new(
        source: Arc<dyn CandleSource>,
        clock: Arc<dyn TimeProvider>,
        options: ClientOptions,
    ) -> Self {
        Self {
            source,
            clock,
            options,
        }
    }

    /// 上游数据源名称
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// # Summary
    /// 抓取请求窗口内的全部原始 K 线。
    ///
    /// # Logic
    /// 1. 凭证缺失或空白时立即失败，不发起网络请求。
    /// 2. 以当前时钟计算窗口 `[now - days_back, now]`。
    /// 3. 预估页数超出 `max_pages` 时返回 `days_back` 校验错误，不发起网络请求。
    /// 4. 顺序分页抓取，可选地受整体超时约束。
    ///
    /// # Arguments
    /// * `credential`: 可选的 Bearer 凭证。
    /// * `request`: 已校验的请求。
    ///
    /// # Returns
    /// 成功返回按 `open_time` 升序的原始 K 线。
    pub async fn fetch(
        &self,
        credential: Option<&Credential>,
        request: &CandleRequest,
    ) -> Result<Vec<RawCandle>, CandleError> {
        let credential = credential.filter(|c| !c.is_blank()).ok_or_else(|| {
            CandleError::Authentication("no API token configured".to_string())
        })?;

        let window = request.window_ending_at(self.clock.now())?;
        let pages = self.estimated_pages(request, &window);
        if pages > i64::from(self.options.max_pages) {
            warn!(
                "Refusing {} {} over {}: needs ~{} pages, budget is {}",
                request.instrument_id(),
                request.interval().token(),
                window,
                pages,
                self.options.max_pages
            );
            return Err(CandleError::Validation {
                field: "days_back",
                reason: format!(
                    "{} day(s) of {} candles need about {} upstream pages, more than the limit of {}; \
                     shorten the window or use a coarser interval",
                    request.days_back(),
                    request.interval().token(),
                    pages,
                    self.options.max_pages
                ),
            });
        }
        info!(
            "Fetching {} {} candles over {} from {}",
            request.instrument_id(),
            request.interval().token(),
            window,
            self.source.name()
        );

        match self.options.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetch_window(credential, request, window))
                .await
                .map_err(|_| {
                    CandleError::UpstreamUnavailable(format!(
                        "fetch did not complete within {}s",
                        limit.as_secs_f64()
                    ))
                })?,
            None => self.fetch_window(credential, request, window).await,
        }
    }

    /// # Summary
    /// 估算覆盖窗口至少需要的页数。
    ///
    /// # Logic
    /// 取两者较大值：按记录数 `ceil(预期根数 / page_limit)`；
    /// 数据源限制单次跨度时按 `ceil(窗口长度 / max_span)`。
    fn estimated_pages(&self, request: &CandleRequest, window: &TimeWindow) -> i64 {
        let limit = i64::try_from(self.options.page_limit.max(1)).unwrap_or(i64::MAX);
        let by_count = ceil_div(request.interval().expected_candles(window.span()), limit);
        let by_span = self
            .source
            .max_span(request.interval().granularity())
            .map(|span| span.num_seconds())
            .filter(|secs| *secs > 0)
            .map_or(0, |secs| ceil_div(window.span().num_seconds(), secs));
        by_count.max(by_span)
    }

    /// # Summary
    /// 分页覆盖整个窗口。
    ///
    /// # Logic
    /// 1. 每页从 `from` 开始请求到窗口结束。
    /// 2. 下一页起点：上游游标优先，否则为本页最新 `open_time` 加一个桶时长。
    /// 3. 以下任一情况停止：无游标且本页不足 `page_limit` 条；起点已越过窗口结束。
    /// 4. 游标不前进或页数超限视为上游协议错误。
    /// 5. 汇总后按时间稳定排序；跨页重复的时间戳保持页序，规整时保留较早一页的记录。
    async fn fetch_window(
        &self,
        credential: &Credential,
        request: &CandleRequest,
        window: TimeWindow,
    ) -> Result<Vec<RawCandle>, CandleError> {
        let limit = self.options.page_limit.max(1);
        let bucket = request.interval().bucket_duration();
        let expected = request.interval().expected_candles(window.span());
        // 预留不超过一页
        let mut candles: Vec<RawCandle> =
            Vec::with_capacity(usize::try_from(expected).unwrap_or(0).min(limit));
        let mut from = window.start;
        let mut page_no: u32 = 0;

        loop {
            page_no += 1;
            if page_no > self.options.max_pages {
                return Err(CandleError::UpstreamRejected(format!(
                    "pagination exceeded {} pages without covering the window",
                    self.options.max_pages
                )));
            }

            let query = PageQuery {
                instrument_id: request.instrument_id().to_string(),
                granularity: request.interval().granularity(),
                from,
                to: window.end,
                limit,
                page: page_no,
            };
            let page = self.fetch_page_with_retry(credential, &query).await?;

            let received = page.candles.len();
            let latest = page.candles.iter().map(|c| c.open_time).max();
            debug!(
                "Page {} from {}: {} candle(s), cursor {:?}",
                page_no, from, received, page.next_cursor
            );
            candles.extend(page.candles);

            let next_from = match (page.next_cursor, latest) {
                (Some(cursor), _) => cursor,
                (None, _) if received < limit => break,
                (None, Some(latest)) => latest + bucket,
                (None, None) => break,
            };
            if next_from >= window.end {
                break;
            }
            if next_from <= from {
                return Err(CandleError::UpstreamRejected(format!(
                    "pagination cursor did not advance past {}",
                    from
                )));
            }
            from = next_from;
        }

        candles.sort_by_key(|c| c.open_time);
        info!(
            "Fetched {} candle(s) in {} page(s), expected at most {}",
            candles.len(),
            page_no,
            expected
        );
        Ok(candles)
    }

    /// # Summary
    /// 抓取单页，暂时性故障按退避策略重试。
    ///
    /// # Logic
    /// 1. `Transient`：未耗尽尝试次数则等待后重试，否则返回 `UpstreamUnavailable`。
    /// 2. `Rejected`：立即返回 `UpstreamRejected`，保留上游原因。
    /// 3. `Unauthenticated`：立即返回 `Authentication`。
    async fn fetch_page_with_retry(
        &self,
        credential: &Credential,
        query: &PageQuery,
    ) -> Result<CandlePage, CandleError> {
        let policy = &self.options.retry;
        let mut failures: u32 = 0;

        loop {
            match self.source.fetch_page(credential, query).await {
                Ok(page) => return Ok(page),
                Err(UpstreamError::Transient {
                    reason,
                    retry_after,
                }) => {
                    failures += 1;
                    if failures >= policy.attempts() {
                        return Err(CandleError::UpstreamUnavailable(format!(
                            "{} (gave up after {} attempt(s))",
                            reason, failures
                        )));
                    }
                    let delay = policy.delay_after(failures, retry_after);
                    warn!(
                        "Page {} failed transiently: {}; retry {}/{} in {:?}",
                        query.page,
                        reason,
                        failures,
                        policy.attempts() - 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(UpstreamError::Rejected(reason)) => {
                    return Err(CandleError::UpstreamRejected(reason));
                }
                Err(UpstreamError::Unauthenticated(reason)) => {
                    return Err(CandleError::Authentication(reason));
                }
            }
        }
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    value / divisor + i64::from(value % divisor != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_after(1, None), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2, None), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3, None), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4, None), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40, None), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_honours_longer_hint() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(30))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_after(2, Some(Duration::from_millis(10))),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(0, 1000), 0);
        assert_eq!(ceil_div(60, 25), 3);
        assert_eq!(ceil_div(1000, 1000), 1);
        assert_eq!(ceil_div(864_000, 1000), 864);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::none()
        };
        assert_eq!(policy.attempts(), 1);
    }
}
