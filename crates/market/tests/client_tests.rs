use async_trait::async_trait;
use candlescope_core::common::Credential;
use candlescope_core::common::interval::Granularity;
use candlescope_core::common::time::FakeClockProvider;
use candlescope_core::market::error::{CandleError, UpstreamError};
use candlescope_core::market::port::{CandlePage, CandleSource, PageQuery};
use candlescope_core::market::request::CandleRequest;
use candlescope_core::test_utils::{ScriptedSource, candle_series, page};
use candlescope_market::client::{CandleClient, ClientOptions, RetryPolicy};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 11, 12, 0, 0).unwrap()
}

fn options(page_limit: usize) -> ClientOptions {
    ClientOptions {
        page_limit,
        max_pages: 50,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: StdDuration::ZERO,
            max_delay: StdDuration::ZERO,
        },
        fetch_timeout: None,
    }
}

fn client(source: Arc<ScriptedSource>, page_limit: usize) -> CandleClient {
    CandleClient::new(
        source,
        Arc::new(FakeClockProvider::new(now())),
        options(page_limit),
    )
}

fn token() -> Credential {
    Credential::new("t.test-token")
}

fn sber_request() -> CandleRequest {
    CandleRequest::build("BBG004730N88", "10", "4h").unwrap()
}

/// 窗口起点开始的 60 根 4 小时 K 线，恰好覆盖 10 天
fn ten_days() -> Vec<candlescope_core::market::entity::RawCandle> {
    candle_series(now() - Duration::days(10), Duration::hours(4), 60)
}

#[tokio::test]
async fn test_three_pages_are_fetched_sequentially() {
    let all = ten_days();
    let source = Arc::new(ScriptedSource::new([
        Ok(page(all[0..25].to_vec())),
        Ok(page(all[25..50].to_vec())),
        Ok(page(all[50..60].to_vec())),
    ]));
    let client = client(source.clone(), 25);

    let candles = client.fetch(Some(&token()), &sber_request()).await.unwrap();

    assert_eq!(source.call_count(), 3);
    assert_eq!(candles, all);

    let queries = source.queries();
    assert_eq!(queries[0].from, now() - Duration::days(10));
    assert_eq!(queries[1].from, all[24].open_time + Duration::hours(4));
    assert_eq!(queries[2].from, all[49].open_time + Duration::hours(4));
    assert!(queries.iter().all(|q| q.to == now() && q.limit == 25));
    assert_eq!(
        queries.iter().map(|q| q.page).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn test_stops_when_window_is_covered() {
    let all = ten_days();
    // 每页恰好满额，最后一页结束后起点越过窗口终点
    let source = Arc::new(ScriptedSource::new([
        Ok(page(all[0..30].to_vec())),
        Ok(page(all[30..60].to_vec())),
    ]));
    let client = client(source.clone(), 30);

    let candles = client.fetch(Some(&token()), &sber_request()).await.unwrap();
    assert_eq!(source.call_count(), 2);
    assert_eq!(candles.len(), 60);
}

#[tokio::test]
async fn test_permanent_failure_on_page_two_discards_everything() {
    let all = ten_days();
    let source = Arc::new(ScriptedSource::new([
        Ok(page(all[0..25].to_vec())),
        Err(UpstreamError::Rejected("instrument not found".to_string())),
        Ok(page(all[50..60].to_vec())),
    ]));
    let client = client(source.clone(), 25);

    let result = client.fetch(Some(&token()), &sber_request()).await;

    assert_eq!(
        result,
        Err(CandleError::UpstreamRejected(
            "instrument not found".to_string()
        ))
    );
    // 永久性错误不重试，也不会继续请求第 3 页
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let all = ten_days();
    let source = Arc::new(ScriptedSource::new([
        Ok(page(all[0..25].to_vec())),
        Err(UpstreamError::transient("HTTP 503")),
        Err(UpstreamError::Transient {
            reason: "rate limited".to_string(),
            retry_after: Some(StdDuration::from_millis(5)),
        }),
        Ok(page(all[25..50].to_vec())),
        Ok(page(all[50..60].to_vec())),
    ]));
    let client = client(source.clone(), 25);

    let candles = client.fetch(Some(&token()), &sber_request()).await.unwrap();
    assert_eq!(candles, all);
    assert_eq!(source.call_count(), 5);

    // 重试沿用同一页的参数
    let queries = source.queries();
    assert_eq!(queries[1], queries[2]);
    assert_eq!(queries[2], queries[3]);
}

#[tokio::test]
async fn test_exhausted_retries_surface_unavailable() {
    let source = Arc::new(ScriptedSource::new([
        Err(UpstreamError::transient("connection reset")),
        Err(UpstreamError::transient("connection reset")),
        Err(UpstreamError::transient("connection reset")),
        Ok(page(ten_days())),
    ]));
    let client = client(source.clone(), 1000);

    let result = client.fetch(Some(&token()), &sber_request()).await;

    match result {
        Err(CandleError::UpstreamUnavailable(detail)) => {
            assert!(detail.contains("connection reset"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_rejected_credential_is_authentication_error() {
    let source = Arc::new(ScriptedSource::new([Err(
        UpstreamError::Unauthenticated("40003: token is invalid".to_string()),
    )]));
    let client = client(source.clone(), 1000);

    let result = client.fetch(Some(&token()), &sber_request()).await;
    assert!(matches!(result, Err(CandleError::Authentication(_))));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_missing_credential_fails_without_network() {
    let source = Arc::new(ScriptedSource::new([Ok(page(ten_days()))]));
    let client = client(source.clone(), 1000);

    let missing = client.fetch(None, &sber_request()).await;
    assert!(matches!(missing, Err(CandleError::Authentication(_))));

    let blank = Credential::new("   ");
    let blank_result = client.fetch(Some(&blank), &sber_request()).await;
    assert!(matches!(blank_result, Err(CandleError::Authentication(_))));

    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_window_is_computed_at_call_time() {
    let clock = Arc::new(FakeClockProvider::new(now()));
    let source = Arc::new(ScriptedSource::new([
        Ok(page(ten_days())),
        Ok(page(ten_days())),
    ]));
    let client = CandleClient::new(source.clone(), clock.clone(), options(1000));
    let request = sber_request();

    client.fetch(Some(&token()), &request).await.unwrap();
    clock.advance(Duration::hours(3));
    client.fetch(Some(&token()), &request).await.unwrap();

    let queries = source.queries();
    assert_eq!(queries[0].to, now());
    assert_eq!(queries[1].to, now() + Duration::hours(3));
    assert_eq!(queries[1].from - queries[0].from, Duration::hours(3));
}

#[tokio::test]
async fn test_upstream_cursor_drives_next_page() {
    let all = ten_days();
    let cursor = now() - Duration::days(5);
    let source = Arc::new(ScriptedSource::new([
        // 上游截断了请求区间，本页数据不足但给出续传位置
        Ok(CandlePage {
            candles: all[0..30].to_vec(),
            next_cursor: Some(cursor),
        }),
        Ok(page(all[30..60].to_vec())),
    ]));
    let client = client(source.clone(), 1000);

    let candles = client.fetch(Some(&token()), &sber_request()).await.unwrap();
    assert_eq!(candles.len(), 60);
    assert_eq!(source.call_count(), 2);
    assert_eq!(source.queries()[1].from, cursor);
}

#[tokio::test]
async fn test_stalled_cursor_is_rejected() {
    let start = now() - Duration::days(10);
    let source = Arc::new(ScriptedSource::new([Ok(CandlePage {
        candles: Vec::new(),
        next_cursor: Some(start),
    })]));
    let client = client(source.clone(), 1000);

    let result = client.fetch(Some(&token()), &sber_request()).await;
    assert!(matches!(result, Err(CandleError::UpstreamRejected(_))));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_page_budget_is_enforced() {
    // 预估 3 页足够，但上游游标每页只前进 1 小时
    let start = now() - Duration::days(10);
    let source = Arc::new(ScriptedSource::new((1..=4).map(|hours| {
        Ok(CandlePage {
            candles: Vec::new(),
            next_cursor: Some(start + Duration::hours(hours)),
        })
    })));
    let mut opts = options(25);
    opts.max_pages = 3;
    let client = CandleClient::new(source.clone(), Arc::new(FakeClockProvider::new(now())), opts);

    let result = client.fetch(Some(&token()), &sber_request()).await;
    assert!(matches!(result, Err(CandleError::UpstreamRejected(_))));
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_window_beyond_page_budget_fails_before_network() {
    let source = Arc::new(ScriptedSource::new([Ok(page(ten_days()))]));
    let client = CandleClient::new(
        source.clone(),
        Arc::new(FakeClockProvider::new(now())),
        ClientOptions::default(),
    );

    // 600 天分钟线约 864000 根，默认预算 1000 * 500
    let request = CandleRequest::build("SBER", "600", "1m").unwrap();
    let result = client.fetch(Some(&token()), &request).await;
    assert!(matches!(
        result,
        Err(CandleError::Validation {
            field: "days_back",
            ..
        })
    ));
    assert_eq!(source.call_count(), 0);
}

/// 每次请求最多覆盖一天的数据源，只统计调用次数
struct DailyChunkSource {
    calls: AtomicUsize,
}

#[async_trait]
impl CandleSource for DailyChunkSource {
    fn name(&self) -> &str {
        "daily-chunks"
    }

    fn max_span(&self, _granularity: Granularity) -> Option<Duration> {
        Some(Duration::days(1))
    }

    async fn fetch_page(
        &self,
        _credential: &Credential,
        query: &PageQuery,
    ) -> Result<CandlePage, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CandlePage {
            candles: Vec::new(),
            next_cursor: Some(query.from + Duration::days(1)),
        })
    }
}

#[tokio::test]
async fn test_source_span_limit_counts_towards_budget() {
    let source = Arc::new(DailyChunkSource {
        calls: AtomicUsize::new(0),
    });
    let mut opts = options(1000);
    opts.max_pages = 10;
    let client = CandleClient::new(source.clone(), Arc::new(FakeClockProvider::new(now())), opts);

    // 按记录数 1 页即可，按跨度需要 30 页
    let too_long = CandleRequest::build("SBER", "30", "1h").unwrap();
    let result = client.fetch(Some(&token()), &too_long).await;
    assert!(matches!(
        result,
        Err(CandleError::Validation {
            field: "days_back",
            ..
        })
    ));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    let fits = CandleRequest::build("SBER", "10", "1h").unwrap();
    let candles = client.fetch(Some(&token()), &fits).await.unwrap();
    assert!(candles.is_empty());
    assert_eq!(source.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_result_buffer_is_bounded_by_page_limit() {
    let source = Arc::new(ScriptedSource::new([Ok(page(Vec::new()))]));
    let mut opts = options(1000);
    opts.max_pages = 500;
    let client = CandleClient::new(source.clone(), Arc::new(FakeClockProvider::new(now())), opts);

    // 300 天分钟线的理论根数为 432000
    let request = CandleRequest::build("SBER", "300", "1m").unwrap();
    let candles = client.fetch(Some(&token()), &request).await.unwrap();
    assert!(candles.is_empty());
    assert!(candles.capacity() < 10_000);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_out_of_order_pages_are_sorted() {
    let all = ten_days();
    let mut shuffled = all.clone();
    shuffled.swap(0, 59);
    shuffled.swap(10, 20);
    let source = Arc::new(ScriptedSource::new([Ok(page(shuffled))]));
    let client = client(source, 1000);

    let candles = client.fetch(Some(&token()), &sber_request()).await.unwrap();
    assert_eq!(candles, all);
}

/// 永远不会及时返回的数据源
struct StalledSource;

#[async_trait]
impl CandleSource for StalledSource {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn fetch_page(
        &self,
        _credential: &Credential,
        _query: &PageQuery,
    ) -> Result<CandlePage, UpstreamError> {
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        Ok(CandlePage::default())
    }
}

#[tokio::test]
async fn test_overall_timeout_surfaces_unavailable() {
    let mut opts = options(1000);
    opts.fetch_timeout = Some(StdDuration::from_millis(50));
    let client = CandleClient::new(
        Arc::new(StalledSource),
        Arc::new(FakeClockProvider::new(now())),
        opts,
    );

    let result = client.fetch(Some(&token()), &sber_request()).await;
    assert!(matches!(result, Err(CandleError::UpstreamUnavailable(_))));
}
