use async_trait::async_trait;
use candlescope_core::common::Credential;
use candlescope_core::common::interval::Granularity;
use candlescope_core::config::UpstreamConfig;
use candlescope_core::market::entity::RawCandle;
use candlescope_core::market::error::UpstreamError;
use candlescope_core::market::port::{CandlePage, CandleSource, PageQuery};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// REST 网关上的 GetCandles 方法路径
pub const GET_CANDLES_PATH: &str =
    "/rest/tinkoff.public.invest.api.contract.v1.MarketDataService/GetCandles";

// 网关在错误体中透传的 gRPC 状态码
const GRPC_PERMISSION_DENIED: i32 = 7;
const GRPC_RESOURCE_EXHAUSTED: i32 = 8;
const GRPC_UNAVAILABLE: i32 = 14;
const GRPC_UNAUTHENTICATED: i32 = 16;

/// # Summary
/// T-Invest 行情提供者，经 REST 网关调用 `MarketDataService/GetCandles`。
///
/// # Invariants
/// - 每次 `fetch_page` 只发出一个 HTTP 请求，重试由上层负责。
/// - 单次请求的时间跨度不超过该粒度的上游上限，超出部分通过续传游标交回调用方。
#[derive(Clone)]
pub struct TinkoffProvider {
    // 内部使用的 HTTP 客户端
    client: Client,
    // GetCandles 完整地址
    endpoint: String,
}

impl TinkoffProvider {
    /// # Summary
    /// 按上游配置创建提供者。
    ///
    /// # Logic
    /// 1. 以 `request_timeout_secs` 作为单个 HTTP 请求的超时。
    /// 2. 拼接 `base_url` 与 GetCandles 路径。
    ///
    /// # Arguments
    /// * `config`: 上游配置。
    ///
    /// # Returns
    /// HTTP 客户端构建失败时返回 `reqwest::Error`。
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("candlescope/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), GET_CANDLES_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// # Summary
/// 上游对单次 GetCandles 请求允许的最大时间跨度。
pub fn max_request_span(granularity: Granularity) -> ChronoDuration {
    match granularity {
        Granularity::Minute1
        | Granularity::Minute2
        | Granularity::Minute3
        | Granularity::Minute5
        | Granularity::Minute10
        | Granularity::Minute15 => ChronoDuration::days(1),
        Granularity::Minute30 => ChronoDuration::days(2),
        Granularity::Hour1 => ChronoDuration::weeks(1),
        Granularity::Hour2 | Granularity::Hour4 => ChronoDuration::days(30),
        Granularity::Day1 => ChronoDuration::days(365),
        Granularity::Week1 => ChronoDuration::days(730),
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GetCandlesRequest<'a> {
    instrument_id: &'a str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: &'static str,
    limit: usize,
}

#[derive(Deserialize, Debug)]
struct GetCandlesResponse {
    #[serde(default)]
    candles: Vec<HistoricCandle>,
}

/// # Summary
/// 网关返回的单根历史 K 线。
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HistoricCandle {
    open: Quotation,
    high: Quotation,
    low: Quotation,
    close: Quotation,
    // int64 在网关 JSON 中以字符串表示
    #[serde(default, deserialize_with = "de_int64")]
    volume: i64,
    time: DateTime<Utc>,
    #[serde(default)]
    is_complete: bool,
}

/// # Summary
/// 上游定点数：`units + nano * 10^-9`，两部分同号。
#[derive(Deserialize, Debug, Default, Clone, Copy)]
struct Quotation {
    #[serde(default, deserialize_with = "de_int64")]
    units: i64,
    #[serde(default)]
    nano: i32,
}

impl Quotation {
    fn to_decimal(self) -> Decimal {
        (Decimal::from(self.units) + Decimal::new(i64::from(self.nano), 9)).normalize()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Int64Repr {
    Number(i64),
    Text(String),
}

fn de_int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Int64Repr::deserialize(deserializer)? {
        Int64Repr::Number(n) => Ok(n),
        Int64Repr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl HistoricCandle {
    fn into_raw(self) -> Result<RawCandle, UpstreamError> {
        let volume = u64::try_from(self.volume).map_err(|_| {
            UpstreamError::Rejected(format!(
                "negative volume {} in candle at {}",
                self.volume, self.time
            ))
        })?;
        Ok(RawCandle {
            open_time: self.time,
            open: self.open.to_decimal(),
            high: self.high.to_decimal(),
            low: self.low.to_decimal(),
            close: self.close.to_decimal(),
            volume,
            is_complete: self.is_complete,
        })
    }
}

/// # Summary
/// 网关错误体，字段均可能缺失。
#[derive(Deserialize, Debug, Default)]
struct GatewayError {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl GatewayError {
    fn reason(&self, status: StatusCode) -> String {
        let parts: Vec<&str> = [self.message.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, parts.join(" - "))
        }
    }
}

/// 从响应头读取上游建议的等待时间（秒）
fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    [RETRY_AFTER.as_str(), "x-ratelimit-reset"]
        .into_iter()
        .find_map(|name| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// # Summary
/// 将非 2xx 响应归类为 `UpstreamError`。
///
/// # Logic
/// 1. 401 / UNAUTHENTICATED / 403 / PERMISSION_DENIED：凭证问题。
/// 2. 429 / RESOURCE_EXHAUSTED / UNAVAILABLE / 408 / 5xx：可重试。
/// 3. 其他：永久拒绝，保留上游说明。
fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &GatewayError,
) -> UpstreamError {
    let reason = body.reason(status);
    let credential_refused = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || matches!(body.code, Some(GRPC_UNAUTHENTICATED | GRPC_PERMISSION_DENIED));
    if credential_refused {
        return UpstreamError::Unauthenticated(reason);
    }

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT
    ) || status.is_server_error()
        || matches!(body.code, Some(GRPC_RESOURCE_EXHAUSTED | GRPC_UNAVAILABLE));
    if retryable {
        UpstreamError::Transient {
            reason,
            retry_after,
        }
    } else {
        UpstreamError::Rejected(reason)
    }
}

#[async_trait]
impl CandleSource for TinkoffProvider {
    fn name(&self) -> &str {
        "T-Invest REST"
    }

    fn max_span(&self, granularity: Granularity) -> Option<ChronoDuration> {
        Some(max_request_span(granularity))
    }

    /// # Summary
    /// 调用 GetCandles 抓取一页。
    ///
    /// # Logic
    /// 1. 请求结束时间截断到 `from + max_request_span`。
    /// 2. 以 Bearer 凭证 POST JSON 请求体。
    /// 3. 非 2xx 响应按状态码与 gRPC 码分类。
    /// 4. Quotation 转为 `Decimal`，volume 转为 `u64`。
    /// 5. 发生截断且本页未满时，以截断点作为续传游标。
    async fn fetch_page(
        &self,
        credential: &Credential,
        query: &PageQuery,
    ) -> Result<CandlePage, UpstreamError> {
        let clamped_to = query
            .from
            .checked_add_signed(max_request_span(query.granularity))
            .map_or(query.to, |limit| limit.min(query.to));
        let body = GetCandlesRequest {
            instrument_id: &query.instrument_id,
            from: query.from,
            to: clamped_to,
            interval: query.granularity.code(),
            limit: query.limit,
        };
        debug!(
            "GetCandles page {}: {} {} [{}, {})",
            query.page, body.instrument_id, body.interval, body.from, body.to
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::transient(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let hint = retry_hint(resp.headers());
            let detail: GatewayError = resp.json().await.unwrap_or_default();
            let err = classify_failure(status, hint, &detail);
            warn!("GetCandles page {} failed: {}", query.page, err);
            return Err(err);
        }

        let payload: GetCandlesResponse = resp.json().await.map_err(|e| {
            UpstreamError::Rejected(format!("malformed GetCandles response: {}", e))
        })?;
        let candles = payload
            .candles
            .into_iter()
            .map(HistoricCandle::into_raw)
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = (clamped_to < query.to && candles.len() < query.limit).then_some(clamped_to);
        Ok(CandlePage {
            candles,
            next_cursor,
        })
    }
}
