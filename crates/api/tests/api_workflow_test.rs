use candlescope_api::server::{AppState, build_router};
use candlescope_api::types::{ApiErrorResponse, ApiResponse, CandleTableResponse, IntervalResponse};
use candlescope_core::common::Credential;
use candlescope_core::common::time::FakeClockProvider;
use candlescope_core::config::FormDefaults;
use candlescope_core::market::error::UpstreamError;
use candlescope_core::test_utils::{ScriptedSource, candle_series, page};
use candlescope_market::client::{CandleClient, ClientOptions, RetryPolicy};
use candlescope_market::pipeline::CandlePipeline;
use candlescope_render::svg::SvgChartRenderer;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::net::TcpListener;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 11, 12, 0, 0).unwrap()
}

fn sber_page() -> Result<candlescope_core::market::port::CandlePage, UpstreamError> {
    Ok(page(candle_series(
        now() - Duration::days(10),
        Duration::hours(4),
        60,
    )))
}

fn http() -> reqwest::Client {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // 已由其他测试安装
    }
    reqwest::Client::new()
}

// 帮助函数：在随机端口启动测试服务器
async fn spawn_test_server(source: Arc<ScriptedSource>, token: Option<&str>) -> String {
    let options = ClientOptions {
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::ZERO,
            max_delay: std::time::Duration::ZERO,
        },
        fetch_timeout: None,
        ..ClientOptions::default()
    };
    let client = CandleClient::new(source, Arc::new(FakeClockProvider::new(now())), options);
    let state = AppState {
        pipeline: Arc::new(CandlePipeline::new(client)),
        renderer: Arc::new(SvgChartRenderer::default()),
        credential: Credential::from_optional(token.map(str::to_string)),
        form: Arc::new(FormDefaults::default()),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let router = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_candles_json_happy_path() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source.clone(), Some("t.token")).await;

    let resp = http()
        .get(format!(
            "{}/api/v1/candles/BBG004730N88?days_back=10&interval=4h",
            addr
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: ApiResponse<CandleTableResponse> = resp.json().await?;
    assert!(body.success);
    let data = body.data.unwrap();
    assert_eq!(data.instrument_id, "BBG004730N88");
    assert_eq!(data.interval, "4h");
    assert_eq!(data.granularity_code, "CANDLE_INTERVAL_4_HOUR");
    assert_eq!(data.days_back, 10);
    assert_eq!(data.source, "scripted");
    assert_eq!(data.candles.len(), 60);
    assert!(data.diagnostics.is_empty());
    assert!(
        data.candles
            .windows(2)
            .all(|pair| pair[0].open_time < pair[1].open_time)
    );
    assert_eq!(source.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_query_defaults_come_from_form_config() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source.clone(), Some("t.token")).await;

    let resp = http()
        .get(format!("{}/api/v1/candles/BBG004730N88", addr))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let queries = source.queries();
    assert_eq!(queries[0].from, now() - Duration::days(10));
    assert_eq!(queries[0].granularity.token(), "4h");
    Ok(())
}

#[tokio::test]
async fn test_invalid_interval_is_rejected_before_upstream() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source.clone(), Some("t.token")).await;

    let resp = http()
        .get(format!(
            "{}/api/v1/candles/BBG004730N88?days_back=10&interval=1M",
            addr
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ApiErrorResponse = resp.json().await?;
    assert!(!body.success);
    assert_eq!(body.kind, "validation");
    assert!(body.error.contains("interval"));
    assert_eq!(source.call_count(), 0);

    // 超出分页预算的窗口同样在访问上游之前被拒绝
    let resp = http()
        .get(format!(
            "{}/api/v1/candles/BBG004730N88?days_back=600&interval=1m",
            addr
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiErrorResponse = resp.json().await?;
    assert_eq!(body.kind, "validation");
    assert!(body.error.contains("days_back"));
    assert_eq!(source.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_token_is_server_error() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source.clone(), None).await;

    let resp = http()
        .get(format!("{}/api/v1/candles/BBG004730N88", addr))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ApiErrorResponse = resp.json().await?;
    assert_eq!(body.kind, "missing_token");
    assert_eq!(source.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failures_map_to_status_codes() -> anyhow::Result<()> {
    let refused = Arc::new(ScriptedSource::new([Err(UpstreamError::Unauthenticated(
        "40003".to_string(),
    ))]));
    let addr = spawn_test_server(refused, Some("t.bad")).await;
    let resp = http()
        .get(format!("{}/api/v1/candles/BBG004730N88", addr))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let flaky = Arc::new(ScriptedSource::new([
        Err(UpstreamError::transient("HTTP 502")),
        Err(UpstreamError::transient("HTTP 502")),
    ]));
    let addr = spawn_test_server(flaky.clone(), Some("t.token")).await;
    let resp = http()
        .get(format!("{}/api/v1/candles/BBG004730N88", addr))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(flaky.call_count(), 2);

    let unknown = Arc::new(ScriptedSource::new([Err(UpstreamError::Rejected(
        "instrument not found".to_string(),
    ))]));
    let addr = spawn_test_server(unknown, Some("t.token")).await;
    let resp = http()
        .get(format!("{}/api/v1/candles/NOPE", addr))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiErrorResponse = resp.json().await?;
    assert_eq!(body.kind, "upstream_rejected");
    assert!(body.error.contains("instrument not found"));
    Ok(())
}

#[tokio::test]
async fn test_list_intervals() -> anyhow::Result<()> {
    let addr = spawn_test_server(Arc::new(ScriptedSource::new([])), None).await;
    let body: ApiResponse<Vec<IntervalResponse>> = http()
        .get(format!("{}/api/v1/intervals", addr))
        .send()
        .await?
        .json()
        .await?;
    let intervals = body.data.unwrap();
    assert_eq!(intervals.len(), 12);
    let four_hours = intervals.iter().find(|i| i.token == "4h").unwrap();
    assert_eq!(four_hours.code, "CANDLE_INTERVAL_4_HOUR");
    assert_eq!(four_hours.bucket_seconds, 14_400);
    Ok(())
}

#[tokio::test]
async fn test_form_page_has_defaults() -> anyhow::Result<()> {
    let addr = spawn_test_server(Arc::new(ScriptedSource::new([])), Some("t.token")).await;
    let resp = http().get(format!("{}/", addr)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let html = resp.text().await?;
    assert!(html.contains(r#"value="BBG004730N88""#));
    assert!(html.contains(r#"value="10""#));
    assert!(html.contains(r#"value="4h""#));
    assert!(html.contains("scripted"));
    Ok(())
}

#[tokio::test]
async fn test_form_run_renders_chart_and_preview() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source, Some("t.token")).await;

    let resp = http()
        .post(format!("{}/run", addr))
        .form(&[
            ("instrument_id", " BBG004730N88 "),
            ("days_back", ""),
            ("interval", ""),
        ])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let html = resp.text().await?;
    assert!(html.contains("data:image/svg+xml;base64,"));
    assert!(html.contains("60 candle(s)"));
    assert!(html.contains("Last 30 candle(s)"));
    assert!(html.contains("<h1>BBG004730N88</h1>"));
    Ok(())
}

#[tokio::test]
async fn test_form_errors_render_error_page() -> anyhow::Result<()> {
    let source = Arc::new(ScriptedSource::new([sber_page()]));
    let addr = spawn_test_server(source.clone(), Some("t.token")).await;

    let resp = http()
        .post(format!("{}/run", addr))
        .form(&[("instrument_id", "<b>"), ("days_back", "-3"), ("interval", "4h")])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let html = resp.text().await?;
    assert!(html.contains("days_back"));
    assert_eq!(source.call_count(), 0);

    let no_token = spawn_test_server(Arc::new(ScriptedSource::new([])), None).await;
    let resp = http()
        .post(format!("{}/run", no_token))
        .form(&[("instrument_id", "BBG004730N88")])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await?.contains("secrets.toml"));
    Ok(())
}

#[tokio::test]
async fn test_openapi_document_lists_routes() -> anyhow::Result<()> {
    let addr = spawn_test_server(Arc::new(ScriptedSource::new([])), None).await;
    let doc: serde_json::Value = http()
        .get(format!("{}/api-docs/openapi.json", addr))
        .send()
        .await?
        .json()
        .await?;
    assert!(doc["paths"]["/api/v1/candles/{instrument_id}"].is_object());
    assert!(doc["paths"]["/api/v1/intervals"].is_object());
    Ok(())
}
