//! # HTML 表单页面
//!
//! `GET /` 展示查询表单，`POST /run` 执行管线并内联图表与最近若干根 K 线。

use axum::Form;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use candlescope_core::common::interval::IntervalResolver;
use candlescope_core::market::request::CandleRequest;
use candlescope_render::preview::{DEFAULT_PREVIEW_ROWS, table_preview};
use candlescope_render::to_data_uri;
use serde::Deserialize;
use std::fmt::Write;

use crate::error::ApiError;
use crate::server::AppState;

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:1080px;margin:24px auto;color:#263238}\
label{display:inline-block;width:130px}\
input{margin:4px 0;padding:4px}\
pre{background:#f5f7fa;padding:12px;overflow-x:auto}\
.error{color:#c62828}\
.muted{color:#78909c;font-size:13px}";

/// `POST /run` 的表单字段，空白的天数与周期回落到默认值
#[derive(Debug, Deserialize)]
pub struct RunForm {
    #[serde(default)]
    pub instrument_id: String,
    #[serde(default)]
    pub days_back: String,
    #[serde(default)]
    pub interval: String,
}

/// 以 HTML 页面形式返回的错误，状态码与 JSON 接口一致
pub struct ErrorPage(pub ApiError);

impl From<ApiError> for ErrorPage {
    fn from(err: ApiError) -> Self {
        ErrorPage(err)
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let body = format!(
            r#"<h2 class="error">Request failed</h2><p>{}</p><p class="muted">{}</p><p><a href="/">Back</a></p>"#,
            escape_html(&self.0.public_message()),
            self.0.kind()
        );
        (self.0.status(), Html(page("Error", &body))).into_response()
    }
}

/// 转义 HTML 特殊字符
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{} - Candlescope</title>\
         <style>{}</style></head><body>{}</body></html>",
        escape_html(title),
        PAGE_STYLE,
        body
    )
}

/// # Summary
/// 查询表单，预填配置中的默认值。
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let body = format!(
        r#"<h1>Candlescope</h1>
<form method="post" action="/run">
<div><label for="instrument_id">Instrument ID</label><input id="instrument_id" name="instrument_id" value="{instrument}"></div>
<div><label for="days_back">Days back</label><input id="days_back" name="days_back" type="number" min="1" value="{days}"></div>
<div><label for="interval">Interval</label><input id="interval" name="interval" value="{interval}"></div>
<div><button type="submit">Run</button></div>
</form>
<p class="muted">Supported intervals: {supported}. Data source: {source}.</p>"#,
        instrument = escape_html(&state.form.instrument_id),
        days = state.form.days_back,
        interval = escape_html(&state.form.interval),
        supported = IntervalResolver::supported_tokens().join(", "),
        source = escape_html(state.pipeline.source_name()),
    );
    Html(page("Candlescope", &body))
}

/// # Summary
/// 执行一次检索并返回结果页。
///
/// # Logic
/// 1. 未配置 Token 时直接返回 500 错误页。
/// 2. 空白的天数与周期取默认值，构造并校验请求。
/// 3. 执行管线，渲染图表并编码为 data URI。
/// 4. 附带最近 30 根 K 线的文本表格、行数与诊断信息。
pub async fn run(
    State(state): State<AppState>,
    Form(form): Form<RunForm>,
) -> Result<Html<String>, ErrorPage> {
    let credential = state.require_credential()?;
    let days_back = if form.days_back.trim().is_empty() {
        state.form.days_back.to_string()
    } else {
        form.days_back
    };
    let interval = if form.interval.trim().is_empty() {
        state.form.interval.clone()
    } else {
        form.interval
    };

    let request = CandleRequest::build(&form.instrument_id, &days_back, &interval)
        .map_err(ApiError::from)?;
    let table = state
        .pipeline
        .run(Some(credential), &request)
        .await
        .map_err(ApiError::from)?;

    let chart = state.renderer.render(&table).map_err(ApiError::from)?;
    let chart_uri = to_data_uri(state.renderer.media_type(), &chart);
    let preview = table_preview(&table, DEFAULT_PREVIEW_ROWS);

    let mut body = format!(
        r#"<h1>{instrument}</h1>
<p>{days} day(s), interval {interval} ({code}), {rows} candle(s). Data source: {source}.</p>
<img alt="candlestick chart" src="{chart}">
<h3>Last {shown} candle(s)</h3>
<pre>{preview}</pre>"#,
        instrument = escape_html(request.instrument_id()),
        days = request.days_back(),
        interval = request.interval().token(),
        code = request.interval().granularity_code(),
        rows = table.len(),
        source = escape_html(state.pipeline.source_name()),
        chart = chart_uri,
        shown = table.tail(DEFAULT_PREVIEW_ROWS).len(),
        preview = escape_html(&preview),
    );
    if !table.diagnostics().is_empty() {
        body.push_str("<h3>Diagnostics</h3><ul>");
        for diagnostic in table.diagnostics() {
            write!(body, "<li>{}</li>", escape_html(&diagnostic.to_string()))
                .map_err(|e| ApiError::Internal(e.to_string()))?;
        }
        body.push_str("</ul>");
    }
    body.push_str(r#"<p><a href="/">New query</a></p>"#);

    Ok(Html(page(request.instrument_id(), &body)))
}
