//! 测试替身：可编排响应的行情源与 K 线序列生成器。

use crate::common::Credential;
use crate::market::entity::RawCandle;
use crate::market::error::UpstreamError;
use crate::market::port::{CandlePage, CandleSource, PageQuery};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Mutex;

/// # Summary
/// 按脚本逐次返回响应的 `CandleSource`，并记录每次收到的请求。
///
/// # Invariants
/// - 脚本耗尽后返回空页。
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<CandlePage, UpstreamError>>>,
    calls: Mutex<Vec<PageQuery>>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<CandlePage, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的请求次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 已收到的请求，按调用顺序
    pub fn queries(&self) -> Vec<PageQuery> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CandleSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_page(
        &self,
        _credential: &Credential,
        query: &PageQuery,
    ) -> Result<CandlePage, UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(CandlePage::default()))
    }
}

/// # Summary
/// 生成 `count` 根等间隔、OHLC 自洽且全部已收盘的 K 线。
///
/// # Arguments
/// * `start`: 第一根的开始时间。
/// * `step`: 相邻 K 线间隔。
/// * `count`: 数量。
///
/// # Returns
/// 按时间升序的原始 K 线。
pub fn candle_series(start: DateTime<Utc>, step: Duration, count: u32) -> Vec<RawCandle> {
    (0..count)
        .map(|i| {
            let base = Decimal::from(250) + Decimal::from(i % 7);
            RawCandle {
                open_time: start + step * i32::try_from(i).unwrap_or(i32::MAX),
                open: base,
                high: base + Decimal::from(2),
                low: base - Decimal::from(2),
                close: base + Decimal::ONE,
                volume: 1_000 + u64::from(i),
                is_complete: true,
            }
        })
        .collect()
}

/// 一页数据，不带续传游标
pub fn page(candles: Vec<RawCandle>) -> CandlePage {
    CandlePage {
        candles,
        next_cursor: None,
    }
}
