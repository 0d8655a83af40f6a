use crate::common::interval::{IntervalResolver, ResolvedInterval};
use crate::market::entity::TimeWindow;
use crate::market::error::CandleError;
use chrono::{DateTime, Utc};

/// 回溯天数上限，保证窗口计算不会越过 chrono 的可表示范围
pub const MAX_DAYS_BACK: u32 = 36_500;

/// # Summary
/// 经过校验的不可变抓取请求。
///
/// # Invariants
/// - `instrument_id` 去除空白后非空。
/// - `1 <= days_back <= MAX_DAYS_BACK`。
/// - `interval` 一定在支持集合内。
/// - 不保存 "now"，时间窗口在每次抓取时重新计算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    instrument_id: String,
    days_back: u32,
    interval: ResolvedInterval,
}

impl CandleRequest {
    /// # Summary
    /// 从不可信的表单字符串构造请求。
    ///
    /// # Logic
    /// 1. 校验标的代码非空。
    /// 2. 解析回溯天数为正整数。
    /// 3. 通过 `IntervalResolver` 解析周期，失败转为 `interval` 字段的校验错误。
    ///
    /// # Arguments
    /// * `raw_instrument`: 标的代码。
    /// * `raw_days_back`: 回溯天数的字符串形式。
    /// * `raw_interval`: 周期字符串。
    ///
    /// # Returns
    /// 成功返回请求，失败返回 `CandleError::Validation`。
    pub fn build(
        raw_instrument: &str,
        raw_days_back: &str,
        raw_interval: &str,
    ) -> Result<Self, CandleError> {
        let instrument_id = parse_instrument(raw_instrument)?;
        let days_back = parse_days_back(raw_days_back)?;
        let interval = parse_interval(raw_interval)?;
        Ok(Self {
            instrument_id,
            days_back,
            interval,
        })
    }

    /// # Summary
    /// 回溯天数已是整数时的构造方式，校验规则与 `build` 相同。
    pub fn new(instrument_id: &str, days_back: i64, interval: &str) -> Result<Self, CandleError> {
        let instrument_id = parse_instrument(instrument_id)?;
        let days_back = check_days_back(days_back)?;
        let interval = parse_interval(interval)?;
        Ok(Self {
            instrument_id,
            days_back,
            interval,
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn days_back(&self) -> u32 {
        self.days_back
    }

    pub fn interval(&self) -> &ResolvedInterval {
        &self.interval
    }

    /// # Summary
    /// 以给定时刻为终点计算抓取窗口。
    ///
    /// # Arguments
    /// * `now`: 抓取发生的时刻。
    ///
    /// # Returns
    /// `[now - days_back, now]`。
    pub fn window_ending_at(&self, now: DateTime<Utc>) -> Result<TimeWindow, CandleError> {
        TimeWindow::ending_at(now, self.days_back).ok_or_else(|| CandleError::Validation {
            field: "days_back",
            reason: format!("{} days before {} is out of range", self.days_back, now),
        })
    }
}

fn parse_instrument(raw: &str) -> Result<String, CandleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CandleError::Validation {
            field: "instrument_id",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_days_back(raw: &str) -> Result<u32, CandleError> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<i64>()
        .map_err(|_| CandleError::Validation {
            field: "days_back",
            reason: format!("must be an integer, got '{}'", trimmed),
        })?;
    check_days_back(value)
}

fn check_days_back(value: i64) -> Result<u32, CandleError> {
    if value < 1 {
        return Err(CandleError::Validation {
            field: "days_back",
            reason: format!("must be at least 1, got {}", value),
        });
    }
    u32::try_from(value)
        .ok()
        .filter(|days| *days <= MAX_DAYS_BACK)
        .ok_or_else(|| CandleError::Validation {
            field: "days_back",
            reason: format!("must be at most {}, got {}", MAX_DAYS_BACK, value),
        })
}

fn parse_interval(raw: &str) -> Result<ResolvedInterval, CandleError> {
    IntervalResolver::resolve(raw).map_err(|e| CandleError::Validation {
        field: "interval",
        reason: e.to_string(),
    })
}
