use crate::common::interval::ResolvedInterval;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// # Summary
/// 上游返回的原始 K 线，一条 API 记录对应一根。
///
/// # Invariants
/// - 期望满足 `low <= min(open, close) <= max(open, close) <= high`，
///   但本层不做校正，违反的数据原样传递给规整器。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandle {
    // K 线桶的开始时间
    pub open_time: DateTime<Utc>,
    // 开盘价
    pub open: Decimal,
    // 最高价
    pub high: Decimal,
    // 最低价
    pub low: Decimal,
    // 收盘价
    pub close: Decimal,
    // 成交量（手）
    pub volume: u64,
    // 记录时该桶是否已收盘，最新一根可能是未完成的
    pub is_complete: bool,
}

impl RawCandle {
    /// # Summary
    /// 检查 OHLC 价格关系是否自洽。
    pub fn is_ohlc_consistent(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        self.low <= body_low && body_high <= self.high
    }
}

/// # Summary
/// 规整后的 K 线，附带下游需要感知的标记。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    // 未收盘的 K 线保留但标记，图表应区分绘制
    pub is_complete: bool,
    // OHLC 关系不自洽的可疑数据，数值保持原样
    pub ohlc_suspect: bool,
}

impl Candle {
    /// 收盘价不低于开盘价
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

impl From<RawCandle> for Candle {
    fn from(raw: RawCandle) -> Self {
        let ohlc_suspect = !raw.is_ohlc_consistent();
        Self {
            open_time: raw.open_time,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            is_complete: raw.is_complete,
            ohlc_suspect,
        }
    }
}

impl From<&Candle> for RawCandle {
    fn from(candle: &Candle) -> Self {
        Self {
            open_time: candle.open_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            is_complete: candle.is_complete,
        }
    }
}

/// # Summary
/// 规整过程中发现的非致命问题，只用于观测，不会中断管线。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    // 重复时间戳，保留输入顺序中的第一条，丢弃后续条目
    DuplicateDropped { open_time: DateTime<Utc> },
    // 相邻两根之间的间隔大于桶时长，缺口不做填充
    Gap {
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        missing_buckets: i64,
    },
    // OHLC 关系不自洽
    OhlcViolation { open_time: DateTime<Utc> },
    // 未收盘 K 线；`trailing` 表示位于序列末尾
    Incomplete {
        open_time: DateTime<Utc>,
        trailing: bool,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DuplicateDropped { open_time } => {
                write!(f, "duplicate candle at {} dropped", open_time)
            }
            Diagnostic::Gap {
                after,
                before,
                missing_buckets,
            } => write!(
                f,
                "gap of {} bucket(s) between {} and {}",
                missing_buckets, after, before
            ),
            Diagnostic::OhlcViolation { open_time } => {
                write!(f, "inconsistent OHLC values at {}", open_time)
            }
            Diagnostic::Incomplete {
                open_time,
                trailing: true,
            } => write!(f, "trailing candle at {} is not closed yet", open_time),
            Diagnostic::Incomplete {
                open_time,
                trailing: false,
            } => write!(f, "candle at {} is marked incomplete", open_time),
        }
    }
}

/// # Summary
/// 可直接交给图表或表格展示的 K 线表。
///
/// # Invariants
/// - 非空。
/// - `open_time` 严格递增且唯一。
/// - 只能由 `CandleNormalizer` 构造，不跨请求共享。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleTable {
    interval: ResolvedInterval,
    candles: Vec<Candle>,
    diagnostics: Vec<Diagnostic>,
}

impl CandleTable {
    pub(crate) fn from_normalized(
        interval: ResolvedInterval,
        candles: Vec<Candle>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            interval,
            candles,
            diagnostics,
        }
    }

    pub fn interval(&self) -> &ResolvedInterval {
        &self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// 最近的 `n` 根 K 线（不足 `n` 根时返回全部）
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    /// # Summary
    /// 全表价格区间 `(最低 low, 最高 high)`。
    ///
    /// # Returns
    /// 表为空时返回 `None`。
    pub fn price_range(&self) -> Option<(Decimal, Decimal)> {
        let first = self.candles.first()?;
        let range = self
            .candles
            .iter()
            .fold((first.low, first.high), |(low, high), c| {
                (low.min(c.low), high.max(c.high))
            });
        Some(range)
    }

    /// 最大单根成交量
    pub fn max_volume(&self) -> u64 {
        self.candles.iter().map(|c| c.volume).max().unwrap_or(0)
    }

    /// 还原为原始记录序列，标记信息丢弃
    pub fn to_raw(&self) -> Vec<RawCandle> {
        self.candles.iter().map(RawCandle::from).collect()
    }
}

/// # Summary
/// 抓取时间窗口 `[start, end]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// # Summary
    /// 以 `end` 为终点向前回溯 `days_back` 个自然日。
    ///
    /// # Returns
    /// 回溯越过 chrono 可表示范围时返回 `None`。
    pub fn ending_at(end: DateTime<Utc>, days_back: u32) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::days(i64::from(days_back)))?;
        Some(Self { start, end })
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
