use crate::market::error::CandleError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// # Summary
/// 系统支持的 K 线粒度，对应上游 `CandleInterval` 枚举的一个子集。
///
/// # Invariants
/// - 集合固定，运行时不可扩展。
/// - 每个粒度都有确定的桶时长与上游编码。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Granularity {
    Minute1,
    Minute2,
    Minute3,
    Minute5,
    Minute10,
    Minute15,
    Minute30,
    Hour1,
    Hour2,
    Hour4,
    Day1,
    Week1,
}

impl Granularity {
    /// 按桶时长升序排列的全部粒度
    pub const ALL: [Granularity; 12] = [
        Granularity::Minute1,
        Granularity::Minute2,
        Granularity::Minute3,
        Granularity::Minute5,
        Granularity::Minute10,
        Granularity::Minute15,
        Granularity::Minute30,
        Granularity::Hour1,
        Granularity::Hour2,
        Granularity::Hour4,
        Granularity::Day1,
        Granularity::Week1,
    ];

    /// # Summary
    /// 上游 API 识别的粒度编码。
    pub fn code(self) -> &'static str {
        match self {
            Granularity::Minute1 => "CANDLE_INTERVAL_1_MIN",
            Granularity::Minute2 => "CANDLE_INTERVAL_2_MIN",
            Granularity::Minute3 => "CANDLE_INTERVAL_3_MIN",
            Granularity::Minute5 => "CANDLE_INTERVAL_5_MIN",
            Granularity::Minute10 => "CANDLE_INTERVAL_10_MIN",
            Granularity::Minute15 => "CANDLE_INTERVAL_15_MIN",
            Granularity::Minute30 => "CANDLE_INTERVAL_30_MIN",
            Granularity::Hour1 => "CANDLE_INTERVAL_HOUR",
            Granularity::Hour2 => "CANDLE_INTERVAL_2_HOUR",
            Granularity::Hour4 => "CANDLE_INTERVAL_4_HOUR",
            Granularity::Day1 => "CANDLE_INTERVAL_DAY",
            Granularity::Week1 => "CANDLE_INTERVAL_WEEK",
        }
    }

    /// # Summary
    /// 单根 K 线覆盖的墙钟时长。
    pub fn bucket(self) -> Duration {
        match self {
            Granularity::Minute1 => Duration::minutes(1),
            Granularity::Minute2 => Duration::minutes(2),
            Granularity::Minute3 => Duration::minutes(3),
            Granularity::Minute5 => Duration::minutes(5),
            Granularity::Minute10 => Duration::minutes(10),
            Granularity::Minute15 => Duration::minutes(15),
            Granularity::Minute30 => Duration::minutes(30),
            Granularity::Hour1 => Duration::hours(1),
            Granularity::Hour2 => Duration::hours(2),
            Granularity::Hour4 => Duration::hours(4),
            Granularity::Day1 => Duration::days(1),
            Granularity::Week1 => Duration::weeks(1),
        }
    }

    /// 规范化的短写形式，例如 `4h`
    pub fn token(self) -> &'static str {
        match self {
            Granularity::Minute1 => "1m",
            Granularity::Minute2 => "2m",
            Granularity::Minute3 => "3m",
            Granularity::Minute5 => "5m",
            Granularity::Minute10 => "10m",
            Granularity::Minute15 => "15m",
            Granularity::Minute30 => "30m",
            Granularity::Hour1 => "1h",
            Granularity::Hour2 => "2h",
            Granularity::Hour4 => "4h",
            Granularity::Day1 => "1d",
            Granularity::Week1 => "1w",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// 用户输入别名到粒度的静态映射表（键均为小写）
const INTERVAL_TABLE: &[(&str, Granularity)] = &[
    ("1m", Granularity::Minute1),
    ("1min", Granularity::Minute1),
    ("2m", Granularity::Minute2),
    ("2min", Granularity::Minute2),
    ("3m", Granularity::Minute3),
    ("3min", Granularity::Minute3),
    ("5m", Granularity::Minute5),
    ("5min", Granularity::Minute5),
    ("10m", Granularity::Minute10),
    ("10min", Granularity::Minute10),
    ("15m", Granularity::Minute15),
    ("15min", Granularity::Minute15),
    ("30m", Granularity::Minute30),
    ("30min", Granularity::Minute30),
    ("1h", Granularity::Hour1),
    ("60m", Granularity::Hour1),
    ("hour", Granularity::Hour1),
    ("1hour", Granularity::Hour1),
    ("2h", Granularity::Hour2),
    ("2hour", Granularity::Hour2),
    ("4h", Granularity::Hour4),
    ("4hour", Granularity::Hour4),
    ("1d", Granularity::Day1),
    ("day", Granularity::Day1),
    ("1day", Granularity::Day1),
    ("1w", Granularity::Week1),
    ("week", Granularity::Week1),
    ("1week", Granularity::Week1),
];

/// # Summary
/// 周期解析结果：上游粒度编码 + 单桶时长。
///
/// # Invariants
/// - 只能通过 `IntervalResolver` 构造，因此一定落在支持集合内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedInterval {
    granularity: Granularity,
}

impl ResolvedInterval {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// 上游 API 使用的粒度编码
    pub fn granularity_code(&self) -> &'static str {
        self.granularity.code()
    }

    /// 单根 K 线的墙钟时长，用于缺口检测与分页游标推进
    pub fn bucket_duration(&self) -> Duration {
        self.granularity.bucket()
    }

    pub fn token(&self) -> &'static str {
        self.granularity.token()
    }

    /// # Summary
    /// 估算给定时间跨度内最多可能出现的 K 线数量。
    ///
    /// # Logic
    /// 跨度按桶时长向上取整；非交易时段会让实际数量更少。
    ///
    /// # Arguments
    /// * `span`: 时间窗口长度。
    ///
    /// # Returns
    /// 预期 K 线根数，跨度非正时为 0。
    pub fn expected_candles(&self, span: Duration) -> i64 {
        let bucket = self.bucket_duration().num_seconds();
        let span = span.num_seconds();
        if span <= 0 {
            return 0;
        }
        (span + bucket - 1) / bucket
    }
}

impl fmt::Display for ResolvedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token(), self.granularity_code())
    }
}

impl From<Granularity> for ResolvedInterval {
    fn from(granularity: Granularity) -> Self {
        Self { granularity }
    }
}

/// # Summary
/// 将用户输入的周期字符串（如 `4h`）解析为上游粒度。
///
/// # Invariants
/// - 纯函数：无副作用，对同一输入总是返回相同结果。
pub struct IntervalResolver;

impl IntervalResolver {
    /// # Summary
    /// 解析周期字符串。
    ///
    /// # Logic
    /// 1. 去除首尾空白。
    /// 2. 大写 `M` 结尾按行情惯例表示月线，不在支持集合内，直接拒绝。
    /// 3. 转小写后在静态表中查找。
    ///
    /// # Arguments
    /// * `token`: 用户输入的周期。
    ///
    /// # Returns
    /// 成功返回 `ResolvedInterval`，否则返回 `CandleError::UnsupportedInterval`。
    pub fn resolve(token: &str) -> Result<ResolvedInterval, CandleError> {
        let trimmed = token.trim();
        let unsupported = || {
            CandleError::UnsupportedInterval(format!(
                "'{}' (supported: {})",
                trimmed,
                Self::supported_tokens().join(", ")
            ))
        };

        if trimmed.ends_with('M') {
            return Err(unsupported());
        }

        let normalized = trimmed.to_ascii_lowercase();
        INTERVAL_TABLE
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, granularity)| ResolvedInterval::from(*granularity))
            .ok_or_else(unsupported)
    }

    /// 规范化的周期写法列表，按桶时长升序
    pub fn supported_tokens() -> Vec<&'static str> {
        Granularity::ALL.iter().map(|g| g.token()).collect()
    }
}
