//! # `candlescope-core` - 领域核心
//!
//! 定义 K 线检索管线中所有与基础设施无关的部分：
//! - 实体：`RawCandle`、`Candle`、`CandleTable`、`CandleRequest`
//! - 端口：上游行情源 `CandleSource`、图表渲染 `ChartRenderer`、时钟 `TimeProvider`
//! - 纯逻辑：周期解析 `IntervalResolver`、请求校验、K 线规整 `CandleNormalizer`
//! - 统一错误分类 `CandleError`

pub mod common;
pub mod config;
pub mod market;
pub mod render;

#[cfg(feature = "test-utils")]
pub mod test_utils;
