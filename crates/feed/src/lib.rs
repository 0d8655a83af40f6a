//! 上游行情源适配器。
//!
//! 目前只有 T-Invest REST 网关一种实现，对外暴露为 `CandleSource`。

pub mod tinkoff;
