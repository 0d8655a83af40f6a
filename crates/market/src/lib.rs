//! # `candlescope-market` - K 线抓取服务
//!
//! - `client`：对上游行情源做顺序分页、有限次指数退避重试，整体成功或整体失败。
//! - `pipeline`：校验 → 抓取 → 规整的一站式入口，供展示层调用。

pub mod client;
pub mod pipeline;
