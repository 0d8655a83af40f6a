use crate::common::interval::ResolvedInterval;
use crate::market::entity::{Candle, CandleTable, Diagnostic, RawCandle};
use crate::market::error::CandleError;
use tracing::{debug, warn};

/// # Summary
/// 将原始 K 线整理为严格有序、时间戳唯一的 `CandleTable`。
///
/// # Invariants
/// - 纯函数，结果只取决于输入。
/// - 只修复结构（顺序、唯一性），价格与成交量原样保留。
/// - 不合成占位 K 线，缺口保持为空。
pub struct CandleNormalizer;

impl CandleNormalizer {
    /// # Summary
    /// 规整原始 K 线序列。
    ///
    /// # Logic
    /// 1. 按 `open_time` 稳定排序（上游顺序不被信任）。
    /// 2. 相同时间戳只保留输入顺序中的第一条，其余记为诊断。
    /// 3. 相邻间隔大于桶时长时记录缺口诊断。
    /// 4. OHLC 不自洽的 K 线打上 `ohlc_suspect` 标记。
    /// 5. 未收盘的 K 线保留并记录诊断。
    /// 6. 结果为空时返回 `EmptyResult`。
    ///
    /// # Arguments
    /// * `raw`: 原始 K 线。
    /// * `resolved`: 请求所用的周期。
    ///
    /// # Returns
    /// 成功返回 `CandleTable`。
    pub fn normalize(
        raw: impl IntoIterator<Item = RawCandle>,
        resolved: &ResolvedInterval,
    ) -> Result<CandleTable, CandleError> {
        let mut records: Vec<RawCandle> = raw.into_iter().collect();
        records.sort_by_key(|c| c.open_time);

        let bucket = resolved.bucket_duration();
        let mut candles: Vec<Candle> = Vec::with_capacity(records.len());
        let mut diagnostics = Vec::new();

        for record in records {
            if let Some(prev) = candles.last() {
                if prev.open_time == record.open_time {
                    warn!(
                        "Duplicate candle at {} dropped (kept first occurrence)",
                        record.open_time
                    );
                    diagnostics.push(Diagnostic::DuplicateDropped {
                        open_time: record.open_time,
                    });
                    continue;
                }

                let delta = record.open_time - prev.open_time;
                if delta > bucket {
                    let missing_buckets = delta.num_seconds() / bucket.num_seconds() - 1;
                    debug!(
                        "Gap between {} and {}: ~{} bucket(s) missing",
                        prev.open_time, record.open_time, missing_buckets
                    );
                    diagnostics.push(Diagnostic::Gap {
                        after: prev.open_time,
                        before: record.open_time,
                        missing_buckets,
                    });
                }
            }

            let candle = Candle::from(record);
            if candle.ohlc_suspect {
                warn!(
                    "Inconsistent OHLC at {}: o={} h={} l={} c={}",
                    candle.open_time, candle.open, candle.high, candle.low, candle.close
                );
                diagnostics.push(Diagnostic::OhlcViolation {
                    open_time: candle.open_time,
                });
            }
            candles.push(candle);
        }

        let last_index = candles.len().checked_sub(1).ok_or_else(|| {
            CandleError::EmptyResult(format!(
                "upstream returned no {} candles for the requested window",
                resolved.token()
            ))
        })?;

        for (index, candle) in candles.iter().enumerate() {
            if !candle.is_complete {
                diagnostics.push(Diagnostic::Incomplete {
                    open_time: candle.open_time,
                    trailing: index == last_index,
                });
            }
        }

        Ok(CandleTable::from_normalized(*resolved, candles, diagnostics))
    }
}
