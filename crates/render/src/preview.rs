use candlescope_core::market::entity::{Candle, CandleTable};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// 结果页默认展示的行数
pub const DEFAULT_PREVIEW_ROWS: usize = 30;

#[derive(Tabled)]
struct PreviewRow {
    #[tabled(rename = "time (UTC)")]
    time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: u64,
    flags: String,
}

impl From<&Candle> for PreviewRow {
    fn from(candle: &Candle) -> Self {
        let mut flags = Vec::new();
        if !candle.is_complete {
            flags.push("incomplete");
        }
        if candle.ohlc_suspect {
            flags.push("suspect");
        }
        Self {
            time: candle.open_time.format("%Y-%m-%d %H:%M").to_string(),
            open: candle.open.to_string(),
            high: candle.high.to_string(),
            low: candle.low.to_string(),
            close: candle.close.to_string(),
            volume: candle.volume,
            flags: flags.join(","),
        }
    }
}

/// # Summary
/// 将最近 `rows` 根 K 线渲染为文本表格。
///
/// # Arguments
/// * `table`: 规整后的 K 线表。
/// * `rows`: 最多展示的行数，按时间升序取最后若干根。
///
/// # Returns
/// 带表头的多行文本。
pub fn table_preview(table: &CandleTable, rows: usize) -> String {
    let mut preview = Table::new(table.tail(rows).iter().map(PreviewRow::from));
    preview.with(Style::psql());
    preview.to_string()
}
