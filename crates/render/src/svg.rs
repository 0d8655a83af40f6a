use candlescope_core::market::entity::{Candle, CandleTable};
use candlescope_core::render::error::RenderError;
use candlescope_core::render::port::ChartRenderer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt::Write;
use tracing::debug;

const MEDIA_TYPE: &str = "image/svg+xml";

// 画布边距（像素）
const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 32.0;
const MARGIN_BOTTOM: f64 = 28.0;
// 价格面板与成交量面板之间的间隔
const PANEL_GAP: f64 = 12.0;
// 实体宽度占单桶宽度的比例
const BODY_RATIO: f64 = 0.7;

const STYLE: &str = ".bg{fill:#ffffff}\
.frame{fill:none;stroke:#d0d4dc;stroke-width:1}\
.up{fill:#26a69a;stroke:#26a69a}\
.down{fill:#ef5350;stroke:#ef5350}\
.open{fill:none;stroke-dasharray:3 2}\
.wick{stroke-width:1}\
.vol{fill:#90a4ae;opacity:0.6}\
.suspect{fill:#ff9800}\
text{font-family:monospace;font-size:11px;fill:#37474f}";

/// # Summary
/// 纯 SVG K 线图渲染器：上方价格面板，下方成交量面板。
///
/// # Invariants
/// - 横轴按时间等比例映射，非交易时段与缺口保持可见。
/// - 未收盘 K 线绘制为空心虚线实体。
/// - OHLC 可疑的 K 线在最高价上方加橙色标记。
/// - 不依赖任何外部状态，同一输入得到完全相同的输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgChartRenderer {
    width: u32,
    height: u32,
}

impl SvgChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(240),
            height: height.max(160),
        }
    }
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self::new(1000, 560)
    }
}

/// # Summary
/// 价格到纵坐标的线性映射，上下各留少量留白。
#[derive(Debug, Clone, Copy)]
struct PriceScale {
    min: f64,
    range: f64,
    top: f64,
    height: f64,
}

impl PriceScale {
    fn new(low: f64, high: f64, top: f64, height: f64) -> Self {
        let spread = high - low;
        // 全部价格相同时给出一个最小区间，避免除零
        let spread = if spread > 0.0 {
            spread
        } else {
            (high.abs() * 0.01).max(1.0)
        };
        let padding = spread * 0.05;
        let mid = (low + high) / 2.0;
        Self {
            min: mid - spread / 2.0 - padding,
            range: spread + padding * 2.0,
            top,
            height,
        }
    }

    fn y(&self, price: f64) -> f64 {
        self.top + (1.0 - (price - self.min) / self.range) * self.height
    }
}

/// # Summary
/// 时间到横坐标的线性映射，覆盖 `[首根开始, 末根开始 + 桶时长]`。
#[derive(Debug, Clone, Copy)]
struct TimeScale {
    origin: DateTime<Utc>,
    span_secs: f64,
    left: f64,
    width: f64,
}

impl TimeScale {
    fn x(&self, time: DateTime<Utc>) -> Result<f64, RenderError> {
        let offset = to_f64_secs((time - self.origin).num_seconds())?;
        Ok(self.left + offset / self.span_secs * self.width)
    }
}

fn to_f64_secs(secs: i64) -> Result<f64, RenderError> {
    secs.to_f64()
        .ok_or_else(|| RenderError::Scale(format!("{} seconds out of range", secs)))
}

fn price(value: Decimal) -> Result<f64, RenderError> {
    value
        .to_f64()
        .ok_or_else(|| RenderError::Scale(format!("price {} is not representable", value)))
}

/// 单根 K 线换算为像素后的几何数据
struct CandleGeometry {
    center: f64,
    high: f64,
    low: f64,
    body_top: f64,
    body_height: f64,
}

impl SvgChartRenderer {
    fn geometry(
        candle: &Candle,
        time: &TimeScale,
        prices: &PriceScale,
        bucket_px: f64,
    ) -> Result<CandleGeometry, RenderError> {
        let open = prices.y(price(candle.open)?);
        let close = prices.y(price(candle.close)?);
        let body_top = open.min(close);
        Ok(CandleGeometry {
            center: time.x(candle.open_time)? + bucket_px / 2.0,
            high: prices.y(price(candle.high)?),
            low: prices.y(price(candle.low)?),
            body_top,
            body_height: (open.max(close) - body_top).max(1.0),
        })
    }

    fn write_candle(
        out: &mut String,
        candle: &Candle,
        geo: &CandleGeometry,
        body_width: f64,
    ) -> Result<(), RenderError> {
        let mut class = String::from(if candle.is_bullish() { "up" } else { "down" });
        if !candle.is_complete {
            class.push_str(" open");
        }
        write!(
            out,
            r#"<line class="{class} wick" x1="{x:.2}" y1="{hi:.2}" x2="{x:.2}" y2="{lo:.2}"/>"#,
            class = class,
            x = geo.center,
            hi = geo.high,
            lo = geo.low,
        )?;
        write!(
            out,
            r#"<rect class="{}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"><title>{}</title></rect>"#,
            class,
            geo.center - body_width / 2.0,
            geo.body_top,
            body_width,
            geo.body_height,
            tooltip(candle),
        )?;
        if candle.ohlc_suspect {
            write!(
                out,
                r#"<circle class="suspect" cx="{:.2}" cy="{:.2}" r="3"/>"#,
                geo.center,
                geo.high - 6.0
            )?;
        }
        Ok(())
    }
}

fn tooltip(candle: &Candle) -> String {
    let mut text = format!(
        "{} O {} H {} L {} C {} V {}",
        candle.open_time.format("%Y-%m-%d %H:%M"),
        candle.open,
        candle.high,
        candle.low,
        candle.close,
        candle.volume
    );
    if !candle.is_complete {
        text.push_str(" (incomplete)");
    }
    if candle.ohlc_suspect {
        text.push_str(" (inconsistent OHLC)");
    }
    text
}

impl ChartRenderer for SvgChartRenderer {
    fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    /// # Summary
    /// 渲染 SVG 文档。
    ///
    /// # Logic
    /// 1. 以全表最高/最低价建立价格坐标，以首末时间建立时间坐标。
    /// 2. 逐根绘制影线与实体，成交量按最大成交量等比缩放。
    /// 3. 标注价格区间、首末时间与周期。
    fn render(&self, table: &CandleTable) -> Result<Vec<u8>, RenderError> {
        let (first, last) = match (table.first(), table.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(RenderError::Scale("cannot chart an empty table".to_string())),
        };
        let (low, high) = table
            .price_range()
            .ok_or_else(|| RenderError::Scale("no price range".to_string()))?;

        let width = f64::from(self.width);
        let height = f64::from(self.height);
        let plot_width = width - MARGIN_LEFT - MARGIN_RIGHT;
        let panels = height - MARGIN_TOP - MARGIN_BOTTOM - PANEL_GAP;
        let price_height = panels * 0.75;
        let volume_top = MARGIN_TOP + price_height + PANEL_GAP;
        let volume_height = panels - price_height;

        let bucket = table.interval().bucket_duration();
        let span_secs = to_f64_secs((last.open_time - first.open_time + bucket).num_seconds())?;
        let time = TimeScale {
            origin: first.open_time,
            span_secs,
            left: MARGIN_LEFT,
            width: plot_width,
        };
        let prices = PriceScale::new(price(low)?, price(high)?, MARGIN_TOP, price_height);
        let bucket_px = to_f64_secs(bucket.num_seconds())? / span_secs * plot_width;
        let body_width = (bucket_px * BODY_RATIO).max(1.0);
        let max_volume = table.max_volume().to_f64().unwrap_or(0.0);

        let mut out = String::with_capacity(256 + table.len() * 320);
        write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        write!(out, "<style>{}</style>", STYLE)?;
        write!(out, r#"<rect class="bg" width="{}" height="{}"/>"#, self.width, self.height)?;
        write!(
            out,
            r#"<rect class="frame" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/>"#,
            MARGIN_LEFT, MARGIN_TOP, plot_width, price_height
        )?;
        write!(
            out,
            r#"<rect class="frame" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/>"#,
            MARGIN_LEFT, volume_top, plot_width, volume_height
        )?;
        write!(
            out,
            r#"<text x="{:.2}" y="20">{} candles, {}</text>"#,
            MARGIN_LEFT,
            table.len(),
            table.interval().token()
        )?;

        for candle in table.candles() {
            let geo = Self::geometry(candle, &time, &prices, bucket_px)?;
            Self::write_candle(&mut out, candle, &geo, body_width)?;

            if max_volume > 0.0 {
                let volume = candle.volume.to_f64().unwrap_or(0.0);
                let bar = (volume / max_volume * volume_height).max(0.5);
                write!(
                    out,
                    r#"<rect class="vol" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/>"#,
                    geo.center - body_width / 2.0,
                    volume_top + volume_height - bar,
                    body_width,
                    bar
                )?;
            }
        }

        write!(
            out,
            r#"<text x="4" y="{:.2}">{}</text><text x="4" y="{:.2}">{}</text>"#,
            prices.y(price(high)?) + 4.0,
            high,
            prices.y(price(low)?) + 4.0,
            low
        )?;
        write!(
            out,
            r#"<text x="4" y="{:.2}">vol {}</text>"#,
            volume_top + 10.0,
            table.max_volume()
        )?;
        let label_y = height - 8.0;
        write!(
            out,
            r#"<text x="{:.2}" y="{:.2}">{}</text><text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT,
            label_y,
            first.open_time.format("%Y-%m-%d %H:%M"),
            width - MARGIN_RIGHT,
            label_y,
            last.open_time.format("%Y-%m-%d %H:%M")
        )?;
        out.push_str("</svg>");

        debug!("Rendered {} candles into {} bytes of SVG", table.len(), out.len());
        Ok(out.into_bytes())
    }
}
