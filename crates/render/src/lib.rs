//! `ChartRenderer` 的实现与结果展示辅助。
//!
//! - `svg`: 纯 SVG K 线图，带成交量面板。
//! - `preview`: 最近若干根 K 线的文本表格。
//! - `to_data_uri`: 将渲染结果内联进 HTML。

pub mod preview;
pub mod svg;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// # Summary
/// 将图像字节编码为 `data:` URI，可直接作为 `<img src>`。
///
/// # Arguments
/// * `media_type`: MIME 类型，通常取自 `ChartRenderer::media_type`。
/// * `bytes`: 图像内容。
///
/// # Returns
/// `data:<media_type>;base64,<payload>`。
pub fn to_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}
