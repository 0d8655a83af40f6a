use crate::market::entity::CandleTable;
use crate::render::error::RenderError;

/// # Summary
/// 将规整后的 K 线表转为可嵌入页面的图像。
///
/// # Invariants
/// - 纯函数：同一张表总是得到相同字节。
/// - 输入由核心保证非空、严格有序且无重复时间戳，但时间间隔可能不均匀。
pub trait ChartRenderer: Send + Sync {
    /// 输出图像的 MIME 类型，例如 `image/svg+xml`
    fn media_type(&self) -> &'static str;

    /// # Summary
    /// 渲染 K 线图。
    ///
    /// # Arguments
    /// * `table`: 规整后的 K 线表。
    ///
    /// # Returns
    /// 成功返回图像字节。
    fn render(&self, table: &CandleTable) -> Result<Vec<u8>, RenderError>;
}
