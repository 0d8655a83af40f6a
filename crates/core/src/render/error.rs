use thiserror::Error;

/// # Summary
/// 图表渲染错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum RenderError {
    // 输出缓冲写入失败
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),
    // 数值无法映射到画布坐标（如价格超出 f64 表示范围）
    #[error("Scale error: {0}")]
    Scale(String),
}
