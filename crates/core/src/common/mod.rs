pub mod interval;
pub mod time;

use std::fmt;

/// # Summary
/// 访问上游行情 API 的 Bearer 凭证。
///
/// # Invariants
/// - 内部字符串已去除首尾空白。
/// - `Debug` 输出永远不包含凭证原文。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// # Summary
    /// 从原始字符串构造凭证。
    ///
    /// # Arguments
    /// * `token`: 原始 Token，允许带空白。
    ///
    /// # Returns
    /// 去除空白后的凭证，可能为空白凭证。
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// # Summary
    /// 将配置中的可选 Token 转为凭证。
    ///
    /// # Logic
    /// 1. `None` 直接返回 `None`。
    /// 2. 空白字符串同样视为缺失。
    ///
    /// # Arguments
    /// * `token`: 配置层读取到的可选 Token。
    ///
    /// # Returns
    /// 有效凭证或 `None`。
    pub fn from_optional(token: Option<String>) -> Option<Self> {
        token.map(Self::new).filter(|c| !c.is_blank())
    }

    /// 是否为空白凭证
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// 取出原文，仅供上游适配器写入请求头
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("Credential(<blank>)")
        } else {
            f.write_str("Credential(***)")
        }
    }
}
