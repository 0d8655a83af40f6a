use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    // 单次抓取（全部分页 + 重试）的总超时，None 表示不限制
    pub fetch_timeout_secs: Option<u64>,
    pub form: FormDefaults,
    // 上游 Bearer Token，通常来自不入库的 secrets.toml 或环境变量
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    // 单页记录上限
    pub page_limit: usize,
    // 单次抓取允许的最大页数
    pub max_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    // 包含首次请求在内的总尝试次数
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// 表单默认值，对应页面首次打开时的预填内容
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefaults {
    pub instrument_id: String,
    pub days_back: u32,
    pub interval: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            retry: RetryConfig::default(),
            fetch_timeout_secs: Some(60),
            form: FormDefaults::default(),
            token: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://invest-public-api.tinkoff.ru".to_string(),
            request_timeout_secs: 15,
            page_limit: 1000,
            max_pages: 500,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            // SBER FIGI
            instrument_id: "BBG004730N88".to_string(),
            days_back: 10,
            interval: "4h".to_string(),
        }
    }
}
