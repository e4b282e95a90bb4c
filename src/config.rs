//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NOMU__*` 覆盖（双下划线表示嵌套，如 `NOMU__LLM__MODEL=gpt-4.1`）。
//! API Key 不进配置文件：OPENAI_API_KEY / NAVER_CLIENT_ID / NAVER_CLIENT_SECRET 直接读环境变量。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub retriever: RetrieverSection,
    pub mcp: McpSection,
    pub web: WebSection,
    pub market: MarketSection,
}

/// [app] 段：应用名与日志目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// TUI 程序的日志目录（终端被界面占用，日志写文件）
    pub log_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "nomu".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// [llm] 段：模型、采样参数、超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            base_url: None,
            temperature: 0.7,
            top_p: 0.9,
            request_timeout_secs: 60,
        }
    }
}

/// [embedding] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: None,
        }
    }
}

/// [retriever] 段：MMR 参数与向量库位置
///
/// `chroma_url` 为空时退回本地内存索引（读取 `docs_dir` 下的文本文件）。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverSection {
    /// 返回的段落数
    pub k: usize,
    /// 交给 MMR 的候选数（fetch_k > k）
    pub fetch_k: usize,
    /// 1 为最少多样性，0 为最大多样性
    pub lambda_mult: f32,
    pub chroma_url: Option<String>,
    pub collection: String,
    pub tenant: String,
    pub database: String,
    pub docs_dir: PathBuf,
    /// RAG 界面等待一次回答的上限（秒）
    pub answer_timeout_secs: u64,
}

impl Default for RetrieverSection {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 10,
            lambda_mult: 0.3,
            chroma_url: None,
            collection: "labor_law".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            docs_dir: PathBuf::from("data/labor_law"),
            answer_timeout_secs: 60,
        }
    }
}

impl RetrieverSection {
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

/// [mcp] 段：默认服务器路径、解释器、façade 超时与 Agent 步数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpSection {
    pub server_path: String,
    /// 启动 .py 服务器时使用的解释器
    pub python: String,
    pub connect_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub disconnect_timeout_secs: u64,
    pub max_agent_steps: usize,
    /// 单次 tools/call 超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for McpSection {
    fn default() -> Self {
        Self {
            server_path: "nomu-math".to_string(),
            python: "python".to_string(),
            connect_timeout_secs: 30,
            send_timeout_secs: 60,
            disconnect_timeout_secs: 10,
            max_agent_steps: 10,
            tool_timeout_secs: 30,
        }
    }
}

impl McpSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }
}

/// [web] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub host: String,
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// [market] 段：新闻/行情数据源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketSection {
    pub naver_news_url: String,
    pub yahoo_chart_url: String,
    pub http_timeout_secs: u64,
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            naver_news_url: "https://openapi.naver.com/v1/search/news.json".to_string(),
            yahoo_chart_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            http_timeout_secs: 10,
        }
    }
}

/// 从 config 目录加载配置，环境变量 NOMU__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NOMU__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NOMU")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载失败时记录警告并退回默认配置（各二进制入口统一用它）
pub fn load_config_or_default() -> AppConfig {
    load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.model, "gpt-4.1-mini");
        assert!((cfg.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert!((cfg.llm.top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(cfg.retriever.k, 5);
        assert_eq!(cfg.retriever.fetch_k, 10);
        assert_eq!(cfg.retriever.collection, "labor_law");
        assert_eq!(cfg.mcp.connect_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.mcp.send_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.mcp.disconnect_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.web.port, 8000);
        assert_eq!(cfg.retriever.answer_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[retriever]\nk = 3\nlambda_mult = 0.5\nanswer_timeout_secs = 120\n\n[mcp]\nserver_path = \"servers/news.py\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.retriever.k, 3);
        assert!((cfg.retriever.lambda_mult - 0.5).abs() < f32::EPSILON);
        // 未写的键保持默认
        assert_eq!(cfg.retriever.fetch_k, 10);
        // RAG 的回答超时与工具聊天的 send 超时各自独立
        assert_eq!(cfg.retriever.answer_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.mcp.send_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.mcp.server_path, "servers/news.py");
        assert_eq!(cfg.llm.model, "gpt-4.1-mini");
    }
}
