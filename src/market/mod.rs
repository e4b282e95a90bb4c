//! 市场数据：네이버 뉴스 검색与 Yahoo Finance 行情（chart API）
//!
//! 工具层面的「软错误」（缺少 API Key、查不到数据、参数越界）以带 "error" 键的 JSON 对象返回；
//! 日期格式错误与请求失败返回 MarketError，由 MCP 服务器转成工具错误。

pub mod news;
pub mod stock;

use std::time::Duration;

use thiserror::Error;

use crate::config::MarketSection;

pub use news::NewsQuery;
pub use stock::{normalize_period, parse_chart, parse_date, ChartData, PriceBar, VALID_PERIODS};

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("잘못된 날짜 형식입니다: {0}. YYYY-MM-DD 형식을 사용해주세요.")]
    InvalidDate(String),

    #[error("주식 데이터 조회 중 오류가 발생했습니다: {0}")]
    Http(#[from] reqwest::Error),

    #[error("주식 데이터 조회 중 오류가 발생했습니다: {0}")]
    Data(String),
}

/// 네이버 검색 API 凭据（来自环境变量 NAVER_CLIENT_ID / NAVER_CLIENT_SECRET）
#[derive(Debug, Clone)]
pub struct NaverCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl NaverCredentials {
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("NAVER_CLIENT_ID").ok().filter(|v| !v.trim().is_empty())?;
        let client_secret = std::env::var("NAVER_CLIENT_SECRET").ok().filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

/// 共享的 HTTP 客户端与数据源地址
#[derive(Clone)]
pub struct MarketClient {
    http: reqwest::Client,
    naver_news_url: String,
    yahoo_chart_url: String,
    naver: Option<NaverCredentials>,
}

impl MarketClient {
    pub fn new(cfg: &MarketSection, naver: Option<NaverCredentials>) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            // Yahoo 拒绝没有 UA 的请求
            .user_agent(concat!("nomu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            naver_news_url: cfg.naver_news_url.clone(),
            yahoo_chart_url: cfg.yahoo_chart_url.trim_end_matches('/').to_string(),
            naver,
        })
    }

    pub fn from_config(cfg: &MarketSection) -> Result<Self, MarketError> {
        Self::new(cfg, NaverCredentials::from_env())
    }

    pub fn has_naver_credentials(&self) -> bool {
        self.naver.is_some()
    }

    /// 新闻搜索 + 行情的综合查询
    pub async fn market_news_and_stock(&self, query: &str, stock_symbol: &str) -> serde_json::Value {
        let news = self.naver_news_search(&NewsQuery::new(query, 5, 1, "date")).await;
        let stock = match self.stock_price(stock_symbol, None, "5d").await {
            Ok(v) => v,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        serde_json::json!({
            "query": query,
            "stock_symbol": stock_symbol,
            "news_data": news,
            "stock_data": stock,
            "analysis_timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        })
    }
}
