//! 新闻·股票 MCP 服务器（stdio）
//!
//! 工具：naver_news_search、get_stock_price、get_stock_comparison、get_market_news_and_stock。
//! NAVER_CLIENT_ID / NAVER_CLIENT_SECRET 未设置时新闻工具返回错误对象，股票工具不受影响。

use anyhow::Context;
use nomu::config::load_config_or_default;
use nomu::market::MarketClient;
use nomu::observability;
use nomu::servers::NewsStockServer;
use rmcp::{transport::stdio, ServiceExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_stderr();
    let cfg = load_config_or_default();

    let market = MarketClient::from_config(&cfg.market).context("Failed to build HTTP client")?;
    if !market.has_naver_credentials() {
        tracing::warn!("NAVER_CLIENT_ID / NAVER_CLIENT_SECRET not set, news search disabled");
    }
    tracing::info!("news/stock MCP server starting");

    let service = NewsStockServer::new(market)
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}
