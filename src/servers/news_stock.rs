//! 뉴스/주식 工具服务器
//!
//! 工具：naver_news_search、get_stock_price、get_stock_comparison、get_market_news_and_stock。
//! 结果以格式化 JSON 文本返回；日期格式错误与行情请求失败作为工具错误（isError）返回。

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::market::{MarketClient, NewsQuery};

fn default_display() -> i64 {
    10
}

fn default_start() -> i64 {
    1
}

fn default_sort() -> String {
    "date".to_string()
}

fn default_price_period() -> String {
    "5d".to_string()
}

fn default_comparison_period() -> String {
    "1mo".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewsSearchArgs {
    /// 검색할 키워드
    pub query: String,
    /// 검색 결과 출력 건수 (1~100)
    #[serde(default = "default_display")]
    pub display: i64,
    /// 검색 시작 위치 (1~1000)
    #[serde(default = "default_start")]
    pub start: i64,
    /// 정렬 옵션 (date: 날짜순, sim: 유사도순)
    #[serde(default = "default_sort")]
    pub sort: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StockPriceArgs {
    /// 주식 심볼 (예: "AAPL", "TSLA", "005930.KS")
    pub symbol: String,
    /// 특정 날짜 (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<String>,
    /// 조회 기간 (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max)
    #[serde(default = "default_price_period")]
    pub period: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StockComparisonArgs {
    /// 주식 심볼 리스트 (예: ["AAPL", "MSFT", "GOOGL"])
    pub symbols: Vec<String>,
    /// 조회 기간
    #[serde(default = "default_comparison_period")]
    pub period: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarketNewsArgs {
    /// 검색할 뉴스 키워드
    pub query: String,
    /// 조회할 주식 심볼
    pub stock_symbol: String,
}

fn json_result(value: &Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[derive(Clone)]
pub struct NewsStockServer {
    market: MarketClient,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NewsStockServer {
    pub fn new(market: MarketClient) -> Self {
        Self {
            market,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "네이버 검색 API를 사용하여 뉴스 검색 결과를 조회합니다.")]
    async fn naver_news_search(&self, Parameters(args): Parameters<NewsSearchArgs>) -> Result<CallToolResult, McpError> {
        let query = NewsQuery::new(&args.query, args.display, args.start, &args.sort);
        json_result(&self.market.naver_news_search(&query).await)
    }

    #[tool(description = "특정 날짜 또는 기간의 주식 가격 정보를 조회합니다.")]
    async fn get_stock_price(&self, Parameters(args): Parameters<StockPriceArgs>) -> Result<CallToolResult, McpError> {
        match self
            .market
            .stock_price(&args.symbol, args.date.as_deref(), &args.period)
            .await
        {
            Ok(report) => json_result(&report),
            Err(e) => {
                tracing::error!(symbol = %args.symbol, error = %e, "stock price failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }

    #[tool(description = "여러 주식의 가격 정보를 비교합니다.")]
    async fn get_stock_comparison(
        &self,
        Parameters(args): Parameters<StockComparisonArgs>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.market.stock_comparison(&args.symbols, &args.period).await)
    }

    #[tool(description = "특정 키워드로 뉴스를 검색하고 관련 주식 정보를 함께 조회합니다.")]
    async fn get_market_news_and_stock(
        &self,
        Parameters(args): Parameters<MarketNewsArgs>,
    ) -> Result<CallToolResult, McpError> {
        json_result(
            &self
                .market
                .market_news_and_stock(&args.query, &args.stock_symbol)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for NewsStockServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("네이버 뉴스 검색과 주식 가격 조회 도구를 제공합니다.".to_string()),
            ..Default::default()
        }
    }
}
