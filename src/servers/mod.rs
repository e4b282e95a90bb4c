//! stdio MCP 服务器：四则运算示例服务器与뉴스/주식服务器

pub mod math;
pub mod news_stock;

pub use math::MathServer;
pub use news_stock::NewsStockServer;
