//! Yahoo Finance chart API 行情
//!
//! 按日取 K 线（interval=1d）。指定日期时取当天，没有数据则回退到此前 5 天；
//! 否则取 period（非法值按 5d）。chart API 不提供板块、市值、PE、股息，这些字段固定为 "Unknown"。

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::market::{MarketClient, MarketError};

pub const VALID_PERIODS: [&str; 11] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

pub fn normalize_period(period: &str) -> &'static str {
    VALID_PERIODS
        .iter()
        .copied()
        .find(|p| *p == period)
        .unwrap_or("5d")
}

pub fn parse_date(date: &str) -> Result<NaiveDate, MarketError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| MarketError::InvalidDate(date.to_string()))
}

/// 单日 K 线；字段名与常见行情表格列名一致
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ChartData {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub bars: Vec<PriceBar>,
}

/// 解析 chart API 响应；未知代码（chart.error 非空、result 为空）视为无数据
pub fn parse_chart(body: &Value) -> Result<ChartData, MarketError> {
    let chart = body
        .get("chart")
        .ok_or_else(|| MarketError::Data("unexpected response: missing 'chart'".to_string()))?;
    let Some(result) = chart.get("result").and_then(|r| r.get(0)) else {
        if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
            tracing::debug!(error = %err, "chart API returned no result");
        }
        return Ok(ChartData::default());
    };

    let meta = result.get("meta").cloned().unwrap_or(Value::Null);
    let text = |key: &str| meta.get(key).and_then(Value::as_str).map(String::from);
    let offset_secs = meta.get("gmtoffset").and_then(Value::as_i64).unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_secs as i32)
        .or_else(|| FixedOffset::east_opt(0))
        .ok_or_else(|| MarketError::Data("invalid gmtoffset".to_string()))?;

    let timestamps: Vec<i64> = result
        .get("timestamp")
        .and_then(Value::as_array)
        .map(|ts| ts.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let quote = result
        .pointer("/indicators/quote/0")
        .cloned()
        .unwrap_or(Value::Null);
    let series = |key: &str, i: usize| quote.get(key).and_then(|s| s.get(i)).and_then(Value::as_f64);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        // 停牌等情况下 close 为 null
        let Some(close) = series("close", i) else { continue };
        let Some(at) = DateTime::from_timestamp(*ts, 0) else { continue };
        bars.push(PriceBar {
            date: at.with_timezone(&offset).format("%Y-%m-%d").to_string(),
            open: series("open", i),
            high: series("high", i),
            low: series("low", i),
            close,
            volume: quote
                .get("volume")
                .and_then(|s| s.get(i))
                .and_then(Value::as_u64),
        });
    }

    Ok(ChartData {
        name: text("longName").or_else(|| text("shortName")),
        currency: text("currency"),
        exchange: text("exchangeName"),
        bars,
    })
}

fn stock_info(symbol: &str, data: &ChartData) -> Value {
    json!({
        "symbol": symbol,
        "stock_name": data.name.clone().unwrap_or_else(|| symbol.to_string()),
        "currency": data.currency.clone().unwrap_or_else(|| "USD".to_string()),
        "exchange": data.exchange.clone().unwrap_or_else(|| "Unknown".to_string()),
        "sector": "Unknown",
        "industry": "Unknown",
        "market_cap": "Unknown",
        "pe_ratio": "Unknown",
        "dividend_yield": "Unknown",
    })
}

/// 组装 get_stock_price 的结果；没有 K 线时返回 error 对象
pub fn price_report(symbol: &str, data: &ChartData, data_period: &str, requested_date: Option<&str>) -> Value {
    let stock_name = data.name.clone().unwrap_or_else(|| symbol.to_string());
    let Some(latest) = data.bars.last() else {
        return match requested_date {
            Some(date) => json!({
                "error": format!("{}에 대한 {} 날짜의 데이터를 찾을 수 없습니다.", symbol, date),
                "symbol": symbol,
                "stock_name": stock_name,
                "requested_date": date,
            }),
            None => json!({
                "error": format!("{}에 대한 주식 데이터를 찾을 수 없습니다. 심볼을 확인해주세요.", symbol),
                "symbol": symbol,
                "stock_name": stock_name,
            }),
        };
    };

    json!({
        "stock_info": stock_info(symbol, data),
        "latest_price": latest,
        "period_data": data.bars,
        "data_period": data_period,
        "total_records": data.bars.len(),
    })
}

impl MarketClient {
    async fn fetch_chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<ChartData, MarketError> {
        let body: Value = self
            .http
            .get(format!("{}/{}", self.yahoo_chart_url, symbol))
            .query(query)
            .send()
            .await?
            .json()
            .await?;
        parse_chart(&body)
    }

    async fn fetch_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<ChartData, MarketError> {
        let ts = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc().timestamp().to_string();
        self.fetch_chart(
            symbol,
            &[
                ("period1", ts(start)),
                ("period2", ts(end)),
                ("interval", "1d".to_string()),
            ],
        )
        .await
    }

    /// 单只股票行情；日期格式错误与请求失败返回 Err
    pub async fn stock_price(&self, symbol: &str, date: Option<&str>, period: &str) -> Result<Value, MarketError> {
        let date = date.map(str::trim).filter(|d| !d.is_empty());
        if let Some(date) = date {
            let day = parse_date(date)?;
            let next = day
                .checked_add_days(Days::new(1))
                .ok_or_else(|| MarketError::InvalidDate(date.to_string()))?;
            let mut data = self.fetch_range(symbol, day, next).await?;
            if data.bars.is_empty() {
                let back = day
                    .checked_sub_days(Days::new(5))
                    .ok_or_else(|| MarketError::InvalidDate(date.to_string()))?;
                let earlier = self.fetch_range(symbol, back, day).await?;
                data = ChartData {
                    name: data.name.or(earlier.name),
                    ..earlier
                };
            }
            return Ok(price_report(symbol, &data, &format!("around {}", date), Some(date)));
        }

        let period = normalize_period(period);
        let data = self
            .fetch_chart(symbol, &[("range", period.to_string()), ("interval", "1d".to_string())])
            .await?;
        Ok(price_report(symbol, &data, period, None))
    }

    /// 多只股票对比（1~10 只）
    pub async fn stock_comparison(&self, symbols: &[String], period: &str) -> Value {
        if symbols.is_empty() {
            return json!({ "error": "비교할 주식 심볼을 최소 1개 이상 입력해주세요." });
        }
        if symbols.len() > 10 {
            return json!({ "error": "한 번에 최대 10개의 주식만 비교할 수 있습니다." });
        }

        let reports = join_all(symbols.iter().map(|symbol| self.stock_price(symbol, None, period))).await;
        let mut stocks = Map::new();
        for (symbol, report) in symbols.iter().zip(reports) {
            let entry = match report {
                Ok(report) => comparison_entry(&report),
                Err(e) => json!({ "error": e.to_string() }),
            };
            stocks.insert(symbol.clone(), entry);
        }
        let successful = stocks.values().filter(|v| v.get("error").is_none()).count();

        json!({
            "comparison_period": period,
            "stocks": stocks,
            "total_stocks": symbols.len(),
            "successful_queries": successful,
        })
    }
}

fn comparison_entry(report: &Value) -> Value {
    if let Some(err) = report.get("error") {
        return json!({ "error": err });
    }
    json!({
        "name": report["stock_info"]["stock_name"],
        "latest_price": report["latest_price"]["Close"],
        "latest_date": report["latest_price"]["Date"],
        "currency": report["stock_info"]["currency"],
        "market_cap": report["stock_info"]["market_cap"],
        "pe_ratio": report["stock_info"]["pe_ratio"],
    })
}
