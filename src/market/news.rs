//! 네이버 뉴스 검색

use serde_json::{json, Value};

use crate::market::MarketClient;

/// 规整后的检索参数：display 1..=100，start 1..=1000，sort 为 date 或 sim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub query: String,
    pub display: i64,
    pub start: i64,
    pub sort: &'static str,
}

impl NewsQuery {
    pub fn new(query: &str, display: i64, start: i64, sort: &str) -> Self {
        Self {
            query: query.to_string(),
            display: display.clamp(1, 100),
            start: start.clamp(1, 1000),
            sort: if sort == "sim" { "sim" } else { "date" },
        }
    }

    fn query_info(&self) -> Value {
        json!({
            "검색어": self.query,
            "출력건수": self.display,
            "시작위치": self.start,
            "정렬방식": self.sort,
        })
    }
}

impl MarketClient {
    /// 返回 {"data", "status_code", "query_info"}；缺少凭据为 400，请求失败为 500
    pub async fn naver_news_search(&self, q: &NewsQuery) -> Value {
        let Some(creds) = &self.naver else {
            return json!({
                "error": "네이버 API 키가 설정되지 않았습니다. NAVER_CLIENT_ID와 NAVER_CLIENT_SECRET 환경변수를 설정해주세요.",
                "status_code": 400,
            });
        };

        let result = async {
            let response = self
                .http
                .get(&self.naver_news_url)
                .header("X-Naver-Client-Id", &creds.client_id)
                .header("X-Naver-Client-Secret", &creds.client_secret)
                .query(&[
                    ("query", q.query.clone()),
                    ("display", q.display.to_string()),
                    ("start", q.start.to_string()),
                    ("sort", q.sort.to_string()),
                ])
                .send()
                .await?;
            let status = response.status().as_u16();
            let data: Value = response.json().await?;
            Ok::<_, reqwest::Error>((status, data))
        }
        .await;

        match result {
            Ok((status, data)) => json!({
                "data": data,
                "status_code": status,
                "query_info": q.query_info(),
            }),
            Err(e) => {
                tracing::error!(error = %e, "naver news request failed");
                json!({
                    "error": format!("API 요청 중 오류가 발생했습니다: {}", e),
                    "status_code": 500,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketSection;

    #[test]
    fn test_parameters_are_clamped() {
        let q = NewsQuery::new("삼성전자", 0, 5000, "popular");
        assert_eq!(q.display, 1);
        assert_eq!(q.start, 1000);
        assert_eq!(q.sort, "date");

        let q = NewsQuery::new("삼성전자", 500, -3, "sim");
        assert_eq!(q.display, 100);
        assert_eq!(q.start, 1);
        assert_eq!(q.sort, "sim");
    }

    #[test]
    fn test_query_info_uses_normalized_values() {
        let info = NewsQuery::new("반도체", 10, 1, "date").query_info();
        assert_eq!(info["검색어"], "반도체");
        assert_eq!(info["출력건수"], 10);
        assert_eq!(info["정렬방식"], "date");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_400() {
        let client = MarketClient::new(&MarketSection::default(), None).unwrap();
        let out = client.naver_news_search(&NewsQuery::new("AI", 10, 1, "date")).await;
        assert_eq!(out["status_code"], 400);
        assert!(out["error"].as_str().unwrap().contains("NAVER_CLIENT_ID"));
    }

    #[tokio::test]
    async fn test_request_failure_is_500() {
        let cfg = MarketSection {
            // 保留端口，连接必然失败
            naver_news_url: "http://127.0.0.1:9/v1/search/news.json".to_string(),
            http_timeout_secs: 2,
            ..Default::default()
        };
        let creds = crate::market::NaverCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };
        let client = MarketClient::new(&cfg, Some(creds)).unwrap();
        let out = client.naver_news_search(&NewsQuery::new("AI", 10, 1, "date")).await;
        assert_eq!(out["status_code"], 500);
    }
}
