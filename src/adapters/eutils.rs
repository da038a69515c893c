use crate::core::detail::{chunk_ids, parse_article_set, DEFAULT_BATCH_SIZE};
use crate::core::retry::RetryPolicy;
use crate::core::{DetailFetcher, FetchedBatch, SearchClient};
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
/// esearch 單次請求的上限
pub const MAX_PAGE_CAP: usize = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const INTERVAL_WITHOUT_KEY: Duration = Duration::from_millis(350);
pub const INTERVAL_WITH_KEY: Duration = Duration::from_millis(110);

#[derive(Debug, Clone)]
pub struct EutilsSettings {
    pub base_url: String,
    pub tool: String,
    pub email: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub request_interval: Duration,
    pub batch_size: usize,
}

impl EutilsSettings {
    pub fn new(tool: impl Into<String>, email: impl Into<String>, api_key: Option<String>) -> Self {
        let request_interval = if api_key.is_some() {
            INTERVAL_WITH_KEY
        } else {
            INTERVAL_WITHOUT_KEY
        };
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tool: tool.into(),
            email: email.into(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
            request_interval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// NCBI E-utilities 用戶端，同時負責搜尋 (esearch) 與取回明細 (efetch)
pub struct EutilsClient {
    client: Client,
    settings: EutilsSettings,
    retry: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl EutilsClient {
    pub fn new(settings: EutilsSettings, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(format!("{}/{}", settings.tool, env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            settings,
            retry,
            last_request: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &EutilsSettings {
        &self.settings
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), name)
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("tool", self.settings.tool.clone()),
            ("email", self.settings.email.clone()),
        ];
        if let Some(key) = &self.settings.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// 請求之間保持固定間隔，不超過 NCBI 的速率限制
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.settings.request_interval {
                tokio::time::sleep(self.settings.request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_text(
        &self,
        operation: &str,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<String> {
        let url = self.endpoint(endpoint);
        let url = url.as_str();

        self.retry
            .run(operation, move || async move {
                self.pace().await;
                tracing::debug!("🌐 GET {} ({})", url, operation);

                let response = self
                    .client
                    .get(url)
                    .query(params)
                    .send()
                    .await
                    .map_err(|e| classify_transport(operation, e))?;

                let status = response.status();
                if status.is_success() {
                    return response
                        .text()
                        .await
                        .map_err(|e| classify_transport(operation, e));
                }

                let body = response.text().await.unwrap_or_default();
                Err(classify_status(operation, status, &body))
            })
            .await
    }
}

/// 429 與 5xx 值得重試，其他 4xx 直接視為失敗
pub fn classify_status(operation: &str, status: StatusCode, body: &str) -> EtlError {
    let snippet: String = body.chars().take(200).collect();
    let message = if snippet.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, snippet.trim())
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        EtlError::TransientFetchError {
            operation: operation.to_string(),
            message,
        }
    } else {
        EtlError::FetchError {
            operation: operation.to_string(),
            attempts: 1,
            message,
        }
    }
}

fn classify_transport(operation: &str, e: reqwest::Error) -> EtlError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        EtlError::TransientFetchError {
            operation: operation.to_string(),
            message: e.to_string(),
        }
    } else {
        EtlError::ApiError(e)
    }
}

pub fn parse_search_response(body: &str) -> Result<Vec<String>> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|e| EtlError::FetchError {
            operation: "esearch".to_string(),
            attempts: 1,
            message: format!("unexpected response body: {}", e),
        })?;

    let result = envelope.esearchresult;
    if let Some(error) = result.error {
        return Err(EtlError::FetchError {
            operation: "esearch".to_string(),
            attempts: 1,
            message: error,
        });
    }

    if let Some(count) = &result.count {
        tracing::debug!("🔢 esearch reports {} total matches", count);
    }
    Ok(result.idlist)
}

#[async_trait::async_trait]
impl SearchClient for EutilsClient {
    async fn search(&self, query: &str, page_cap: usize) -> Result<Vec<String>> {
        let retmax = page_cap.clamp(1, MAX_PAGE_CAP);

        let mut params = self.common_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", retmax.to_string()));
        params.push(("sort", "pub_date".to_string()));
        params.push(("retmode", "json".to_string()));

        let body = self.get_text("esearch", "esearch.fcgi", &params).await?;
        let ids = parse_search_response(&body)?;
        tracing::debug!("📋 esearch returned {} identifiers", ids.len());
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl DetailFetcher for EutilsClient {
    async fn fetch(&self, identifiers: &[String]) -> Result<FetchedBatch> {
        let mut batch = FetchedBatch::default();

        for (index, chunk) in chunk_ids(identifiers, self.settings.batch_size).enumerate() {
            let mut params = self.common_params();
            params.push(("id", chunk.join(",")));
            params.push(("retmode", "xml".to_string()));

            tracing::debug!("📦 efetch chunk {} ({} identifiers)", index + 1, chunk.len());
            let body = self.get_text("efetch", "efetch.fcgi", &params).await?;

            let parsed = parse_article_set(&body);
            batch.dropped += parsed.issues.len();
            for issue in &parsed.issues {
                if let EtlError::ParseError { record, .. } = issue {
                    if chunk.contains(record) {
                        batch.dropped_ids.push(record.clone());
                    }
                }
            }
            if parsed.records.len() + parsed.issues.len() < chunk.len() {
                tracing::warn!(
                    "⚠️ efetch returned {} of {} requested records",
                    parsed.records.len() + parsed.issues.len(),
                    chunk.len()
                );
            }
            batch.records.extend(parsed.records);
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status("esearch", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status("esearch", StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());

        let bad_request = classify_status("esearch", StatusCode::BAD_REQUEST, "bad term");
        assert!(!bad_request.is_transient());
        assert!(bad_request.to_string().contains("bad term"));
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{"header":{},"esearchresult":{"count":"3","retmax":"3","idlist":["102","101","100"]}}"#;
        assert_eq!(parse_search_response(body).unwrap(), vec!["102", "101", "100"]);

        let empty = r#"{"esearchresult":{"count":"0","idlist":[]}}"#;
        assert!(parse_search_response(empty).unwrap().is_empty());
    }

    #[test]
    fn test_search_error_field_is_fetch_error() {
        let body = r#"{"esearchresult":{"ERROR":"Invalid query"}}"#;
        let err = parse_search_response(body).unwrap_err();
        assert!(matches!(err, EtlError::FetchError { .. }));
        assert!(parse_search_response("<html>").is_err());
    }

    #[test]
    fn test_interval_depends_on_api_key() {
        assert_eq!(
            EutilsSettings::new("t", "a@b.org", None).request_interval,
            INTERVAL_WITHOUT_KEY
        );
        assert_eq!(
            EutilsSettings::new("t", "a@b.org", Some("k".to_string())).request_interval,
            INTERVAL_WITH_KEY
        );
    }
}
