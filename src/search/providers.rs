use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{DrugResult, SupplementResult};
use crate::search::filters::SupplementQuery;
use crate::search::types::{FdaResponse, LabelDetail, LabelSearchResponse};

/// Results requested from the drug label search
pub const DRUG_RESULT_LIMIT: u32 = 15;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Http(StatusCode),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Supplement label search
#[async_trait]
pub trait SupplementSource: Send + Sync {
    async fn search(&self, query: &SupplementQuery) -> Result<Vec<SupplementResult>, SearchError>;
}

/// Drug label search
#[async_trait]
pub trait DrugSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<DrugResult>, SearchError>;
}

/// Build the shared HTTP client
pub fn http_client(timeout: Duration) -> Result<Client, SearchError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("refillr/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Client for the supplement label proxy
#[derive(Clone)]
pub struct LabelClient {
    client: Client,
    base_url: String,
}

impl LabelClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch one label by id
    pub async fn label(&self, id: &str) -> Result<LabelDetail, SearchError> {
        let url = join_url(&self.base_url, "api/label");
        debug!("Label detail request: {} id={}", url, id);

        let response = self.client.get(&url).query(&[("id", id)]).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(status));
        }
        let body = response.bytes().await?;
        Ok(LabelDetail::from_slice(&body)?)
    }
}

#[async_trait]
impl SupplementSource for LabelClient {
    async fn search(&self, query: &SupplementQuery) -> Result<Vec<SupplementResult>, SearchError> {
        let url = join_url(&self.base_url, "api/labels");
        let pairs = query.query_pairs();
        debug!("Label search request: {} {:?}", url, pairs);

        let response = self.client.get(&url).query(&pairs).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(status));
        }
        let body = response.bytes().await?;
        let decoded: LabelSearchResponse = serde_json::from_slice(&body)?;
        Ok(decoded.into_results())
    }
}

/// Client for the openFDA drug label endpoint
#[derive(Clone)]
pub struct FdaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FdaClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub(crate) fn query_pairs(&self, query: &str) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(key) = &self.api_key {
            pairs.push(("api_key", key.clone()));
        }
        pairs.push(("search", format!("\"{}\"", query.replace('"', ""))));
        pairs.push(("limit", DRUG_RESULT_LIMIT.to_string()));
        pairs
    }
}

#[async_trait]
impl DrugSource for FdaClient {
    async fn search(&self, query: &str) -> Result<Vec<DrugResult>, SearchError> {
        let url = join_url(&self.base_url, "drug/label.json");
        debug!("Drug search request: {} q={}", url, query);

        let response = self.client.get(&url).query(&self.query_pairs(query)).send().await?;
        let status = response.status();
        // openFDA answers "no matches" with 404
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(SearchError::Http(status));
        }
        let body = response.bytes().await?;
        let decoded: FdaResponse = serde_json::from_slice(&body)?;
        Ok(decoded.into_results())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filters::SearchFilters;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer a single request with a canned response. The handle yields the
    /// request line that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).lines().next().unwrap_or_default().to_string()
        });
        (base_url, handle)
    }

    fn local_client() -> Client {
        Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    fn supplement_query(q: &str) -> SupplementQuery {
        SupplementQuery {
            q: q.to_string(),
            filters: SearchFilters::default(),
        }
    }

    #[tokio::test]
    async fn test_fda_not_found_is_empty() {
        let (base_url, server) = serve_once("404 Not Found", r#"{"error":{"code":"NOT_FOUND"}}"#).await;
        let fda = FdaClient::new(local_client(), base_url, None);

        let results = fda.search("zzzz").await.unwrap();
        assert!(results.is_empty());
        assert!(server.await.unwrap().starts_with("GET /drug/label.json?search="));
    }

    #[tokio::test]
    async fn test_fda_server_error_is_http_failure() {
        let (base_url, _server) = serve_once("503 Service Unavailable", "").await;
        let fda = FdaClient::new(local_client(), base_url, None);

        match fda.search("advil").await {
            Err(SearchError::Http(status)) => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fda_bad_body_is_decode_failure() {
        let (base_url, _server) = serve_once("200 OK", "<html>oops</html>").await;
        let fda = FdaClient::new(local_client(), base_url, None);

        assert!(matches!(fda.search("advil").await, Err(SearchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fda_results_decode() {
        let body = r#"{"results":[{"set_id":"abc","id":"abc","openfda":{"brand_name":["Advil"],"generic_name":["ibuprofen"]}}]}"#;
        let (base_url, _server) = serve_once("200 OK", body).await;
        let fda = FdaClient::new(local_client(), base_url, None);

        let results = fda.search("advil").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Advil");
    }

    #[tokio::test]
    async fn test_label_search_server_error_is_http_failure() {
        let (base_url, _server) = serve_once("500 Internal Server Error", "boom").await;
        let labels = LabelClient::new(local_client(), base_url);

        match labels.search(&supplement_query("fish oil")).await {
            Err(SearchError::Http(status)) => assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR),
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_label_search_decodes_items() {
        let body = r#"{"items":[{"id":42,"fullName":"Fish Oil","brandName":"Nordic"},"junk"],"total":2}"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let labels = LabelClient::new(local_client(), base_url);

        let results = labels.search(&supplement_query("fish oil")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "42");
        assert_eq!(results[0].full_name.as_deref(), Some("Fish Oil"));
        assert!(server.await.unwrap().starts_with("GET /api/labels?"));
    }

    #[tokio::test]
    async fn test_label_detail_array_uses_first_element() {
        let body = r#"[{"id":7,"fullName":"Vitamin D3"},{"id":8,"fullName":"Other"}]"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let labels = LabelClient::new(local_client(), base_url);

        let detail = labels.label("7").await.unwrap();
        assert_eq!(detail.id.as_deref(), Some("7"));
        assert_eq!(detail.full_name.as_deref(), Some("Vitamin D3"));
        assert!(server.await.unwrap().starts_with("GET /api/label?id=7"));
    }

    #[tokio::test]
    async fn test_label_detail_not_found_is_http_failure() {
        let (base_url, _server) = serve_once("404 Not Found", "").await;
        let labels = LabelClient::new(local_client(), base_url);

        assert!(matches!(labels.label("7").await, Err(SearchError::Http(StatusCode::NOT_FOUND))));
    }

    #[test]
    fn test_join_url_slashes() {
        assert_eq!(join_url("https://x.dev/", "/api/labels"), "https://x.dev/api/labels");
        assert_eq!(join_url("https://x.dev", "api/label"), "https://x.dev/api/label");
    }

    #[test]
    fn test_fda_pairs_quote_query_and_skip_blank_key() {
        let client = Client::new();
        let fda = FdaClient::new(client.clone(), "https://api.fda.gov", Some("  ".to_string()));
        assert_eq!(
            fda.query_pairs("advil \"gel\""),
            vec![
                ("search", "\"advil gel\"".to_string()),
                ("limit", "15".to_string()),
            ]
        );

        let fda = FdaClient::new(client, "https://api.fda.gov", Some("k".to_string()));
        assert_eq!(fda.query_pairs("advil")[0], ("api_key", "k".to_string()));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SearchError::Http(StatusCode::BAD_GATEWAY).to_string(), "HTTP error: 502 Bad Gateway");
        assert_eq!(
            SearchError::Timeout(Duration::from_secs(15)).to_string(),
            "Request timed out after 15s"
        );
    }
}
