use std::fmt;

use serde::Deserialize;

use crate::error::SearchError;
use crate::provider::{SearchProvider, WebSnippet, normalize};

pub const SERPAPI_BASE_URL: &str = "https://serpapi.com/search.json";

const PROVIDER: &str = "serpapi";

#[derive(Clone)]
pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    engine: String,
}

impl fmt::Debug for SerpApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerpApiProvider")
            .field("base_url", &self.base_url)
            .field("engine", &self.engine)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SerpApiProvider {
    /// # Errors
    ///
    /// Returns [`SearchError::MissingApiKey`] if `api_key` is blank.
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::MissingApiKey(PROVIDER.into()));
        }
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| SERPAPI_BASE_URL.into()),
            engine: "google".into(),
        })
    }

    fn request_url(&self, query: &str, max_results: usize) -> Result<url::Url, SearchError> {
        let num = max_results.to_string();
        Ok(url::Url::parse_with_params(
            &self.base_url,
            [
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("engine", self.engine.as_str()),
                ("num", num.as_str()),
            ],
        )?)
    }
}

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OrganicResult {
    position: Option<usize>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    snippet: Option<String>,
}

fn into_snippets(resp: SerpResponse) -> Vec<WebSnippet> {
    resp.organic_results
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let excerpt = r
                .snippet
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| r.title.clone());
            WebSnippet {
                title: r.title,
                url: r.link,
                excerpt,
                rank: r.position.unwrap_or(i + 1),
            }
        })
        .collect()
}

impl SearchProvider for SerpApiProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebSnippet>, SearchError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let url = self.request_url(query, max_results)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.into(),
                status: status.as_u16(),
            });
        }
        let body: SerpResponse = serde_json::from_slice(&resp.bytes().await?)?;
        if let Some(message) = body.error.clone()
            && body.organic_results.is_empty()
        {
            // SerpAPI reports "no results" as an error string.
            if message.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(SearchError::Provider {
                provider: PROVIDER.into(),
                message,
            });
        }
        let snippets = normalize(into_snippets(body), max_results);
        tracing::debug!(count = snippets.len(), "serpapi search complete");
        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    async fn serve_once(status_line: &'static str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = stream.read(&mut buf).await;
            let resp = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(resp.as_bytes()).await.ok();
        });
        port
    }

    fn provider(base_url: &str) -> SerpApiProvider {
        SerpApiProvider::new(
            reqwest::Client::new(),
            "test-key".into(),
            Some(base_url.into()),
        )
        .unwrap()
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let err = SerpApiProvider::new(reqwest::Client::new(), "  ".into(), None).unwrap_err();
        assert!(matches!(err, SearchError::MissingApiKey(_)));
    }

    #[test]
    fn request_url_encodes_query() {
        let p = provider(SERPAPI_BASE_URL);
        let url = p.request_url("weather in paris & lyon", 5).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "weather in paris & lyon".into())));
        assert!(pairs.contains(&("num".into(), "5".into())));
        assert!(pairs.contains(&("engine".into(), "google".into())));
    }

    #[test]
    fn debug_redacts_api_key() {
        let out = format!("{:?}", provider(SERPAPI_BASE_URL));
        assert!(!out.contains("test-key"));
    }

    #[test]
    fn snippet_falls_back_to_title() {
        let resp: SerpResponse = serde_json::from_str(
            r#"{"organic_results":[
                {"position":2,"title":"Second","link":"https://b.example","snippet":"beta"},
                {"position":1,"title":"First","link":"https://a.example"}
            ]}"#,
        )
        .unwrap();
        let out = normalize(into_snippets(resp), 10);
        assert_eq!(out[0].title, "First");
        assert_eq!(out[0].excerpt, "First");
        assert_eq!(out[1].excerpt, "beta");
    }

    #[tokio::test]
    async fn search_parses_organic_results() {
        let port = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"organic_results":[
                {"position":1,"title":"Forecast","link":"https://w.example","snippet":"Sunny, 21C"},
                {"position":2,"title":"Radar","link":"https://r.example","snippet":"Clear skies"},
                {"position":3,"title":"News","link":"https://n.example","snippet":"Heatwave"}
            ]}"#,
        )
        .await;
        let p = provider(&format!("http://127.0.0.1:{port}/search.json"));
        let out = p.search("weather", 2).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].excerpt, "Sunny, 21C");
        assert_eq!(out[1].rank, 2);
    }

    #[tokio::test]
    async fn no_results_error_is_empty_list() {
        let port = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"error":"Google hasn't returned any results for this query."}"#,
        )
        .await;
        let p = provider(&format!("http://127.0.0.1:{port}/search.json"));
        assert!(p.search("zzzz", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let port = serve_once("HTTP/1.1 200 OK", r#"{"error":"Invalid API key."}"#).await;
        let p = provider(&format!("http://127.0.0.1:{port}/search.json"));
        assert!(matches!(
            p.search("q", 5).await,
            Err(SearchError::Provider { .. })
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let port = serve_once("HTTP/1.1 502 Bad Gateway", "{}").await;
        let p = provider(&format!("http://127.0.0.1:{port}/search.json"));
        let err = p.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Status { status: 502, .. }));
        assert!(err.is_transient());
    }
}
