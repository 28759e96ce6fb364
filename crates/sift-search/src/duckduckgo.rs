use crate::error::SearchError;
use crate::provider::{SearchProvider, WebSnippet, normalize};

pub const DUCKDUCKGO_BASE_URL: &str = "https://html.duckduckgo.com/html/";

const PROVIDER: &str = "duckduckgo";
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Keyless provider that scrapes the DuckDuckGo HTML endpoint.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.unwrap_or_else(|| DUCKDUCKGO_BASE_URL.into()),
        }
    }

    async fn fetch_html(&self, query: &str) -> Result<String, SearchError> {
        let url = url::Url::parse_with_params(&self.base_url, [("q", query)])?;
        let mut resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (compatible; sift)")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.into(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = resp.content_length()
            && len > MAX_BODY_BYTES as u64
        {
            return Err(too_large(len));
        }
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn too_large(len: u64) -> SearchError {
    SearchError::Other(format!(
        "response too large: {len} bytes (max: {MAX_BODY_BYTES})"
    ))
}

impl SearchProvider for DuckDuckGoProvider {
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
        let html = self.fetch_html(query).await?;
        let snippets = tokio::task::spawn_blocking(move || parse_results(&html))
            .await
            .map_err(|e| SearchError::Other(e.to_string()))??;
        let snippets = normalize(snippets, max_results);
        tracing::debug!(count = snippets.len(), "duckduckgo search complete");
        Ok(snippets)
    }
}

fn parse_results(html: &str) -> Result<Vec<WebSnippet>, SearchError> {
    let soup = scrape_core::Soup::parse(html);
    let blocks = soup
        .find_all("div.result")
        .map_err(|e| SearchError::Other(format!("invalid selector: {e}")))?;

    let mut out = Vec::new();
    for block in blocks {
        let inner = scrape_core::Soup::parse(&block.inner_html());
        let Some((title, href)) = first(&inner, "a.result__a")? else {
            continue;
        };
        let excerpt = first(&inner, ".result__snippet")?
            .map(|(text, _)| text)
            .unwrap_or_default();
        if title.is_empty() && excerpt.is_empty() {
            continue;
        }
        let rank = out.len() + 1;
        out.push(WebSnippet {
            excerpt: if excerpt.is_empty() {
                title.clone()
            } else {
                excerpt
            },
            title,
            url: resolve_href(&href.unwrap_or_default()),
            rank,
        });
    }
    Ok(out)
}

/// Trimmed text and `href` of the first element matching `selector`.
fn first(
    soup: &scrape_core::Soup,
    selector: &str,
) -> Result<Option<(String, Option<String>)>, SearchError> {
    let tags = soup
        .find_all(selector)
        .map_err(|e| SearchError::Other(format!("invalid selector: {e}")))?;
    Ok(tags
        .into_iter()
        .next()
        .map(|tag| (tag.text().trim().to_owned(), tag.get("href").map(str::to_owned))))
}

/// Result links are redirects (`//duckduckgo.com/l/?uddg=<target>`); unwrap them.
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };
    let Ok(parsed) = url::Url::parse(&absolute) else {
        return href.to_owned();
    };
    parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map_or(absolute.clone(), |(_, v)| v.into_owned())
}
