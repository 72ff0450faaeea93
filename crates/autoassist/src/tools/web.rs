use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use autoassist_core::tool::{Error as ToolError, Tool, ToolResult};
use backoff::backoff::Backoff;
use backoff::future::retry;
use regex::Regex;
use reqwest::{Client, Url, header};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use super::html::{decode_entities, html_to_text};

/// Some sites serve their plain markup only to old browsers.
const LEGACY_USER_AGENT: &str =
    "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1)";

const DUCKDUCKGO_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b([^>]*\bclass="result__a"[^>]*)>(.*?)</a\s*>"#)
        .unwrap()
});

static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)<(a|div|td)\b[^>]*\bclass="result__snippet"[^>]*>"#,
        r"(.*?)</(?:a|div|td)\s*>",
    ))
    .unwrap()
});

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bhref\s*=\s*"([^"]*)""#).unwrap());

#[derive(Deserialize, JsonSchema)]
pub struct FetchContentParameters {
    #[schemars(description = "The URL to fetch.")]
    url: String,
}

/// A tool that fetches a web page and returns its text.
pub struct FetchContentTool {
    client: Client,
    parameter_schema: Value,
}

impl FetchContentTool {
    /// Creates a new fetch content tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            parameter_schema: schema_for!(FetchContentParameters).to_value(),
        }
    }
}

impl Default for FetchContentTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for FetchContentTool {
    type Input = FetchContentParameters;

    fn name(&self) -> &str {
        "fetch_content"
    }

    fn description(&self) -> &str {
        "Get the contents of the given URL."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: FetchContentParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        async move {
            let url = Url::parse(&input.url).map_err(|err| {
                ToolError::invalid_input().with_reason(format!(
                    "'{}' is not a valid URL: {err}",
                    input.url
                ))
            })?;

            info!("fetching content from {url}");
            let resp = client
                .get(url)
                .header(header::USER_AGENT, LEGACY_USER_AGENT)
                .send()
                .await
                .map_err(request_error)?;
            if !resp.status().is_success() {
                debug!("{} responded with {}", input.url, resp.status());
                return Ok(String::new());
            }
            let body = resp.text().await.map_err(request_error)?;

            let text = html_to_text(&body);
            if text.is_empty() {
                return Ok(String::new());
            }
            Ok(format!(
                "Below are the contents of the URL: {}. If you think it is \
                 required to extend your research, you can request the \
                 contents of the relevant URLs mentioned in this page by \
                 calling fetch_content function.\n\n\
                 PAGE CONTENTS:\n\n{text}",
                input.url
            ))
        }
    }
}

#[inline]
fn request_error(err: reqwest::Error) -> ToolError {
    ToolError::execution_error().with_reason(err.to_string())
}

/// An item found by a [`SearchBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    /// The title of the page.
    pub title: String,
    /// The address of the page.
    pub url: String,
    /// A short excerpt of the page.
    pub description: String,
}

/// The error returned by a [`SearchBackend`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The search request failed.
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The backend found nothing. Search engines often answer this way
    /// when they throttle clients.
    #[error("no results")]
    NoResults,
    /// Any other failure of the backend.
    #[error("{0}")]
    Other(String),
}

/// A web search engine.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Returns the results for `query`, best match first.
    async fn search(
        &self,
        query: &str,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

/// A [`SearchBackend`] that scrapes the HTML version of DuckDuckGo.
#[derive(Clone, Debug)]
pub struct DuckDuckGoBackend {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoBackend {
    /// Creates a backend for the public endpoint.
    #[inline]
    pub fn new() -> Self {
        Self::with_endpoint(DUCKDUCKGO_ENDPOINT)
    }

    /// Creates a backend for a compatible endpoint.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(endpoint: S) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for DuckDuckGoBackend {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    async fn search(
        &self,
        query: &str,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|err| SearchError::Other(err.to_string()))?;
        let body = self
            .client
            .get(url)
            .header(header::USER_AGENT, LEGACY_USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_results(&body))
    }
}

fn parse_results(html: &str) -> Vec<SearchResult> {
    let links: Vec<_> = RESULT_LINK.captures_iter(html).collect();
    let mut results = Vec::with_capacity(links.len());
    for (i, link) in links.iter().enumerate() {
        let Some(href) = HREF.captures(&link[1]) else {
            continue;
        };
        let url = resolve_redirect(&decode_entities(&href[1]));
        // Sponsored results go through the ad tracker.
        if url.contains("duckduckgo.com/y.js") {
            continue;
        }

        let start = link.get(0).map_or(0, |m| m.end());
        let end = links
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let description = RESULT_SNIPPET
            .captures(&html[start..end])
            .map(|snippet| html_to_text(&snippet[2]))
            .unwrap_or_default();

        results.push(SearchResult {
            title: html_to_text(&link[2]),
            url,
            description,
        });
    }
    results
}

/// Unwraps the target of a DuckDuckGo redirect link.
fn resolve_redirect(href: &str) -> String {
    let absolute = match href.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => href.to_owned(),
    };
    let Ok(url) = Url::parse(&absolute) else {
        return absolute;
    };
    url.query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .unwrap_or(absolute)
}

/// Waits a growing, linear amount of time between attempts: one step after
/// the first attempt, two steps after the second and so on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearBackoff {
    step: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl LinearBackoff {
    /// Creates a backoff that allows `max_attempts` attempts in total.
    #[inline]
    pub fn new(step: Duration, max_attempts: u32) -> Self {
        Self {
            step,
            max_attempts,
            attempt: 0,
        }
    }
}

impl Default for LinearBackoff {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 5)
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        (self.attempt < self.max_attempts).then(|| self.step * self.attempt)
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct WebSearchParameters {
    #[schemars(description = "Search query string.")]
    query: String,
}

/// A tool that searches the web.
///
/// Empty result sets are retried with a [`LinearBackoff`], since search
/// engines tend to return nothing instead of an error when they throttle.
pub struct WebSearchTool {
    backend: Arc<dyn SearchBackend>,
    backoff: LinearBackoff,
    parameter_schema: Value,
}

impl WebSearchTool {
    /// Creates a tool that searches with `backend`.
    #[inline]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            backoff: Default::default(),
            parameter_schema: schema_for!(WebSearchParameters).to_value(),
        }
    }

    /// Replaces the retry schedule.
    #[inline]
    pub fn with_backoff(mut self, backoff: LinearBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Tool for WebSearchTool {
    type Input = WebSearchParameters;

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Get search results for a query."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WebSearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        let backoff = self.backoff.clone();
        async move {
            let query = input.query;
            info!("searching for {query:?}");
            let results = search_with_retry(&*backend, &query, backoff).await;
            if results.is_empty() {
                return Ok(String::new());
            }

            let mut text = format!(
                "Below are the list of items returned for your query: \
                 \"{query}\".\n\
                 For the items you find to be relevant to your quest, you \
                 can call the \"fetch_content\" function to retrieve the full \
                 content.\n\n"
            );
            for result in results {
                text.push_str(&format!(
                    "### [{}]({})\n{}\n\n",
                    result.title, result.url, result.description
                ));
            }
            Ok(text)
        }
    }
}

/// Searches until a non-empty result set arrives or the backoff gives up.
/// Failed attempts count as empty ones.
async fn search_with_retry(
    backend: &dyn SearchBackend,
    query: &str,
    backoff: LinearBackoff,
) -> Vec<SearchResult> {
    let result = retry(backoff, move || async move {
        match backend.search(query).await {
            Ok(results) if !results.is_empty() => Ok(results),
            Ok(_) => {
                debug!("no results for {query:?}");
                Err(backoff::Error::transient(SearchError::NoResults))
            }
            Err(err) => {
                warn!("search for {query:?} failed: {err}");
                Err(backoff::Error::transient(err))
            }
        }
    })
    .await;
    result.unwrap_or_else(|err| {
        info!("giving up searching for {query:?}: {err}");
        vec![]
    })
}
