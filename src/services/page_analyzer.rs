//! Out-of-band page analysis.
//!
//! Web pages served by the platform declare the app path they correspond to
//! with `<meta name="itch:path" content="games/42">`. When a view lands on
//! such a page, the owning tab is evolved to that path so it gets native
//! metadata.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::types::errors::FetchError;
use crate::types::path::TabPath;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("meta tag regex"));

static CONTENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("content attr regex")
});

#[async_trait]
pub trait PageAnalyzer: Send + Sync {
    /// Returns the app path declared by the page at `url`, if any.
    async fn analyze(&self, url: &str) -> Result<Option<TabPath>, FetchError>;
}

/// Fetches pages over HTTP and looks for the path meta tag.
pub struct HttpPageAnalyzer {
    client: reqwest::Client,
    name_attr: Regex,
}

impl HttpPageAnalyzer {
    pub fn new(meta_name: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let name_attr =
            name_pattern(meta_name).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self { client, name_attr })
    }
}

#[async_trait]
impl PageAnalyzer for HttpPageAnalyzer {
    async fn analyze(&self, url: &str) -> Result<Option<TabPath>, FetchError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(None);
        }
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let path = find_meta_content(&body, &self.name_attr).map(|p| TabPath::parse(&p));
        debug!(url = %url, path = ?path, "page analyzed");
        Ok(path)
    }
}

fn name_pattern(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"(?i)\bname\s*=\s*["']{}["']"#,
        regex::escape(name)
    ))
}

fn find_meta_content(html: &str, name_attr: &Regex) -> Option<String> {
    META_TAG
        .find_iter(html)
        .map(|m| m.as_str())
        .filter(|t| name_attr.is_match(t))
        .find_map(|t| {
            let caps = CONTENT_ATTR.captures(t)?;
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|c| c.as_str().trim().to_string())
        })
        .filter(|content| !content.is_empty())
}

/// Finds `<meta name="{name}" content="...">` in an HTML document.
/// Attribute order and quoting style are not significant.
pub fn extract_meta_path(html: &str, name: &str) -> Option<String> {
    let name_attr = name_pattern(name).ok()?;
    find_meta_content(html, &name_attr)
}
