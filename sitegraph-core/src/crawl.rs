// Crawler-facing input records. The crawler itself lives outside this crate;
// these are the plain records it hands over once a crawl run has finished.

use crate::error::Result;
use crate::model::LinkType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

/// A single fetched page as reported by the crawler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlPage {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Missing when the request timed out
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Location header for 3xx responses
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub crawled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_root: bool,
    /// Depth as seen by the crawler, only used to recognise the seed page
    #[serde(default)]
    pub depth: Option<u32>,
}

/// A link discovered on a page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlEdge {
    pub source_url: String,
    pub target_url: String,
    #[serde(default)]
    pub anchor_text: Option<String>,
    /// Region of the page the link was found in (nav, footer, aside, ...)
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub nofollow: bool,
    /// Manual override of the detected link type
    #[serde(default)]
    pub link_type: Option<LinkType>,
}

/// Everything one crawl run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlData {
    #[serde(default)]
    pub root_url: Option<String>,
    pub pages: Vec<CrawlPage>,
    #[serde(default)]
    pub edges: Vec<CrawlEdge>,
}

impl CrawlData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl CrawlPage {
    pub fn new(url: &str, http_status: u16) -> Self {
        Self {
            url: url.to_string(),
            http_status: Some(http_status),
            ..Default::default()
        }
    }
}

impl CrawlEdge {
    pub fn new(source_url: &str, target_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            target_url: target_url.to_string(),
            ..Default::default()
        }
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Extract the host component from a URL
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// URL without its `scheme://` prefix, used to match http and https
/// variants of the same page
pub fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Canonical form used to match pages and link targets.
///
/// Drops the fragment and the trailing slash of non-root paths. Scheme and
/// host are lowercased by the parser. Returns `None` for unparseable input.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    Some(parsed.to_string())
}

/// Resolve a possibly relative link target against the page it was found on
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;
    normalize_url(resolved.as_str())
}
