use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a page after analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Ok,
    Redirect,
    ClientError,
    ServerError,
    Timeout,
    Orphan,
    Deep,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Ok => "ok",
            StatusCategory::Redirect => "redirect",
            StatusCategory::ClientError => "client_error",
            StatusCategory::ServerError => "server_error",
            StatusCategory::Timeout => "timeout",
            StatusCategory::Orphan => "orphan",
            StatusCategory::Deep => "deep",
        }
    }

    /// Category implied by the HTTP response alone
    pub fn from_http_status(status: Option<u16>) -> Self {
        match status {
            None | Some(0) => StatusCategory::Timeout,
            Some(200..=299) => StatusCategory::Ok,
            Some(300..=399) => StatusCategory::Redirect,
            Some(400..=499) => StatusCategory::ClientError,
            Some(_) => StatusCategory::ServerError,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StatusCategory::ClientError | StatusCategory::ServerError | StatusCategory::Timeout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Navigation,
    Content,
    Footer,
    Sidebar,
    Header,
    Breadcrumb,
    Pagination,
    External,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Navigation => "navigation",
            LinkType::Content => "content",
            LinkType::Footer => "footer",
            LinkType::Sidebar => "sidebar",
            LinkType::Header => "header",
            LinkType::Breadcrumb => "breadcrumb",
            LinkType::Pagination => "pagination",
            LinkType::External => "external",
        }
    }

    /// Guess the link type from the region of the page it was found in
    pub fn detect(position: Option<&str>, is_external: bool) -> Self {
        if is_external {
            return LinkType::External;
        }

        let position = position.map(|p| p.trim().to_lowercase()).unwrap_or_default();
        match position.as_str() {
            "nav" | "navigation" | "menu" => LinkType::Navigation,
            "footer" => LinkType::Footer,
            "aside" | "sidebar" => LinkType::Sidebar,
            "header" | "masthead" => LinkType::Header,
            "breadcrumb" | "breadcrumbs" => LinkType::Breadcrumb,
            "pagination" | "pager" => LinkType::Pagination,
            _ => LinkType::Content,
        }
    }
}

/// Where a link points. Exactly one of internal, external or broken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkTarget {
    Internal { node_id: Uuid },
    External { domain: String },
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub url: String,
    pub path: String,
    pub title: Option<String>,
    pub http_status: Option<u16>,
    pub status: StatusCategory,
    pub depth: Option<u32>,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub link_equity: f64,
    pub word_count: u32,
    pub issue_count: usize,
    pub is_root: bool,
    pub is_orphan: bool,
    pub is_deep: bool,
    /// Linked from somewhere, but not reachable from the root
    pub unreachable: bool,
    pub position: Option<Position>,
    pub content_hash: Option<String>,
    pub redirect_to: Option<String>,
    pub crawled_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Title if the page had one, otherwise its path
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title.trim(),
            _ => &self.path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.http_status, Some(200..=299))
    }

    pub fn http_category(&self) -> StatusCategory {
        StatusCategory::from_http_status(self.http_status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub source: Uuid,
    pub target: LinkTarget,
    pub target_url: String,
    pub detected_type: LinkType,
    pub type_override: Option<LinkType>,
    pub anchor_text: Option<String>,
    pub nofollow: bool,
    pub position: Option<String>,
}

impl Link {
    pub fn effective_type(&self) -> LinkType {
        self.type_override.unwrap_or(self.detected_type)
    }

    pub fn target_node_id(&self) -> Option<Uuid> {
        match self.target {
            LinkTarget::Internal { node_id } => Some(node_id),
            _ => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.target, LinkTarget::External { .. })
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.target, LinkTarget::Broken)
    }

    pub fn external_domain(&self) -> Option<&str> {
        match &self.target {
            LinkTarget::External { domain } => Some(domain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Serious => "serious",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Orphan,
    Deep,
    BrokenLink,
    RedirectChain,
    ThinContent,
    DuplicateContent,
}

impl IssueKind {
    pub const ALL: [IssueKind; 6] = [
        IssueKind::BrokenLink,
        IssueKind::Orphan,
        IssueKind::RedirectChain,
        IssueKind::DuplicateContent,
        IssueKind::Deep,
        IssueKind::ThinContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Orphan => "orphan",
            IssueKind::Deep => "deep",
            IssueKind::BrokenLink => "broken_link",
            IssueKind::RedirectChain => "redirect_chain",
            IssueKind::ThinContent => "thin_content",
            IssueKind::DuplicateContent => "duplicate_content",
        }
    }

    /// Fixed severity table. Filtering and sorting downstream rely on it.
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::BrokenLink => Severity::Critical,
            IssueKind::Orphan => Severity::Serious,
            IssueKind::RedirectChain => Severity::Serious,
            IssueKind::DuplicateContent => Severity::Moderate,
            IssueKind::Deep => Severity::Moderate,
            IssueKind::ThinContent => Severity::Minor,
        }
    }
}

/// Evidence attached to an issue, one variant per issue kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueEvidence {
    Orphan,
    Deep {
        depth: u32,
        threshold: u32,
    },
    BrokenLink {
        link_id: Uuid,
        target_url: String,
        http_status: Option<u16>,
    },
    RedirectChain {
        hops: Vec<String>,
        is_loop: bool,
    },
    ThinContent {
        word_count: u32,
        minimum: u32,
    },
    DuplicateContent {
        content_hash: String,
        duplicates: Vec<Uuid>,
    },
}

impl IssueEvidence {
    pub fn kind(&self) -> IssueKind {
        match self {
            IssueEvidence::Orphan => IssueKind::Orphan,
            IssueEvidence::Deep { .. } => IssueKind::Deep,
            IssueEvidence::BrokenLink { .. } => IssueKind::BrokenLink,
            IssueEvidence::RedirectChain { .. } => IssueKind::RedirectChain,
            IssueEvidence::ThinContent { .. } => IssueKind::ThinContent,
            IssueEvidence::DuplicateContent { .. } => IssueKind::DuplicateContent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub node_id: Uuid,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
    pub evidence: IssueEvidence,
    pub resolved: bool,
    /// Stable key for the underlying condition, used across re-analysis
    pub fingerprint: String,
}

impl Issue {
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}
