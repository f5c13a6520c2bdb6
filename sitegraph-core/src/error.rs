use thiserror::Error;
use uuid::Uuid;

/// Structural integrity violations found while building a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidGraphReason {
    #[error("more than one page claims to be the root: {0:?}")]
    DuplicateRoot(Vec<String>),

    #[error("link source {0} does not match any crawled page")]
    UnknownSource(String),

    #[error("link {link} references unknown node {node}")]
    DanglingLink { link: Uuid, node: Uuid },

    #[error("duplicate node id {0}")]
    DuplicateNode(Uuid),

    #[error("invalid page url {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid graph: {0}")]
    InvalidGraph(#[from] InvalidGraphReason),

    #[error("No root node: no page is marked as root and none sits at depth 0")]
    NoRootNode,

    #[error("Invalid export config: {option} = {value:?} (expected {expected})")]
    InvalidExportConfig {
        option: String,
        value: String,
        expected: String,
    },

    #[error("Invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn export_config(
        option: &str,
        value: impl ToString,
        expected: &str,
    ) -> Self {
        GraphError::InvalidExportConfig {
            option: option.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
