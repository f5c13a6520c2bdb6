// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    export_cache_key, load_analysis_config, load_crawl_data, load_export_config, render_export,
    resolve_db_path, resolve_issue, run_analysis, select_diff_pair,
};

// Re-export the crawl input types from sitegraph-core
pub use sitegraph_core::crawl::{CrawlData, CrawlEdge, CrawlPage, extract_url_path};
