use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Knobs for one analysis run. Passed explicitly into the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Pages deeper than this are flagged as deep
    pub deep_page_threshold: u32,
    pub equity_max_iterations: usize,
    /// Propagation stops once the summed absolute score change falls below this
    pub equity_epsilon: f64,
    /// Successful pages with fewer words are thin
    pub thin_content_words: u32,
    /// Number of redirects followed before a redirect counts as a chain
    pub redirect_chain_min_hops: usize,
    pub nofollow_passes_equity: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            deep_page_threshold: 4,
            equity_max_iterations: 20,
            equity_epsilon: 1e-6,
            thin_content_words: 300,
            redirect_chain_min_hops: 2,
            nofollow_passes_equity: false,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.equity_max_iterations == 0 {
            return Err(GraphError::InvalidConfig(
                "equity_max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.equity_epsilon.is_finite() || self.equity_epsilon <= 0.0 {
            return Err(GraphError::InvalidConfig(format!(
                "equity_epsilon must be a positive number, got {}",
                self.equity_epsilon
            )));
        }
        if self.redirect_chain_min_hops == 0 {
            return Err(GraphError::InvalidConfig(
                "redirect_chain_min_hops must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
