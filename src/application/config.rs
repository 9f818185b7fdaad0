//! Workspace configuration.

use std::path::PathBuf;

use crate::adapters::chain::DEFAULT_ID_MAX_LEN;
use crate::adapters::IngestLimits;
use crate::domain::{Taxonomy, TaxonomyError};

use super::graph::GraphView;

/// Runtime settings for loading data and building graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    /// Taxonomy JSON replacing the built-in one
    pub taxonomy_path: Option<PathBuf>,

    /// View built when none is requested
    pub default_view: GraphView,

    /// Ingestion size and row limits
    pub limits: IngestLimits,

    /// Patient-id characters kept inside chain node ids
    pub chain_id_max_len: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: None,
            default_view: GraphView::Flat,
            limits: IngestLimits::default(),
            chain_id_max_len: DEFAULT_ID_MAX_LEN,
        }
    }
}

impl WorkspaceConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - COHORTGRAPH_TAXONOMY_PATH
    /// - COHORTGRAPH_DEFAULT_VIEW=flat|hierarchy|chain
    /// - COHORTGRAPH_MAX_INPUT_BYTES
    /// - COHORTGRAPH_MAX_ROWS
    /// - COHORTGRAPH_CHAIN_ID_MAX_LEN
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("COHORTGRAPH_TAXONOMY_PATH") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.taxonomy_path = Some(PathBuf::from(v));
            }
        }

        if let Some(v) = lookup("COHORTGRAPH_DEFAULT_VIEW") {
            match v.parse::<GraphView>() {
                Ok(view) => cfg.default_view = view,
                Err(e) => tracing::warn!("Ignoring COHORTGRAPH_DEFAULT_VIEW: {e}"),
            }
        }

        if let Some(x) = positive(&lookup, "COHORTGRAPH_MAX_INPUT_BYTES") {
            cfg.limits.max_input_bytes = x;
        }

        if let Some(x) = positive(&lookup, "COHORTGRAPH_MAX_ROWS") {
            cfg.limits.max_rows = usize::try_from(x).unwrap_or(usize::MAX);
        }

        if let Some(x) = positive(&lookup, "COHORTGRAPH_CHAIN_ID_MAX_LEN") {
            cfg.chain_id_max_len = usize::try_from(x).unwrap_or(usize::MAX);
        }

        cfg
    }

    /// The taxonomy to classify against: the configured file, or the
    /// built-in one.
    ///
    /// # Errors
    /// Returns error if the configured file cannot be read or is invalid.
    pub fn load_taxonomy(&self) -> Result<Taxonomy, TaxonomyError> {
        match &self.taxonomy_path {
            Some(path) => {
                let taxonomy = Taxonomy::from_path(path)?;
                tracing::info!(path = %path.display(), "Loaded taxonomy override");
                Ok(taxonomy)
            }
            None => Ok(Taxonomy::builtin()),
        }
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(x) if x > 0 => Some(x),
        _ => {
            tracing::warn!("Ignoring {key}: expected a positive integer");
            None
        }
    }
}
