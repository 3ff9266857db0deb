//! Router eligibility filters.
//!
//! Operators can restrict a run to a known list of routers by handing
//! in a file with one router id per line.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub type FilterResult<T> = Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("router list file not found: {0}")]
    MissingFile(PathBuf),

    #[error("failed to read router list {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which routers a run may touch.
#[derive(Debug, Clone, Default)]
pub enum RouterFilter {
    /// Every router is eligible.
    #[default]
    All,
    ListFile(ListFileFilter),
}

impl RouterFilter {
    /// Build a list-file filter and load it immediately.
    pub fn from_list_file(path: impl Into<PathBuf>) -> FilterResult<Self> {
        let mut filter = ListFileFilter::new(path);
        filter.load()?;
        Ok(Self::ListFile(filter))
    }

    /// Keep the eligible ids, in input order.
    pub fn filter_routers(&self, router_ids: Vec<String>) -> Vec<String> {
        match self {
            Self::All => router_ids,
            Self::ListFile(f) => f.filter_routers(router_ids),
        }
    }
}

/// Allows only the router ids listed in a file.
#[derive(Debug, Clone)]
pub struct ListFileFilter {
    path: PathBuf,
    router_ids: Vec<String>,
    lookup: HashSet<String>,
}

impl ListFileFilter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            router_ids: Vec::new(),
            lookup: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file: one id per line, surrounding whitespace trimmed,
    /// blank lines skipped.
    pub fn load(&mut self) -> FilterResult<()> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                FilterError::MissingFile(self.path.clone())
            } else {
                FilterError::Read {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        self.router_ids = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        self.lookup = self.router_ids.iter().cloned().collect();

        info!(
            path = %self.path.display(),
            routers = self.router_ids.len(),
            "loaded router list"
        );
        Ok(())
    }

    /// Loaded ids, in file order.
    pub fn router_ids(&self) -> &[String] {
        &self.router_ids
    }

    pub fn filter_routers(&self, router_ids: Vec<String>) -> Vec<String> {
        router_ids
            .into_iter()
            .filter(|id| self.lookup.contains(id))
            .collect()
    }
}
