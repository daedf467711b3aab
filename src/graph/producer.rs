//! Graph producers: where a pipeline run gets its source graph from.
//!
//! Parsing the build description itself is not this crate's job; producers
//! either hand out an already-built snapshot or read a serialized graph.

use super::{Graph, GraphError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The source description could not be loaded.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid graph: {0}")]
    Invalid(#[from] GraphError),

    #[error("{0}")]
    Other(String),
}

/// Anything that can hand out a fresh [`Graph`].
#[cfg_attr(test, mockall::automock)]
pub trait GraphProducer: Send + Sync {
    /// Produce the graph. Called once per load, and once per recompute when
    /// the producer sits behind a filter pipeline.
    fn produce(&self) -> Result<Graph, SourceError>;

    /// Short human-readable description for logs and the status bar.
    fn describe(&self) -> String;
}

/// Producer over an already-built graph.
///
/// The controller wraps each freshly loaded graph in one of these so that
/// re-filtering never goes back to the original source.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    graph: Graph,
}

impl SnapshotSource {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

impl GraphProducer for SnapshotSource {
    fn produce(&self) -> Result<Graph, SourceError> {
        Ok(self.graph.clone())
    }

    fn describe(&self) -> String {
        format!("snapshot of '{}'", self.graph.name())
    }
}

/// Producer reading a JSON-serialized graph from disk.
#[derive(Debug, Clone)]
pub struct JsonGraphSource {
    path: PathBuf,
}

impl JsonGraphSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GraphProducer for JsonGraphSource {
    fn produce(&self) -> Result<Graph, SourceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let graph: Graph = serde_json::from_str(&content).map_err(|e| SourceError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            "Loaded graph '{}' from {:?}: {} nodes, {} links",
            graph.name(),
            self.path,
            graph.node_count(),
            graph.link_count()
        );
        Ok(graph)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
