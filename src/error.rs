//! Error handling for depgraph-view
//!
//! Each stage owns its own error enum; this module gathers them into one
//! crate-level type and a Result alias for callers that cross stages.

use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::filter::{FilterError, PipelineError};
use crate::graph::{GraphError, SourceError};
use crate::layout::LayoutError;
use crate::scene::RenderError;
use thiserror::Error;

/// Main error type for depgraph-view operations
#[derive(Error, Debug)]
pub enum GraphViewError {
    /// Graph model invariant violated
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// The source description could not be loaded
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphViewError>,
    },
}

impl From<PipelineError> for GraphViewError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Source(e) => GraphViewError::Source(e),
            PipelineError::Filter(e) => GraphViewError::Filter(e),
        }
    }
}

impl GraphViewError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphViewError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for depgraph-view operations
pub type Result<T> = std::result::Result<T, GraphViewError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<GraphViewError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: GraphViewError = GraphError::DuplicateNode("compile".to_string()).into();
        assert_eq!(err.to_string(), "Graph error: Duplicate node name 'compile'");
    }

    #[test]
    fn test_error_with_context() {
        let err: Result<()> = Err(FilterError::new("hide-missing", "bad graph")).context("Refilter");
        let text = err.unwrap_err().to_string();
        assert!(text.starts_with("Refilter: "));
        assert!(text.contains("hide-missing"));
    }

    #[test]
    fn test_pipeline_error_flattens() {
        let err: GraphViewError = PipelineError::Filter(FilterError::new("f", "m")).into();
        assert!(matches!(err, GraphViewError::Filter(_)));
    }

    #[test]
    fn test_lazy_context() {
        let res: std::result::Result<(), LayoutError> = Err(LayoutError::Engine("x".into()));
        let err = res.with_context(|| format!("layout of {}", "g")).unwrap_err();
        assert!(matches!(err, GraphViewError::WithContext { .. }));
    }
}
