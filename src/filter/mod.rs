//! Filter pipeline: an ordered chain of pure graph-to-graph transforms.
//!
//! ```text
//! [source producer] ──► filter 1 ──► filter 2 ──► … ──► derived Graph
//! ```
//!
//! The chain is applied in list order on every explicit recompute. Editing the
//! chain with [`FilterPipeline::add_filter_first`] or
//! [`FilterPipeline::add_filter_last`] recomputes immediately; clearing an
//! already-empty chain does nothing. A failing filter fails the whole
//! recompute and the previous result stays the last good graph.

pub mod builtin;

pub use builtin::{DropWeakLinks, FnFilter, HideMissing, ReachableFromStart, RemoveIsolated, RemoveNodes};

use crate::graph::{Graph, GraphProducer, SourceError};
use crate::progress::{NoProgress, ProgressSink};
use std::sync::Arc;
use thiserror::Error;

/// A filter failed while being applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Filter '{filter}' failed: {message}")]
pub struct FilterError {
    /// Name of the failing filter.
    pub filter: String,
    pub message: String,
}

impl FilterError {
    pub fn new(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// Errors from a pipeline recompute.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// A named, pure graph transform. Implementations must not rely on any state
/// mutated during `apply`; the input graph is only borrowed.
pub trait GraphFilter: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError>;
}

/// Ordered filter chain over a pluggable source producer.
#[derive(Default)]
pub struct FilterPipeline {
    source: Option<Arc<dyn GraphProducer>>,
    filters: Vec<Arc<dyn GraphFilter>>,
    /// Last successfully computed graph.
    graph: Option<Graph>,
    /// Number of successful recomputes, for observers comparing snapshots.
    generation: u64,
    /// Sink used by implicit recomputes (chain edits and [`FilterPipeline::recompute`]).
    progress: Option<Arc<dyn ProgressSink>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source producer. Does not recompute.
    pub fn set_source(&mut self, source: Arc<dyn GraphProducer>) {
        tracing::debug!("Filter pipeline source set to {}", source.describe());
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Route progress of implicit recomputes to `sink`; `None` silences them.
    pub fn set_progress(&mut self, sink: Option<Arc<dyn ProgressSink>>) {
        self.progress = sink;
    }

    /// Insert a filter at the front of the chain and recompute.
    pub fn add_filter_first(&mut self, filter: Arc<dyn GraphFilter>) -> Result<(), PipelineError> {
        tracing::debug!("Adding filter '{}' first", filter.name());
        self.filters.insert(0, filter);
        self.recompute().map(|_| ())
    }

    /// Append a filter at the end of the chain and recompute.
    pub fn add_filter_last(&mut self, filter: Arc<dyn GraphFilter>) -> Result<(), PipelineError> {
        tracing::debug!("Adding filter '{}' last", filter.name());
        self.filters.push(filter);
        self.recompute().map(|_| ())
    }

    /// Remove all filters. Recomputes only if the chain was non-empty.
    pub fn clear_filters(&mut self) -> Result<(), PipelineError> {
        if self.filters.is_empty() {
            return Ok(());
        }
        self.filters.clear();
        self.recompute().map(|_| ())
    }

    /// Swap the whole chain, recomputing once.
    pub fn replace_filters(
        &mut self,
        filters: Vec<Arc<dyn GraphFilter>>,
    ) -> Result<(), PipelineError> {
        self.filters = filters;
        self.recompute().map(|_| ())
    }

    pub fn filter_names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Last good derived graph, if any recompute has succeeded.
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Recompute the derived graph from the source.
    ///
    /// Without a source there is nothing to compute and `Ok(None)` is returned.
    pub fn recompute(&mut self) -> Result<Option<&Graph>, PipelineError> {
        match self.progress.clone() {
            Some(sink) => self.recompute_with(sink.as_ref()),
            None => self.recompute_with(&NoProgress),
        }
    }

    /// Recompute, reporting one progress unit per filter.
    pub fn recompute_with(
        &mut self,
        progress: &dyn ProgressSink,
    ) -> Result<Option<&Graph>, PipelineError> {
        if self.source.is_none() {
            tracing::debug!("Recompute skipped: no source");
            return Ok(None);
        }
        let graph = self.compute(progress)?;
        tracing::info!(
            "Filter pipeline recomputed: {} nodes, {} links after {} filter(s)",
            graph.node_count(),
            graph.link_count(),
            self.filters.len()
        );
        self.graph = Some(graph);
        self.generation += 1;
        Ok(self.graph.as_ref())
    }

    /// Run source + chain without touching the stored result.
    fn compute(&self, progress: &dyn ProgressSink) -> Result<Graph, PipelineError> {
        let source = self.source.as_ref().ok_or_else(|| {
            PipelineError::Source(SourceError::Other("no source configured".to_string()))
        })?;
        progress.begin("Filtering", self.filters.len() as u32 + 1);
        let mut graph = source.produce()?;
        progress.advance("source");

        for filter in &self.filters {
            graph = filter.apply(&graph).map_err(|e| {
                tracing::warn!("Filter '{}' failed: {}", filter.name(), e.message);
                e
            })?;
            progress.advance(filter.name());
        }
        Ok(graph)
    }
}

impl GraphProducer for FilterPipeline {
    fn produce(&self) -> Result<Graph, SourceError> {
        self.compute(&NoProgress).map_err(|e| match e {
            PipelineError::Source(source) => source,
            PipelineError::Filter(filter) => SourceError::Other(filter.to_string()),
        })
    }

    fn describe(&self) -> String {
        let source = self
            .source
            .as_ref()
            .map(|s| s.describe())
            .unwrap_or_else(|| "<none>".to_string());
        format!("{} | {}", source, self.filter_names().join(" | "))
    }
}
