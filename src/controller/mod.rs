//! Graph controller: orchestrates a pipeline run as a state machine.
//!
//! ```text
//! Idle ─► Loading ─► Filtering ─► LayingOut ─► Rendering ─► Ready
//!                       ▲             ▲
//!                  filter edit   bundling / theme change
//!
//! any stage ─► Error ─► Idle
//! ```
//!
//! Loading and filtering run on a worker thread; they report back through
//! [`bridge::StageMessage`]s which [`GraphController::poll`] drains on the UI
//! thread. Attribution, layout and rendering always run inside `poll` (or the
//! synchronous re-render entry points) on the thread that created the
//! controller.
//!
//! One run at a time: a trigger while a run is in flight is rejected with
//! [`ControllerError::Busy`]. Cancellation is checked between stages only.
//! Any failure moves through `Error` back to `Idle`, keeping the previously
//! rendered scene.

pub mod bridge;

use crate::attribution::{Attributor, TextMeasure};
use crate::config::{BundlingSettings, PreferenceChanged, ThemeStore};
use crate::dispatch::{Dispatcher, Listener};
use crate::filter::{FilterError, FilterPipeline, GraphFilter, PipelineError};
use crate::graph::{Graph, GraphProducer, SnapshotSource, SourceError};
use crate::layout::{LayoutEngine, LayoutError};
use crate::progress::{CancelToken, ProgressSink};
use crate::scene::{RenderError, Scene, SceneRenderer, SelectionChanged};
use bridge::{stage_channel, RunSender, StageMessage, UiProgress};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest single block inside [`GraphController::wait`] before re-checking
/// the worker.
const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Idle,
    Loading,
    Filtering,
    LayingOut,
    Rendering,
    Ready,
    Error,
}

impl ControllerState {
    pub fn display_name(self) -> &'static str {
        match self {
            ControllerState::Idle => "Idle",
            ControllerState::Loading => "Loading",
            ControllerState::Filtering => "Filtering",
            ControllerState::LayingOut => "Laying out",
            ControllerState::Rendering => "Rendering",
            ControllerState::Ready => "Ready",
            ControllerState::Error => "Error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("A pipeline run is already in progress")]
    Busy,

    #[error("No graph has been loaded")]
    NotLoaded,

    #[error("Controller has been stopped")]
    Stopped,

    #[error("Timed out waiting for the pipeline")]
    Timeout,

    #[error("Pipeline worker died: {0}")]
    Worker(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<PipelineError> for ControllerError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Source(e) => ControllerError::Source(e),
            PipelineError::Filter(e) => ControllerError::Filter(e),
        }
    }
}

/// A state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    pub from: ControllerState,
    pub to: ControllerState,
}

/// Incremental progress of the current stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub stage: String,
    pub done: u32,
    pub total: u32,
    pub detail: String,
}

impl ProgressUpdate {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.done as f32 / self.total as f32).min(1.0)
        }
    }
}

/// A pipeline parameter was edited.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterChanged {
    Bundling(BundlingSettings),
    Filters(Vec<String>),
}

/// Observer channels owned by a controller. Cleared on [`GraphController::stop`].
#[derive(Debug)]
pub struct ControllerChannels {
    pub state: Dispatcher<StateChanged>,
    pub progress: Dispatcher<ProgressUpdate>,
    pub selection: Arc<Dispatcher<SelectionChanged>>,
    pub parameters: Dispatcher<ParameterChanged>,
}

impl Default for ControllerChannels {
    fn default() -> Self {
        Self {
            state: Dispatcher::new("state"),
            progress: Dispatcher::new("progress"),
            selection: Arc::new(Dispatcher::new("selection")),
            parameters: Dispatcher::new("parameters"),
        }
    }
}

impl ControllerChannels {
    /// Drop every subscriber on every channel.
    pub fn clear(&self) {
        self.state.clear();
        self.progress.clear();
        self.selection.clear();
        self.parameters.clear();
    }
}

/// Work handed to the worker thread.
enum Job {
    Load(Arc<dyn GraphProducer>),
    Refilter(FilterEdit),
}

/// An edit of the filter chain.
enum FilterEdit {
    First(Arc<dyn GraphFilter>),
    Last(Arc<dyn GraphFilter>),
    Clear,
    Replace(Vec<Arc<dyn GraphFilter>>),
}

impl FilterEdit {
    fn apply(self, pipeline: &mut FilterPipeline) -> Result<(), PipelineError> {
        match self {
            FilterEdit::First(f) => pipeline.add_filter_first(f),
            FilterEdit::Last(f) => pipeline.add_filter_last(f),
            FilterEdit::Clear => pipeline.clear_filters(),
            FilterEdit::Replace(list) => pipeline.replace_filters(list),
        }
    }
}

/// How a UI-thread render pass ended.
enum PassOutcome {
    Rendered,
    Cancelled,
}

/// Orchestrates load → filter → attribute/layout → render.
pub struct GraphController {
    ui_thread: ThreadId,
    state: ControllerState,
    channels: ControllerChannels,

    theme: Option<Arc<ThemeStore>>,
    theme_listener: Option<Arc<dyn Listener<PreferenceChanged>>>,
    theme_dirty: Arc<AtomicBool>,
    measure: Option<Box<dyn TextMeasure + Send>>,
    layout: Option<Box<dyn LayoutEngine + Send>>,
    pipeline: Arc<Mutex<FilterPipeline>>,
    producer: Option<Arc<dyn GraphProducer>>,
    bundling: Option<BundlingSettings>,

    filtered: Option<Graph>,
    filter_names: Vec<String>,
    scene: Scene,

    generation: u64,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    tx: Sender<StageMessage>,
    rx: Receiver<StageMessage>,

    progress: Option<ProgressUpdate>,
    last_error: Option<ControllerError>,
    stopped: bool,
}

impl GraphController {
    /// Create a controller bound to the current thread as its UI thread.
    pub fn new(
        theme: Arc<ThemeStore>,
        measure: Box<dyn TextMeasure + Send>,
        layout: Box<dyn LayoutEngine + Send>,
    ) -> Self {
        let channels = ControllerChannels::default();
        let theme_dirty = Arc::new(AtomicBool::new(false));
        let flag = theme_dirty.clone();
        let listener: Arc<dyn Listener<PreferenceChanged>> =
            Arc::new(move |_: &PreferenceChanged| flag.store(true, Ordering::SeqCst));
        theme.changes().subscribe(listener.clone());

        let (tx, rx) = stage_channel();
        let scene = Scene::new(channels.selection.clone());
        tracing::debug!("Graph controller created with layout '{}'", layout.name());

        Self {
            ui_thread: std::thread::current().id(),
            state: ControllerState::Idle,
            channels,
            theme: Some(theme),
            theme_listener: Some(listener),
            theme_dirty,
            measure: Some(measure),
            layout: Some(layout),
            pipeline: Arc::new(Mutex::new(FilterPipeline::new())),
            producer: None,
            bundling: None,
            filtered: None,
            filter_names: Vec::new(),
            scene,
            generation: 0,
            cancel: CancelToken::new(),
            worker: None,
            tx,
            rx,
            progress: None,
            last_error: None,
            stopped: false,
        }
    }

    // --- Accessors ---

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn channels(&self) -> &ControllerChannels {
        &self.channels
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access for selection and viewport edits.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Graph the current scene was rendered from.
    pub fn filtered_graph(&self) -> Option<&Graph> {
        self.filtered.as_ref()
    }

    pub fn filter_names(&self) -> &[String] {
        &self.filter_names
    }

    pub fn last_error(&self) -> Option<&ControllerError> {
        self.last_error.as_ref()
    }

    pub fn progress(&self) -> Option<&ProgressUpdate> {
        self.progress.as_ref()
    }

    /// Effective bundling settings.
    pub fn bundling(&self) -> BundlingSettings {
        self.bundling
            .or_else(|| self.theme.as_ref().map(|t| t.snapshot().bundling))
            .unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn source_description(&self) -> Option<String> {
        self.producer.as_ref().map(|p| p.describe())
    }

    // --- Triggers ---

    /// Load a graph from `producer` and run the whole pipeline.
    pub fn load(&mut self, producer: Arc<dyn GraphProducer>) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        tracing::info!("Loading {}", producer.describe());
        self.producer = Some(producer.clone());
        self.spawn(ControllerState::Loading, Job::Load(producer))
    }

    /// Reload from the last producer.
    pub fn reload(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        let producer = self.producer.clone().ok_or(ControllerError::NotLoaded)?;
        tracing::info!("Reloading {}", producer.describe());
        self.spawn(ControllerState::Loading, Job::Load(producer))
    }

    pub fn add_filter_first(&mut self, filter: Arc<dyn GraphFilter>) -> Result<(), ControllerError> {
        self.edit_filters(FilterEdit::First(filter))
    }

    pub fn add_filter_last(&mut self, filter: Arc<dyn GraphFilter>) -> Result<(), ControllerError> {
        self.edit_filters(FilterEdit::Last(filter))
    }

    pub fn clear_filters(&mut self) -> Result<(), ControllerError> {
        self.edit_filters(FilterEdit::Clear)
    }

    pub fn replace_filters(
        &mut self,
        filters: Vec<Arc<dyn GraphFilter>>,
    ) -> Result<(), ControllerError> {
        self.edit_filters(FilterEdit::Replace(filters))
    }

    /// Change bundling and re-render from `LayingOut` without reloading or
    /// re-filtering.
    pub fn set_bundling(&mut self, settings: BundlingSettings) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        self.check_thread()?;
        tracing::info!(
            "Bundling {} (in > {}, out > {})",
            if settings.enabled { "enabled" } else { "disabled" },
            settings.in_threshold,
            settings.out_threshold
        );
        let committed = if self.filtered.is_some() {
            self.cancel = CancelToken::new();
            self.render_pass(None, Some(settings))
        } else {
            self.bundling = Some(settings);
            true
        };
        if committed {
            self.channels
                .parameters
                .dispatch(&ParameterChanged::Bundling(settings));
        }
        Ok(())
    }

    /// Ask the current run to stop at the next stage boundary.
    pub fn cancel(&self) {
        if self.is_busy() {
            tracing::info!("Cancel requested for run {}", self.generation);
        }
        self.cancel.cancel();
    }

    /// Tear down: unsubscribe from everything, release collaborators and
    /// abandon any in-flight run. Every later trigger fails with
    /// [`ControllerError::Stopped`].
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        tracing::info!("Stopping graph controller");
        self.cancel.cancel();
        self.generation += 1;
        // Detach the worker; a fresh channel makes its remaining sends fail.
        self.worker = None;
        let (tx, rx) = stage_channel();
        self.tx = tx;
        self.rx = rx;

        if let (Some(theme), Some(listener)) = (self.theme.take(), self.theme_listener.take()) {
            theme.changes().unsubscribe(&listener);
        }
        self.channels.clear();
        self.measure = None;
        self.layout = None;
        self.producer = None;
        self.state = ControllerState::Idle;
        self.stopped = true;
    }

    // --- UI-thread pump ---

    /// Drain worker messages and run the UI-thread stages. Call once per frame.
    pub fn poll(&mut self) -> Result<(), ControllerError> {
        if self.stopped {
            return Err(ControllerError::Stopped);
        }
        self.check_thread()?;

        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
        }
        self.check_worker();

        if !self.is_busy()
            && self.filtered.is_some()
            && self.theme_dirty.swap(false, Ordering::SeqCst)
        {
            tracing::debug!("Theme changed, re-rendering");
            self.cancel = CancelToken::new();
            self.render_pass(None, self.bundling);
        }
        Ok(())
    }

    /// Block until the current run finishes, polling as it goes. Returns the
    /// state reached.
    pub fn wait(&mut self, timeout: Duration) -> Result<ControllerState, ControllerError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll()?;
            if !self.is_busy() {
                return Ok(self.state);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ControllerError::Timeout);
            }
            match self.rx.recv_timeout(remaining.min(WAIT_SLICE)) {
                Ok(msg) => self.handle(msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ControllerError::Worker("message channel closed".into()))
                }
            }
        }
    }

    // --- Internals ---

    fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.stopped {
            Err(ControllerError::Stopped)
        } else if self.is_busy() {
            Err(ControllerError::Busy)
        } else {
            Ok(())
        }
    }

    fn check_thread(&self) -> Result<(), ControllerError> {
        if std::thread::current().id() == self.ui_thread {
            Ok(())
        } else {
            Err(RenderError::WrongThread.into())
        }
    }

    fn lock_pipeline(&self) -> MutexGuard<'_, FilterPipeline> {
        self.pipeline.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn edit_filters(&mut self, edit: FilterEdit) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        if matches!(edit, FilterEdit::Clear) && self.lock_pipeline().filter_count() == 0 {
            tracing::debug!("Filter chain already empty");
            return Ok(());
        }
        let loaded = self.lock_pipeline().has_source();
        if !loaded {
            // Nothing to recompute yet; the chain applies to the next load.
            let names = {
                let mut pipeline = self.lock_pipeline();
                edit.apply(&mut pipeline)?;
                pipeline.filter_names()
            };
            self.update_filter_names(names);
            return Ok(());
        }
        self.spawn(ControllerState::Filtering, Job::Refilter(edit))
    }

    fn spawn(&mut self, entry: ControllerState, job: Job) -> Result<(), ControllerError> {
        self.generation += 1;
        self.cancel = CancelToken::new();
        self.last_error = None;
        self.progress = None;

        let run = RunSender::new(self.tx.clone(), self.generation);
        let pipeline = self.pipeline.clone();
        let cancel = self.cancel.clone();
        let handle = std::thread::Builder::new()
            .name(format!("graph-run-{}", self.generation))
            .spawn(move || run_job(job, pipeline, run, cancel))
            .map_err(|e| ControllerError::Worker(e.to_string()))?;
        self.worker = Some(handle);
        self.transition(entry);
        Ok(())
    }

    fn handle(&mut self, msg: StageMessage) {
        if msg.generation() != self.generation {
            tracing::debug!("Dropping message from superseded run {}", msg.generation());
            return;
        }
        if msg.is_terminal() {
            self.join_worker();
        }
        match msg {
            StageMessage::State { state, .. } => self.transition(state),
            StageMessage::Progress { update, .. } => self.report(update),
            StageMessage::Filtered { graph, filters, .. } => {
                self.update_filter_names(filters);
                if self.cancel.is_cancelled() {
                    self.cancelled();
                    return;
                }
                self.render_pass(Some(graph), self.bundling);
            }
            StageMessage::Failed { error, .. } => self.fail(error),
            StageMessage::Cancelled { .. } => self.cancelled(),
        }
    }

    /// Detect a worker that exited without a terminal message.
    fn check_worker(&mut self) {
        let finished = self.worker.as_ref().is_some_and(|h| h.is_finished());
        if finished && self.rx.is_empty() {
            let Some(handle) = self.worker.take() else {
                return;
            };
            let reason = match handle.join() {
                Err(_) => "worker thread panicked".to_string(),
                Ok(()) => "worker exited without a result".to_string(),
            };
            self.fail(ControllerError::Worker(reason));
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Pipeline worker panicked after reporting");
            }
        }
    }

    /// Attribution → layout → render on the UI thread.
    ///
    /// `incoming` is a freshly filtered graph; `None` re-renders the current
    /// one. The graph and `bundling` become current only if the pass renders,
    /// so a failed or cancelled pass leaves the last good run intact. Returns
    /// whether it rendered.
    fn render_pass(
        &mut self,
        incoming: Option<Graph>,
        bundling: Option<BundlingSettings>,
    ) -> bool {
        let (graph, fresh) = match incoming {
            Some(graph) => (graph, true),
            None => match self.filtered.take() {
                Some(graph) => (graph, false),
                None => {
                    self.fail(ControllerError::NotLoaded);
                    return false;
                }
            },
        };

        let outcome = self.try_render_pass(&graph, bundling);
        if matches!(outcome, Ok(PassOutcome::Rendered)) || !fresh {
            self.filtered = Some(graph);
        }
        match outcome {
            Ok(PassOutcome::Rendered) => {
                self.bundling = bundling;
                self.transition(ControllerState::Ready);
                true
            }
            Ok(PassOutcome::Cancelled) => {
                self.cancelled();
                false
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn try_render_pass(
        &mut self,
        graph: &Graph,
        bundling: Option<BundlingSettings>,
    ) -> Result<PassOutcome, ControllerError> {
        self.check_thread()?;
        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        let theme = self
            .theme
            .as_ref()
            .ok_or(ControllerError::Stopped)?
            .snapshot();

        self.transition(ControllerState::LayingOut);
        self.report(ProgressUpdate {
            stage: "Laying out".into(),
            done: 0,
            total: 2,
            detail: String::new(),
        });
        let laid_out = {
            let measure = self.measure.as_deref().ok_or(ControllerError::Stopped)?;
            let layout = self.layout.as_deref().ok_or(ControllerError::Stopped)?;
            let attributed = Attributor::new(&theme, measure, bundling).attribute(graph);
            layout.layout(&attributed)?
        };
        self.report(ProgressUpdate {
            stage: "Laying out".into(),
            done: 2,
            total: 2,
            detail: laid_out.name.clone(),
        });

        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        self.transition(ControllerState::Rendering);
        SceneRenderer::new(&theme)
            .bound_to(self.ui_thread)
            .render_into(&mut self.scene, &laid_out)?;
        self.report(ProgressUpdate {
            stage: "Rendering".into(),
            done: 1,
            total: 1,
            detail: format!("{} nodes", self.scene.nodes().len()),
        });
        Ok(PassOutcome::Rendered)
    }

    fn transition(&mut self, to: ControllerState) {
        let from = self.state;
        self.state = to;
        tracing::debug!("Controller: {:?} -> {:?}", from, to);
        self.channels.state.dispatch(&StateChanged { from, to });
    }

    fn report(&mut self, update: ProgressUpdate) {
        self.channels.progress.dispatch(&update);
        self.progress = Some(update);
    }

    fn fail(&mut self, error: ControllerError) {
        tracing::error!("Pipeline run failed: {}", error);
        self.transition(ControllerState::Error);
        self.last_error = Some(error);
        self.transition(ControllerState::Idle);
    }

    fn cancelled(&mut self) {
        tracing::info!("Pipeline run {} cancelled", self.generation);
        self.transition(ControllerState::Idle);
    }

    fn update_filter_names(&mut self, names: Vec<String>) {
        if names != self.filter_names {
            self.filter_names = names.clone();
            self.channels
                .parameters
                .dispatch(&ParameterChanged::Filters(names));
        }
    }
}

impl Drop for GraphController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker body: everything up to and including filtering.
fn run_job(job: Job, pipeline: Arc<Mutex<FilterPipeline>>, run: RunSender, cancel: CancelToken) {
    let generation = run.generation();
    let progress: Arc<dyn ProgressSink> = Arc::new(UiProgress::new(run.clone()));

    let result = (|| -> Result<Option<(Graph, Vec<String>)>, ControllerError> {
        let edit = match job {
            Job::Load(producer) => {
                progress.begin("Loading", 1);
                let graph = producer.produce()?;
                progress.advance(&producer.describe());
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                run.state(ControllerState::Filtering);
                let mut p = pipeline.lock().unwrap_or_else(|e| e.into_inner());
                p.set_source(Arc::new(SnapshotSource::new(graph)));
                None
            }
            Job::Refilter(edit) => Some(edit),
        };

        let mut p = pipeline.lock().unwrap_or_else(|e| e.into_inner());
        p.set_progress(Some(progress.clone()));
        let outcome = match edit {
            Some(edit) => edit.apply(&mut p),
            None => p.recompute().map(|_| ()),
        };
        p.set_progress(None);
        outcome?;

        let graph = p.graph().cloned().ok_or(ControllerError::NotLoaded)?;
        Ok(Some((graph, p.filter_names())))
    })();

    let msg = match result {
        Ok(Some((graph, filters))) => StageMessage::Filtered {
            generation,
            graph,
            filters,
        },
        Ok(None) => StageMessage::Cancelled { generation },
        Err(error) => StageMessage::Failed { generation, error },
    };
    run.send(msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::ApproxTextMeasure;
    use crate::config::ThemeSettings;
    use crate::filter::{FnFilter, RemoveNodes};
    use crate::graph::producer::MockGraphProducer;
    use crate::graph::{Link, Node};
    use crate::layout::{LaidOutGraph, LayeredLayout};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn abc() -> Graph {
        let mut g = Graph::new("abc");
        g.add_node(Node::new("A")).unwrap();
        g.add_node(Node::new("B")).unwrap();
        g.add_node(Node::new("C")).unwrap();
        g.add_link(Link::new("A", "B")).unwrap();
        g.add_link(Link::new("A", "C")).unwrap();
        g.set_start("A").unwrap();
        g
    }

    fn controller() -> (GraphController, Arc<ThemeStore>) {
        let theme = ThemeStore::new(ThemeSettings::default());
        let c = GraphController::new(
            theme.clone(),
            Box::new(ApproxTextMeasure::default()),
            Box::new(LayeredLayout::default()),
        );
        (c, theme)
    }

    fn record_states(c: &GraphController) -> Arc<Mutex<Vec<ControllerState>>> {
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        c.channels()
            .state
            .subscribe(Arc::new(move |e: &StateChanged| sink.lock().unwrap().push(e.to)));
        states
    }

    struct BrokenLayout;

    impl LayoutEngine for BrokenLayout {
        fn name(&self) -> &str {
            "broken"
        }

        fn layout(&self, _graph: &crate::attribution::AttributedGraph) -> Result<LaidOutGraph, LayoutError> {
            Err(LayoutError::Engine("no solution".into()))
        }
    }

    /// Lays out normally `ok_runs` times, then fails.
    struct FlakyLayout {
        ok_runs: usize,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl FlakyLayout {
        fn new(ok_runs: usize) -> Self {
            Self {
                ok_runs,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl LayoutEngine for FlakyLayout {
        fn name(&self) -> &str {
            "flaky"
        }

        fn layout(&self, graph: &crate::attribution::AttributedGraph) -> Result<LaidOutGraph, LayoutError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.ok_runs {
                LayeredLayout::default().layout(graph)
            } else {
                Err(LayoutError::Engine("second".into()))
            }
        }
    }

    fn flaky_controller() -> (GraphController, Arc<ThemeStore>) {
        let theme = ThemeStore::new(ThemeSettings::default());
        let c = GraphController::new(
            theme.clone(),
            Box::new(ApproxTextMeasure::default()),
            Box::new(FlakyLayout::new(1)),
        );
        (c, theme)
    }

    #[test]
    fn test_load_runs_every_stage() {
        let (mut c, _theme) = controller();
        let states = record_states(&c);

        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Ready);
        assert_eq!(
            *states.lock().unwrap(),
            vec![
                ControllerState::Loading,
                ControllerState::Filtering,
                ControllerState::LayingOut,
                ControllerState::Rendering,
                ControllerState::Ready,
            ]
        );
        assert_eq!(c.scene().nodes().len(), 3);
        assert_eq!(c.scene().edges().len(), 2);
    }

    #[test]
    fn test_busy_rejects_second_trigger() {
        let (mut c, _theme) = controller();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let mut producer = MockGraphProducer::new();
        producer.expect_describe().return_const("slow".to_string());
        producer.expect_produce().times(1).returning(move || {
            let _ = release_rx.recv();
            Ok(abc())
        });

        c.load(Arc::new(producer)).unwrap();
        assert!(c.is_busy());
        assert!(matches!(
            c.load(Arc::new(SnapshotSource::new(abc()))),
            Err(ControllerError::Busy)
        ));
        assert!(matches!(c.clear_filters(), Err(ControllerError::Busy)));
        release_tx.send(()).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Ready);
    }

    #[test]
    fn test_source_error_returns_to_idle() {
        let (mut c, _theme) = controller();
        let states = record_states(&c);
        let mut producer = MockGraphProducer::new();
        producer.expect_describe().return_const("bad".to_string());
        producer
            .expect_produce()
            .returning(|| Err(SourceError::Other("unparsable".into())));

        c.load(Arc::new(producer)).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Idle);
        assert!(matches!(c.last_error(), Some(ControllerError::Source(_))));
        assert_eq!(
            *states.lock().unwrap(),
            vec![ControllerState::Loading, ControllerState::Error, ControllerState::Idle]
        );
        assert!(c.scene().is_empty());
    }

    #[test]
    fn test_filter_edit_refilters_without_reload() {
        let (mut c, _theme) = controller();
        let mut producer = MockGraphProducer::new();
        producer.expect_describe().return_const("once".to_string());
        producer.expect_produce().times(1).returning(|| Ok(abc()));
        c.load(Arc::new(producer)).unwrap();
        c.wait(TIMEOUT).unwrap();

        let states = record_states(&c);
        c.add_filter_last(Arc::new(RemoveNodes::new(["C"]))).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Ready);
        assert_eq!(states.lock().unwrap()[0], ControllerState::Filtering);
        assert_eq!(c.filtered_graph().unwrap().node_count(), 2);
        assert_eq!(c.scene().nodes().len(), 2);
        assert_eq!(c.filter_names(), ["remove-nodes"]);
    }

    #[test]
    fn test_filter_failure_keeps_previous_scene() {
        let (mut c, _theme) = controller();
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        c.wait(TIMEOUT).unwrap();

        c.add_filter_last(Arc::new(FnFilter::new("explode", |_| Err("boom".to_string()))))
            .unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Idle);
        match c.last_error() {
            Some(ControllerError::Filter(e)) => assert_eq!(e.filter, "explode"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.scene().nodes().len(), 3);
    }

    #[test]
    fn test_layout_failure_keeps_previous_scene() {
        let theme = ThemeStore::new(ThemeSettings::default());
        let mut c = GraphController::new(
            theme,
            Box::new(ApproxTextMeasure::default()),
            Box::new(BrokenLayout),
        );
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Idle);
        assert!(matches!(c.last_error(), Some(ControllerError::Layout(_))));
        assert!(c.scene().is_empty());
    }

    #[test]
    fn test_failed_render_keeps_last_rendered_graph() {
        let (mut c, theme) = flaky_controller();
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Ready);

        c.add_filter_last(Arc::new(RemoveNodes::new(["C"]))).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Idle);
        assert!(matches!(c.last_error(), Some(ControllerError::Layout(_))));
        assert_eq!(c.scene().nodes().len(), 3);
        assert_eq!(c.filtered_graph().unwrap().node_count(), 3);
        assert!(c.filtered_graph().unwrap().contains("C"));

        // A later theme re-render retries the graph on screen, not the failed one.
        theme.update(|s| s.font_size = 16.0);
        c.poll().unwrap();
        assert_eq!(c.filtered_graph().unwrap().node_count(), 3);
    }

    #[test]
    fn test_failed_bundling_change_is_not_committed() {
        let (mut c, _theme) = flaky_controller();
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        c.wait(TIMEOUT).unwrap();
        let before = c.bundling();

        let params = Arc::new(Mutex::new(Vec::new()));
        let sink = params.clone();
        c.channels()
            .parameters
            .subscribe(Arc::new(move |e: &ParameterChanged| sink.lock().unwrap().push(e.clone())));

        let settings = BundlingSettings {
            enabled: true,
            in_threshold: 1,
            out_threshold: 1,
        };
        c.set_bundling(settings).unwrap();
        assert_eq!(c.state(), ControllerState::Idle);
        assert!(matches!(c.last_error(), Some(ControllerError::Layout(_))));
        assert_eq!(c.bundling(), before);
        assert!(params.lock().unwrap().is_empty());
        assert_eq!(c.scene().edges().len(), 2);
    }

    #[test]
    fn test_clearing_empty_chain_does_nothing() {
        let (mut c, _theme) = controller();
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        c.wait(TIMEOUT).unwrap();

        let states = record_states(&c);
        c.clear_filters().unwrap();
        assert!(!c.is_busy());
        assert_eq!(c.state(), ControllerState::Ready);
        assert!(states.lock().unwrap().is_empty());
    }

    #[test]
    fn test_set_bundling_reenters_at_layout() {
        let (mut c, _theme) = controller();
        let mut g = Graph::new("fan");
        g.add_node(Node::new("hub")).unwrap();
        for i in 0..5 {
            g.add_node(Node::new(format!("n{}", i))).unwrap();
            g.add_link(Link::new("hub", format!("n{}", i))).unwrap();
        }
        c.load(Arc::new(SnapshotSource::new(g))).unwrap();
        c.wait(TIMEOUT).unwrap();
        assert_eq!(c.scene().edges().len(), 5);

        let states = record_states(&c);
        let params = Arc::new(Mutex::new(Vec::new()));
        let sink = params.clone();
        c.channels()
            .parameters
            .subscribe(Arc::new(move |e: &ParameterChanged| sink.lock().unwrap().push(e.clone())));

        let settings = BundlingSettings {
            enabled: true,
            in_threshold: 10,
            out_threshold: 2,
        };
        c.set_bundling(settings).unwrap();
        assert_eq!(
            *states.lock().unwrap(),
            vec![ControllerState::LayingOut, ControllerState::Rendering, ControllerState::Ready]
        );
        assert_eq!(*params.lock().unwrap(), vec![ParameterChanged::Bundling(settings)]);
        assert!(c.scene().edges().is_empty());
        assert_eq!(c.scene().bundles().len(), 1);
    }

    #[test]
    fn test_theme_change_triggers_rerender() {
        let (mut c, theme) = controller();
        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        c.wait(TIMEOUT).unwrap();

        let states = record_states(&c);
        theme.update(|s| s.main.line_width = 4.0);
        c.poll().unwrap();
        assert_eq!(states.lock().unwrap().last(), Some(&ControllerState::Ready));
        assert_eq!(states.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_cancel_between_stages() {
        let (mut c, _theme) = controller();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let mut producer = MockGraphProducer::new();
        producer.expect_describe().return_const("gated".to_string());
        producer.expect_produce().returning(move || {
            let _ = release_rx.recv();
            Ok(abc())
        });

        c.load(Arc::new(producer)).unwrap();
        c.cancel();
        release_tx.send(()).unwrap();
        assert_eq!(c.wait(TIMEOUT).unwrap(), ControllerState::Idle);
        assert!(c.last_error().is_none());
        assert!(c.scene().is_empty());
        assert!(c.filtered_graph().is_none());
    }

    #[test]
    fn test_stop_releases_everything() {
        let (mut c, theme) = controller();
        c.channels()
            .selection
            .subscribe(Arc::new(|_: &SelectionChanged| {}));
        assert_eq!(theme.changes().len(), 1);

        c.stop();
        assert!(c.is_stopped());
        assert_eq!(theme.changes().len(), 0);
        assert!(c.channels().selection.is_empty());
        assert!(matches!(c.reload(), Err(ControllerError::Stopped)));
        assert!(matches!(c.poll(), Err(ControllerError::Stopped)));
    }

    #[test]
    fn test_filters_before_load_apply_on_load() {
        let (mut c, _theme) = controller();
        c.add_filter_last(Arc::new(RemoveNodes::new(["B"]))).unwrap();
        assert_eq!(c.state(), ControllerState::Idle);
        assert_eq!(c.filter_names(), ["remove-nodes"]);

        c.load(Arc::new(SnapshotSource::new(abc()))).unwrap();
        c.wait(TIMEOUT).unwrap();
        assert!(c.scene().node("B").is_none());
        assert!(c.scene().node("C").is_some());
    }

    #[test]
    fn test_wrong_thread_rejected() {
        let (mut c, _theme) = controller();
        let err = std::thread::scope(|s| s.spawn(|| c.poll()).join().unwrap()).unwrap_err();
        assert!(matches!(err, ControllerError::Render(RenderError::WrongThread)));
    }
}
