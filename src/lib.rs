//! # depgraph-view: interactive dependency graph viewer
//!
//! Renders a build dependency graph as a zoomable, selectable diagram. A
//! graph flows through a fixed pipeline:
//!
//! ```text
//! producer ─► filter chain ─► attribution ─► layout engine ─► scene
//! ```
//!
//! ## Architecture
//!
//! - **Graph**: the domain model (targets, dependencies) and its producers
//! - **Filter**: an ordered chain of pure graph-to-graph transforms
//! - **Attribution**: maps node/link roles to visual attributes via the theme
//! - **Layout**: the layout-engine contract and a built-in layered engine
//! - **Scene**: flattened shapes, edge bundling, selection and zoom
//! - **Controller**: the cancellable, progress-reporting state machine tying
//!   the stages together
//! - **Dispatch**: typed multicast channels decoupling state from observers
//! - **Frontend**: the eframe/egui desktop shell
//!
//! Loading and filtering run on a worker thread and report back over
//! crossbeam channels; attribution, layout and rendering stay on the UI
//! thread.
//!
//! ## Configuration
//!
//! Theme and layout settings are read from `config.toml` in the platform
//! config directory under `depgraph-view` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use depgraph_view::{
//!     attribution::ApproxTextMeasure,
//!     config::{ThemeSettings, ThemeStore},
//!     controller::GraphController,
//!     filter::HideMissing,
//!     graph::JsonGraphSource,
//!     layout::LayeredLayout,
//! };
//! use std::{sync::Arc, time::Duration};
//!
//! let theme = ThemeStore::new(ThemeSettings::default());
//! let mut controller = GraphController::new(
//!     theme,
//!     Box::new(ApproxTextMeasure::default()),
//!     Box::new(LayeredLayout::default()),
//! );
//! controller.add_filter_last(Arc::new(HideMissing))?;
//! controller.load(Arc::new(JsonGraphSource::new("build-graph.json")))?;
//! controller.wait(Duration::from_secs(5))?;
//! println!("{} nodes on screen", controller.scene().nodes().len());
//! ```

pub mod attribution;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod frontend;
pub mod graph;
pub mod layout;
pub mod progress;
pub mod scene;

// Re-export commonly used types
pub use controller::{ControllerState, GraphController};
pub use dispatch::{DispatchReport, Dispatcher, Listener};
pub use error::{GraphViewError, Result, ResultExt};
pub use filter::{FilterPipeline, GraphFilter};
pub use frontend::GraphViewApp;
pub use graph::{Graph, GraphProducer, Link, LinkKind, Node};
pub use scene::{Scene, SceneRenderer};
