//! Frontend module for egui UI
//!
//! The desktop shell around a [`GraphController`]: a toolbar on top, a status
//! bar at the bottom and the scene canvas filling the rest. The controller is
//! pumped once per frame from [`eframe::App::update`].
//!
//! # Main Types
//!
//! - [`GraphViewApp`] - Main application state implementing [`eframe::App`]
//! - [`AppAction`] - What the toolbar and shortcuts ask for
//!
//! # Submodules
//!
//! - `state` - Actions and filter toggles
//! - `toolbar` - Top toolbar
//! - `status_bar` - Bottom status line

pub mod state;
mod status_bar;
mod toolbar;

pub use state::{AppAction, BuiltinFilter, FilterToggles};

use status_bar::{render_status_bar, StatusBarContext};
use toolbar::{render_toolbar, ToolbarContext};

use crate::attribution::EguiTextMeasure;
use crate::config::{Theme, ThemeStore, ViewerConfig};
use crate::controller::GraphController;
use crate::dispatch::Listener;
use crate::error::ResultExt;
use crate::graph::JsonGraphSource;
use crate::layout::LayeredLayout;
use crate::scene::{paint, SelectionChanged};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Main application state
pub struct GraphViewApp {
    controller: GraphController,
    theme: Arc<ThemeStore>,
    toggles: FilterToggles,
    /// Selection as last reported on the selection channel.
    selection: Arc<Mutex<Vec<String>>>,
    selection_listener: Arc<dyn Listener<SelectionChanged>>,
    hovered: Option<String>,
    jump_query: String,
    /// Canvas rect from the last frame, used by "fit to view".
    last_canvas: Option<egui::Rect>,
    /// Fit the diagram once the next scene arrives.
    fit_on_ready: bool,
    /// Errors from UI-side actions (open, jump); pipeline errors come from the controller.
    ui_error: Option<String>,
}

impl GraphViewApp {
    /// Create the app and, if given, start loading `graph_path`.
    pub fn new(cc: &eframe::CreationContext<'_>, config: ViewerConfig, graph_path: Option<PathBuf>) -> Self {
        let theme = ThemeStore::new(config.theme);
        let controller = GraphController::new(
            theme.clone(),
            Box::new(EguiTextMeasure::new(cc.egui_ctx.clone())),
            Box::new(LayeredLayout::new(config.layout)),
        );

        let selection = Arc::new(Mutex::new(Vec::new()));
        let sink = selection.clone();
        let selection_listener: Arc<dyn Listener<SelectionChanged>> =
            Arc::new(move |event: &SelectionChanged| {
                let mut current = sink.lock().unwrap_or_else(|e| e.into_inner());
                current.clone_from(&event.selected);
            });
        controller
            .channels()
            .selection
            .subscribe(selection_listener.clone());

        let mut app = Self {
            controller,
            theme,
            toggles: FilterToggles::default(),
            selection,
            selection_listener,
            hovered: None,
            jump_query: String::new(),
            last_canvas: None,
            fit_on_ready: false,
            ui_error: None,
        };

        if let Some(path) = graph_path {
            if let Err(e) = app.open(&path) {
                tracing::error!("{}", e);
                app.ui_error = Some(e.to_string());
            }
        }
        app
    }

    /// Start loading the graph description at `path`.
    pub fn open(&mut self, path: &Path) -> crate::Result<()> {
        self.controller
            .load(Arc::new(JsonGraphSource::new(path)))
            .with_context(|| format!("Failed to open {}", path.display()))?;
        self.fit_on_ready = true;
        self.ui_error = None;
        Ok(())
    }

    fn handle_action(&mut self, action: AppAction) {
        tracing::debug!("Action: {:?}", action);
        let result: crate::Result<()> = match action {
            AppAction::Open(path) => self.open(&path),
            AppAction::Reload => self.controller.reload().context("Reload"),
            AppAction::Cancel => {
                self.controller.cancel();
                Ok(())
            }
            AppAction::ZoomIn => {
                self.controller.scene_mut().zoom_in();
                Ok(())
            }
            AppAction::ZoomOut => {
                self.controller.scene_mut().zoom_out();
                Ok(())
            }
            AppAction::ResetZoom => {
                self.controller.scene_mut().reset_zoom();
                Ok(())
            }
            AppAction::FitToView => {
                if let Some(canvas) = self.last_canvas {
                    self.controller.scene_mut().fit_to(canvas);
                }
                Ok(())
            }
            AppAction::SetBundling(enabled) => {
                let settings = crate::config::BundlingSettings {
                    enabled,
                    ..self.controller.bundling()
                };
                self.controller.set_bundling(settings).context("Bundling")
            }
            AppAction::ToggleFilter(filter, on) => {
                if self.toggles.set(filter, on) {
                    let result = self
                        .controller
                        .replace_filters(self.toggles.chain())
                        .context(format!("Filter '{}'", filter.display_name()));
                    if result.is_err() {
                        // The chain did not change, keep the checkboxes in sync.
                        self.toggles.set(filter, !on);
                    }
                    result
                } else {
                    Ok(())
                }
            }
            AppAction::JumpTo(name) => {
                let scene = self.controller.scene_mut();
                scene
                    .select(&name, false)
                    .and_then(|_| scene.jump_to(&name))
                    .context("Jump")
            }
            AppAction::ClearSelection => {
                self.controller.scene_mut().clear_selection();
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!("{}", e);
                self.ui_error = Some(e.to_string());
            }
        }
    }

    fn handle_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        use egui::Key;

        // Leave typing in the search box alone.
        if ctx.wants_keyboard_input() {
            return;
        }

        let busy = self.controller.is_busy();
        let actions = ctx.input(|i| {
            let mut actions = Vec::new();
            if i.key_pressed(Key::F5) {
                actions.push(AppAction::Reload);
            }
            if i.key_pressed(Key::Escape) {
                actions.push(if busy {
                    AppAction::Cancel
                } else {
                    AppAction::ClearSelection
                });
            }
            if (i.key_pressed(Key::Plus) || i.key_pressed(Key::Equals)) && i.modifiers.command_only() {
                actions.push(AppAction::ZoomIn);
            }
            if i.key_pressed(Key::Minus) && i.modifiers.command_only() {
                actions.push(AppAction::ZoomOut);
            }
            if i.key_pressed(Key::Num0) && i.modifiers.command_only() {
                actions.push(AppAction::ResetZoom);
            }
            if i.key_pressed(Key::F) && !i.modifiers.any() {
                actions.push(AppAction::FitToView);
            }
            actions
        });

        for action in actions {
            self.handle_action(action);
        }
    }
}

impl eframe::App for GraphViewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Err(e) = self.controller.poll() {
            tracing::warn!("Controller poll failed: {}", e);
        }
        self.handle_keyboard_shortcuts(ctx);

        let busy = self.controller.is_busy();
        if busy {
            ctx.request_repaint();
        }

        // Dropping a graph file onto the window opens it.
        let mut actions: Vec<AppAction> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .map(AppAction::Open)
                .collect()
        });

        // Toolbar
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            let toolbar_ctx = ToolbarContext {
                state: self.controller.state(),
                busy,
                loaded: self.controller.source_description().is_some(),
                zoom: self.controller.scene().viewport().zoom(),
                bundling: self.controller.bundling().enabled,
                filters: &self.toggles,
            };
            actions.extend(render_toolbar(ui, &toolbar_ctx, &mut self.jump_query));
        });

        // Status bar
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let selection = self
                .selection
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            let source = self.controller.source_description();
            let hovered = self.hovered.as_deref().and_then(|name| {
                self.controller
                    .scene()
                    .node(name)
                    .map(|n| (n.name.as_str(), n.description.as_deref()))
            });
            let controller_error = self.controller.last_error().map(|e| e.to_string());
            let status_ctx = StatusBarContext {
                state: self.controller.state(),
                busy,
                progress: self.controller.progress(),
                source: source.as_deref(),
                counts: self
                    .controller
                    .filtered_graph()
                    .map(|g| (g.node_count(), g.link_count())),
                selection: &selection,
                hovered,
                last_error: self.ui_error.as_deref().or(controller_error.as_deref()),
            };
            render_status_bar(ui, &status_ctx);
        });

        // Scene canvas
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let font_size = self.theme.snapshot().font_size();
                let output = paint::show(ui, self.controller.scene_mut(), font_size);
                self.last_canvas = Some(output.response.rect);
                self.hovered = output.hovered;
            });

        if self.fit_on_ready && !busy && !self.controller.scene().is_empty() {
            self.fit_on_ready = false;
            actions.push(AppAction::FitToView);
        }

        for action in actions {
            self.handle_action(action);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.controller
            .channels()
            .selection
            .unsubscribe(&self.selection_listener);
        self.controller.stop();
        tracing::info!("Viewer closed");
    }
}
