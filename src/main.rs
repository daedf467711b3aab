//! depgraph-view - Main Entry Point
//!
//! Usage: `depgraph-view [GRAPH.json]`. A graph file can also be dropped onto
//! the window.

use anyhow::Context;
use depgraph_view::{config::ViewerConfig, frontend::GraphViewApp};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,depgraph_view=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting depgraph-view");

    let config = ViewerConfig::load_or_default(None);
    let graph_path = std::env::args_os().nth(1).map(PathBuf::from);
    if let Some(path) = &graph_path {
        tracing::info!("Opening {:?}", path);
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("Dependency Graph Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "depgraph-view",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(GraphViewApp::new(cc, config, graph_path)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("Viewer window failed")?;

    tracing::info!("Shutting down...");
    Ok(())
}
