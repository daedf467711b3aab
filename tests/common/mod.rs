//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use depgraph_view::attribution::ApproxTextMeasure;
use depgraph_view::config::{ThemeSettings, ThemeStore};
use depgraph_view::controller::GraphController;
use depgraph_view::layout::LayeredLayout;
use std::sync::Arc;
use std::time::Duration;

/// Generous timeout for waiting on a controller run
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f32, b: f32, epsilon: f32) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Headless controller with the built-in layout and approximate text metrics
pub fn headless_controller() -> (GraphController, Arc<ThemeStore>) {
    let theme = ThemeStore::new(ThemeSettings::default());
    let controller = GraphController::new(
        theme.clone(),
        Box::new(ApproxTextMeasure::default()),
        Box::new(LayeredLayout::default()),
    );
    (controller, theme)
}
