//! Action and toggle types for the frontend
//!
//! The toolbar and keyboard handling return `AppAction`s instead of driving
//! the controller directly; `GraphViewApp::handle_action` applies them.

use crate::filter::{DropWeakLinks, GraphFilter, HideMissing, ReachableFromStart, RemoveIsolated};
use std::path::PathBuf;
use std::sync::Arc;

/// Actions the UI can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Load the graph description at this path (dropped onto the window)
    Open(PathBuf),
    /// Reload the graph from its source
    Reload,
    /// Stop the running pipeline at the next stage boundary
    Cancel,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    /// Fit the whole diagram into the view
    FitToView,
    /// Turn edge bundling on or off
    SetBundling(bool),
    /// Enable or disable one of the built-in filters
    ToggleFilter(BuiltinFilter, bool),
    /// Center the view on a node and select it
    JumpTo(String),
    ClearSelection,
}

/// Built-in filters offered in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinFilter {
    ReachableFromStart,
    HideMissing,
    DropWeakLinks,
    RemoveIsolated,
}

impl BuiltinFilter {
    /// All filters in chain order.
    pub fn all() -> &'static [BuiltinFilter] {
        &[
            BuiltinFilter::ReachableFromStart,
            BuiltinFilter::HideMissing,
            BuiltinFilter::DropWeakLinks,
            BuiltinFilter::RemoveIsolated,
        ]
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BuiltinFilter::ReachableFromStart => "Reachable from start",
            BuiltinFilter::HideMissing => "Hide missing",
            BuiltinFilter::DropWeakLinks => "Drop weak links",
            BuiltinFilter::RemoveIsolated => "Remove isolated",
        }
    }

    pub fn build(self) -> Arc<dyn GraphFilter> {
        match self {
            BuiltinFilter::ReachableFromStart => Arc::new(ReachableFromStart),
            BuiltinFilter::HideMissing => Arc::new(HideMissing),
            BuiltinFilter::DropWeakLinks => Arc::new(DropWeakLinks),
            BuiltinFilter::RemoveIsolated => Arc::new(RemoveIsolated),
        }
    }
}

/// Which built-in filters are switched on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterToggles {
    enabled: Vec<BuiltinFilter>,
}

impl FilterToggles {
    pub fn is_enabled(&self, filter: BuiltinFilter) -> bool {
        self.enabled.contains(&filter)
    }

    /// Returns whether the toggle changed anything.
    pub fn set(&mut self, filter: BuiltinFilter, on: bool) -> bool {
        match (on, self.is_enabled(filter)) {
            (true, false) => {
                self.enabled.push(filter);
                self.enabled.sort();
                true
            }
            (false, true) => {
                self.enabled.retain(|f| *f != filter);
                true
            }
            _ => false,
        }
    }

    /// Filter chain for the enabled toggles, in [`BuiltinFilter::all`] order.
    pub fn chain(&self) -> Vec<Arc<dyn GraphFilter>> {
        self.enabled.iter().map(|f| f.build()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_order_is_fixed() {
        let mut toggles = FilterToggles::default();
        assert!(toggles.set(BuiltinFilter::RemoveIsolated, true));
        assert!(toggles.set(BuiltinFilter::ReachableFromStart, true));
        assert!(!toggles.set(BuiltinFilter::ReachableFromStart, true));
        let names: Vec<_> = toggles.chain().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["reachable-from-start", "remove-isolated"]);
    }

    #[test]
    fn test_toggle_off() {
        let mut toggles = FilterToggles::default();
        toggles.set(BuiltinFilter::HideMissing, true);
        assert!(toggles.set(BuiltinFilter::HideMissing, false));
        assert!(!toggles.set(BuiltinFilter::HideMissing, false));
        assert!(toggles.chain().is_empty());
    }
}
