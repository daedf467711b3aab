//! Theming collaborator: per-role visual attributes and bundling thresholds.
//!
//! [`ThemeSettings`] is the serializable configuration. [`ThemeStore`] holds
//! the live copy and announces edits on a [`Dispatcher<PreferenceChanged>`],
//! which is how a running controller learns it has to re-render.

use crate::dispatch::Dispatcher;
use crate::graph::NodeRole;
use egui::Color32;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Node outline shape requested from the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeToken {
    Box,
    RoundedBox,
    Ellipse,
    Octagon,
    Diamond,
}

impl ShapeToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeToken::Box => "box",
            ShapeToken::RoundedBox => "rounded_box",
            ShapeToken::Ellipse => "ellipse",
            ShapeToken::Octagon => "octagon",
            ShapeToken::Diamond => "diamond",
        }
    }
}

/// Link style categories. Plain links use the default link style; the others
/// are explicit per-link overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStyleKind {
    Plain,
    Weak,
    Task,
    Bundle,
}

/// Resolved node style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStyle {
    pub shape: ShapeToken,
    pub foreground: Color32,
    pub background: Color32,
    pub line_width: f32,
}

/// Resolved link style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkStyle {
    pub color: Color32,
    pub line_width: f32,
    pub dashed: bool,
}

/// Bus-routing thresholds. A node whose in- or out-degree exceeds the
/// threshold gets one shared connector for that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlingSettings {
    pub enabled: bool,
    pub in_threshold: usize,
    pub out_threshold: usize,
}

impl Default for BundlingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            in_threshold: 6,
            out_threshold: 6,
        }
    }
}

/// Read-only keyed lookups used by attribution and rendering.
pub trait Theme: Send + Sync {
    fn node_style(&self, role: NodeRole) -> NodeStyle;

    fn link_style(&self, kind: LinkStyleKind) -> LinkStyle;

    fn selection_color(&self) -> Color32;

    fn bundling(&self) -> BundlingSettings;

    /// Label font size in points.
    fn font_size(&self) -> f32;

    /// Padding added around label text when sizing a node.
    fn label_padding(&self) -> [f32; 2];
}

/// Serializable per-role node style. Colors are RGBA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleStyleConfig {
    pub shape: ShapeToken,
    pub foreground: [u8; 4],
    pub background: [u8; 4],
    pub line_width: f32,
}

impl RoleStyleConfig {
    fn resolve(&self) -> NodeStyle {
        NodeStyle {
            shape: self.shape,
            foreground: rgba(self.foreground),
            background: rgba(self.background),
            line_width: self.line_width,
        }
    }
}

/// Serializable link style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStyleConfig {
    pub color: [u8; 4],
    pub line_width: f32,
    #[serde(default)]
    pub dashed: bool,
}

impl LinkStyleConfig {
    fn resolve(&self) -> LinkStyle {
        LinkStyle {
            color: rgba(self.color),
            line_width: self.line_width,
            dashed: self.dashed,
        }
    }
}

fn rgba(c: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}

/// Theme configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    pub start: RoleStyleConfig,
    pub main: RoleStyleConfig,
    pub missing: RoleStyleConfig,
    pub plain: RoleStyleConfig,
    pub plain_link: LinkStyleConfig,
    pub weak_link: LinkStyleConfig,
    pub task_link: LinkStyleConfig,
    pub bundle_link: LinkStyleConfig,
    pub selection: [u8; 4],
    pub font_size: f32,
    pub label_padding: [f32; 2],
    pub bundling: BundlingSettings,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            start: RoleStyleConfig {
                shape: ShapeToken::Octagon,
                foreground: [20, 20, 20, 255],
                background: [60, 140, 60, 255],
                line_width: 2.0,
            },
            main: RoleStyleConfig {
                shape: ShapeToken::Ellipse,
                foreground: [20, 20, 20, 255],
                background: [60, 100, 180, 255],
                line_width: 1.5,
            },
            missing: RoleStyleConfig {
                shape: ShapeToken::Box,
                foreground: [200, 40, 40, 255],
                background: [70, 70, 70, 255],
                line_width: 1.0,
            },
            plain: RoleStyleConfig {
                shape: ShapeToken::RoundedBox,
                foreground: [40, 40, 40, 255],
                background: [200, 120, 40, 255],
                line_width: 1.0,
            },
            plain_link: LinkStyleConfig {
                color: [150, 150, 150, 255],
                line_width: 1.5,
                dashed: false,
            },
            weak_link: LinkStyleConfig {
                color: [120, 120, 120, 255],
                line_width: 1.0,
                dashed: true,
            },
            task_link: LinkStyleConfig {
                color: [100, 149, 237, 255],
                line_width: 1.5,
                dashed: false,
            },
            bundle_link: LinkStyleConfig {
                color: [180, 120, 200, 255],
                line_width: 2.0,
                dashed: false,
            },
            selection: [255, 255, 255, 255],
            font_size: 12.0,
            label_padding: [16.0, 10.0],
            bundling: BundlingSettings::default(),
        }
    }
}

impl Theme for ThemeSettings {
    fn node_style(&self, role: NodeRole) -> NodeStyle {
        match role {
            NodeRole::Start => self.start.resolve(),
            NodeRole::Main => self.main.resolve(),
            NodeRole::Missing => self.missing.resolve(),
            NodeRole::Plain => self.plain.resolve(),
        }
    }

    fn link_style(&self, kind: LinkStyleKind) -> LinkStyle {
        match kind {
            LinkStyleKind::Plain => self.plain_link.resolve(),
            LinkStyleKind::Weak => self.weak_link.resolve(),
            LinkStyleKind::Task => self.task_link.resolve(),
            LinkStyleKind::Bundle => self.bundle_link.resolve(),
        }
    }

    fn selection_color(&self) -> Color32 {
        rgba(self.selection)
    }

    fn bundling(&self) -> BundlingSettings {
        self.bundling
    }

    fn font_size(&self) -> f32 {
        self.font_size
    }

    fn label_padding(&self) -> [f32; 2] {
        self.label_padding
    }
}

/// Emitted whenever the live theme changes.
#[derive(Debug, Clone)]
pub struct PreferenceChanged {
    pub settings: ThemeSettings,
}

/// Live theme settings plus the channel announcing edits.
pub struct ThemeStore {
    settings: RwLock<ThemeSettings>,
    changes: Dispatcher<PreferenceChanged>,
}

impl ThemeStore {
    pub fn new(settings: ThemeSettings) -> Arc<Self> {
        Arc::new(Self {
            settings: RwLock::new(settings),
            changes: Dispatcher::new("preferences"),
        })
    }

    /// Snapshot of the current settings.
    pub fn snapshot(&self) -> ThemeSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Edit the settings and notify observers.
    pub fn update(&self, edit: impl FnOnce(&mut ThemeSettings)) {
        let settings = {
            let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
            edit(&mut guard);
            guard.clone()
        };
        tracing::debug!("Theme updated");
        self.changes.dispatch(&PreferenceChanged { settings });
    }

    pub fn changes(&self) -> &Dispatcher<PreferenceChanged> {
        &self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_role_lookup() {
        let theme = ThemeSettings::default();
        assert_eq!(theme.node_style(NodeRole::Start).shape, ShapeToken::Octagon);
        assert_eq!(theme.node_style(NodeRole::Plain).shape, ShapeToken::RoundedBox);
        assert!(theme.link_style(LinkStyleKind::Weak).dashed);
        assert_eq!(
            theme.node_style(NodeRole::Main).background,
            Color32::from_rgb(60, 100, 180)
        );
    }

    #[test]
    fn test_store_update_notifies() {
        let store = ThemeStore::new(ThemeSettings::default());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        store.changes().subscribe(Arc::new(move |e: &PreferenceChanged| {
            assert!(e.settings.bundling.enabled);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        store.update(|s| s.bundling.enabled = true);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(store.snapshot().bundling.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ThemeSettings = toml::from_str("font_size = 20.0").unwrap();
        assert_eq!(settings.font_size, 20.0);
        assert_eq!(settings.start, ThemeSettings::default().start);
    }
}
