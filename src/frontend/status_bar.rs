//! Status bar panel: bottom bar showing pipeline state, progress, selection
//! and the last error.

use egui::{Color32, RichText, Ui};

use crate::controller::{ControllerState, ProgressUpdate};

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub state: ControllerState,
    pub busy: bool,
    pub progress: Option<&'a ProgressUpdate>,
    pub source: Option<&'a str>,
    pub counts: Option<(usize, usize)>,
    pub selection: &'a [String],
    /// Hovered node and its description.
    pub hovered: Option<(&'a str, Option<&'a str>)>,
    pub last_error: Option<&'a str>,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        // === State dot + source ===
        let status_color = match ctx.state {
            ControllerState::Ready => Color32::GREEN,
            ControllerState::Error => Color32::RED,
            ControllerState::Idle => Color32::GRAY,
            _ => Color32::YELLOW,
        };
        ui.colored_label(status_color, "●");
        let source = ctx.source.unwrap_or("No graph loaded");
        ui.label(RichText::new(source).small());

        // === Progress ===
        if ctx.busy {
            if let Some(progress) = ctx.progress {
                ui.separator();
                ui.add(
                    egui::ProgressBar::new(progress.fraction())
                        .desired_width(120.0)
                        .text(format!("{} {}/{}", progress.stage, progress.done, progress.total)),
                );
                if !progress.detail.is_empty() {
                    ui.label(RichText::new(&progress.detail).small().weak());
                }
            }
        }

        // === Graph size ===
        if let Some((nodes, links)) = ctx.counts {
            ui.separator();
            ui.label(RichText::new(format!("{} nodes, {} links", nodes, links)).small());
        }

        // === Selection ===
        if !ctx.selection.is_empty() {
            ui.separator();
            let text = match ctx.selection {
                [one] => format!("Selected: {}", one),
                many => format!("Selected: {} nodes", many.len()),
            };
            ui.label(RichText::new(text).small());
        }

        // === Hover info ===
        if let Some((name, description)) = ctx.hovered {
            ui.separator();
            let text = match description {
                Some(d) => format!("{}: {}", name, d),
                None => name.to_string(),
            };
            ui.label(RichText::new(text).small().weak());
        }

        // === Error message (right-aligned) ===
        if let Some(error) = ctx.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}
