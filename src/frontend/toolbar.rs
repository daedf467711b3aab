//! Toolbar panel: reload, zoom, bundling, filters and node search.
//!
//! Sits above the scene view.

use egui::{Color32, RichText, Ui};

use crate::controller::ControllerState;
use crate::frontend::state::{AppAction, BuiltinFilter, FilterToggles};

/// Context needed to render the toolbar.
pub struct ToolbarContext<'a> {
    pub state: ControllerState,
    pub busy: bool,
    pub loaded: bool,
    pub zoom: f32,
    pub bundling: bool,
    pub filters: &'a FilterToggles,
}

/// Render the toolbar. `jump_query` is the search box text, kept by the app
/// between frames.
pub fn render_toolbar(ui: &mut Ui, ctx: &ToolbarContext<'_>, jump_query: &mut String) -> Vec<AppAction> {
    let mut actions = Vec::new();

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 4.0;

        // === Pipeline group ===
        if ctx.busy {
            if ui.button("Cancel").on_hover_text("Stop after the current stage").clicked() {
                actions.push(AppAction::Cancel);
            }
        } else if ui
            .add_enabled(ctx.loaded, egui::Button::new("⟳ Reload"))
            .on_hover_text("Reload the graph from its source (F5)")
            .clicked()
        {
            actions.push(AppAction::Reload);
        }

        ui.separator();

        // === View group ===
        if ui.button("−").on_hover_text("Zoom out").clicked() {
            actions.push(AppAction::ZoomOut);
        }
        if ui
            .button(format!("{:.0}%", ctx.zoom * 100.0))
            .on_hover_text("Reset zoom")
            .clicked()
        {
            actions.push(AppAction::ResetZoom);
        }
        if ui.button("+").on_hover_text("Zoom in").clicked() {
            actions.push(AppAction::ZoomIn);
        }
        if ui.button("Fit").clicked() {
            actions.push(AppAction::FitToView);
        }

        ui.separator();

        // === Pipeline parameters ===
        ui.add_enabled_ui(!ctx.busy, |ui| {
            let mut bundling = ctx.bundling;
            if ui
                .checkbox(&mut bundling, "Bundle edges")
                .on_hover_text("Collapse links of high-degree nodes into one connector")
                .changed()
            {
                actions.push(AppAction::SetBundling(bundling));
            }

            ui.menu_button("Filters", |ui| {
                for &filter in BuiltinFilter::all() {
                    let mut on = ctx.filters.is_enabled(filter);
                    if ui.checkbox(&mut on, filter.display_name()).changed() {
                        actions.push(AppAction::ToggleFilter(filter, on));
                    }
                }
            });
        });

        ui.separator();

        // === Jump to node ===
        let response = ui.add(
            egui::TextEdit::singleline(jump_query)
                .hint_text("Jump to node…")
                .desired_width(160.0),
        );
        if response.lost_focus()
            && ui.input(|i| i.key_pressed(egui::Key::Enter))
            && !jump_query.trim().is_empty()
        {
            actions.push(AppAction::JumpTo(jump_query.trim().to_string()));
        }

        // === Right-aligned state ===
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let color = match ctx.state {
                ControllerState::Ready => Color32::GREEN,
                ControllerState::Error => Color32::RED,
                ControllerState::Idle => Color32::GRAY,
                _ => Color32::YELLOW,
            };
            ui.colored_label(color, RichText::new(ctx.state.display_name()).small());
        });
    });

    actions
}
