//! Label text metrics.

use egui::{Color32, FontId, Vec2};

/// Measures label text. Implementations backed by a UI font system must only
/// be called on the UI thread.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> Vec2;
}

/// Font-free estimate from character count. Used headless and in tests.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTextMeasure {
    /// Average glyph advance as a fraction of the font size.
    pub advance: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for ApproxTextMeasure {
    fn default() -> Self {
        Self {
            advance: 0.6,
            line_height: 1.25,
        }
    }
}

impl TextMeasure for ApproxTextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> Vec2 {
        let chars = text.chars().count() as f32;
        Vec2::new(chars * font_size * self.advance, font_size * self.line_height)
    }
}

/// Measures with egui's font system.
#[derive(Clone)]
pub struct EguiTextMeasure {
    ctx: egui::Context,
}

impl EguiTextMeasure {
    pub fn new(ctx: egui::Context) -> Self {
        Self { ctx }
    }
}

impl TextMeasure for EguiTextMeasure {
    fn measure(&self, text: &str, font_size: f32) -> Vec2 {
        self.ctx
            .fonts_mut(|f| {
                f.layout_no_wrap(
                    text.to_owned(),
                    FontId::proportional(font_size),
                    Color32::WHITE,
                )
            })
            .size()
    }
}
