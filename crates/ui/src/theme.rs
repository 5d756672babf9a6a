use egui::{Color32, Rounding, Stroke, Visuals};

#[derive(Clone, Debug)]
pub struct ThemeTokens {
    pub accent: Color32,
    pub accent_hover: Color32,
    pub neutral_bg: Color32,
    pub neutral_panel: Color32,
    pub text_primary: Color32,
    pub button_text: Color32,
}

#[derive(Clone, Debug)]
pub struct Theme {
    pub tokens: ThemeTokens,
    pub visuals: Visuals,
}

pub fn tokens() -> ThemeTokens {
    ThemeTokens {
        accent: Color32::from_rgb(0xBD, 0x32, 0x54),
        accent_hover: Color32::from_rgb(0xD0, 0x45, 0x67),
        neutral_bg: Color32::from_rgb(0x32, 0x32, 0x32),
        neutral_panel: Color32::from_rgb(0x2A, 0x2A, 0x2A),
        text_primary: Color32::from_rgb(0xE6, 0xE6, 0xE6),
        button_text: Color32::WHITE,
    }
}

/// Dark grey surfaces with accent-coloured buttons.
pub fn analyzer() -> Theme {
    let tokens = tokens();

    let mut visuals = Visuals::dark();
    visuals.window_rounding = Rounding::same(6.0);
    visuals.panel_fill = tokens.neutral_bg;
    visuals.window_fill = tokens.neutral_bg;
    visuals.extreme_bg_color = tokens.neutral_panel;
    visuals.widgets.noninteractive.bg_fill = tokens.neutral_bg;
    visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, tokens.text_primary);
    // buttons
    visuals.widgets.inactive.bg_fill = tokens.accent;
    visuals.widgets.inactive.weak_bg_fill = tokens.accent;
    visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, tokens.button_text);
    visuals.widgets.hovered.bg_fill = tokens.accent_hover;
    visuals.widgets.hovered.weak_bg_fill = tokens.accent_hover;
    visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, tokens.button_text);
    visuals.widgets.active.bg_fill = tokens.accent.linear_multiply(0.85);
    visuals.widgets.active.weak_bg_fill = tokens.accent.linear_multiply(0.85);
    visuals.widgets.active.fg_stroke = Stroke::new(1.0, tokens.button_text);
    visuals.selection.bg_fill = tokens.accent;
    visuals.selection.stroke = Stroke::new(1.0, tokens.button_text);
    visuals.hyperlink_color = tokens.accent_hover;

    Theme { tokens, visuals }
}

pub fn apply(ctx: &egui::Context) {
    ctx.set_visuals(analyzer().visuals);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_use_the_background_token() {
        let theme = analyzer();
        assert_eq!(theme.visuals.panel_fill, Color32::from_rgb(0x32, 0x32, 0x32));
        assert_eq!(theme.visuals.widgets.inactive.weak_bg_fill, theme.tokens.accent);
        assert_eq!(theme.visuals.widgets.inactive.fg_stroke.color, Color32::WHITE);
    }
}
