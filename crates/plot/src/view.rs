use egui::{pos2, vec2, Align2, Color32, FontId, Rect, Response, Sense, Stroke, TextureHandle, Ui};

use crate::spectrogram::SpectrogramImage;
use crate::waveform::EnvelopeBin;

const AXIS_LEFT: f32 = 52.0;
const AXIS_BOTTOM: f32 = 18.0;
const TITLE_HEIGHT: f32 = 20.0;

/// Picks a tick step that keeps the time axis under ten labels.
pub fn time_ticks(duration_seconds: f64) -> Vec<f64> {
    const STEPS: [f64; 10] = [0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0];
    if !(duration_seconds > 0.0) {
        return vec![0.0];
    }
    let step = STEPS
        .iter()
        .copied()
        .find(|step| duration_seconds / step <= 10.0)
        .unwrap_or(600.0);
    (0..)
        .map(|i| i as f64 * step)
        .take_while(|&t| t <= duration_seconds + 1e-9)
        .collect()
}

fn format_time(seconds: f64) -> String {
    if seconds >= 60.0 {
        format!("{}:{:02}", (seconds / 60.0) as u64, (seconds % 60.0) as u64)
    } else if seconds.fract() == 0.0 {
        format!("{seconds:.0}s")
    } else {
        format!("{seconds:.1}s")
    }
}

fn format_hz(hz: f32) -> String {
    if hz >= 1000.0 {
        format!("{}k", hz / 1000.0)
    } else {
        format!("{hz:.0}")
    }
}

/// Draws a title, the plot body and a labelled time axis; returns the body rect.
fn plot_frame(ui: &mut Ui, title: &str, height: f32, duration_seconds: f64) -> (Rect, Response) {
    let width = ui.available_width().max(AXIS_LEFT + 40.0);
    let (outer, response) =
        ui.allocate_exact_size(vec2(width, height + TITLE_HEIGHT + AXIS_BOTTOM), Sense::hover());
    let painter = ui.painter_at(outer);
    let text = ui.visuals().text_color();
    let grid = ui.visuals().weak_text_color();

    painter.text(
        pos2(outer.center().x, outer.top() + 2.0),
        Align2::CENTER_TOP,
        title,
        FontId::proportional(14.0),
        text,
    );
    let body = Rect::from_min_max(
        pos2(outer.left() + AXIS_LEFT, outer.top() + TITLE_HEIGHT),
        pos2(outer.right() - 4.0, outer.bottom() - AXIS_BOTTOM),
    );
    for t in time_ticks(duration_seconds) {
        let x = body.left() + body.width() * (t / duration_seconds.max(f64::EPSILON)) as f32;
        painter.line_segment([pos2(x, body.bottom()), pos2(x, body.bottom() + 4.0)], Stroke::new(1.0, grid));
        painter.text(
            pos2(x, body.bottom() + 4.0),
            Align2::CENTER_TOP,
            format_time(t),
            FontId::proportional(10.0),
            text,
        );
    }
    (body, response)
}

/// Spectrogram texture with a frequency axis matching its scale.
pub struct SpectrogramPlot<'a> {
    image: &'a SpectrogramImage,
    texture: &'a TextureHandle,
    height: f32,
}

impl<'a> SpectrogramPlot<'a> {
    pub fn new(image: &'a SpectrogramImage, texture: &'a TextureHandle) -> Self {
        Self {
            image,
            texture,
            height: 180.0,
        }
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn show(self, ui: &mut Ui) -> Response {
        let (body, response) =
            plot_frame(ui, self.image.title(), self.height, self.image.duration_seconds);
        let painter = ui.painter_at(response.rect);
        painter.image(
            self.texture.id(),
            body,
            Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
            Color32::WHITE,
        );

        let text = ui.visuals().text_color();
        let grid = ui.visuals().weak_text_color();
        let max_hz = self.image.max_frequency_hz;
        for hz in self.image.scale.ticks(max_hz) {
            let y = body.bottom() - body.height() * self.image.scale.position(hz, max_hz);
            painter.line_segment([pos2(body.left() - 4.0, y), pos2(body.left(), y)], Stroke::new(1.0, grid));
            painter.text(
                pos2(body.left() - 6.0, y),
                Align2::RIGHT_CENTER,
                format_hz(hz),
                FontId::proportional(10.0),
                text,
            );
        }
        painter.text(
            pos2(response.rect.left() + 2.0, body.center().y),
            Align2::LEFT_CENTER,
            "Hz",
            FontId::proportional(10.0),
            grid,
        );
        response
    }
}

/// Min/max envelope drawn as a filled band around the centre line.
pub struct WaveformPlot<'a> {
    envelope: &'a [EnvelopeBin],
    duration_seconds: f64,
    color: Color32,
    height: f32,
}

impl<'a> WaveformPlot<'a> {
    pub fn new(envelope: &'a [EnvelopeBin], duration_seconds: f64) -> Self {
        Self {
            envelope,
            duration_seconds,
            color: Color32::from_rgb(0xbd, 0x32, 0x54),
            height: 140.0,
        }
    }

    pub fn color(mut self, color: Color32) -> Self {
        self.color = color;
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn show(self, ui: &mut Ui) -> Response {
        let (body, response) = plot_frame(ui, "Waveform", self.height, self.duration_seconds);
        let painter = ui.painter_at(response.rect);
        painter.rect_filled(body, 0.0, ui.visuals().extreme_bg_color);
        let mid = body.center().y;
        let half = body.height() / 2.0;
        painter.line_segment(
            [pos2(body.left(), mid), pos2(body.right(), mid)],
            Stroke::new(1.0, ui.visuals().weak_text_color()),
        );

        let count = self.envelope.len().max(1) as f32;
        let column = (body.width() / count).max(1.0);
        for (i, bin) in self.envelope.iter().enumerate() {
            let x = body.left() + body.width() * i as f32 / count;
            let top = mid - bin.max * half;
            let bottom = mid - bin.min * half;
            painter.rect_filled(
                Rect::from_min_max(pos2(x, top), pos2(x + column, bottom.max(top + 1.0))),
                0.0,
                self.color,
            );
        }
        response
    }
}
