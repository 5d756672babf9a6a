use std::path::PathBuf;

use bpmscope_domain::{AnalysisError, TempoLog};
use bpmscope_plot::{
    peak_envelope, DbSpectrogram, EnvelopeBin, FrequencyScale, RenderConfig, SpectrogramImage,
    SpectrogramPlot, WaveformPlot,
};
use bpmscope_tempo::AnalysisSession;
use bpmscope_ui::theme as ui_theme;
use eframe::egui;
use rfd::FileDialog;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const WAVEFORM_BINS: usize = 2048;
const TOO_SHORT_MESSAGE: &str = "Audio signal is too short for analysis.";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("BPM Analyzer")
            .with_inner_size([960.0, 640.0]),
        ..Default::default()
    };
    eframe::run_native(
        "BPM Analyzer",
        options,
        Box::new(|cc| {
            ui_theme::apply(&cc.egui_ctx);
            Box::new(AnalyzerApp::default())
        }),
    )
    .map_err(|e| anyhow::anyhow!(format!("{e:?}")))?;
    Ok(())
}

struct SpectrogramPane {
    image: SpectrogramImage,
    texture: egui::TextureHandle,
}

/// Both spectrograms of one analysis run.
struct Plots {
    linear: SpectrogramPane,
    log: SpectrogramPane,
}

/// Log text and summary kept from the last successful analysis.
struct TempoReport {
    lines: Vec<String>,
    mean_bpm: Option<f32>,
    segments: usize,
}

impl TempoReport {
    fn from_log(log: &TempoLog) -> Self {
        Self {
            lines: log.lines(),
            mean_bpm: log.mean_bpm(),
            segments: log.len(),
        }
    }
}

struct Waveform {
    envelope: Vec<EnvelopeBin>,
    duration_seconds: f64,
}

#[derive(Default)]
struct AnalyzerApp {
    session: AnalysisSession,
    render: RenderConfig,
    plots: Option<Plots>,
    waveform: Option<Waveform>,
    tempo_report: Option<TempoReport>,
    status_message: Option<String>,
    error_message: Option<String>,
    show_spectrograms: bool,
    show_log: bool,
    show_waveform: bool,
}

impl AnalyzerApp {
    fn file_label(&self) -> String {
        match self.session.source() {
            Some(path) => format!("Selected File: {}", path.display()),
            None => "No file selected".to_string(),
        }
    }

    fn select_file(&mut self) {
        let Some(path) = FileDialog::new()
            .set_title("Select Audio File")
            .add_filter("Audio files", &["wav", "mp3"])
            .pick_file()
        else {
            return;
        };
        self.load(path);
    }

    fn load(&mut self, path: PathBuf) {
        match self.session.load(&path) {
            Ok(signal) => {
                info!(path = %path.display(), seconds = signal.duration_seconds(), "audio loaded");
                self.waveform = Some(Waveform {
                    envelope: peak_envelope(signal.samples(), WAVEFORM_BINS),
                    duration_seconds: signal.duration_seconds(),
                });
                self.plots = None;
                self.tempo_report = None;
                self.show_log = false;
                self.show_spectrograms = false;
                self.error_message = None;
                self.status_message = None;
            }
            Err(err) => self.report(err),
        }
    }

    fn analyze(&mut self, ctx: &egui::Context) {
        self.error_message = None;
        self.tempo_report = None;
        if let Err(err) = self.session.analyze() {
            self.report(err);
            return;
        }
        let report = match self.session.tempo_log() {
            Ok(log) => TempoReport::from_log(&log),
            Err(err) => {
                self.report(err);
                return;
            }
        };
        let count = report.segments;
        self.tempo_report = Some(report);
        match self.build_plots(ctx) {
            Ok(plots) => {
                self.plots = Some(plots);
                self.show_spectrograms = true;
            }
            Err(err) => {
                error!(?err, "spectrogram rendering failed");
                self.error_message = Some(format!("Error: {err}"));
            }
        }
        self.status_message = Some(format!("Analyzed {count} segments"));
    }

    fn build_plots(&self, ctx: &egui::Context) -> anyhow::Result<Plots> {
        let signal = self
            .session
            .signal()
            .ok_or_else(|| anyhow::anyhow!(AnalysisError::NoSignal))?;
        let spectrogram = DbSpectrogram::compute(signal, &self.render.spectrogram)?;
        let pane = |scale: FrequencyScale, name: &str| {
            let image = spectrogram.render(scale, &self.render);
            let texture = ctx.load_texture(name, image.image.clone(), egui::TextureOptions::LINEAR);
            SpectrogramPane { image, texture }
        };
        Ok(Plots {
            linear: pane(FrequencyScale::Linear, "spectrogram-linear"),
            log: pane(FrequencyScale::Log, "spectrogram-log"),
        })
    }

    fn view_log(&mut self) {
        if self.tempo_report.is_some() {
            self.error_message = None;
            self.show_log = true;
        } else {
            self.report(AnalysisError::NotAnalyzed);
        }
    }

    fn view_waveform(&mut self) {
        if self.waveform.is_some() {
            self.show_waveform = true;
        } else {
            self.report(AnalysisError::NoSignal);
        }
    }

    fn report(&mut self, err: AnalysisError) {
        error!(%err, "analysis request failed");
        self.error_message = Some(if err.is_too_short() {
            TOO_SHORT_MESSAGE.to_string()
        } else {
            err.to_string()
        });
    }

    fn windows(&mut self, ctx: &egui::Context) {
        let accent = ui_theme::tokens().accent;

        if let Some(plots) = &self.plots {
            egui::Window::new("Spectrograms")
                .open(&mut self.show_spectrograms)
                .resizable(true)
                .default_size([900.0, 480.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                        let height = ((ui.available_height() - 90.0) / 2.0).max(120.0);
                        SpectrogramPlot::new(&plots.linear.image, &plots.linear.texture)
                            .height(height)
                            .show(ui);
                        ui.add_space(8.0);
                        SpectrogramPlot::new(&plots.log.image, &plots.log.texture)
                            .height(height)
                            .show(ui);
                    });
                });
        }

        if let Some(waveform) = &self.waveform {
            egui::Window::new("Waveform View")
                .open(&mut self.show_waveform)
                .resizable(true)
                .default_size([900.0, 220.0])
                .show(ctx, |ui| {
                    let height = (ui.available_height() - 40.0).max(80.0);
                    WaveformPlot::new(&waveform.envelope, waveform.duration_seconds)
                        .color(accent)
                        .height(height)
                        .show(ui);
                });
        }

        if let Some(report) = &self.tempo_report {
            egui::Window::new("BPM Log View")
                .open(&mut self.show_log)
                .resizable(true)
                .default_size([420.0, 300.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                        for line in &report.lines {
                            ui.label(egui::RichText::new(line).monospace().color(accent));
                        }
                    });
                });
        }
    }
}

impl eframe::App for AnalyzerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let accent = ui_theme::tokens().accent;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);
                ui.label(egui::RichText::new(self.file_label()).color(accent));
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if ui.button("Select Audio File").clicked() {
                        self.select_file();
                    }
                    let can_analyze = self.session.signal().is_some();
                    if ui
                        .add_enabled(can_analyze, egui::Button::new("Analyze BPM"))
                        .clicked()
                    {
                        self.analyze(ctx);
                    }
                });
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if ui.button("View BPM Log").clicked() {
                        self.view_log();
                    }
                    if ui.button("View Waveform").clicked() {
                        self.view_waveform();
                    }
                    if self.plots.is_some() && ui.button("Show Spectrograms").clicked() {
                        self.show_spectrograms = true;
                    }
                });
                ui.add_space(10.0);
                if let Some(message) = &self.error_message {
                    ui.colored_label(egui::Color32::from_rgb(0xFF, 0x8A, 0x8A), message);
                }
                if let Some(message) = &self.status_message {
                    ui.label(message);
                }
                if let Some(report) = &self.tempo_report {
                    if let Some(mean) = report.mean_bpm {
                        ui.label(format!("Mean BPM over {} segments: {mean:.2}", report.segments));
                    }
                }
            });
        });

        self.windows(ctx);
    }
}
