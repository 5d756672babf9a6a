//! Plot images and painters used by the desktop app.
//!
//! Spectrograms are rendered to [`egui::ColorImage`]s once per analysis and
//! uploaded as textures; the painters in [`view`] only lay them out.

pub mod colormap;
pub mod spectrogram;
pub mod view;
pub mod waveform;

pub use colormap::magma;
pub use spectrogram::{DbSpectrogram, FrequencyScale, RenderConfig, SpectrogramImage};
pub use view::{SpectrogramPlot, WaveformPlot};
pub use waveform::{peak_envelope, EnvelopeBin};
