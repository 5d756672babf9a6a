pub mod analysis;
pub mod dsp;
pub mod io;
pub mod spectrum;

pub use analysis::{BeatTrack, BeatTracker, FixedTempoTracker};
pub use dsp::{normalize_buffer, trim_silence, trimmed, TrimConfig};
pub use io::{load_signal, AudioDecoder, AudioReader, LoaderConfig, DEFAULT_SAMPLE_RATE};
pub use spectrum::{amplitude_to_db, power_to_db, MelFilterbank, SpectrogramConfig, Stft};
