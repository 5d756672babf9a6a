use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use bpmscope_domain::{AnalysisError, AudioSignal};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, instrument, warn};

use crate::dsp::{downmix_to_mono, resample};

/// Default analysis rate; tempo features are computed at this rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Resample to this rate after decoding. `None` keeps the file's rate.
    pub target_sample_rate: Option<u32>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: Some(DEFAULT_SAMPLE_RATE),
        }
    }
}

/// Decoded file contents before downmixing. Samples are interleaved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioReader {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioReader {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<AudioReader> {
        let path_ref = path.as_ref();
        let file =
            File::open(path_ref).with_context(|| format!("open audio file {:?}", path_ref))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("unsupported or unrecognized audio format")?;
        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| anyhow::anyhow!("no default track found"))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("unsupported codec")?;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
        let mut samples = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphError::ResetRequired) => break,
                Err(err) => return Err(err.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphError::DecodeError(msg)) => {
                    warn!(msg, "skipping undecodable packet");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channels.get_or_insert(spec.channels.count() as u16);
            let mut out = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            out.copy_interleaved_ref(decoded);
            samples.extend_from_slice(out.samples());
        }

        let reader = AudioReader {
            sample_rate: sample_rate.ok_or_else(|| anyhow::anyhow!("unknown sample rate"))?,
            channels: channels.unwrap_or(1),
            samples,
        };
        debug!(
            sample_rate = reader.sample_rate,
            channels = reader.channels,
            frames = reader.frames(),
            "decoded audio"
        );
        Ok(reader)
    }
}

/// Decodes `path` into a mono signal at the configured rate.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_signal<P: AsRef<Path>>(
    path: P,
    config: &LoaderConfig,
) -> Result<AudioSignal, AnalysisError> {
    let path_ref = path.as_ref();
    let as_load_error = |err: anyhow::Error| {
        AnalysisError::load(path_ref.display().to_string(), format!("{err:#}"))
    };

    let reader = AudioDecoder::open(path_ref).map_err(as_load_error)?;
    let mono = downmix_to_mono(&reader.samples, reader.channels as usize);
    let (samples, sample_rate) = match config.target_sample_rate {
        Some(target) if target != reader.sample_rate => {
            let resampled = resample(&mono, reader.sample_rate, target).map_err(as_load_error)?;
            (resampled, target)
        }
        _ => (mono, reader.sample_rate),
    };
    info!(
        sample_rate,
        samples = samples.len(),
        "loaded audio signal"
    );
    AudioSignal::new(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::path::PathBuf;

    fn write_wav(dir: &Path, name: &str, channels: u16, rate: u32, frames: &[Vec<i16>]) -> PathBuf {
        let path = dir.join(name);
        let spec = WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for frame in frames {
            for sample in frame {
                writer.write_sample(*sample).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn audio_reader_handles_missing_file() {
        let result = AudioDecoder::open("does-not-exist.wav");
        assert!(result.is_err());
    }

    #[test]
    fn load_signal_reports_load_error() {
        let err = load_signal("does-not-exist.wav", &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Load { .. }));
        assert!(err.to_string().contains("does-not-exist.wav"));
    }

    #[test]
    fn rejects_non_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(load_signal(&path, &LoaderConfig::default()).is_err());
    }

    #[test]
    fn downmixes_stereo_at_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<Vec<i16>> = (0..4000).map(|_| vec![16_384, 0]).collect();
        let path = write_wav(dir.path(), "stereo.wav", 2, 8000, &frames);

        let config = LoaderConfig {
            target_sample_rate: None,
        };
        let signal = load_signal(&path, &config).unwrap();
        assert_eq!(signal.sample_rate(), 8000);
        assert_eq!(signal.len(), 4000);
        assert!(signal.samples().iter().all(|s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn resamples_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<Vec<i16>> = (0..44_100)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                vec![((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 8000.0) as i16]
            })
            .collect();
        let path = write_wav(dir.path(), "tone.wav", 1, 44_100, &frames);

        let signal = load_signal(&path, &LoaderConfig::default()).unwrap();
        assert_eq!(signal.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(signal.len(), 22_050);
    }
}
