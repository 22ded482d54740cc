//! WAV reading and writing through `hound`.

use crate::format::OutputFormat;
use std::path::Path;
use stemsplit_core::{Result, StemSplitError, StereoBuffer, CHANNELS};
use tracing::debug;

/// Read a WAV file into a stereo buffer at its native sample rate.
pub fn read_wav(path: &Path) -> Result<StereoBuffer> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| StemSplitError::Decoder(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| StemSplitError::Decoder(format!("{}: {e}", path.display())))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| StemSplitError::Decoder(format!("{}: {e}", path.display())))?
        }
    };

    debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        "read wav"
    );
    StereoBuffer::from_interleaved(&samples, spec.channels, spec.sample_rate)
}

/// Write a stereo buffer as 16-bit or float WAV.
pub fn write_wav(path: &Path, audio: &StereoBuffer, format: OutputFormat) -> Result<()> {
    let (bits_per_sample, sample_format) = match format {
        OutputFormat::Pcm16 => (16, hound::SampleFormat::Int),
        OutputFormat::Float => (32, hound::SampleFormat::Float),
        other => {
            return Err(StemSplitError::UnsupportedFormat(format!(
                "{other} is not a WAV encoding"
            )))
        }
    };
    let spec = hound::WavSpec {
        channels: CHANNELS as u16,
        sample_rate: audio.sample_rate(),
        bits_per_sample,
        sample_format,
    };
    let encoder_err = |e: hound::Error| StemSplitError::Encoder(format!("{}: {e}", path.display()));

    let mut writer = hound::WavWriter::create(path, spec).map_err(encoder_err)?;
    for sample in audio.to_interleaved() {
        match sample_format {
            hound::SampleFormat::Int => {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(value).map_err(encoder_err)?;
            }
            hound::SampleFormat::Float => writer.write_sample(sample).map_err(encoder_err)?,
        }
    }
    writer.finalize().map_err(encoder_err)
}
