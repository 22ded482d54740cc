//! Output formats for stems and checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stemsplit_core::StemSplitError;

/// Persistence format. Only affects how a waveform is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// 16-bit integer WAV.
    #[serde(rename = "PCM_16")]
    Pcm16,
    /// 32-bit float WAV.
    #[serde(rename = "FLOAT")]
    Float,
    /// 24-bit FLAC.
    #[default]
    #[serde(rename = "FLAC")]
    Flac,
    /// 320 kbps MP3.
    #[serde(rename = "MP3")]
    Mp3,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Pcm16, Self::Float, Self::Flac, Self::Mp3];

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pcm16 | Self::Float => "wav",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
        }
    }

    /// Whether the file is written directly rather than through FFmpeg.
    pub fn is_wav(self) -> bool {
        matches!(self, Self::Pcm16 | Self::Float)
    }

    /// FFmpeg encoder arguments for the compressed formats.
    pub fn ffmpeg_codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Flac => &["-c:a", "flac", "-sample_fmt", "s32", "-bits_per_raw_sample", "24"],
            Self::Mp3 => &["-c:a", "libmp3lame", "-b:a", "320k"],
            Self::Pcm16 => &["-c:a", "pcm_s16le"],
            Self::Float => &["-c:a", "pcm_f32le"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pcm16 => "PCM_16",
            Self::Float => "FLOAT",
            Self::Flac => "FLAC",
            Self::Mp3 => "MP3",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = StemSplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "PCM_16" | "PCM16" | "WAV" => Ok(Self::Pcm16),
            "FLOAT" | "F32" => Ok(Self::Float),
            "FLAC" => Ok(Self::Flac),
            "MP3" => Ok(Self::Mp3),
            other => Err(StemSplitError::UnsupportedFormat(other.to_string())),
        }
    }
}
