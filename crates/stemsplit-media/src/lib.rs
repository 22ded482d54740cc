//! StemSplit Media - Audio I/O for the separator
//!
//! This crate handles:
//! - Decoding input mixtures (WAV natively, everything else through FFmpeg)
//! - Writing stems and checkpoints in the configured output format

pub mod ffmpeg;
pub mod format;
pub mod wav;

pub use format::OutputFormat;

use std::path::Path;
use stemsplit_core::{Result, StemSplitError, StereoBuffer, SAMPLE_RATE};
use tracing::debug;

/// Extensions accepted as input mixtures.
pub const INPUT_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "m4a", "aac", "wma", "aiff", "aif"];

/// Whether `path` looks like an audio file we can decode.
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode `path` to a stereo buffer at the working sample rate.
///
/// WAV files already at that rate are read directly; anything else goes
/// through FFmpeg, which also resamples.
pub fn read_audio(path: &Path) -> Result<StereoBuffer> {
    if !path.is_file() {
        return Err(StemSplitError::NotFound(path.display().to_string()));
    }
    let is_wav = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        if let Ok(audio) = wav::read_wav(path) {
            if audio.sample_rate() == SAMPLE_RATE {
                return Ok(audio);
            }
            debug!(path = %path.display(), rate = audio.sample_rate(), "resampling through ffmpeg");
        }
    }
    ffmpeg::decode(path, SAMPLE_RATE)
}

/// Write `audio` to `path` in `format`. The caller picks the extension.
pub fn write_audio(path: &Path, audio: &StereoBuffer, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if format.is_wav() {
        wav::write_wav(path, audio, format)
    } else {
        ffmpeg::encode(path, audio, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_inputs() {
        assert!(is_supported_input(Path::new("a/song.FLAC")));
        assert!(is_supported_input(Path::new("song.mp3")));
        assert!(!is_supported_input(Path::new("notes.txt")));
        assert!(!is_supported_input(Path::new("no_extension")));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_audio(Path::new("/nope/missing.wav")).unwrap_err();
        assert!(matches!(err, StemSplitError::NotFound(_)));
    }

    #[test]
    fn test_write_then_read_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song").join("stem.wav");
        let audio = StereoBuffer::from_channels(vec![0.25; 64], vec![-0.25; 64], SAMPLE_RATE).unwrap();
        write_audio(&path, &audio, OutputFormat::Float).unwrap();
        assert_eq!(read_audio(&path).unwrap(), audio);
    }
}
