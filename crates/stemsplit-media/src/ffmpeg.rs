//! FFmpeg subprocess for compressed formats.
//!
//! Decoding pipes raw little-endian float samples out of FFmpeg; encoding
//! pipes them in. `FfmpegCommand` picks the sidecar binary when one was
//! downloaded next to the executable, else the one on `PATH`.

use crate::format::OutputFormat;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::io::{Read, Write};
use std::path::Path;
use stemsplit_core::{Result, StemSplitError, StereoBuffer, CHANNELS};
use tracing::{debug, info};

/// Arguments that decode `input` to interleaved stereo `f32le` on stdout.
pub fn decode_args(input: &Path, sample_rate: u32) -> Vec<String> {
    vec![
        "-nostdin".into(),
        "-v".into(),
        "error".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vn".into(),
        "-f".into(),
        "f32le".into(),
        "-acodec".into(),
        "pcm_f32le".into(),
        "-ac".into(),
        CHANNELS.to_string(),
        "-ar".into(),
        sample_rate.to_string(),
        "pipe:1".into(),
    ]
}

/// Arguments that encode interleaved stereo `f32le` from stdin into `output`.
pub fn encode_args(output: &Path, format: OutputFormat, sample_rate: u32) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-ac".into(),
        CHANNELS.to_string(),
        "-i".into(),
        "pipe:0".into(),
    ];
    args.extend(format.ffmpeg_codec_args().iter().map(|a| a.to_string()));
    args.push(output.to_string_lossy().into_owned());
    args
}

fn spawn(args: &[String]) -> std::io::Result<FfmpegChild> {
    FfmpegCommand::new().args(args).spawn()
}

/// Everything FFmpeg printed on stderr, trimmed.
fn stderr_text(child: &mut FfmpegChild) -> String {
    let mut text = String::new();
    if let Some(mut stderr) = child.take_stderr() {
        // Diagnostics only: a failed read leaves the message empty.
        let _ = stderr.read_to_string(&mut text);
    }
    text.trim().to_string()
}

/// Decode any FFmpeg-readable file, resampled to `sample_rate` stereo.
pub fn decode(input: &Path, sample_rate: u32) -> Result<StereoBuffer> {
    debug!(path = %input.display(), "decoding with ffmpeg");
    let mut child = spawn(&decode_args(input, sample_rate))
        .map_err(|e| StemSplitError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;
    // Nothing is fed on stdin; closing it keeps FFmpeg from waiting on it.
    drop(child.take_stdin());

    let mut stdout = child
        .take_stdout()
        .ok_or_else(|| StemSplitError::Decoder("Failed to open ffmpeg stdout".into()))?;
    let mut bytes = Vec::new();
    stdout
        .read_to_end(&mut bytes)
        .map_err(|e| StemSplitError::Decoder(format!("Failed to read samples: {e}")))?;
    let message = stderr_text(&mut child);

    let status = child
        .wait()
        .map_err(|e| StemSplitError::Decoder(format!("Failed to wait for ffmpeg: {e}")))?;
    if !status.success() {
        return Err(StemSplitError::Decoder(format!(
            "{}: ffmpeg exited with status {status}: {message}",
            input.display()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    if samples.is_empty() {
        return Err(StemSplitError::Decoder(format!(
            "{}: no audio stream",
            input.display()
        )));
    }
    StereoBuffer::from_interleaved(&samples, CHANNELS as u16, sample_rate)
}

/// Encode `audio` into `output` as FLAC or MP3.
pub fn encode(output: &Path, audio: &StereoBuffer, format: OutputFormat) -> Result<()> {
    let mut child = spawn(&encode_args(output, format, audio.sample_rate()))
        .map_err(|e| StemSplitError::Encoder(format!("Failed to spawn ffmpeg: {e}")))?;

    let mut stdin = child
        .take_stdin()
        .ok_or_else(|| StemSplitError::Encoder("Failed to open ffmpeg stdin".into()))?;

    let bytes: Vec<u8> = audio
        .to_interleaved()
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    if let Err(e) = stdin.write_all(&bytes) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(StemSplitError::Encoder(format!("Failed to write samples: {e}")));
    }
    // Close stdin to signal end-of-stream
    drop(stdin);

    let message = stderr_text(&mut child);
    let status = child
        .wait()
        .map_err(|e| StemSplitError::Encoder(format!("Failed to wait for ffmpeg: {e}")))?;
    if !status.success() {
        return Err(StemSplitError::Encoder(format!(
            "ffmpeg exited with status {status}: {message}"
        )));
    }
    info!(path = %output.display(), %format, "encoded");
    Ok(())
}
