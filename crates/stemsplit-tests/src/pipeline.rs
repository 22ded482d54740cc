//! End-to-end separation of a two-tone song with band-mask networks.

use crate::mocks::{correlation, sine, small_descriptor, stereo, BandMask};
use std::path::Path;
use std::sync::Arc;
use stemsplit_ai::catalog::ModelDescriptor;
use stemsplit_ai::{
    AiError, AiResult, ModelCatalog, ModelLoader, SeparationConfig, SeparationModel, Separator,
    StemKind,
};
use stemsplit_core::SAMPLE_RATE;
use stemsplit_media::{read_audio, write_audio, OutputFormat};

const VOCAL_HZ: f32 = 440.0;
const MUSIC_HZ: f32 = 220.0;
const SPLIT_HZ: f32 = 330.0;

/// Hands out a band mask chosen by the model's stem.
struct MaskLoader;

impl ModelLoader for MaskLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>> {
        match descriptor.stem {
            StemKind::Vocals => Ok(Arc::new(BandMask { low_hz: SPLIT_HZ, high_hz: f32::INFINITY })),
            StemKind::Instrumental => Ok(Arc::new(BandMask { low_hz: 0.0, high_hz: SPLIT_HZ })),
        }
    }
}

fn catalog() -> ModelCatalog {
    ModelCatalog::from_descriptors(vec![
        small_descriptor("Mask Vocals", StemKind::Vocals, 0),
        small_descriptor("Mask Music", StemKind::Instrumental, 0),
    ])
    .unwrap()
}

fn config(output: &Path) -> SeparationConfig {
    let mut config = SeparationConfig::default();
    config.paths.output = output.to_path_buf();
    config.process.output_format = OutputFormat::Float;
    config.process.instrumental = vec!["Mask Music".into()];
    config.process.vocals = vec!["Mask Vocals".into()];
    config.process.filters = vec!["Mask Music".into()];
    config.options.shifts_vocals = 2;
    config.options.shifts_instrumental = 2;
    config.options.shifts_filter = 1;
    config
}

fn write_song(dir: &Path, name: &str) -> std::path::PathBuf {
    let len = SAMPLE_RATE as usize * 4;
    let mix: Vec<f32> = sine(VOCAL_HZ, 0.4, len)
        .into_iter()
        .zip(sine(MUSIC_HZ, 0.4, len))
        .map(|(a, b)| a + b)
        .collect();
    let path = dir.join(name);
    write_audio(&path, &stereo(mix), OutputFormat::Float).unwrap();
    path
}

fn interior(samples: &[f32]) -> &[f32] {
    let edge = SAMPLE_RATE as usize / 2;
    &samples[edge..samples.len() - edge]
}

#[test]
fn two_tone_song_splits_into_stems() {
    let dir = tempfile::tempdir().unwrap();
    let song = write_song(dir.path(), "Two Tones.wav");
    let output = dir.path().join("Results");

    let separator = Separator::new(config(&output), &catalog(), Box::new(MaskLoader)).unwrap();
    separator.preload().unwrap();
    let stems = separator.separate_file(&song).unwrap();

    let len = SAMPLE_RATE as usize * 4;
    assert_eq!(stems.vocals.len(), len);
    assert_eq!(stems.music.len(), len);

    let vocal_ref = sine(VOCAL_HZ, 0.4, len);
    let music_ref = sine(MUSIC_HZ, 0.4, len);
    let vocals = stems.vocals.channel_to_vec(0);
    let music = stems.music.channel_to_vec(0);
    assert!(correlation(interior(&vocals), interior(&vocal_ref)) > 0.9);
    assert!(correlation(interior(&music), interior(&music_ref)) > 0.9);

    // Only the mandatory stages land on disk outside debug mode.
    let song_dir = output.join("Two Tones");
    let vocal_file = read_audio(&song_dir.join("Vocal FINAL.wav")).unwrap();
    let music_file = read_audio(&song_dir.join("Music FINAL.wav")).unwrap();
    assert_eq!(vocal_file.len(), len);
    assert!(correlation(interior(&music_file.channel_to_vec(1)), interior(&music_ref)) > 0.9);
    assert!(song_dir.join("Music extract - (Mask Music).wav").is_file());
    assert!(!song_dir.join("Ensemble Vocal.wav").exists());
}

#[test]
fn debug_run_writes_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let song = write_song(dir.path(), "Debug.wav");
    let output = dir.path().join("Results");
    let mut config = config(&output);
    config.bonus.debug = true;
    config.bonus.single_pass = true;

    let separator = Separator::new(config, &catalog(), Box::new(MaskLoader)).unwrap();
    let summary = separator.run(&[song]).unwrap();
    assert_eq!(summary.processed, 1);

    let song_dir = output.join("Debug");
    for name in [
        "1 - Music extract - (Mask Music).wav",
        "2 - Vocal extract - (Mask Vocals).wav",
        "3 - Ensemble Vocal.wav",
        "4 - Bleedings in Vocal - (Mask Music).wav",
        "5 - Vocal FINAL.wav",
        "6 - Music FINAL.wav",
    ] {
        assert!(song_dir.join(name).is_file(), "missing {name}");
    }
}

#[test]
fn loader_failure_aborts_the_run() {
    struct Broken;
    impl ModelLoader for Broken {
        fn load(&self, descriptor: &ModelDescriptor) -> AiResult<Arc<dyn SeparationModel>> {
            Err(AiError::ModelNotFound {
                model_id: descriptor.name.clone(),
                path: descriptor.repo_file.clone().into(),
            })
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let song = write_song(dir.path(), "Broken.wav");
    let separator =
        Separator::new(config(&dir.path().join("Results")), &catalog(), Box::new(Broken)).unwrap();
    assert!(separator.run(&[song]).is_err());
}
