//! Chunk engine reconstruction with an identity network.

use crate::mocks::{max_error, sine, stereo};
use stemsplit_ai::backend::IdentityModel;
use stemsplit_ai::demix::Demixer;
use stemsplit_ai::ModelCatalog;
use stemsplit_core::SAMPLE_RATE;

#[test]
fn identity_reconstructs_signal_shorter_than_a_chunk() {
    let catalog = ModelCatalog::builtin().unwrap();
    let model = catalog.get("Kim Vocal 2").unwrap();
    let mix = stereo(sine(330.0, 0.7, 10_000));
    assert!(mix.len() < model.chunk_size());

    for shifts in [1, 2, 12] {
        let out = Demixer::default()
            .demix(&IdentityModel, model, &mix, shifts)
            .unwrap();
        assert_eq!(out.len(), mix.len());
        assert!(max_error(&out, &mix, 0..mix.len()) < 1e-5);
    }
}

#[test]
fn identity_reconstructs_signal_longer_than_a_chunk() {
    let catalog = ModelCatalog::builtin().unwrap();
    let model = catalog.get("Instrum HQ 3").unwrap();
    let len = SAMPLE_RATE as usize * 7 + 1234;
    assert!(len > model.chunk_size());
    let mix = stereo(sine(220.0, 0.5, len));

    let out = Demixer::new(200_000)
        .demix(&IdentityModel, model, &mix, 12)
        .unwrap();
    assert_eq!(out.len(), len);
    assert!(max_error(&out, &mix, 0..len) < 1e-5);
}

#[test]
fn empty_input_stays_empty() {
    let catalog = ModelCatalog::builtin().unwrap();
    let model = catalog.get("Voc FT").unwrap();
    let out = Demixer::default()
        .demix(&IdentityModel, model, &stereo(Vec::new()), 3)
        .unwrap();
    assert!(out.is_empty());
}
