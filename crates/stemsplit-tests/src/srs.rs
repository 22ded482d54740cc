//! Bandwidth extension with an identity network.

use crate::mocks::{max_error, sine, small_descriptor, stereo};
use stemsplit_ai::backend::IdentityModel;
use stemsplit_ai::demix::Demixer;
use stemsplit_ai::extract::{Extractor, Purpose, ShiftCounts};
use stemsplit_ai::StemKind;

fn two_tones(len: usize) -> Vec<f32> {
    sine(1_000.0, 0.3, len)
        .into_iter()
        .zip(sine(5_000.0, 0.3, len))
        .map(|(a, b)| a + b)
        .collect()
}

#[test]
fn identity_survives_bandwidth_extension() {
    let descriptor = small_descriptor("Wide", StemKind::Vocals, 15_000);
    assert!(descriptor.uses_srs(44_100));

    let len = 44_100;
    let mix = stereo(two_tones(len));
    let extractor = Extractor::new(Demixer::default(), ShiftCounts::default());
    let out = extractor
        .extract(Purpose::Vocals, &IdentityModel, &descriptor, &mix)
        .unwrap();

    assert_eq!(out.len(), len);
    assert!(max_error(&out, &mix, 4_000..len - 4_000) < 0.02);
}

#[test]
fn single_pass_matches_double_pass_for_linear_model() {
    let descriptor = small_descriptor("Wide", StemKind::Vocals, 17_400);
    let mix = stereo(two_tones(30_000));
    let double = Extractor::new(Demixer::default(), ShiftCounts::default());
    let single = double.clone().with_single_pass(true);

    let a = double
        .extract(Purpose::Filter, &IdentityModel, &descriptor, &mix)
        .unwrap();
    let b = single
        .extract(Purpose::Filter, &IdentityModel, &descriptor, &mix)
        .unwrap();
    assert!(max_error(&a, &b, 0..mix.len()) < 1e-4);
}
