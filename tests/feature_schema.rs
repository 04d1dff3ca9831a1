//! Feature vector contract tests
//!
//! The extractor must always produce the same ordered key set, whatever the
//! input length or sample rate, and fill failed or meaningless families with
//! their zero defaults.

use beat_analysis::analysis::{extract_all, FeatureExtractor, FeatureFamily, FeatureValue};
use beat_analysis::audio::Waveform;
use beat_analysis::config::ExtractionConfig;
use beat_analysis::testing::signals::{click_track, mix, sine_wave, white_noise, write_wav};

const EXPECTED_FEATURES: usize = 366;

#[test]
fn key_set_is_stable_across_inputs() {
    let config = ExtractionConfig::default();
    let inputs = [
        Waveform::new(white_noise(22050, 0.3, 7), 22050).unwrap(),
        Waveform::new(sine_wave(330.0, 16000, 16000 * 3, 0.5), 16000).unwrap(),
        Waveform::new(
            mix(
                &sine_wave(220.0, 44100, 44100 * 2, 0.3),
                &click_track(100.0, 44100, 44100 * 2, 0.5),
            ),
            44100,
        )
        .unwrap(),
        Waveform::new(vec![0.1; 300], 22050).unwrap(),
    ];

    let reference = extract_all(&inputs[0], &config);
    assert_eq!(reference.len(), EXPECTED_FEATURES);
    for waveform in &inputs[1..] {
        let features = extract_all(waveform, &config);
        assert!(
            features.same_schema(&reference),
            "schema changed for {} samples at {} Hz",
            waveform.len(),
            waveform.sample_rate()
        );
        assert!(features.iter().all(|(_, v)| v.as_f64().is_finite()));
    }
}

#[test]
fn keys_follow_family_order() {
    let config = ExtractionConfig::default();
    let features = extract_all(&Waveform::new(white_noise(22050, 0.3, 8), 22050).unwrap(), &config);
    let names: Vec<&str> = features.names().collect();

    assert_eq!(&names[..3], &["duration", "sample_rate", "total_samples"]);
    assert_eq!(names.last(), Some(&"fourier_tempogram_std"));

    let mut offset = 0;
    for family in FeatureFamily::ALL {
        let defaults = family.defaults(&config);
        let family_names: Vec<&str> = defaults.names().collect();
        assert_eq!(
            &names[offset..offset + family_names.len()],
            family_names.as_slice(),
            "{} keys out of place",
            family.name()
        );
        offset += family_names.len();
    }
    assert_eq!(offset, EXPECTED_FEATURES);
}

#[test]
fn silence_yields_zero_defaults_for_dynamic_families() {
    let config = ExtractionConfig::default();
    let silence = Waveform::new(vec![0.0; 22050 * 2], 22050).unwrap();
    let features = extract_all(&silence, &config);

    for family in [
        FeatureFamily::Rhythm,
        FeatureFamily::HarmonicPercussive,
        FeatureFamily::Tempogram,
    ] {
        for (name, default) in family.defaults(&config).iter() {
            let value = features.get(name).expect("key present");
            assert!(
                (value.as_f64() - default.as_f64()).abs() < 1e-9,
                "{} on silence: {:?}",
                name,
                value
            );
        }
    }
    assert_eq!(features.get("tempo"), Some(FeatureValue::Float(0.0)));
    assert_eq!(features.get("beat_count"), Some(FeatureValue::Int(0)));
}

#[test]
fn integer_features_stay_integers() {
    let config = ExtractionConfig::default();
    let features = extract_all(
        &Waveform::new(click_track(120.0, 22050, 22050 * 4, 0.8), 22050).unwrap(),
        &config,
    );
    assert_eq!(features.get("sample_rate"), Some(FeatureValue::Int(22050)));
    assert_eq!(features.get("total_samples"), Some(FeatureValue::Int(22050 * 4)));
    assert!(matches!(features.get("beat_count"), Some(FeatureValue::Int(n)) if n > 0));
    assert!(matches!(features.get("onset_count"), Some(FeatureValue::Int(n)) if n > 0));
}

#[test]
fn file_report_serialises_metadata_around_features() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    write_wav(&path, &click_track(120.0, 44100, 44100, 0.7), 44100).unwrap();

    let report = FeatureExtractor::with_config(ExtractionConfig::default())
        .extract_file(&path)
        .unwrap();
    assert_eq!(report.extraction_params.sample_rate, 22050);
    assert_eq!(report.total_features_extracted(), EXPECTED_FEATURES);
    assert_eq!(report.features.get("total_samples"), Some(FeatureValue::Int(22050)));

    let (json_path, csv_path) = report.save(dir.path()).unwrap();
    assert!(json_path.ends_with("extracted_features_loop.json"));
    assert!(csv_path.ends_with("extracted_features_loop.csv"));

    let text = std::fs::read_to_string(&json_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["extraction_params"]["duration"], 30.0);
    assert_eq!(json["extraction_params"]["offset"], 0.0);
    assert_eq!(json["total_features_extracted"], EXPECTED_FEATURES);
    let first_key = text.find("\"file_path\"").unwrap();
    let last_key = text.find("\"total_features_extracted\"").unwrap();
    let duration_key = text.find("\"duration\"").unwrap();
    assert!(first_key < duration_key && duration_key < last_key);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].split(',').count(), EXPECTED_FEATURES);
    assert_eq!(lines[1].split(',').count(), EXPECTED_FEATURES);
    assert!(lines[0].starts_with("duration,sample_rate,total_samples"));
}
