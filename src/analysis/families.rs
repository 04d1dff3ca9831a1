// Feature families - the nine named groups that make up a feature vector
//
// Each family is a pure function of the waveform and the extraction config.
// It computes a small stats struct and lays it out as named features. A
// family's zero defaults use the same layout code on `Default` stats, so the
// key set of a failed family always matches a successful one.
//
// Family order and key names:
// - basic: duration, sample_rate, total_samples, rms_*, zcr_*
// - spectral: spectral_{centroid,bandwidth,rolloff}_*, spectral_contrast_{1..7}_*,
//   spectral_flatness_*, poly_feature_{0,1}_*
// - mfcc: mfcc_{i}_*, mfcc_delta_{i}_*, mfcc_delta2_{i}_*
// - chroma: chroma_{stft,cqt,cens}_{1..12}_*
// - tonnetz: tonnetz_{1..6}_*
// - rhythm: tempo, beat_*, onset_*
// - harmonic_percussive: harmonic_*, percussive_*
// - mel: mel_spectrogram_*, mel_band_{1..20}
// - tempogram: tempogram_*, fourier_tempogram_*

use crate::audio::Waveform;
use crate::config::ExtractionConfig;
use crate::error::{log_feature_error, FeatureError};

use super::beat::beat_track_envelope;
use super::features::chroma::{chroma_stft, CqtChroma, N_CHROMA};
use super::features::hpss::hpss;
use super::features::mel::{delta, mfcc, MelFilterbank};
use super::features::spectral::{SpectralFeatures, CONTRAST_BANDS};
use super::features::stft::{Spectrogram, Stft};
use super::features::tempogram::{
    autocorrelation_tempogram, fourier_tempogram, TEMPOGRAM_WIN_LENGTH,
};
use super::features::temporal::TemporalFeatures;
use super::features::tonnetz::{tonnetz, N_TONNETZ};
use super::features::{FeatureValue, FeatureVector};
use super::onset::OnsetDetector;
use super::stats::{column_summary, diff, matrix_summary, Summary};

/// Mel bands reported individually
const MEL_BANDS_REPORTED: usize = 20;

/// A named group of features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFamily {
    Basic,
    Spectral,
    Mfcc,
    Chroma,
    Tonnetz,
    Rhythm,
    HarmonicPercussive,
    Mel,
    Tempogram,
}

impl FeatureFamily {
    /// All families in extraction order
    pub const ALL: [FeatureFamily; 9] = [
        FeatureFamily::Basic,
        FeatureFamily::Spectral,
        FeatureFamily::Mfcc,
        FeatureFamily::Chroma,
        FeatureFamily::Tonnetz,
        FeatureFamily::Rhythm,
        FeatureFamily::HarmonicPercussive,
        FeatureFamily::Mel,
        FeatureFamily::Tempogram,
    ];

    /// Identifier used in logs
    pub fn name(self) -> &'static str {
        match self {
            FeatureFamily::Basic => "basic",
            FeatureFamily::Spectral => "spectral",
            FeatureFamily::Mfcc => "mfcc",
            FeatureFamily::Chroma => "chroma",
            FeatureFamily::Tonnetz => "tonnetz",
            FeatureFamily::Rhythm => "rhythm",
            FeatureFamily::HarmonicPercussive => "harmonic_percussive",
            FeatureFamily::Mel => "mel",
            FeatureFamily::Tempogram => "tempogram",
        }
    }

    /// Human-readable category name
    pub fn label(self) -> &'static str {
        match self {
            FeatureFamily::Basic => "Basic Properties",
            FeatureFamily::Spectral => "Spectral Features",
            FeatureFamily::Mfcc => "MFCC Features",
            FeatureFamily::Chroma => "Chroma Features",
            FeatureFamily::Tonnetz => "Tonnetz Features",
            FeatureFamily::Rhythm => "Rhythm Features",
            FeatureFamily::HarmonicPercussive => "Harmonic/Percussive",
            FeatureFamily::Mel => "Mel Features",
            FeatureFamily::Tempogram => "Tempogram Features",
        }
    }

    /// Compute this family
    ///
    /// # Errors
    /// `InsufficientSamples` for an empty waveform, `Numerical` if any
    /// value is NaN or infinite
    pub fn extract(
        self,
        waveform: &Waveform,
        config: &ExtractionConfig,
    ) -> Result<FeatureVector, FeatureError> {
        if waveform.is_empty() {
            return Err(FeatureError::InsufficientSamples {
                required: 1,
                got: 0,
            });
        }
        let features = match self {
            FeatureFamily::Basic => basic(waveform, config).into_features(),
            FeatureFamily::Spectral => spectral(waveform, config).into_features(),
            FeatureFamily::Mfcc => mfcc_family(waveform, config).into_features(),
            FeatureFamily::Chroma => chroma(waveform, config).into_features(),
            FeatureFamily::Tonnetz => tonnetz_family(waveform, config).into_features(),
            FeatureFamily::Rhythm => rhythm(waveform, config),
            FeatureFamily::HarmonicPercussive => harmonic_percussive(waveform, config).into_features(),
            FeatureFamily::Mel => mel(waveform, config).into_features(),
            FeatureFamily::Tempogram => tempogram(waveform, config).into_features(),
        };
        ensure_finite(features)
    }

    /// Zero defaults with exactly the keys `extract` produces
    pub fn defaults(self, config: &ExtractionConfig) -> FeatureVector {
        match self {
            FeatureFamily::Basic => BasicStats::default().into_features(),
            FeatureFamily::Spectral => SpectralStats::default().into_features(),
            FeatureFamily::Mfcc => MfccStats::zeros(config.n_mfcc).into_features(),
            FeatureFamily::Chroma => ChromaStats::default().into_features(),
            FeatureFamily::Tonnetz => TonnetzStats::default().into_features(),
            FeatureFamily::Rhythm => {
                let mut features = BeatStats::default().into_features();
                features.extend(OnsetStats::default().into_features());
                features
            }
            FeatureFamily::HarmonicPercussive => HpssStats::default().into_features(),
            FeatureFamily::Mel => MelStats::zeros(reported_mel_bands(config)).into_features(),
            FeatureFamily::Tempogram => TempogramStats::default().into_features(),
        }
    }
}

/// Compute a family, or its zero defaults if it fails
///
/// Failures are logged at warn level and never propagate.
pub fn extract_or_default(
    family: FeatureFamily,
    waveform: &Waveform,
    config: &ExtractionConfig,
) -> FeatureVector {
    let result = family
        .extract(waveform, config)
        .map_err(|err| FeatureError::family_failed(family.name(), &err));
    or_default(family.name(), result, || family.defaults(config))
}

/// All nine families merged in order
pub fn extract_all(waveform: &Waveform, config: &ExtractionConfig) -> FeatureVector {
    let mut features = FeatureVector::new();
    for family in FeatureFamily::ALL {
        log::debug!("[Extractor] Extracting {} features", family.name());
        features.extend(extract_or_default(family, waveform, config));
    }
    features
}

fn or_default(
    context: &str,
    result: Result<FeatureVector, FeatureError>,
    defaults: impl FnOnce() -> FeatureVector,
) -> FeatureVector {
    match result {
        Ok(features) => features,
        Err(err) => {
            log_feature_error(&err, context);
            defaults()
        }
    }
}

fn ensure_finite(features: FeatureVector) -> Result<FeatureVector, FeatureError> {
    for (name, value) in features.iter() {
        if let FeatureValue::Float(v) = value {
            if !v.is_finite() {
                return Err(FeatureError::Numerical {
                    feature: name.to_string(),
                    reason: format!("value {}", v),
                });
            }
        }
    }
    Ok(features)
}

fn reported_mel_bands(config: &ExtractionConfig) -> usize {
    MEL_BANDS_REPORTED.min(config.n_mels)
}

fn push_summary(features: &mut FeatureVector, prefix: &str, summary: &Summary) {
    features.insert(format!("{}_mean", prefix), summary.mean);
    features.insert(format!("{}_std", prefix), summary.std);
    features.insert(format!("{}_max", prefix), summary.max);
    features.insert(format!("{}_min", prefix), summary.min);
}

fn push_mean_std(features: &mut FeatureVector, prefix: &str, summary: &Summary) {
    features.insert(format!("{}_mean", prefix), summary.mean);
    features.insert(format!("{}_std", prefix), summary.std);
}

fn row_summaries<const N: usize>(frames: &Spectrogram) -> [Summary; N] {
    std::array::from_fn(|row| column_summary(frames, row))
}

// ---------------------------------------------------------------------------
// basic

#[derive(Debug, Default)]
struct BasicStats {
    duration: f64,
    sample_rate: i64,
    total_samples: i64,
    rms: Summary,
    zcr: Summary,
}

impl BasicStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert("duration", self.duration);
        features.insert("sample_rate", FeatureValue::Int(self.sample_rate));
        features.insert("total_samples", FeatureValue::Int(self.total_samples));
        push_summary(&mut features, "rms", &self.rms);
        push_summary(&mut features, "zcr", &self.zcr);
        features
    }
}

fn basic(waveform: &Waveform, config: &ExtractionConfig) -> BasicStats {
    let temporal = TemporalFeatures::new(config.n_fft, config.hop_length);
    BasicStats {
        duration: waveform.duration_secs(),
        sample_rate: waveform.sample_rate() as i64,
        total_samples: waveform.len() as i64,
        rms: Summary::of(temporal.compute_rms(waveform.samples())),
        zcr: Summary::of(temporal.compute_zcr(waveform.samples())),
    }
}

// ---------------------------------------------------------------------------
// spectral

#[derive(Debug, Default)]
struct SpectralStats {
    centroid: Summary,
    bandwidth: Summary,
    rolloff: Summary,
    contrast: [Summary; CONTRAST_BANDS + 1],
    flatness: Summary,
    poly: [Summary; 2],
}

impl SpectralStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        push_summary(&mut features, "spectral_centroid", &self.centroid);
        push_summary(&mut features, "spectral_bandwidth", &self.bandwidth);
        push_summary(&mut features, "spectral_rolloff", &self.rolloff);
        for (i, band) in self.contrast.iter().enumerate() {
            push_mean_std(&mut features, &format!("spectral_contrast_{}", i + 1), band);
        }
        push_summary(&mut features, "spectral_flatness", &self.flatness);
        for (i, coeff) in self.poly.iter().enumerate() {
            push_mean_std(&mut features, &format!("poly_feature_{}", i), coeff);
        }
        features
    }
}

fn spectral(waveform: &Waveform, config: &ExtractionConfig) -> SpectralStats {
    let magnitude = Stft::new(config.n_fft, config.hop_length).magnitude(waveform.samples());
    let spectral = SpectralFeatures::new(waveform.sample_rate(), config.n_fft);

    let mut centroids = Vec::with_capacity(magnitude.len());
    let mut bandwidths = Vec::with_capacity(magnitude.len());
    let mut rolloffs = Vec::with_capacity(magnitude.len());
    let mut flatness = Vec::with_capacity(magnitude.len());
    let mut contrast: Spectrogram = Vec::with_capacity(magnitude.len());
    let mut poly: Spectrogram = Vec::with_capacity(magnitude.len());

    for frame in &magnitude {
        let centroid = spectral.compute_centroid(frame);
        centroids.push(centroid);
        bandwidths.push(spectral.compute_bandwidth(frame, centroid));
        rolloffs.push(spectral.compute_rolloff(frame));
        flatness.push(spectral.compute_flatness(frame));
        contrast.push(spectral.compute_contrast(frame).to_vec());
        let (slope, intercept) = spectral.compute_poly(frame);
        poly.push(vec![slope, intercept]);
    }

    SpectralStats {
        centroid: Summary::of(centroids),
        bandwidth: Summary::of(bandwidths),
        rolloff: Summary::of(rolloffs),
        contrast: row_summaries(&contrast),
        flatness: Summary::of(flatness),
        poly: row_summaries(&poly),
    }
}

// ---------------------------------------------------------------------------
// mfcc

#[derive(Debug)]
struct MfccStats {
    coefficients: Vec<Summary>,
    delta: Vec<Summary>,
    delta2: Vec<Summary>,
}

impl MfccStats {
    fn zeros(n_mfcc: usize) -> Self {
        Self {
            coefficients: vec![Summary::default(); n_mfcc],
            delta: vec![Summary::default(); n_mfcc],
            delta2: vec![Summary::default(); n_mfcc],
        }
    }

    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        for (i, coeff) in self.coefficients.iter().enumerate() {
            let prefix = format!("mfcc_{}", i + 1);
            push_summary(&mut features, &prefix, coeff);
            features.insert(format!("{}_range", prefix), coeff.range());
        }
        for (i, d) in self.delta.iter().enumerate() {
            push_mean_std(&mut features, &format!("mfcc_delta_{}", i + 1), d);
        }
        for (i, d) in self.delta2.iter().enumerate() {
            push_mean_std(&mut features, &format!("mfcc_delta2_{}", i + 1), d);
        }
        features
    }
}

fn mfcc_family(waveform: &Waveform, config: &ExtractionConfig) -> MfccStats {
    let power = Stft::new(config.n_fft, config.hop_length).power(waveform.samples());
    let mel = MelFilterbank::new(waveform.sample_rate(), config.n_fft, config.n_mels)
        .melspectrogram(&power);
    let coefficients = mfcc(&mel, config.n_mfcc);
    let delta1 = delta(&coefficients, 1);
    let delta2 = delta(&coefficients, 2);

    let per_row = |m: &Spectrogram| -> Vec<Summary> {
        (0..config.n_mfcc).map(|i| column_summary(m, i)).collect()
    };
    MfccStats {
        coefficients: per_row(&coefficients),
        delta: per_row(&delta1),
        delta2: per_row(&delta2),
    }
}

// ---------------------------------------------------------------------------
// chroma

#[derive(Debug, Default)]
struct ChromaStats {
    stft: [Summary; N_CHROMA],
    cqt: [Summary; N_CHROMA],
    cens: [Summary; N_CHROMA],
}

impl ChromaStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        for (kind, rows) in [("stft", &self.stft), ("cqt", &self.cqt), ("cens", &self.cens)] {
            for (i, row) in rows.iter().enumerate() {
                push_mean_std(&mut features, &format!("chroma_{}_{}", kind, i + 1), row);
            }
        }
        features
    }
}

fn chroma(waveform: &Waveform, config: &ExtractionConfig) -> ChromaStats {
    let power = Stft::new(config.n_fft, config.hop_length).power(waveform.samples());
    let stft_chroma = chroma_stft(&power, waveform.sample_rate(), config.n_fft);
    let cqt = CqtChroma::new(waveform.sample_rate(), config.hop_length);
    ChromaStats {
        stft: row_summaries(&stft_chroma),
        cqt: row_summaries(&cqt.chroma(waveform.samples())),
        cens: row_summaries(&cqt.cens(waveform.samples())),
    }
}

// ---------------------------------------------------------------------------
// tonnetz

#[derive(Debug, Default)]
struct TonnetzStats {
    dimensions: [Summary; N_TONNETZ],
}

impl TonnetzStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        for (i, dim) in self.dimensions.iter().enumerate() {
            push_summary(&mut features, &format!("tonnetz_{}", i + 1), dim);
        }
        features
    }
}

fn tonnetz_family(waveform: &Waveform, config: &ExtractionConfig) -> TonnetzStats {
    let chroma = CqtChroma::new(waveform.sample_rate(), config.hop_length).chroma(waveform.samples());
    TonnetzStats {
        dimensions: row_summaries(&tonnetz(&chroma)),
    }
}

// ---------------------------------------------------------------------------
// rhythm

#[derive(Debug, Default)]
struct BeatStats {
    tempo: f64,
    beat_count: i64,
    intervals: Summary,
    regularity: f64,
}

impl BeatStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert("tempo", self.tempo);
        features.insert("beat_count", FeatureValue::Int(self.beat_count));
        push_mean_std(&mut features, "beat_intervals", &self.intervals);
        features.insert("beat_regularity", self.regularity);
        features
    }
}

#[derive(Debug, Default)]
struct OnsetStats {
    count: i64,
    rate: f64,
    intervals: Summary,
}

impl OnsetStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert("onset_count", FeatureValue::Int(self.count));
        features.insert("onset_rate", self.rate);
        push_mean_std(&mut features, "onset_intervals", &self.intervals);
        features
    }
}

/// Beat and onset parts fall back independently
fn rhythm(waveform: &Waveform, config: &ExtractionConfig) -> FeatureVector {
    let detector = OnsetDetector::new(waveform.sample_rate(), config.n_fft, config.hop_length);
    let envelope = detector.strength(waveform.samples());

    let beats = beat_stats(&envelope, &detector);
    let mut features = or_default("rhythm.beats", beats, || {
        BeatStats::default().into_features()
    });

    let onsets = onset_stats(&envelope, &detector, waveform.duration_secs());
    features.extend(or_default("rhythm.onsets", onsets, || {
        OnsetStats::default().into_features()
    }));
    features
}

fn beat_stats(envelope: &[f32], detector: &OnsetDetector) -> Result<FeatureVector, FeatureError> {
    let track = beat_track_envelope(envelope, detector.sample_rate(), detector.hop());
    let mut stats = BeatStats {
        tempo: track.tempo,
        beat_count: track.beats.len() as i64,
        ..BeatStats::default()
    };
    if track.beats.len() > 1 {
        let intervals = diff(&track.beat_times(detector.sample_rate(), detector.hop()));
        stats.intervals = Summary::of(intervals);
        stats.regularity = 1.0 / (1.0 + stats.intervals.std);
    }
    ensure_finite(stats.into_features())
}

fn onset_stats(
    envelope: &[f32],
    detector: &OnsetDetector,
    duration: f64,
) -> Result<FeatureVector, FeatureError> {
    if duration <= 0.0 {
        return Err(FeatureError::InsufficientSamples {
            required: 1,
            got: 0,
        });
    }
    let onsets = detector.detect(envelope);
    let times = detector.frames_to_time(&onsets);
    let mut stats = OnsetStats {
        count: onsets.len() as i64,
        rate: onsets.len() as f64 / duration,
        ..OnsetStats::default()
    };
    if times.len() > 1 {
        stats.intervals = Summary::of(diff(&times));
    }
    ensure_finite(stats.into_features())
}

// ---------------------------------------------------------------------------
// harmonic / percussive

#[derive(Debug, Default)]
struct HpssStats {
    harmonic_energy: f64,
    harmonic_rms: f64,
    percussive_energy: f64,
    percussive_rms: f64,
    harmonic_ratio: f64,
    percussive_ratio: f64,
}

impl HpssStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert("harmonic_energy", self.harmonic_energy);
        features.insert("harmonic_rms", self.harmonic_rms);
        features.insert("percussive_energy", self.percussive_energy);
        features.insert("percussive_rms", self.percussive_rms);
        features.insert("harmonic_ratio", self.harmonic_ratio);
        features.insert("percussive_ratio", self.percussive_ratio);
        features
    }
}

fn harmonic_percussive(waveform: &Waveform, config: &ExtractionConfig) -> HpssStats {
    let parts = hpss(waveform.samples(), &Stft::new(config.n_fft, config.hop_length));
    let energy = |x: &[f32]| x.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>();
    let rms = |e: f64, n: usize| if n == 0 { 0.0 } else { (e / n as f64).sqrt() };

    let harmonic_energy = energy(&parts.harmonic);
    let percussive_energy = energy(&parts.percussive);
    let total = harmonic_energy + percussive_energy;
    let (harmonic_ratio, percussive_ratio) = if total > 0.0 {
        (harmonic_energy / total, percussive_energy / total)
    } else {
        (0.0, 0.0)
    };

    HpssStats {
        harmonic_energy,
        harmonic_rms: rms(harmonic_energy, parts.harmonic.len()),
        percussive_energy,
        percussive_rms: rms(percussive_energy, parts.percussive.len()),
        harmonic_ratio,
        percussive_ratio,
    }
}

// ---------------------------------------------------------------------------
// mel

#[derive(Debug)]
struct MelStats {
    spectrogram: Summary,
    bands: Vec<f64>,
}

impl MelStats {
    fn zeros(n_bands: usize) -> Self {
        Self {
            spectrogram: Summary::default(),
            bands: vec![0.0; n_bands],
        }
    }

    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        push_summary(&mut features, "mel_spectrogram", &self.spectrogram);
        for (i, band) in self.bands.iter().enumerate() {
            features.insert(format!("mel_band_{}", i + 1), *band);
        }
        features
    }
}

fn mel(waveform: &Waveform, config: &ExtractionConfig) -> MelStats {
    let power = Stft::new(config.n_fft, config.hop_length).power(waveform.samples());
    let mel = MelFilterbank::new(waveform.sample_rate(), config.n_fft, config.n_mels)
        .melspectrogram(&power);
    MelStats {
        spectrogram: matrix_summary(&mel),
        bands: (0..reported_mel_bands(config))
            .map(|band| column_summary(&mel, band).mean)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// tempogram

#[derive(Debug, Default)]
struct TempogramStats {
    tempogram: Summary,
    fourier: Summary,
}

impl TempogramStats {
    fn into_features(self) -> FeatureVector {
        let mut features = FeatureVector::new();
        push_summary(&mut features, "tempogram", &self.tempogram);
        push_mean_std(&mut features, "fourier_tempogram", &self.fourier);
        features
    }
}

fn tempogram(waveform: &Waveform, config: &ExtractionConfig) -> TempogramStats {
    let detector = OnsetDetector::new(waveform.sample_rate(), config.n_fft, config.hop_length);
    let envelope = detector.strength(waveform.samples());
    TempogramStats {
        tempogram: matrix_summary(&autocorrelation_tempogram(&envelope, TEMPOGRAM_WIN_LENGTH)),
        fourier: matrix_summary(&fourier_tempogram(&envelope, TEMPOGRAM_WIN_LENGTH)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::{click_track, mix, sine_wave};

    fn short_config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    fn tone_with_clicks(sr: u32, secs: usize) -> Waveform {
        let n = sr as usize * secs;
        let samples = mix(&sine_wave(440.0, sr, n, 0.4), &click_track(120.0, sr, n, 0.6));
        Waveform::new(samples, sr).unwrap()
    }

    #[test]
    fn test_family_key_counts() {
        let config = short_config();
        let counts: Vec<(&str, usize)> = FeatureFamily::ALL
            .iter()
            .map(|f| (f.name(), f.defaults(&config).len()))
            .collect();
        println!("{:?}", counts);
        assert_eq!(FeatureFamily::Basic.defaults(&config).len(), 11);
        assert_eq!(FeatureFamily::Spectral.defaults(&config).len(), 34);
        assert_eq!(FeatureFamily::Mfcc.defaults(&config).len(), 180);
        assert_eq!(FeatureFamily::Chroma.defaults(&config).len(), 72);
        assert_eq!(FeatureFamily::Tonnetz.defaults(&config).len(), 24);
        assert_eq!(FeatureFamily::Rhythm.defaults(&config).len(), 9);
        assert_eq!(FeatureFamily::HarmonicPercussive.defaults(&config).len(), 6);
        assert_eq!(FeatureFamily::Mel.defaults(&config).len(), 24);
        assert_eq!(FeatureFamily::Tempogram.defaults(&config).len(), 6);
    }

    #[test]
    fn test_every_family_matches_its_defaults() {
        let config = short_config();
        let waveform = tone_with_clicks(22050, 3);
        for family in FeatureFamily::ALL {
            let extracted = family.extract(&waveform, &config).unwrap();
            assert!(
                extracted.same_schema(&family.defaults(&config)),
                "{} schema drifted",
                family.name()
            );
        }
    }

    #[test]
    fn test_empty_waveform_falls_back() {
        let config = short_config();
        let empty = Waveform::new(Vec::new(), 22050).unwrap();
        assert!(FeatureFamily::Spectral.extract(&empty, &config).is_err());
        let features = extract_or_default(FeatureFamily::Spectral, &empty, &config);
        assert_eq!(features, FeatureFamily::Spectral.defaults(&config));
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let mut features = FeatureVector::new();
        features.insert("ok", 1.0);
        features.insert("bad", f64::NAN);
        let err = ensure_finite(features).unwrap_err();
        assert!(matches!(err, FeatureError::Numerical { ref feature, .. } if feature == "bad"));
    }

    #[test]
    fn test_rhythm_finds_tempo_in_clicks() {
        let config = short_config();
        let features = FeatureFamily::Rhythm
            .extract(&tone_with_clicks(22050, 6), &config)
            .unwrap();
        let tempo = features.get("tempo").map(|v| v.as_f64()).unwrap_or(0.0);
        println!("rhythm features: {:?}", features);
        assert!((tempo - 120.0).abs() < 4.0);
        assert!(features.get("onset_rate").map(|v| v.as_f64()).unwrap_or(0.0) > 1.0);
    }

    #[test]
    fn test_basic_reports_integers() {
        let config = short_config();
        let features = FeatureFamily::Basic
            .extract(&tone_with_clicks(22050, 1), &config)
            .unwrap();
        assert_eq!(features.get("sample_rate"), Some(FeatureValue::Int(22050)));
        assert_eq!(features.get("total_samples"), Some(FeatureValue::Int(22050)));
    }
}
