// Key estimation - tonic and mode from a chroma profile, plus the
// spectral-spread confidence score reported by the analysis service
//
// The tonic is the pitch class with the most average chroma energy (the
// lowest index wins a tie). The mode compares the tonic's major third with
// its minor third: strictly more major-third energy means Major, anything
// else (including a tie) means Minor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::features::chroma::N_CHROMA;
use super::features::stft::Spectrogram;

/// Confidence never exceeds this value
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Confidence for a perfectly steady centroid
const BASE_CONFIDENCE: f64 = 0.7;

/// Confidence gained per 1000 Hz of centroid standard deviation
const CONFIDENCE_PER_KHZ: f64 = 0.25;

/// The twelve pitch classes, C = 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; N_CHROMA] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for an index (wraps modulo 12)
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % N_CHROMA]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Sharp-spelled name
    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Major or minor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "Major",
            Scale::Minor => "Minor",
        }
    }
}

/// Estimated key, displayed as e.g. `"A Minor"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEstimate {
    pub tonic: PitchClass,
    pub scale: Scale,
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic.name(), self.scale.name())
    }
}

/// Average chroma energy per pitch class
///
/// # Arguments
/// * `chroma` - Frame-major chroma matrix (`chroma[frame][class]`)
pub fn chroma_profile(chroma: &Spectrogram) -> [f64; N_CHROMA] {
    let mut profile = [0.0f64; N_CHROMA];
    if chroma.is_empty() {
        return profile;
    }
    for frame in chroma {
        for (acc, &v) in profile.iter_mut().zip(frame.iter()) {
            *acc += v as f64;
        }
    }
    let n = chroma.len() as f64;
    profile.iter_mut().for_each(|v| *v /= n);
    profile
}

/// Key from an averaged chroma profile
pub fn estimate_key_from_profile(profile: &[f64; N_CHROMA]) -> KeyEstimate {
    let mut tonic = 0;
    for (i, &energy) in profile.iter().enumerate() {
        if energy > profile[tonic] {
            tonic = i;
        }
    }

    let major_third = profile[(tonic + 4) % N_CHROMA];
    let minor_third = profile[(tonic + 3) % N_CHROMA];
    let scale = if major_third > minor_third {
        Scale::Major
    } else {
        Scale::Minor
    };

    KeyEstimate {
        tonic: PitchClass::from_index(tonic),
        scale,
    }
}

/// Key from a chroma matrix
pub fn estimate_key(chroma: &Spectrogram) -> KeyEstimate {
    estimate_key_from_profile(&chroma_profile(chroma))
}

/// Confidence from the spread of the spectral centroid
///
/// Formula: min(0.95, 0.7 + std(centroid) / 1000 * 0.25), with the
/// population standard deviation over frames
pub fn confidence_from_centroids(centroids: &[f32]) -> f64 {
    let values: Vec<f64> = centroids.iter().map(|&c| c as f64).collect();
    confidence_from_spread(super::stats::std_dev(&values))
}

/// Confidence for a given centroid standard deviation (Hz)
pub fn confidence_from_spread(std_hz: f64) -> f64 {
    (BASE_CONFIDENCE + (std_hz / 1000.0) * CONFIDENCE_PER_KHZ).min(MAX_CONFIDENCE)
}
