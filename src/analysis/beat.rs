// Beat tracking - global tempo estimate and dynamic-programming beat tracker
//
// Tempo: the autocorrelation tempogram of the onset envelope (8 s window)
// is averaged over time, compressed with log1p, and weighted by a
// log-normal prior centred on 120 BPM (one octave standard deviation).
// Lags faster than 320 BPM are excluded. The best lag is refined with a
// parabolic fit through its neighbours.
//
// Beats: Ellis (2007) dynamic programming. Each frame's score is the local
// onset strength plus the best predecessor score penalised by
// `-tightness * log(interval / period)^2`. Beats are backtracked from the
// last strong frame and weak beats at both ends are trimmed.

use super::features::tempogram::autocorrelation_tempogram;
use super::onset::OnsetDetector;

/// Prior centre (BPM)
const START_BPM: f64 = 120.0;

/// Prior spread (octaves)
const STD_BPM: f64 = 1.0;

/// Fastest tempo considered (BPM)
const MAX_TEMPO: f64 = 320.0;

/// Tempogram window for tempo estimation (seconds)
const AC_SIZE_SECS: f64 = 8.0;

/// Transition penalty weight
const TIGHTNESS: f64 = 100.0;

/// Tempo and beat positions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeatTrack {
    /// Global tempo in BPM (0.0 when nothing rhythmic was found)
    pub tempo: f64,
    /// Beat positions in onset-envelope frames
    pub beats: Vec<usize>,
}

impl BeatTrack {
    /// Beat positions in seconds
    pub fn beat_times(&self, sample_rate: u32, hop: usize) -> Vec<f64> {
        super::onset::frames_to_time(&self.beats, sample_rate, hop)
    }
}

/// Estimate tempo and track beats in `samples`
pub fn beat_track(samples: &[f32], detector: &OnsetDetector) -> BeatTrack {
    let envelope = detector.strength(samples);
    beat_track_envelope(&envelope, detector.sample_rate(), detector.hop())
}

/// Estimate tempo and track beats from a precomputed onset envelope
///
/// # Returns
/// `BeatTrack::default()` (tempo 0, no beats) for an all-zero envelope
pub fn beat_track_envelope(envelope: &[f32], sample_rate: u32, hop: usize) -> BeatTrack {
    if envelope.iter().all(|&v| v == 0.0) {
        return BeatTrack::default();
    }
    let frame_rate = sample_rate as f64 / hop as f64;
    let tempo = estimate_tempo(envelope, frame_rate);
    if tempo <= 0.0 {
        return BeatTrack::default();
    }
    BeatTrack {
        tempo,
        beats: track_beats(envelope, tempo, frame_rate),
    }
}

/// Global tempo estimate in BPM
///
/// # Arguments
/// * `envelope` - Onset strength envelope
/// * `frame_rate` - Envelope frames per second
pub fn estimate_tempo(envelope: &[f32], frame_rate: f64) -> f64 {
    let win_length = (AC_SIZE_SECS * frame_rate).round() as usize;
    let tempogram = autocorrelation_tempogram(envelope, win_length.max(2));
    if tempogram.is_empty() {
        return 0.0;
    }

    let n_frames = tempogram.len() as f64;
    let mut profile = vec![0.0f64; win_length];
    for frame in &tempogram {
        for (acc, &v) in profile.iter_mut().zip(frame.iter()) {
            *acc += v as f64 / n_frames;
        }
    }

    let bpm_of = |lag: f64| 60.0 * frame_rate / lag;
    let scores: Vec<f64> = profile
        .iter()
        .enumerate()
        .map(|(lag, &strength)| {
            if lag == 0 {
                return f64::NEG_INFINITY;
            }
            let bpm = bpm_of(lag as f64);
            if bpm > MAX_TEMPO {
                return f64::NEG_INFINITY;
            }
            let prior = -0.5 * ((bpm.log2() - START_BPM.log2()) / STD_BPM).powi(2);
            (1e6 * strength.max(0.0)).ln_1p() + prior
        })
        .collect();

    let Some(best) = argmax(&scores) else {
        return 0.0;
    };
    if !scores[best].is_finite() {
        return 0.0;
    }

    let mut lag = best as f64;
    if best >= 1 && best + 1 < scores.len() {
        let (a, b, c) = (scores[best - 1], scores[best], scores[best + 1]);
        let denom = a - 2.0 * b + c;
        if a.is_finite() && c.is_finite() && denom.abs() > f64::EPSILON {
            lag += (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }
    bpm_of(lag)
}

fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= v => {}
            _ if v.is_nan() => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Dynamic-programming beat tracker
///
/// # Returns
/// Beat frames in increasing order
pub fn track_beats(envelope: &[f32], bpm: f64, frame_rate: f64) -> Vec<usize> {
    let period = (60.0 * frame_rate / bpm).round().max(1.0) as isize;
    let local = local_score(envelope, period);
    let n = local.len();
    if n == 0 {
        return Vec::new();
    }

    // Candidate predecessor offsets: -2 * period ..= -period / 2
    let offsets: Vec<isize> = (-2 * period..=-((period as f64 / 2.0).round() as isize)).collect();
    let penalty: Vec<f64> = offsets
        .iter()
        .map(|&o| -TIGHTNESS * ((-o) as f64 / period as f64).ln().powi(2))
        .collect();

    let local_max = local.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut cumscore = vec![0.0f64; n];
    let mut backlink = vec![-1isize; n];
    let mut first_beat = true;

    for i in 0..n {
        let mut best_score = f64::NEG_INFINITY;
        let mut best_pos = -1isize;
        for (&offset, &pen) in offsets.iter().zip(penalty.iter()) {
            let pos = i as isize + offset;
            let score = if pos >= 0 {
                pen + cumscore[pos as usize]
            } else {
                pen
            };
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        cumscore[i] = local[i] + best_score;

        if first_beat && local[i] < 0.01 * local_max {
            backlink[i] = -1;
        } else {
            backlink[i] = best_pos;
            first_beat = false;
        }
    }

    let Some(last) = last_beat(&cumscore) else {
        return Vec::new();
    };
    let mut beats = vec![last];
    while let Some(&current) = beats.last() {
        let prev = backlink[current];
        if prev < 0 {
            break;
        }
        beats.push(prev as usize);
    }
    beats.reverse();

    trim_beats(&local, &beats)
}

/// Onset envelope (unit sample std) smoothed with a Gaussian of width ~period/32
fn local_score(envelope: &[f32], period: isize) -> Vec<f64> {
    let values: Vec<f64> = envelope.iter().map(|&v| v as f64).collect();
    let n = values.len();
    let std = if n > 1 {
        let mean = values.iter().sum::<f64>() / n as f64;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    let normalised: Vec<f64> = if std > 0.0 {
        values.iter().map(|v| v / std).collect()
    } else {
        values
    };

    let window: Vec<f64> = (-period..=period)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period as f64).powi(2)).exp())
        .collect();
    convolve_same(&normalised, &window)
}

/// Full convolution trimmed to the input length, centred
fn convolve_same(x: &[f64], kernel: &[f64]) -> Vec<f64> {
    let half = (kernel.len() / 2) as isize;
    let n = x.len() as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &k)| {
                    let idx = i + half - j as isize;
                    (idx >= 0 && idx < n).then(|| k * x[idx as usize])
                })
                .sum()
        })
        .collect()
}

/// Last local maximum of the cumulative score that beats half the median peak
fn last_beat(cumscore: &[f64]) -> Option<usize> {
    let n = cumscore.len();
    let is_max: Vec<bool> = (0..n)
        .map(|i| {
            let prev = if i == 0 { cumscore[0] } else { cumscore[i - 1] };
            let next = if i + 1 == n { cumscore[n - 1] } else { cumscore[i + 1] };
            cumscore[i] > prev && cumscore[i] >= next
        })
        .collect();

    let mut peaks: Vec<f64> = cumscore
        .iter()
        .zip(is_max.iter())
        .filter(|(_, &m)| m)
        .map(|(&s, _)| s)
        .collect();
    if peaks.is_empty() {
        return n.checked_sub(1);
    }
    peaks.sort_by(|a, b| a.total_cmp(b));
    let median = if peaks.len() % 2 == 0 {
        0.5 * (peaks[peaks.len() / 2 - 1] + peaks[peaks.len() / 2])
    } else {
        peaks[peaks.len() / 2]
    };

    (0..n).rev().find(|&i| is_max[i] && 2.0 * cumscore[i] > median)
}

/// Drop weak beats at the start and end
fn trim_beats(local: &[f64], beats: &[usize]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let strengths: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let smooth = convolve_same(&strengths, &[0.0, 0.5, 1.0, 0.5, 0.0]);
    let rms = (smooth.iter().map(|v| v * v).sum::<f64>() / smooth.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let first = smooth.iter().position(|&v| v > threshold);
    let last = smooth.iter().rposition(|&v| v > threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..last].to_vec(),
        _ => Vec::new(),
    }
}
