//! Deterministic test signals and WAV writing.
//!
//! Click generation follows the metronome approach: a short white-noise
//! burst from a fixed seed, placed at exact sample offsets computed from the
//! tempo. Everything here is deterministic so assertions on tempo and key
//! stay stable between runs.

use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Duration of one click burst in milliseconds
const CLICK_DURATION_MS: f32 = 20.0;

/// Pure sine tone
pub fn sine_wave(frequency: f32, sample_rate: u32, num_samples: usize, amplitude: f32) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Seeded white noise in `[-amplitude, amplitude]`
pub fn white_noise(num_samples: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples)
        .map(|_| amplitude * rng.gen_range(-1.0f32..1.0))
        .collect()
}

/// Samples between beats: `sample_rate * 60 / bpm`
#[inline]
pub fn samples_per_beat(bpm: f32, sample_rate: u32) -> f64 {
    sample_rate as f64 * 60.0 / bpm as f64
}

/// Click track: a decaying 20 ms noise burst on every beat, starting at 0
pub fn click_track(bpm: f32, sample_rate: u32, num_samples: usize, amplitude: f32) -> Vec<f32> {
    let burst_len = (sample_rate as f32 * CLICK_DURATION_MS / 1000.0) as usize;
    let burst = white_noise(burst_len, 1.0, 42);
    let period = samples_per_beat(bpm, sample_rate);

    let mut out = vec![0.0f32; num_samples];
    let mut beat = 0usize;
    loop {
        let start = (beat as f64 * period).round() as usize;
        if start >= num_samples {
            break;
        }
        for (i, &s) in burst.iter().enumerate() {
            let idx = start + i;
            if idx >= num_samples {
                break;
            }
            let envelope = 1.0 - i as f32 / burst_len as f32;
            out[idx] += amplitude * s * envelope;
        }
        beat += 1;
    }
    out
}

/// Sample-wise sum, truncated to the shorter input
pub fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

/// Write 16-bit mono PCM to `path`
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()
}

/// 16-bit mono PCM WAV file as bytes (for upload tests)
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), wav_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
