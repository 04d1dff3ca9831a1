// Tonnetz module - Tonal centroid features
//
// Projects L1-normalised chroma onto three circles: perfect fifths, minor
// thirds and major thirds (x/y each), giving 6 dimensions per frame.
//
// Reference: Harte, C. et al. (2006). Detecting harmonic change in musical
// audio.

use std::f32::consts::PI;

use super::chroma::{normalize_l1, N_CHROMA};
use super::stft::Spectrogram;

/// Output dimensions
pub const N_TONNETZ: usize = 6;

/// Circle angle per pitch class for each dimension
const SCALE: [f32; N_TONNETZ] = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];

/// Circle radius per dimension (major thirds weighted down)
const RADIUS: [f32; N_TONNETZ] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

fn basis() -> [[f32; N_CHROMA]; N_TONNETZ] {
    let mut phi = [[0.0f32; N_CHROMA]; N_TONNETZ];
    for (i, row) in phi.iter_mut().enumerate() {
        // Even rows are sines, odd rows cosines
        let phase = if i % 2 == 0 { 0.5 } else { 0.0 };
        for (j, value) in row.iter_mut().enumerate() {
            *value = RADIUS[i] * (PI * (SCALE[i] * j as f32 - phase)).cos();
        }
    }
    phi
}

/// Tonnetz from chroma
///
/// # Arguments
/// * `chroma` - Frame-major 12-class chroma (any normalisation)
///
/// # Returns
/// Frame-major 6-dimensional tonal centroids
pub fn tonnetz(chroma: &Spectrogram) -> Spectrogram {
    let mut normalised = chroma.clone();
    normalize_l1(&mut normalised);
    let phi = basis();
    normalised
        .iter()
        .map(|frame| {
            phi.iter()
                .map(|row| row.iter().zip(frame.iter()).map(|(p, c)| p * c).sum())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_class_lies_on_circles() {
        let mut frame = vec![0.0f32; N_CHROMA];
        frame[7] = 1.0;
        let t = tonnetz(&vec![frame]);
        let fifths = (t[0][0].powi(2) + t[0][1].powi(2)).sqrt();
        let major = (t[0][4].powi(2) + t[0][5].powi(2)).sqrt();
        assert!((fifths - 1.0).abs() < 1e-5);
        assert!((major - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_silent_chroma_is_origin() {
        let t = tonnetz(&vec![vec![0.0; N_CHROMA]; 3]);
        assert!(t.iter().all(|f| f.len() == N_TONNETZ && f.iter().all(|&v| v == 0.0)));
    }
}
