//! Multi-algorithm perceptual fingerprints.
//!
//! A fingerprint bundles three bit-sequences computed from the same luminance
//! grid at one resolution `N`, each holding `N * N` bits:
//!
//! - **average**: the grid reduced to `N x N`, one bit per cell set when the
//!   cell is at least as bright as the mean.
//! - **difference**: the grid reduced to `(N + 1) x N`, one bit per adjacent
//!   horizontal pair set when the right pixel is brighter.
//! - **perceptual**: the grid reduced to `4N x 4N`, transformed with a 2D
//!   DCT-II; the lowest `N x N` frequencies are thresholded against their
//!   median, with the DC term left out of the median and its bit cleared.
//!
//! All resampling uses a Lanczos3 filter.

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::core::error::FingerprintError;
use crate::core::pixels::PixelGrid;

pub const DEFAULT_RESOLUTION: u32 = 16;
pub const MIN_RESOLUTION: u32 = 2;
/// Upper bound keeping the DCT working grid at 256x256.
pub const MAX_RESOLUTION: u32 = 64;
/// Working grid side for the perceptual component, as a multiple of `N`.
pub const PERCEPTUAL_OVERSAMPLE: u32 = 4;

const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Average,
    Difference,
    Perceptual,
}

impl HashAlgorithm {
    /// Transport order of the components.
    pub const ALL: [HashAlgorithm; 3] = [
        HashAlgorithm::Average,
        HashAlgorithm::Difference,
        HashAlgorithm::Perceptual,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Average => "average",
            HashAlgorithm::Difference => "difference",
            HashAlgorithm::Perceptual => "perceptual",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-length bit-sequence, row-major, first bit most significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitSequence {
    bits: Vec<bool>,
}

impl BitSequence {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    average: BitSequence,
    difference: BitSequence,
    perceptual: BitSequence,
}

impl Fingerprint {
    /// Assemble a fingerprint; all three components must share one non-zero length.
    pub fn new(
        average: BitSequence,
        difference: BitSequence,
        perceptual: BitSequence,
    ) -> Result<Self, FingerprintError> {
        if average.is_empty() {
            return Err(FingerprintError::invalid_input(
                "fingerprint components must not be empty",
            ));
        }
        for other in [&difference, &perceptual] {
            if other.len() != average.len() {
                return Err(FingerprintError::IncompatibleFingerprints {
                    left: average.len(),
                    right: other.len(),
                });
            }
        }

        Ok(Self {
            average,
            difference,
            perceptual,
        })
    }

    pub fn average(&self) -> &BitSequence {
        &self.average
    }

    pub fn difference(&self) -> &BitSequence {
        &self.difference
    }

    pub fn perceptual(&self) -> &BitSequence {
        &self.perceptual
    }

    pub fn component(&self, algorithm: HashAlgorithm) -> &BitSequence {
        match algorithm {
            HashAlgorithm::Average => &self.average,
            HashAlgorithm::Difference => &self.difference,
            HashAlgorithm::Perceptual => &self.perceptual,
        }
    }

    /// Bits per component.
    pub fn bit_length(&self) -> usize {
        self.average.len()
    }
}

/// Derives fingerprints at a fixed resolution. Pure and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintEngine {
    resolution: u32,
}

impl FingerprintEngine {
    pub fn new(resolution: u32) -> Result<Self, FingerprintError> {
        if resolution < MIN_RESOLUTION {
            return Err(FingerprintError::invalid_configuration(format!(
                "resolution must be at least {}, got {}",
                MIN_RESOLUTION, resolution
            )));
        }
        if resolution > MAX_RESOLUTION {
            return Err(FingerprintError::invalid_configuration(format!(
                "resolution must be at most {}, got {}",
                MAX_RESOLUTION, resolution
            )));
        }
        Ok(Self { resolution })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Bits per component, `N * N`.
    pub fn bit_length(&self) -> usize {
        (self.resolution * self.resolution) as usize
    }

    pub fn compute(&self, grid: &PixelGrid) -> Fingerprint {
        Fingerprint {
            average: self.average_bits(grid),
            difference: self.difference_bits(grid),
            perceptual: self.perceptual_bits(grid),
        }
    }

    fn average_bits(&self, grid: &PixelGrid) -> BitSequence {
        let n = self.resolution;
        let reduced = imageops::resize(grid.as_luma(), n, n, RESAMPLE_FILTER);
        let values: Vec<f64> = reduced.pixels().map(|p| f64::from(p.0[0])).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        values.iter().map(|&value| value >= mean).collect()
    }

    fn difference_bits(&self, grid: &PixelGrid) -> BitSequence {
        let n = self.resolution;
        let reduced = imageops::resize(grid.as_luma(), n + 1, n, RESAMPLE_FILTER);

        let mut bits = Vec::with_capacity(self.bit_length());
        for y in 0..n {
            for x in 0..n {
                let left = reduced.get_pixel(x, y).0[0];
                let right = reduced.get_pixel(x + 1, y).0[0];
                bits.push(right > left);
            }
        }
        BitSequence::from_bits(bits)
    }

    fn perceptual_bits(&self, grid: &PixelGrid) -> BitSequence {
        let keep = self.resolution as usize;
        let side = self.resolution * PERCEPTUAL_OVERSAMPLE;
        let reduced = imageops::resize(grid.as_luma(), side, side, RESAMPLE_FILTER);
        let pixels: Vec<f64> = reduced.pixels().map(|p| f64::from(p.0[0])).collect();

        let coefficients = low_frequency_dct(&pixels, side as usize, keep);

        let mut ac_terms = coefficients[1..].to_vec();
        let threshold = median(&mut ac_terms);

        coefficients
            .iter()
            .enumerate()
            .map(|(i, &coefficient)| i != 0 && coefficient > threshold)
            .collect()
    }
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
        }
    }
}

/// Compute a fingerprint at resolution `resolution`.
pub fn compute_fingerprint(
    grid: &PixelGrid,
    resolution: u32,
) -> Result<Fingerprint, FingerprintError> {
    Ok(FingerprintEngine::new(resolution)?.compute(grid))
}

/// Unnormalized separable DCT-II of a `size x size` block, keeping only the
/// `keep x keep` lowest frequencies. Output is row-major by vertical frequency.
fn low_frequency_dct(pixels: &[f64], size: usize, keep: usize) -> Vec<f64> {
    let basis: Vec<f64> = (0..keep)
        .flat_map(|k| {
            (0..size).map(move |n| {
                (PI * k as f64 * (2 * n + 1) as f64 / (2 * size) as f64).cos()
            })
        })
        .collect();

    // Horizontal pass: size rows x keep frequencies.
    let mut rows = vec![0.0; size * keep];
    for y in 0..size {
        let row = &pixels[y * size..(y + 1) * size];
        for k in 0..keep {
            let weights = &basis[k * size..(k + 1) * size];
            rows[y * keep + k] = 2.0 * dot(row, weights);
        }
    }

    // Vertical pass over each retained horizontal frequency.
    let mut block = vec![0.0; keep * keep];
    for kx in 0..keep {
        for ky in 0..keep {
            let weights = &basis[ky * size..(ky + 1) * size];
            let sum: f64 = (0..size).map(|y| rows[y * keep + kx] * weights[y]).sum();
            block[ky * keep + kx] = 2.0 * sum;
        }
    }
    block
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{
        TEXTURE_31_RECORD, TEXTURE_32_RECORD, TEXTURE_34_RECORD, encode_png, textured_grid,
        textured_luma,
    };
    use crate::core::pixels::{ImageDecoder, PixelSource};
    use image::{ImageBuffer, Luma};

    fn grid_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> PixelGrid {
        let img = ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)]));
        PixelGrid::from_luma(img).unwrap()
    }

    fn hamming(a: &BitSequence, b: &BitSequence) -> usize {
        a.bits().iter().zip(b.bits()).filter(|(x, y)| x != y).count()
    }

    #[test]
    fn test_rejects_small_resolution() {
        for resolution in [0, 1] {
            let result = FingerprintEngine::new(resolution);
            assert!(matches!(
                result,
                Err(FingerprintError::InvalidConfiguration { .. })
            ));
        }
        assert!(FingerprintEngine::new(MIN_RESOLUTION).is_ok());
    }

    #[test]
    fn test_rejects_oversized_resolution() {
        let result = FingerprintEngine::new(MAX_RESOLUTION + 1);
        assert!(matches!(
            result,
            Err(FingerprintError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_component_lengths() {
        let grid = textured_grid(97, 61, 1);
        for resolution in [2, 3, 8, 16] {
            let fingerprint = compute_fingerprint(&grid, resolution).unwrap();
            let expected = (resolution * resolution) as usize;
            for algorithm in HashAlgorithm::ALL {
                assert_eq!(fingerprint.component(algorithm).len(), expected);
            }
            assert_eq!(fingerprint.bit_length(), expected);
        }
    }

    #[test]
    fn test_deterministic() {
        let grid = textured_grid(120, 80, 2);
        let engine = FingerprintEngine::default();
        assert_eq!(engine.compute(&grid), engine.compute(&grid));
    }

    #[test]
    fn test_constant_grid() {
        let grid = grid_from_fn(40, 40, |_, _| 128);
        let fingerprint = FingerprintEngine::default().compute(&grid);

        // Every cell equals the mean; nothing is brighter than its neighbour.
        assert_eq!(fingerprint.average().count_ones(), 256);
        assert_eq!(fingerprint.difference().count_ones(), 0);
        assert!(!fingerprint.perceptual().bits()[0]);
    }

    #[test]
    fn test_horizontal_gradient_sets_difference_bits() {
        let grid = grid_from_fn(170, 64, |x, _| x as u8);
        let fingerprint = FingerprintEngine::new(8).unwrap().compute(&grid);
        assert_eq!(fingerprint.difference().count_ones(), 64);

        let reversed = grid_from_fn(170, 64, |x, _| 169 - x as u8);
        let fingerprint = FingerprintEngine::new(8).unwrap().compute(&reversed);
        assert_eq!(fingerprint.difference().count_ones(), 0);
    }

    #[test]
    fn test_average_tracks_bright_half() {
        let grid = grid_from_fn(64, 64, |x, _| if x < 32 { 20 } else { 230 });
        let fingerprint = FingerprintEngine::new(4).unwrap().compute(&grid);
        let expected: Vec<bool> = (0..16).map(|i| i % 4 >= 2).collect();
        assert_eq!(fingerprint.average().bits(), expected.as_slice());
    }

    #[test]
    fn test_perceptual_dc_bit_cleared() {
        let grid = textured_grid(100, 100, 3);
        let fingerprint = FingerprintEngine::default().compute(&grid);
        assert!(!fingerprint.perceptual().bits()[0]);
        // At most half of the 255 AC terms sit above their median.
        let ones = fingerprint.perceptual().count_ones();
        assert!((100..=127).contains(&ones), "unexpected ones: {}", ones);
    }

    #[test]
    fn test_resize_keeps_fingerprint_close() {
        let engine = FingerprintEngine::default();
        let original = textured_grid(256, 256, 4);
        let resized = PixelGrid::from_luma(imageops::resize(
            original.as_luma(),
            180,
            180,
            FilterType::Triangle,
        ))
        .unwrap();

        let a = engine.compute(&original);
        let b = engine.compute(&resized);
        for algorithm in HashAlgorithm::ALL {
            let distance = hamming(a.component(algorithm), b.component(algorithm));
            assert!(
                distance < 64,
                "{} distance too large: {}",
                algorithm,
                distance
            );
        }
    }

    #[test]
    fn test_known_textures_produce_stored_records() {
        let engine = FingerprintEngine::default();
        for (seed, record) in [
            (31, TEXTURE_31_RECORD),
            (32, TEXTURE_32_RECORD),
            (34, TEXTURE_34_RECORD),
        ] {
            assert_eq!(
                engine.compute(&textured_grid(256, 256, seed)).to_string(),
                record,
                "seed {}",
                seed
            );
        }

        let png = encode_png(&textured_luma(256, 256, 31));
        let decoded = ImageDecoder::new().decode(&png).unwrap();
        assert_eq!(engine.compute(&decoded).to_string(), TEXTURE_31_RECORD);
    }

    #[test]
    fn test_inverted_grid_differs() {
        let engine = FingerprintEngine::default();
        let original = textured_grid(128, 128, 5);
        let inverted = grid_from_fn(128, 128, |x, y| 255 - original.get(x, y));

        let a = engine.compute(&original);
        let b = engine.compute(&inverted);
        assert!(hamming(a.difference(), b.difference()) > 128);
    }

    #[test]
    fn test_fingerprint_new_rejects_mismatched_lengths() {
        let four = BitSequence::from_bits(vec![true; 4]);
        let nine = BitSequence::from_bits(vec![false; 9]);
        let result = Fingerprint::new(four.clone(), four.clone(), nine);
        assert!(matches!(
            result,
            Err(FingerprintError::IncompatibleFingerprints { left: 4, right: 9 })
        ));
        assert!(Fingerprint::new(four.clone(), four.clone(), four).is_ok());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_dct_of_constant_block_is_dc_only() {
        let pixels = vec![10.0; 64];
        let block = low_frequency_dct(&pixels, 8, 4);
        assert!((block[0] - 4.0 * 10.0 * 64.0).abs() < 1e-9);
        for coefficient in &block[1..] {
            assert!(coefficient.abs() < 1e-9);
        }
    }
}
