use crate::core::error::FingerprintError;
use crate::core::fingerprint::BitSequence;

/// Count of differing bit positions. Lengths must match exactly.
pub fn hamming_distance(a: &BitSequence, b: &BitSequence) -> Result<usize, FingerprintError> {
    if a.len() != b.len() {
        return Err(FingerprintError::IncompatibleFingerprints {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.bits()
        .iter()
        .zip(b.bits())
        .filter(|(left, right)| left != right)
        .count())
}

/// Percentage of matching bits, in `[0, 100]`.
pub fn similarity(a: &BitSequence, b: &BitSequence) -> Result<f64, FingerprintError> {
    let distance = hamming_distance(a, b)?;
    let total = a.len();
    if total == 0 {
        return Err(FingerprintError::invalid_input(
            "cannot compare empty bit-sequences",
        ));
    }

    // Integer numerator keeps exact ratios (e.g. 80.0) exact.
    Ok((total - distance) as f64 * 100.0 / total as f64)
}
