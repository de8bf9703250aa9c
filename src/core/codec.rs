//! Transport form of a fingerprint: `<hex-average>#<hex-difference>#<hex-perceptual>`.
//!
//! Each component is written row-major, most significant bit first, as
//! lowercase hex left-padded to whole digits. This is the layout persisted on
//! the ledger, so it must stay byte-for-byte stable.

use std::fmt;
use std::str::FromStr;

use crate::core::error::FingerprintError;
use crate::core::fingerprint::{BitSequence, Fingerprint, HashAlgorithm};

pub const SEPARATOR: char = '#';
const SEGMENTS: usize = 3;

pub struct FingerprintStringCodec;

impl FingerprintStringCodec {
    pub fn encode(fingerprint: &Fingerprint) -> String {
        HashAlgorithm::ALL
            .iter()
            .map(|&algorithm| bits_to_hex(fingerprint.component(algorithm)))
            .collect::<Vec<_>>()
            .join(&SEPARATOR.to_string())
    }

    pub fn decode(record: &str) -> Result<Fingerprint, FingerprintError> {
        let segments: Vec<&str> = record.split(SEPARATOR).collect();
        if segments.len() != SEGMENTS {
            return Err(FingerprintError::malformed(format!(
                "expected {} '{}'-separated segments, found {}",
                SEGMENTS,
                SEPARATOR,
                segments.len()
            )));
        }

        let average = hex_to_bits(segments[0])?;
        let difference = hex_to_bits(segments[1])?;
        let perceptual = hex_to_bits(segments[2])?;

        Fingerprint::new(average, difference, perceptual).map_err(|e| match e {
            FingerprintError::IncompatibleFingerprints { left, right } => {
                FingerprintError::malformed(format!(
                    "segments decode to different lengths ({} vs {} bits)",
                    left, right
                ))
            }
            other => other,
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&FingerprintStringCodec::encode(self))
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FingerprintStringCodec::decode(s)
    }
}

fn bits_to_hex(sequence: &BitSequence) -> String {
    let digits = sequence.len().div_ceil(4);
    let padding = digits * 4 - sequence.len();

    let padded: Vec<bool> = std::iter::repeat_n(false, padding)
        .chain(sequence.bits().iter().copied())
        .collect();

    padded
        .chunks(4)
        .map(|nibble| {
            let value = nibble
                .iter()
                .fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit));
            char::from_digit(value, 16).unwrap_or('0')
        })
        .collect()
}

/// A segment of `h` digits carries `s * s` bits where `s = isqrt(4h)`;
/// the leading padding bits must be zero.
fn hex_to_bits(segment: &str) -> Result<BitSequence, FingerprintError> {
    if segment.is_empty() {
        return Err(FingerprintError::malformed("empty segment"));
    }

    let mut raw = Vec::with_capacity(segment.len() * 4);
    for c in segment.chars() {
        let value = c.to_digit(16).ok_or_else(|| {
            FingerprintError::malformed(format!("invalid hex character {:?}", c))
        })?;
        for shift in (0..4).rev() {
            raw.push((value >> shift) & 1 == 1);
        }
    }

    let side = raw.len().isqrt();
    let padding = raw.len() - side * side;
    if raw[..padding].iter().any(|&bit| bit) {
        return Err(FingerprintError::malformed(format!(
            "segment {:?} has non-zero padding bits",
            segment
        )));
    }

    Ok(BitSequence::from_bits(raw.split_off(padding)))
}
