//! Vector math used by the index and the ranker.
//!
//! Magnitudes are always recomputed from raw components; nothing here
//! assumes an input was normalized.

use crate::vector::VectorError;

/// Dot product of two equally sized slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm.
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * `Some(score)` in range [-1, 1], where 1 is most similar
/// * `None` if the dimensions differ or either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    cosine_with_magnitudes(a, magnitude(a), b, magnitude(b))
}

/// Cosine similarity when both magnitudes are already known.
///
/// Same formula as [`cosine_similarity`]; the index stores each document's
/// magnitude once at build time and reuses it for every query.
pub(crate) fn cosine_with_magnitudes(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> Option<f32> {
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot(a, b) / (norm_a * norm_b))
}

/// Scales `v` to unit length in place.
///
/// # Errors
/// Returns `ZeroMagnitude` for the zero vector and `NonFinite` if any
/// component is NaN or infinite.
pub fn l2_normalize(v: &mut [f32]) -> Result<(), VectorError> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(VectorError::NonFinite);
    }
    let norm = magnitude(v);
    if norm == 0.0 {
        return Err(VectorError::ZeroMagnitude);
    }
    for val in v.iter_mut() {
        *val /= norm;
    }
    Ok(())
}
