//! This is the vector math module
//! Provide dot product, magnitude, cosine similarity and vector parsing

use crate::error::{DimensionMismatch, QueryParseError};

/// Dot Product
/// dot_prod = sum(a[i] * b[i]) for i = 0..a.len()
/// Can only process vectors with same dimensions
/// Accumulates in f64: products of large or tiny f32 components stay finite and non-zero
pub fn dot_product(left: &[f32], right: &[f32]) -> Result<f64, DimensionMismatch> {
    if left.len() != right.len() {
        return Err(DimensionMismatch { left: left.len(), right: right.len() });
    }

    let dot_prod = left.iter()
        .zip(right.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();

    Ok(dot_prod)
}

/// L2 magnitude
/// ||vec|| = sqrt(sum(vec[i]^2)), accumulated in f64
pub fn magnitude(vector: &[f32]) -> f64 {
    vector.iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity
/// cos = dot(a, b) / (||a|| * ||b||)
///
/// A zero-magnitude vector on either side scores `0.0` instead of NaN, so a
/// degenerate embedding still ranks deterministically. Any other non-finite
/// ratio (a NaN or infinite component) also scores `0.0`. The result is
/// clamped to `[-1, 1]` and a negative zero is folded to `0.0`.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f32, DimensionMismatch> {
    let dot = dot_product(left, right)?;
    let denom = magnitude(left) * magnitude(right);
    if denom == 0.0 {
        return Ok(0.0);
    }

    let cos = dot / denom;
    if !cos.is_finite() {
        return Ok(0.0);
    }

    Ok((cos as f32).clamp(-1.0, 1.0) + 0.0)
}

/// Result of leniently parsing one comma-separated row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVector {
    pub values: Vec<f32>,
    /// `(column, token)` for every component replaced by `0.0`.
    pub malformed: Vec<(usize, String)>,
}

/// Parse a comma-separated row of floats.
///
/// Tokens are trimmed and a single trailing comma is ignored. A token that is
/// not a finite `f32` becomes `0.0` and is reported in `malformed`; parsing
/// never fails as a whole.
pub fn parse_vector(line: &str) -> ParsedVector {
    let line = line.trim();
    let line = line.strip_suffix(',').unwrap_or(line);

    let mut parsed = ParsedVector { values: Vec::new(), malformed: Vec::new() };
    if line.is_empty() {
        return parsed;
    }

    for (column, token) in line.split(',').enumerate() {
        let token = token.trim();
        match token.parse::<f32>() {
            Ok(value) if value.is_finite() => parsed.values.push(value),
            _ => {
                parsed.values.push(0.0);
                parsed.malformed.push((column, token.to_string()));
            }
        }
    }

    parsed
}

/// Parse a query line strictly.
///
/// Unlike [`parse_vector`], any bad component is an error: a zeroed query
/// component would shift every score.
pub fn parse_query(line: &str) -> Result<Vec<f32>, QueryParseError> {
    let line = line.trim();
    let line = line.strip_suffix(',').unwrap_or(line);
    if line.is_empty() {
        return Err(QueryParseError::Empty);
    }

    line.split(',')
        .enumerate()
        .map(|(column, token)| {
            let token = token.trim();
            match token.parse::<f32>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(QueryParseError::MalformedToken { column, token: token.to_string() }),
            }
        })
        .collect()
}
