use crate::perception::Landmarks;

/// Face-mesh index of the upper inner lip midpoint.
pub const UPPER_INNER_LIP: usize = 13;
/// Face-mesh index of the lower inner lip midpoint.
pub const LOWER_INNER_LIP: usize = 14;

/// Vertical mouth opening in normalized landmark units.
pub fn lip_gap(landmarks: &Landmarks) -> Option<f64> {
    let upper = landmarks.get(UPPER_INNER_LIP)?;
    let lower = landmarks.get(LOWER_INNER_LIP)?;
    Some((upper[1] - lower[1]).abs())
}

/// Single-frame lip movement: the mouth is open wider than `threshold`.
/// No smoothing here; debouncing belongs to the session monitor.
pub fn lips_moving(landmarks: &Landmarks, threshold: f64) -> bool {
    lip_gap(landmarks).is_some_and(|gap| gap > threshold)
}

/// Scale to unit length. `None` for an empty, zero, or non-finite vector.
pub fn normalize(mut values: Vec<f64>) -> Option<Vec<f64>> {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if values.is_empty() || !norm.is_finite() || norm == 0.0 {
        return None;
    }
    values.iter_mut().for_each(|v| *v /= norm);
    Some(values)
}

/// `None` when the vectors differ in length.
pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> Option<f64> {
    if lhs.len() != rhs.len() {
        return None;
    }
    let sum: f64 = lhs
        .iter()
        .zip(rhs)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    Some(sum.sqrt())
}
