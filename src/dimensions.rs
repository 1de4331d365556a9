/// Scale factor applied on the first attempt.
pub const INITIAL_SCALE_FACTOR: f64 = 0.9;

/// Multiplier applied to the scale factor after every attempt that misses the target.
pub const SCALE_DECAY: f64 = 0.95;

/// Scale factors tried in order: 0.9, 0.855, 0.81225, ...
pub fn scale_factors() -> impl Iterator<Item = f64> {
    std::iter::successors(Some(INITIAL_SCALE_FACTOR), |s| Some(s * SCALE_DECAY))
}

/// Smallest dimensions a candidate may have.
///
/// Each side is `floor(original * min_size_percentage)`, raised to 1 pixel so
/// a candidate is never empty.
pub fn floor_dimensions(width: u32, height: u32, min_size_percentage: f64) -> (u32, u32) {
    let floor = |dim: u32| ((dim as f64 * min_size_percentage).floor() as u32).max(1);
    (floor(width), floor(height))
}

/// Dimensions of the candidate for one attempt, clamped to the floor.
pub fn candidate_dimensions(
    width: u32,
    height: u32,
    scale_factor: f64,
    floor: (u32, u32),
) -> (u32, u32) {
    let new_w = (width as f64 * scale_factor).round() as u32;
    let new_h = (height as f64 * scale_factor).round() as u32;

    (new_w.max(floor.0), new_h.max(floor.1))
}
