//! Fill Level Calculation

/// Convert a sensor distance into a fill percentage for a bin of `height_cm`.
///
/// The sensor sits at the lid, so a distance of 0 means full and a distance
/// equal to the height means empty. Distances outside `[0, height_cm]` are
/// sensor noise and are clamped to the nearest boundary. A non-positive
/// height is a degenerate capacity and reads as empty.
///
/// The raw percentage is never negative, so `f64::round` rounds ties at .5 up.
pub fn fill_level(height_cm: f64, distance_cm: f64) -> u8 {
    // Also rejects NaN heights
    if !(height_cm > 0.0) {
        return 0;
    }

    let distance = distance_cm.clamp(0.0, height_cm);
    let fill = (height_cm - distance) / height_cm * 100.0;

    // NaN distance casts to 0
    fill.round() as u8
}
