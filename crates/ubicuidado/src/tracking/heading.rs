//! Direction of travel between two fixes.

use crate::fix::PositionFix;

/// Heading from `from` to `to`, in degrees.
///
/// Computed as `atan2(Δlongitude, Δlatitude)` on raw degree differences:
/// 0 is north and angles grow clockwise (90 east, -90 west, 180 south), which
/// is the rotation a screen marker expects. The result lies in (-180, 180].
/// Identical positions give 0.
#[must_use]
pub fn heading_degrees(from: &PositionFix, to: &PositionFix) -> f64 {
    let d_lat = to.latitude - from.latitude;
    let d_lng = to.longitude - from.longitude;
    d_lng.atan2(d_lat).to_degrees()
}
