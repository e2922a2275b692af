//! Distance and panning math for channel-level 3D positioning.
//!
//! Everything here is pure. The engine computes distance and yaw once per
//! object per tick and derives the per-channel byte values from them:
//! a distance byte in `[0, 255]` (0 = at or inside the minimum range,
//! 255 = at or beyond the maximum range) and a left/right gain pair in
//! `[0, 255]`.

use crate::math::Pose;

/// Minimum and maximum attenuation distances of a trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    min: f32,
    max: f32,
}

impl Attenuation {
    /// Builds a range, clamping both ends to be non-negative.
    ///
    /// A swapped range is repaired rather than rejected.
    pub fn new(min: f32, max: f32) -> Self {
        let mut min = min.max(0.0);
        let mut max = max.max(0.0);
        if min > max {
            log::warn!(
                "Attenuation range min {} is greater than max {}, swapping",
                min,
                max
            );
            std::mem::swap(&mut min, &mut max);
        }
        Self { min, max }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn distance_byte(&self, distance: f32) -> u8 {
        channel_distance_byte(distance, self.min, self.max)
    }
}

/// Values pushed to a mixer channel after a positional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpatial {
    pub distance: u8,
    pub left: u8,
    pub right: u8,
}

impl ChannelSpatial {
    /// Full volume, centered, no attenuation.
    pub const NEUTRAL: Self = Self {
        distance: 0,
        left: 255,
        right: 255,
    };
}

impl Default for ChannelSpatial {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Distance from listener to object, and the signed yaw of the object in
/// degrees as seen by the listener (positive = to the right).
pub fn compute_distance_and_angle(listener: &Pose, object: &Pose) -> (f32, f32) {
    let to_object = object.position - listener.position;
    let distance = to_object.length();

    let up = listener.up().normalize_or_zero();
    let planar = to_object - up * to_object.dot(up);
    if planar.length_squared() <= f32::EPSILON {
        return (distance, 0.0);
    }

    let forward = listener.forward();
    let right = listener.right();
    let angle = planar.dot(right).atan2(planar.dot(forward)).to_degrees();

    (distance, angle.clamp(-180.0, 180.0))
}

pub fn channel_distance_byte(distance: f32, min: f32, max: f32) -> u8 {
    if distance <= min {
        return 0;
    }
    if distance >= max || max <= min {
        return 255;
    }
    let t = (distance - min) / (max - min);
    (t * 255.0).clamp(0.0, 255.0) as u8
}

/// Left and right gains for a yaw angle in degrees.
///
/// Rear angles are mirrored into the front half plane, so a source directly
/// behind the listener pans like one directly ahead.
pub fn stereo_pan(angle_degrees: f32) -> (u8, u8) {
    let angle = angle_degrees.clamp(-180.0, 180.0);
    let folded = if angle.abs() > 90.0 {
        angle.signum() * (180.0 - angle.abs())
    } else {
        angle
    };

    let right = (folded + 90.0) / 180.0;
    let left = (90.0 - folded) / 180.0;

    (
        (left * 255.0).round().clamp(0.0, 255.0) as u8,
        (right * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}

/// Channel values for an object, given the trigger's attenuation and panning.
pub fn channel_spatial(
    distance: f32,
    angle_degrees: f32,
    attenuation: Option<&Attenuation>,
    panning: bool,
) -> ChannelSpatial {
    let distance = attenuation.map_or(0, |range| range.distance_byte(distance));
    let (left, right) = if panning {
        stereo_pan(angle_degrees)
    } else {
        (255, 255)
    };
    ChannelSpatial {
        distance,
        left,
        right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quat, Vec3};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "{} != {}", a, b);
    }

    #[test]
    fn test_distance_and_angle_cardinal_directions() {
        let listener = Pose::identity();

        let (d, a) = compute_distance_and_angle(
            &listener,
            &Pose::from_position(Vec3::new(0.0, 0.0, -5.0)),
        );
        assert_close(d, 5.0);
        assert_close(a, 0.0);

        let (_, a) = compute_distance_and_angle(
            &listener,
            &Pose::from_position(Vec3::new(3.0, 0.0, 0.0)),
        );
        assert_close(a, 90.0);

        let (_, a) = compute_distance_and_angle(
            &listener,
            &Pose::from_position(Vec3::new(-3.0, 0.0, 0.0)),
        );
        assert_close(a, -90.0);

        let (_, a) = compute_distance_and_angle(
            &listener,
            &Pose::from_position(Vec3::new(0.0, 0.0, 4.0)),
        );
        assert_close(a.abs(), 180.0);
    }

    #[test]
    fn test_angle_ignores_height() {
        let listener = Pose::identity();
        let object = Pose::from_position(Vec3::new(2.0, 10.0, 0.0));
        let (d, a) = compute_distance_and_angle(&listener, &object);
        assert_close(d, (104.0f32).sqrt());
        assert_close(a, 90.0);
    }

    #[test]
    fn test_angle_follows_listener_rotation() {
        // Turning 90 degrees to the left puts a source at -Z on the right.
        let listener = Pose::new(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let (_, a) = compute_distance_and_angle(
            &listener,
            &Pose::from_position(Vec3::new(0.0, 0.0, -1.0)),
        );
        assert_close(a, 90.0);
    }

    #[test]
    fn test_object_at_listener() {
        let (d, a) = compute_distance_and_angle(&Pose::identity(), &Pose::identity());
        assert_eq!(d, 0.0);
        assert_eq!(a, 0.0);
    }

    #[test]
    fn test_distance_byte_bounds_and_monotonicity() {
        assert_eq!(channel_distance_byte(0.0, 1.0, 10.0), 0);
        assert_eq!(channel_distance_byte(1.0, 1.0, 10.0), 0);
        assert_eq!(channel_distance_byte(10.0, 1.0, 10.0), 255);
        assert_eq!(channel_distance_byte(50.0, 1.0, 10.0), 255);
        assert_eq!(channel_distance_byte(5.0, 0.0, 10.0), 127);

        let mut previous = 0;
        for step in 0..200 {
            let value = channel_distance_byte(step as f32 * 0.1, 2.0, 15.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_distance_byte_degenerate_range() {
        assert_eq!(channel_distance_byte(3.0, 3.0, 3.0), 0);
        assert_eq!(channel_distance_byte(3.01, 3.0, 3.0), 255);
    }

    #[test]
    fn test_attenuation_swaps_and_clamps() {
        let range = Attenuation::new(20.0, 5.0);
        assert_eq!(range.min(), 5.0);
        assert_eq!(range.max(), 20.0);

        let range = Attenuation::new(-4.0, 8.0);
        assert_eq!(range.min(), 0.0);
        assert_eq!(range.max(), 8.0);
    }

    #[test]
    fn test_pan_center_and_extremes() {
        let (l, r) = stereo_pan(0.0);
        assert!((l as i16 - r as i16).abs() <= 1);

        assert_eq!(stereo_pan(90.0), (0, 255));
        assert_eq!(stereo_pan(-90.0), (255, 0));
    }

    #[test]
    fn test_pan_mirror_symmetry() {
        for angle in [10.0, 33.0, 55.0, 89.0, 125.0, 170.0] {
            let (l, r) = stereo_pan(angle);
            let (ml, mr) = stereo_pan(-angle);
            assert_eq!((l, r), (mr, ml), "angle {}", angle);
        }
    }

    #[test]
    fn test_pan_rear_folds_to_front() {
        assert_eq!(stereo_pan(150.0), stereo_pan(30.0));
        assert_eq!(stereo_pan(-135.0), stereo_pan(-45.0));
        let (l, r) = stereo_pan(180.0);
        assert!((l as i16 - r as i16).abs() <= 1);
    }

    #[test]
    fn test_channel_spatial_flags() {
        let range = Attenuation::new(0.0, 10.0);
        let spatial = channel_spatial(20.0, 90.0, Some(&range), false);
        assert_eq!(spatial.distance, 255);
        assert_eq!((spatial.left, spatial.right), (255, 255));

        let spatial = channel_spatial(20.0, 90.0, None, true);
        assert_eq!(spatial.distance, 0);
        assert_eq!((spatial.left, spatial.right), (0, 255));
    }
}
