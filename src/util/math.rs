//! Small scalar/vector helpers shared by the force models

use glam::Vec3;

/// Durations at or below this are treated as zero
pub const DURATION_EPSILON: f32 = 1.0e-6;

/// Linear interpolation with `t` clamped to [0, 1]
pub fn lerp_clamped(a: f32, b: f32, t: f32) -> f32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    a + (b - a) * t
}

/// `numerator / denominator`, or zero when the denominator is degenerate
pub fn ratio_or_zero(numerator: f32, denominator: f32) -> f32 {
    if denominator.abs() <= DURATION_EPSILON || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fraction of a duration covered by `dt`; a zero duration completes in one step
pub fn step_fraction(dt: f32, duration: f32) -> f32 {
    if duration <= DURATION_EPSILON || !duration.is_finite() {
        1.0
    } else {
        dt / duration
    }
}

/// Component of `v` along `onto`; zero for a zero axis
pub fn project(v: Vec3, onto: Vec3) -> Vec3 {
    let len_sq = onto.length_squared();
    if len_sq <= f32::EPSILON {
        Vec3::ZERO
    } else {
        onto * (v.dot(onto) / len_sq)
    }
}

/// Angle in degrees from `from` to `to`, signed by the rotation sense around `axis`
pub fn signed_angle_deg(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let denom = (from.length_squared() * to.length_squared()).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    let cos = (from.dot(to) / denom).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    if axis.dot(from.cross(to)) < 0.0 {
        -angle
    } else {
        angle
    }
}
