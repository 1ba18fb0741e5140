//! Interpolation helpers:
//! - tween_fraction (position of a frame inside a keyframe span)
//! - ease (Flash quadratic ease in/out)
//! - lerp_affine (component-wise matrix blend)

use glam::Affine2;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Fractional position of `frame` within `[start, start + duration)`, clamped to `[0, 1]`.
#[inline]
pub fn tween_fraction(frame: f32, start: u32, duration: u32) -> f32 {
    if duration == 0 {
        return 0.0;
    }
    ((frame - start as f32) / duration as f32).clamp(0.0, 1.0)
}

/// Apply a Flash ease in `[-1, 1]` to `t`.
///
/// `-1` is a full quadratic ease-in (`t^2`), `1` a full ease-out (`2t - t^2`),
/// `0` is linear.
#[inline]
pub fn ease(t: f32, ease: f32) -> f32 {
    let e = ease.clamp(-1.0, 1.0);
    t + e * t * (1.0 - t)
}

/// Blend two affine transforms component-wise.
#[inline]
pub fn lerp_affine(a: &Affine2, b: &Affine2, t: f32) -> Affine2 {
    let ca = a.to_cols_array();
    let cb = b.to_cols_array();
    let out: [f32; 6] = std::array::from_fn(|i| lerp_f32(ca[i], cb[i], t));
    Affine2::from_cols_array(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec2;

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(tween_fraction(5.0, 4, 4), 0.25);
        assert_eq!(tween_fraction(20.0, 4, 4), 1.0);
        assert_eq!(tween_fraction(1.0, 4, 4), 0.0);
        assert_eq!(tween_fraction(1.0, 4, 0), 0.0);
    }

    #[test]
    fn ease_endpoints_are_fixed() {
        for e in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            assert_relative_eq!(ease(0.0, e), 0.0);
            assert_relative_eq!(ease(1.0, e), 1.0);
        }
        assert_relative_eq!(ease(0.5, 0.0), 0.5);
        assert_relative_eq!(ease(0.5, -1.0), 0.25);
        assert_relative_eq!(ease(0.5, 1.0), 0.75);
    }

    #[test]
    fn affine_blend_is_componentwise() {
        let a = Affine2::from_translation(Vec2::new(0.0, 0.0));
        let b = Affine2::from_scale_angle_translation(Vec2::splat(3.0), 0.0, Vec2::new(10.0, -4.0));
        let m = lerp_affine(&a, &b, 0.5);
        assert_relative_eq!(m.translation.x, 5.0);
        assert_relative_eq!(m.translation.y, -2.0);
        assert_relative_eq!(m.matrix2.x_axis.x, 2.0);
    }
}
