//! Tween interpolation helpers.
//!
//! Keyframe tweens blend transform matrices and colour transforms linearly,
//! with an optional Flash-style quadratic ease applied to the blend factor.

pub mod functions;

pub use functions::{ease, lerp_affine, tween_fraction};
