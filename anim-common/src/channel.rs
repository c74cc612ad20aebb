//! Keyframe channels
//!
//! A clip is imported as one channel per skeleton bone plus a leading
//! root-motion channel. Channel `i + 1` animates bone `i`.
//!
//! Two shapes exist:
//! - [`RawChannel`]: irregular keys per track, frame times normalized to [0, 1]
//! - [`UniformChannel`]: every track of every channel sampled on the same
//!   evenly spaced timeline (required before lossy compression)

use glam::{Quat, Vec3};

/// Index of the root-motion pseudo-bone in a channel array
pub const ROOT_MOTION_CHANNEL: usize = 0;

/// Maximum deviation from unit length tolerated for rotation values
pub const UNIT_QUAT_TOLERANCE: f32 = 1e-5;

/// A single keyed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame<T> {
    /// 0.0 = beginning of the clip, 1.0 = end of the clip
    pub frame_time: f32,
    pub value: T,
}

impl<T> KeyFrame<T> {
    pub const fn new(frame_time: f32, value: T) -> Self {
        Self { frame_time, value }
    }
}

/// Translation / rotation / scale of a bone relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Transform equivalent to applying `child` inside `self`
    ///
    /// Exact for uniform scale; non-uniform parent scale under a rotated child
    /// keeps only the per-axis product.
    pub fn mul_transform(&self, child: &Self) -> Self {
        Self {
            translation: self.translation + self.rotation * (self.scale * child.translation),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Check that a quaternion is unit length within [`UNIT_QUAT_TOLERANCE`]
#[inline]
pub fn is_unit_quat(q: Quat) -> bool {
    (q.length() - 1.0).abs() <= UNIT_QUAT_TOLERANCE
}

/// Blending between two keyed values
///
/// `alpha <= 0` and `alpha >= 1` return the bracketing value untouched, so
/// sampling exactly on a key reproduces it bit for bit.
pub trait Interpolate: Copy {
    fn interpolate(self, next: Self, alpha: f32) -> Self;
}

impl Interpolate for Vec3 {
    #[inline]
    fn interpolate(self, next: Self, alpha: f32) -> Self {
        if alpha <= 0.0 {
            self
        } else if alpha >= 1.0 {
            next
        } else {
            self.lerp(next, alpha)
        }
    }
}

impl Interpolate for Quat {
    /// Shortest-arc slerp, renormalized
    #[inline]
    fn interpolate(self, next: Self, alpha: f32) -> Self {
        if alpha <= 0.0 {
            self
        } else if alpha >= 1.0 {
            next
        } else {
            self.slerp(next, alpha).normalize()
        }
    }
}

/// Blend factor of `time` between two key times
///
/// A zero-length span yields 0 (the earlier key wins).
#[inline]
pub fn blend_factor(start: f32, end: f32, time: f32) -> f32 {
    let span = end - start;
    if span <= 0.0 {
        0.0
    } else {
        ((time - start) / span).clamp(0.0, 1.0)
    }
}

/// Per-bone keyframes with independent track timings
///
/// Invariant (established by the extractor): every non-empty track starts at
/// frame time 0.0 and ends at 1.0, rotations are unit length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawChannel {
    pub translations: Vec<KeyFrame<Vec3>>,
    pub rotations: Vec<KeyFrame<Quat>>,
    pub scales: Vec<KeyFrame<Vec3>>,
}

impl RawChannel {
    /// Two-key hold of a constant transform over the whole clip
    pub fn hold(transform: LocalTransform) -> Self {
        Self {
            translations: hold(transform.translation),
            rotations: hold(transform.rotation),
            scales: hold(transform.scale),
        }
    }

    /// Largest key count over the three tracks
    pub fn max_key_count(&self) -> usize {
        self.translations
            .len()
            .max(self.rotations.len())
            .max(self.scales.len())
    }
}

/// Two keys at 0.0 and 1.0 holding `value`
pub fn hold<T: Copy>(value: T) -> Vec<KeyFrame<T>> {
    vec![KeyFrame::new(0.0, value), KeyFrame::new(1.0, value)]
}

/// Per-bone samples on a shared uniform timeline
///
/// All three tracks hold the same number of samples `M`; sample `i` sits at
/// frame time `i / (M - 1)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformChannel {
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl UniformChannel {
    pub fn with_capacity(sample_count: usize) -> Self {
        Self {
            translations: Vec::with_capacity(sample_count),
            rotations: Vec::with_capacity(sample_count),
            scales: Vec::with_capacity(sample_count),
        }
    }

    /// Number of samples (all tracks are the same length)
    pub fn sample_count(&self) -> usize {
        self.translations.len()
    }

    /// Frame time of sample `index` on a timeline of `sample_count` samples
    ///
    /// The last sample is exactly 1.0.
    #[inline]
    pub fn frame_time(index: usize, sample_count: usize) -> f32 {
        if sample_count < 2 || index + 1 >= sample_count {
            return if index == 0 && sample_count < 2 { 0.0 } else { 1.0 };
        }
        index as f32 / (sample_count - 1) as f32
    }

    /// Expand back into keyed form, one key per uniform sample
    pub fn to_raw(&self) -> RawChannel {
        let m = self.sample_count();
        let keyed = |i: usize| Self::frame_time(i, m);
        RawChannel {
            translations: self
                .translations
                .iter()
                .enumerate()
                .map(|(i, v)| KeyFrame::new(keyed(i), *v))
                .collect(),
            rotations: self
                .rotations
                .iter()
                .enumerate()
                .map(|(i, q)| KeyFrame::new(keyed(i), *q))
                .collect(),
            scales: self
                .scales
                .iter()
                .enumerate()
                .map(|(i, v)| KeyFrame::new(keyed(i), *v))
                .collect(),
        }
    }
}
