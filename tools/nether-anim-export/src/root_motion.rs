//! Root-motion separation
//!
//! Moves the movement of the skeleton's primary root into channel 0 so a
//! runtime can apply it to the character's world transform while the bones
//! animate in place. For every root bone, composing channel 0 with the
//! bone's channel (translations add, rotations multiply `root * local`)
//! reproduces the authored trajectory at the bone's key times.
//!
//! In unmasked mode the primary root is left holding zero translation and
//! identity rotation. Its rest offset (for example a hip height from the bind
//! pose) travels with channel 0, so a runtime that drops root motion also
//! drops that offset. Scale stays on the bone.

use glam::{Quat, Vec3};
use nether_anim_common::channel::hold;
use nether_anim_common::{KeyFrame, RawChannel, Skeleton, ROOT_MOTION_CHANNEL};
use serde::Deserialize;

use crate::diagnostics::Diagnostics;
use crate::resample::{sample_quat, sample_vec3};

/// Horizontal projections shorter than this give no usable heading
const MIN_HEADING_LENGTH: f32 = 1e-4;

/// What part of the primary root's motion becomes root motion
///
/// Unmasked (the default) moves the whole root translation and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootMotionMask {
    pub masked: bool,
    /// Translation axes (x, y, z) extracted in masked mode
    pub translation: [bool; 3],
    /// Extract the heading (rotation about +Y) in masked mode
    pub yaw: bool,
}

impl RootMotionMask {
    /// Masked extraction of the ground-plane motion and heading
    pub fn ground() -> Self {
        Self {
            masked: true,
            translation: [true, false, true],
            yaw: true,
        }
    }

    fn translation_mask(&self) -> Vec3 {
        Vec3::select(
            glam::BVec3::new(self.translation[0], self.translation[1], self.translation[2]),
            Vec3::ONE,
            Vec3::ZERO,
        )
    }
}

/// Heading of `rotation` as a pure rotation about +Y
///
/// The +X axis is rotated, projected onto the XZ plane and measured against
/// +X. Returns `None` when the rotated axis is near vertical.
pub fn extract_yaw(rotation: Quat) -> Option<Quat> {
    let axis = rotation * Vec3::X;
    let projected = Vec3::new(axis.x, 0.0, axis.z);
    if projected.length() < MIN_HEADING_LENGTH {
        return None;
    }
    Some(Quat::from_rotation_y((-axis.z).atan2(axis.x)))
}

/// Split the primary root's motion into channel 0
///
/// `channels` must hold the root-motion channel followed by one channel per
/// bone, as produced by [`crate::extract::extract_channels`].
pub fn separate_root_motion(
    channels: &mut [RawChannel],
    skeleton: &Skeleton,
    mask: &RootMotionMask,
    diagnostics: &mut Diagnostics,
) {
    if channels.len() != skeleton.bone_count() + 1 {
        tracing::warn!(
            "Root motion skipped: {} channels for {} bones",
            channels.len(),
            skeleton.bone_count()
        );
        return;
    }

    let primary = skeleton.primary_root() + 1;
    let (head, bones) = channels.split_at_mut(primary);
    let root_motion = &mut head[ROOT_MOTION_CHANNEL];
    let root = &mut bones[0];

    root_motion.scales = hold(Vec3::ONE);
    if mask.masked {
        split_masked(root_motion, root, mask, diagnostics);
    } else {
        root_motion.translations = std::mem::replace(&mut root.translations, hold(Vec3::ZERO));
        root_motion.rotations = std::mem::replace(&mut root.rotations, hold(Quat::IDENTITY));
    }

    let root_motion = channels[ROOT_MOTION_CHANNEL].clone();
    for other in skeleton.roots().filter(|&r| r != skeleton.primary_root()) {
        remove_root_motion(&root_motion, &mut channels[other + 1]);
    }
}

fn split_masked(
    root_motion: &mut RawChannel,
    root: &mut RawChannel,
    mask: &RootMotionMask,
    diagnostics: &mut Diagnostics,
) {
    let extracted = mask.translation_mask();
    let kept = Vec3::ONE - extracted;
    root_motion.translations = root
        .translations
        .iter()
        .map(|k| KeyFrame::new(k.frame_time, k.value * extracted))
        .collect();
    for key in &mut root.translations {
        key.value *= kept;
    }

    if !mask.yaw {
        root_motion.rotations = hold(Quat::IDENTITY);
        return;
    }

    let mut vertical = 0usize;
    root_motion.rotations = Vec::with_capacity(root.rotations.len());
    for key in &mut root.rotations {
        let yaw = extract_yaw(key.value).unwrap_or_else(|| {
            vertical += 1;
            Quat::IDENTITY
        });
        root_motion.rotations.push(KeyFrame::new(key.frame_time, yaw));
        key.value = (yaw.conjugate() * key.value).normalize();
    }
    if vertical > 0 {
        diagnostics.data_quality(format!(
            "{vertical} root rotation key(s) face straight up or down; their yaw is taken as 0"
        ));
    }
}

/// Express a secondary root relative to the extracted root motion
fn remove_root_motion(root_motion: &RawChannel, channel: &mut RawChannel) {
    for key in &mut channel.translations {
        if let Some(offset) = sample_vec3(&root_motion.translations, key.frame_time) {
            key.value -= offset;
        }
    }
    for key in &mut channel.rotations {
        if let Some(rotation) = sample_quat(&root_motion.rotations, key.frame_time) {
            key.value = (rotation.conjugate() * key.value).normalize();
        }
    }
}
