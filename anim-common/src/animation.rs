//! Engine-ready animation clip

use glam::{Quat, Vec3};

use crate::channel::{RawChannel, ROOT_MOTION_CHANNEL};
use crate::codec::CodecId;
use crate::formats::SortedKeys;

/// Where the root-motion channel starts and ends
///
/// Lets a runtime accumulate root motion across loops without sampling the
/// clip boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionExtents {
    pub translation_start: Vec3,
    pub translation_end: Vec3,
    pub rotation_start: Quat,
    pub rotation_end: Quat,
}

impl Default for RootMotionExtents {
    fn default() -> Self {
        Self {
            translation_start: Vec3::ZERO,
            translation_end: Vec3::ZERO,
            rotation_start: Quat::IDENTITY,
            rotation_end: Quat::IDENTITY,
        }
    }
}

impl RootMotionExtents {
    /// First and last keys of the root-motion channel
    pub fn from_channels(channels: &[RawChannel]) -> Self {
        let Some(root) = channels.get(ROOT_MOTION_CHANNEL) else {
            return Self::default();
        };
        let mut extents = Self::default();
        if let (Some(first), Some(last)) = (root.translations.first(), root.translations.last()) {
            extents.translation_start = first.value;
            extents.translation_end = last.value;
        }
        if let (Some(first), Some(last)) = (root.rotations.first(), root.rotations.last()) {
            extents.rotation_start = first.value;
            extents.rotation_end = last.value;
        }
        extents
    }

    /// Net root displacement over one playback of the clip
    pub fn translation_delta(&self) -> Vec3 {
        self.translation_end - self.translation_start
    }
}

/// Encoded per-track data
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationPayload {
    /// Exact keys in forward-scan order
    SortedKeys(SortedKeys),
    /// Opaque blob produced by an [`AnimationCodec`](crate::codec::AnimationCodec)
    Compressed { codec: CodecId, blob: Vec<u8> },
}

impl AnimationPayload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SortedKeys(_) => "sorted-keys",
            Self::Compressed { codec, .. } => codec.name(),
        }
    }

    /// Encoded size in bytes, as stored in a pack
    pub fn byte_len(&self) -> usize {
        match self {
            Self::SortedKeys(keys) => keys.byte_len(),
            Self::Compressed { blob, .. } => blob.len(),
        }
    }
}

/// One imported clip
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAnimation {
    pub name: String,
    /// Seconds, always > 0
    pub duration: f32,
    /// Root-motion channel plus one track per bone
    pub track_count: u32,
    pub root_motion: RootMotionExtents,
    pub payload: AnimationPayload,
}
