//! Clip encoding
//!
//! Two layouts: exact sorted keys built from raw channels, or a codec blob
//! built from uniformly resampled channels.

use nether_anim_common::{
    AnimationCodec, AnimationPayload, CodecError, EncodedAnimation, RawChannel,
    RootMotionExtents, SortedKeys, UniformChannel, ROOT_MOTION_CHANNEL,
};

use crate::extract::MIN_DURATION_SECONDS;

fn positive_duration(duration: f32) -> f32 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        MIN_DURATION_SECONDS
    }
}

/// Root-motion extents from the first and last uniform samples
fn uniform_extents(channels: &[UniformChannel]) -> RootMotionExtents {
    let Some(root) = channels.get(ROOT_MOTION_CHANNEL) else {
        return RootMotionExtents::default();
    };
    let mut extents = RootMotionExtents::default();
    if let (Some(first), Some(last)) = (root.translations.first(), root.translations.last()) {
        extents.translation_start = *first;
        extents.translation_end = *last;
    }
    if let (Some(first), Some(last)) = (root.rotations.first(), root.rotations.last()) {
        extents.rotation_start = *first;
        extents.rotation_end = *last;
    }
    extents
}

/// Exact encoding of raw channels
pub fn encode_sorted_keys(name: &str, channels: &[RawChannel], duration: f32) -> EncodedAnimation {
    EncodedAnimation {
        name: name.to_string(),
        duration: positive_duration(duration),
        track_count: channels.len() as u32,
        root_motion: RootMotionExtents::from_channels(channels),
        payload: AnimationPayload::SortedKeys(SortedKeys::from_channels(channels)),
    }
}

/// Lossy encoding of uniform channels through `codec`
///
/// A codec failure yields no animation at all.
pub fn encode_compressed(
    name: &str,
    channels: &[UniformChannel],
    codec: &dyn AnimationCodec,
    duration: f32,
) -> Result<EncodedAnimation, CodecError> {
    let blob = codec.compress(channels)?;
    Ok(EncodedAnimation {
        name: name.to_string(),
        duration: positive_duration(duration),
        track_count: channels.len() as u32,
        root_motion: uniform_extents(channels),
        payload: AnimationPayload::Compressed {
            codec: codec.id(),
            blob,
        },
    })
}
