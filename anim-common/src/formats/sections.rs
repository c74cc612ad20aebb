//! Section payloads of an animation pack
//!
//! # Skeleton
//! ```text
//! root transform: translation 3×f32, rotation 4×f32, scale 3×f32
//! bone_count u32
//! bone_count × { name string, parent u32 (u32::MAX = root),
//!                translation 3×f32, rotation 4×f32, scale 3×f32 }
//! ```
//!
//! # Clip
//! ```text
//! name string, duration f32, track_count u32
//! root motion: translation start/end 2×3×f32, rotation start/end 2×4×f32
//! payload_kind u8 (0 = sorted keys, 1 = compressed)
//!   0: sorted-key layout
//!   1: codec_id u32, blob_len u32, blob
//! ```
//!
//! Strings are a u32 byte length followed by UTF-8.

use crate::animation::{AnimationPayload, EncodedAnimation, RootMotionExtents};
use crate::channel::LocalTransform;
use crate::codec::CodecId;
use crate::skeleton::{Bone, Skeleton, NO_PARENT};

use super::container::{ContainerError, SectionKind};
use super::serialization::{ByteReader, ByteWriter};
use super::sorted_keys::SortedKeys;

const PAYLOAD_SORTED_KEYS: u8 = 0;
const PAYLOAD_COMPRESSED: u8 = 1;

/// Smallest possible bone record (empty name)
const MIN_BONE_SIZE: usize = 4 + 4 + 40;

fn malformed(kind: SectionKind, reason: &'static str) -> ContainerError {
    ContainerError::MalformedSection { kind, reason }
}

fn write_transform(out: &mut ByteWriter, transform: &LocalTransform) {
    out.vec3(transform.translation);
    out.quat(transform.rotation);
    out.vec3(transform.scale);
}

fn read_transform(input: &mut ByteReader<'_>) -> Option<LocalTransform> {
    Some(LocalTransform {
        translation: input.vec3()?,
        rotation: input.quat()?,
        scale: input.vec3()?,
    })
}

pub fn write_skeleton(skeleton: &Skeleton) -> Vec<u8> {
    let mut out = ByteWriter::new();
    write_transform(&mut out, &skeleton.root_transform());
    out.u32(skeleton.bone_count() as u32);
    for bone in skeleton.bones() {
        out.string(&bone.name);
        out.u32(bone.parent.map_or(NO_PARENT, |p| p as u32));
        write_transform(&mut out, &bone.bind);
    }
    out.into_bytes()
}

pub fn read_skeleton(bytes: &[u8]) -> Result<Skeleton, ContainerError> {
    let truncated = || malformed(SectionKind::Skeleton, "truncated bone table");
    let mut input = ByteReader::new(bytes);

    let root_transform = read_transform(&mut input).ok_or_else(truncated)?;
    let count = input.count(MIN_BONE_SIZE).ok_or_else(truncated)?;
    let mut bones = Vec::with_capacity(count);
    for _ in 0..count {
        let name = input.string().ok_or_else(truncated)?;
        let parent = input.u32().ok_or_else(truncated)?;
        let bind = read_transform(&mut input).ok_or_else(truncated)?;
        let parent = (parent != NO_PARENT).then_some(parent as usize);
        bones.push(Bone { name, parent, bind });
    }

    let skeleton = Skeleton::from_bones(bones).ok_or_else(|| {
        malformed(
            SectionKind::Skeleton,
            "empty skeleton, duplicate bone name or forward parent index",
        )
    })?;
    Ok(skeleton.with_root_transform(root_transform))
}

pub fn write_clip(clip: &EncodedAnimation) -> Vec<u8> {
    let mut out = ByteWriter::new();
    out.string(&clip.name);
    out.f32(clip.duration);
    out.u32(clip.track_count);
    out.vec3(clip.root_motion.translation_start);
    out.vec3(clip.root_motion.translation_end);
    out.quat(clip.root_motion.rotation_start);
    out.quat(clip.root_motion.rotation_end);
    match &clip.payload {
        AnimationPayload::SortedKeys(keys) => {
            out.u8(PAYLOAD_SORTED_KEYS);
            keys.write(&mut out);
        }
        AnimationPayload::Compressed { codec, blob } => {
            out.u8(PAYLOAD_COMPRESSED);
            out.u32(codec.0);
            out.u32(blob.len() as u32);
            out.bytes(blob);
        }
    }
    out.into_bytes()
}

pub fn read_clip(bytes: &[u8]) -> Result<EncodedAnimation, ContainerError> {
    let truncated = || malformed(SectionKind::Clip, "truncated clip header");
    let mut input = ByteReader::new(bytes);

    let name = input.string().ok_or_else(truncated)?;
    let duration = input.f32().ok_or_else(truncated)?;
    if !(duration.is_finite() && duration > 0.0) {
        return Err(malformed(SectionKind::Clip, "duration must be positive"));
    }
    let track_count = input.u32().ok_or_else(truncated)?;
    let root_motion = RootMotionExtents {
        translation_start: input.vec3().ok_or_else(truncated)?,
        translation_end: input.vec3().ok_or_else(truncated)?,
        rotation_start: input.quat().ok_or_else(truncated)?,
        rotation_end: input.quat().ok_or_else(truncated)?,
    };

    let payload = match input.u8().ok_or_else(truncated)? {
        PAYLOAD_SORTED_KEYS => {
            let keys = SortedKeys::read(&mut input)
                .ok_or_else(|| malformed(SectionKind::Clip, "invalid sorted-key payload"))?;
            if keys.track_count != track_count {
                return Err(malformed(SectionKind::Clip, "track count mismatch"));
            }
            AnimationPayload::SortedKeys(keys)
        }
        PAYLOAD_COMPRESSED => {
            let codec = CodecId(input.u32().ok_or_else(truncated)?);
            let len = input.u32().ok_or_else(truncated)? as usize;
            let blob = input
                .take(len)
                .ok_or_else(|| malformed(SectionKind::Clip, "truncated codec blob"))?
                .to_vec();
            AnimationPayload::Compressed { codec, blob }
        }
        _ => return Err(malformed(SectionKind::Clip, "unknown payload kind")),
    };

    if !input.is_exhausted() {
        return Err(malformed(SectionKind::Clip, "trailing bytes"));
    }

    Ok(EncodedAnimation {
        name,
        duration,
        track_count,
        root_motion,
        payload,
    })
}
