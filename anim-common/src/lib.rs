//! Shared types and binary formats for the Nethercore animation pipeline
//!
//! This crate provides everything shared between:
//! - `nether-anim-export` (import pipeline, writes packs)
//! - runtime readers (load packs, replay sorted keys, decompress clips)
//!
//! # Modules
//!
//! - [`skeleton`] - Bone hierarchy with bind pose
//! - [`channel`] - Raw and uniform keyframe channels
//! - [`animation`] - Encoded clip representation
//! - [`codec`] - Pluggable lossy compression of uniform channels
//! - [`formats`] - Binary pack container and sorted-key layout

pub mod animation;
pub mod channel;
pub mod codec;
pub mod formats;
pub mod skeleton;

pub use animation::{AnimationPayload, EncodedAnimation, RootMotionExtents};
pub use channel::{KeyFrame, LocalTransform, RawChannel, UniformChannel, ROOT_MOTION_CHANNEL};
pub use codec::{AnimationCodec, CodecError, CodecId, CodecSettings, QuantizedCodec};
pub use formats::{
    AnimationKey, ContainerError, ForwardCursor, PackReader, PackWriter, SectionKind, SortedKeys,
    PACK_EXT, PACK_MAGIC, PACK_VERSION,
};
pub use skeleton::{Bone, Skeleton};
