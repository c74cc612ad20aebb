//! Binary formats of the animation pipeline
//!
//! - [`container`]: the seekable `.ncanim` pack (header + section table)
//! - [`sections`]: skeleton and clip section payloads
//! - [`sorted_keys`]: exact keys ordered for single-pass forward replay
//! - [`quantize`]: f16 and smallest-three quaternion packing used by codecs
//!
//! All multi-byte values are little-endian.

pub mod container;
pub mod quantize;
pub mod sections;
mod serialization;
pub mod sorted_keys;

pub use container::*;
pub use sections::{read_clip, read_skeleton, write_clip, write_skeleton};
pub use serialization::{ByteReader, ByteWriter};
pub use sorted_keys::*;
