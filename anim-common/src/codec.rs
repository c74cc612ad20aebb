//! Lossy compression of uniform channels
//!
//! [`AnimationCodec`] is the seam for pluggable compressors. The crate ships
//! [`QuantizedCodec`], which stores each track in the cheapest of a few fixed
//! representations that stays within the configured error tolerance.
//!
//! # QuantizedCodec blob
//! ```text
//! version u8 = 1
//! channel_count u32, sample_count u32
//! channel_count × { translation track, rotation track, scale track }
//!
//! vector track:   format u8 (0 constant, 1 f16, 2 f32), then
//!                 3×f32 | sample_count × 3×u16 | sample_count × 3×f32
//! rotation track: format u8 (0 constant, 1 quat32, 2 quat48, 3 f32), then
//!                 4×f32 | sample_count × u32 | sample_count × 6 bytes
//!                 | sample_count × 4×f32
//! ```

use glam::{Quat, Vec3};

use crate::channel::UniformChannel;
use crate::formats::quantize::{
    decode_quat32, decode_quat48, decode_vec3_f16, encode_quat32, encode_quat48,
    encode_vec3_f16, rotation_shell_error,
};
use crate::formats::{ByteReader, ByteWriter};

/// Identifies the codec that produced a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecId(pub u32);

impl CodecId {
    pub const QUANTIZED: Self = Self(1);

    pub fn name(self) -> &'static str {
        match self {
            Self::QUANTIZED => "quantized",
            _ => "custom",
        }
    }
}

/// Errors raised by a codec
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("no channels to compress")]
    Empty,

    #[error("uniform channels need at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("channel {channel} has {found} samples, expected {expected}")]
    SampleCountMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },

    #[error("channel {channel} contains a non-finite value")]
    NonFinite { channel: usize },

    #[error("invalid codec settings: {0}")]
    InvalidSettings(&'static str),

    #[error("compressed blob is truncated")]
    Truncated,

    #[error("unknown format tag {0} in compressed blob")]
    UnknownFormat(u8),

    #[error("compressed blob declares {channels} channels x {samples} samples, above the decode limit")]
    TooLarge { channels: usize, samples: usize },
}

/// Compressor / decompressor of uniformly sampled channels
pub trait AnimationCodec: Send + Sync {
    fn id(&self) -> CodecId;

    /// Either the whole clip compresses, or nothing is produced
    fn compress(&self, channels: &[UniformChannel]) -> Result<Vec<u8>, CodecError>;

    fn decompress(&self, blob: &[u8]) -> Result<Vec<UniformChannel>, CodecError>;
}

/// Tolerances of [`QuantizedCodec`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSettings {
    /// Maximum translation error, scene units
    pub position_tolerance: f32,
    /// Maximum displacement of a point at `shell_distance`, scene units
    pub rotation_tolerance: f32,
    pub scale_tolerance: f32,
    /// Distance from the joint at which rotation error is measured
    pub shell_distance: f32,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            position_tolerance: 1e-4,
            rotation_tolerance: 1e-4,
            scale_tolerance: 1e-4,
            shell_distance: 3.0,
        }
    }
}

impl CodecSettings {
    pub fn validate(&self) -> Result<(), CodecError> {
        let tolerances = [
            self.position_tolerance,
            self.rotation_tolerance,
            self.scale_tolerance,
        ];
        if tolerances.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(CodecError::InvalidSettings(
                "tolerances must be finite and non-negative",
            ));
        }
        if !self.shell_distance.is_finite() || self.shell_distance <= 0.0 {
            return Err(CodecError::InvalidSettings(
                "shell distance must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Look up a built-in codec able to decode blobs tagged `id`
pub fn builtin_codec(id: CodecId) -> Option<Box<dyn AnimationCodec>> {
    match id {
        CodecId::QUANTIZED => Some(Box::new(QuantizedCodec::default())),
        _ => None,
    }
}

const BLOB_VERSION: u8 = 1;

/// Upper bound on `channel_count * sample_count` accepted by decompression
pub const MAX_DECODED_SAMPLES: usize = 1 << 22;

/// Representation chosen for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VectorFormat {
    Constant = 0,
    Half = 1,
    Full = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RotationFormat {
    Constant = 0,
    Quat32 = 1,
    Quat48 = 2,
    Full = 3,
}

/// Reference lossy codec built on f16 and smallest-three quantization
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizedCodec {
    pub settings: CodecSettings,
}

impl QuantizedCodec {
    pub fn new(settings: CodecSettings) -> Self {
        Self { settings }
    }

    fn check_input(&self, channels: &[UniformChannel]) -> Result<usize, CodecError> {
        self.settings.validate()?;
        let first = channels.first().ok_or(CodecError::Empty)?;
        let expected = first.translations.len();
        if expected < 2 {
            return Err(CodecError::TooFewSamples(expected));
        }
        for (channel, c) in channels.iter().enumerate() {
            for found in [c.translations.len(), c.rotations.len(), c.scales.len()] {
                if found != expected {
                    return Err(CodecError::SampleCountMismatch {
                        channel,
                        expected,
                        found,
                    });
                }
            }
            let finite = c.translations.iter().all(|v| v.is_finite())
                && c.rotations.iter().all(|q| q.is_finite())
                && c.scales.iter().all(|v| v.is_finite());
            if !finite {
                return Err(CodecError::NonFinite { channel });
            }
        }
        Ok(expected)
    }
}

fn max_vector_error(samples: &[Vec3], decode: impl Fn(Vec3) -> Vec3) -> f32 {
    samples
        .iter()
        .map(|&v| (decode(v) - v).length())
        .fold(0.0, f32::max)
}

fn choose_vector_format(samples: &[Vec3], tolerance: f32) -> VectorFormat {
    let first = samples[0];
    if max_vector_error(samples, |_| first) <= tolerance {
        VectorFormat::Constant
    } else if max_vector_error(samples, |v| decode_vec3_f16(encode_vec3_f16(v))) <= tolerance {
        VectorFormat::Half
    } else {
        VectorFormat::Full
    }
}

fn choose_rotation_format(samples: &[Quat], settings: &CodecSettings) -> RotationFormat {
    let error = |decode: &dyn Fn(Quat) -> Quat| {
        samples
            .iter()
            .map(|&q| rotation_shell_error(q, decode(q), settings.shell_distance))
            .fold(0.0, f32::max)
    };
    let first = samples[0];
    if error(&|_| first) <= settings.rotation_tolerance {
        RotationFormat::Constant
    } else if error(&|q| decode_quat32(encode_quat32(q))) <= settings.rotation_tolerance {
        RotationFormat::Quat32
    } else if error(&|q| decode_quat48(encode_quat48(q))) <= settings.rotation_tolerance {
        RotationFormat::Quat48
    } else {
        RotationFormat::Full
    }
}

fn write_vector_track(out: &mut ByteWriter, samples: &[Vec3], tolerance: f32) {
    let format = choose_vector_format(samples, tolerance);
    out.u8(format as u8);
    match format {
        VectorFormat::Constant => out.vec3(samples[0]),
        VectorFormat::Half => {
            for &v in samples {
                for bits in encode_vec3_f16(v) {
                    out.u16(bits);
                }
            }
        }
        VectorFormat::Full => samples.iter().for_each(|&v| out.vec3(v)),
    }
}

fn write_rotation_track(out: &mut ByteWriter, samples: &[Quat], settings: &CodecSettings) {
    let format = choose_rotation_format(samples, settings);
    out.u8(format as u8);
    match format {
        RotationFormat::Constant => out.quat(samples[0]),
        RotationFormat::Quat32 => samples.iter().for_each(|&q| out.u32(encode_quat32(q))),
        RotationFormat::Quat48 => samples.iter().for_each(|&q| out.bytes(&encode_quat48(q))),
        RotationFormat::Full => samples.iter().for_each(|&q| out.quat(q)),
    }
}

fn read_vector_track(input: &mut ByteReader<'_>, count: usize) -> Result<Vec<Vec3>, CodecError> {
    let tag = input.u8().ok_or(CodecError::Truncated)?;
    match tag {
        0 => Ok(vec![input.vec3().ok_or(CodecError::Truncated)?; count]),
        1 => (0..count)
            .map(|_| {
                let bits = [input.u16(), input.u16(), input.u16()];
                match bits {
                    [Some(x), Some(y), Some(z)] => Ok(decode_vec3_f16([x, y, z])),
                    _ => Err(CodecError::Truncated),
                }
            })
            .collect(),
        2 => (0..count)
            .map(|_| input.vec3().ok_or(CodecError::Truncated))
            .collect(),
        other => Err(CodecError::UnknownFormat(other)),
    }
}

fn read_rotation_track(input: &mut ByteReader<'_>, count: usize) -> Result<Vec<Quat>, CodecError> {
    let tag = input.u8().ok_or(CodecError::Truncated)?;
    match tag {
        0 => Ok(vec![input.quat().ok_or(CodecError::Truncated)?; count]),
        1 => (0..count)
            .map(|_| input.u32().map(decode_quat32).ok_or(CodecError::Truncated))
            .collect(),
        2 => (0..count)
            .map(|_| {
                let raw = input.take(6).ok_or(CodecError::Truncated)?;
                let mut bytes = [0u8; 6];
                bytes.copy_from_slice(raw);
                Ok(decode_quat48(bytes))
            })
            .collect(),
        3 => (0..count)
            .map(|_| input.quat().ok_or(CodecError::Truncated))
            .collect(),
        other => Err(CodecError::UnknownFormat(other)),
    }
}

impl AnimationCodec for QuantizedCodec {
    fn id(&self) -> CodecId {
        CodecId::QUANTIZED
    }

    fn compress(&self, channels: &[UniformChannel]) -> Result<Vec<u8>, CodecError> {
        let sample_count = self.check_input(channels)?;

        let mut out = ByteWriter::new();
        out.u8(BLOB_VERSION);
        out.u32(channels.len() as u32);
        out.u32(sample_count as u32);
        for channel in channels {
            write_vector_track(
                &mut out,
                &channel.translations,
                self.settings.position_tolerance,
            );
            write_rotation_track(&mut out, &channel.rotations, &self.settings);
            write_vector_track(&mut out, &channel.scales, self.settings.scale_tolerance);
        }
        Ok(out.into_bytes())
    }

    fn decompress(&self, blob: &[u8]) -> Result<Vec<UniformChannel>, CodecError> {
        let mut input = ByteReader::new(blob);
        let version = input.u8().ok_or(CodecError::Truncated)?;
        if version != BLOB_VERSION {
            return Err(CodecError::UnknownFormat(version));
        }
        // Every channel needs at least three format tags plus constants
        let channel_count = input.count(3 + 40).ok_or(CodecError::Truncated)?;
        let sample_count = input.u32().ok_or(CodecError::Truncated)? as usize;
        if sample_count < 2 {
            return Err(CodecError::TooFewSamples(sample_count));
        }
        if channel_count == 0 {
            return Err(CodecError::Empty);
        }
        // Constant tracks expand without consuming input
        let too_large = CodecError::TooLarge {
            channels: channel_count,
            samples: sample_count,
        };
        match channel_count.checked_mul(sample_count) {
            Some(total) if total <= MAX_DECODED_SAMPLES => {}
            _ => return Err(too_large),
        }

        let mut channels = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            channels.push(UniformChannel {
                translations: read_vector_track(&mut input, sample_count)?,
                rotations: read_rotation_track(&mut input, sample_count)?,
                scales: read_vector_track(&mut input, sample_count)?,
            });
        }
        if !input.is_exhausted() {
            return Err(CodecError::Truncated);
        }
        Ok(channels)
    }
}
