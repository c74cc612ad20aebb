//! Value quantizers used by lossy animation codecs
//!
//! # Smallest-three quaternions
//!
//! The largest-magnitude component is dropped (it is recovered from the unit
//! length constraint) and forced positive, since `q` and `-q` are the same
//! rotation. The other three lie in [-1/√2, 1/√2] and are stored with
//! `bits` bits each, followed by the 2-bit index of the dropped component:
//!
//! ```text
//! 32-bit: [a:10][b:10][c:10][idx:2]
//! 48-bit: [a:15][b:15][c:15][idx:2] (top bit unused)
//! ```

use glam::{Quat, Vec3};
use half::f16;

/// Bits per component of the compact quaternion form
pub const QUAT32_COMPONENT_BITS: u32 = 10;

/// Bits per component of the wide quaternion form
pub const QUAT48_COMPONENT_BITS: u32 = 15;

/// Index of the largest-magnitude component (x = 0 … w = 3)
fn largest_component(q: [f32; 4]) -> usize {
    let mut idx = 0;
    for i in 1..4 {
        if q[i].abs() > q[idx].abs() {
            idx = i;
        }
    }
    idx
}

/// Pack a unit quaternion into `3 * bits + 2` bits
pub fn encode_smallest_three(q: Quat, bits: u32) -> u64 {
    let q = q.to_array();
    let idx = largest_component(q);
    let sign = if q[idx] < 0.0 { -1.0 } else { 1.0 };

    let max = ((1u64 << bits) - 1) as f32;
    let half_range = max / 2.0;
    let sqrt2 = std::f32::consts::SQRT_2;

    let mut packed = 0u64;
    for (i, &component) in q.iter().enumerate() {
        if i == idx {
            continue;
        }
        let quantized = ((component * sign * sqrt2 + 1.0) * half_range)
            .round()
            .clamp(0.0, max) as u64;
        packed = (packed << bits) | quantized;
    }
    (packed << 2) | idx as u64
}

/// Inverse of [`encode_smallest_three`]
pub fn decode_smallest_three(packed: u64, bits: u32) -> Quat {
    let idx = (packed & 0x3) as usize;
    let mask = (1u64 << bits) - 1;
    let half_range = mask as f32 / 2.0;
    let sqrt2_inv = std::f32::consts::FRAC_1_SQRT_2;

    let dequantize =
        |shift: u32| ((((packed >> shift) & mask) as f32 / half_range) - 1.0) * sqrt2_inv;
    let a = dequantize(2 + 2 * bits);
    let b = dequantize(2 + bits);
    let c = dequantize(2);

    let largest = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();
    let q = match idx {
        0 => [largest, a, b, c],
        1 => [a, largest, b, c],
        2 => [a, b, largest, c],
        _ => [a, b, c, largest],
    };
    Quat::from_array(q).normalize()
}

pub fn encode_quat32(q: Quat) -> u32 {
    encode_smallest_three(q, QUAT32_COMPONENT_BITS) as u32
}

pub fn decode_quat32(packed: u32) -> Quat {
    decode_smallest_three(packed as u64, QUAT32_COMPONENT_BITS)
}

/// Six little-endian bytes
pub fn encode_quat48(q: Quat) -> [u8; 6] {
    let packed = encode_smallest_three(q, QUAT48_COMPONENT_BITS);
    let bytes = packed.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
}

pub fn decode_quat48(bytes: [u8; 6]) -> Quat {
    let mut wide = [0u8; 8];
    wide[..6].copy_from_slice(&bytes);
    decode_smallest_three(u64::from_le_bytes(wide), QUAT48_COMPONENT_BITS)
}

pub fn encode_vec3_f16(v: Vec3) -> [u16; 3] {
    [
        f16::from_f32(v.x).to_bits(),
        f16::from_f32(v.y).to_bits(),
        f16::from_f32(v.z).to_bits(),
    ]
}

pub fn decode_vec3_f16(bits: [u16; 3]) -> Vec3 {
    Vec3::new(
        f16::from_bits(bits[0]).to_f32(),
        f16::from_bits(bits[1]).to_f32(),
        f16::from_bits(bits[2]).to_f32(),
    )
}

/// Largest distance between points at `shell_distance` along each local
/// axis, rotated by `a` and by `b`
///
/// Measures rotation error the way it shows up on skinned geometry.
pub fn rotation_shell_error(a: Quat, b: Quat, shell_distance: f32) -> f32 {
    [Vec3::X, Vec3::Y, Vec3::Z]
        .into_iter()
        .map(|axis| {
            let point = axis * shell_distance;
            (a * point).distance(b * point)
        })
        .fold(0.0, f32::max)
}
