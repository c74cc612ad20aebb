//! Uniform resampling of keyed channels
//!
//! All tracks of all channels end up on one timeline of `M` evenly spaced
//! samples, `M = max(2, largest key count)`. Translation and scale are
//! interpolated linearly, rotation with normalized shortest-arc slerp.

use glam::{Quat, Vec3};
use nether_anim_common::channel::{blend_factor, Interpolate};
use nether_anim_common::{KeyFrame, RawChannel, UniformChannel};

/// Sample a sorted track at normalized `time`
///
/// Times before the first key or after the last clamp to those keys. Equal
/// key times resolve to the earlier key. `None` only for an empty track.
pub fn sample_track<T: Interpolate>(keys: &[KeyFrame<T>], time: f32) -> Option<T> {
    let first = keys.first()?;
    // First key at or after `time`
    let next = keys.partition_point(|k| k.frame_time < time);
    if next == 0 {
        return Some(first.value);
    }
    let Some(b) = keys.get(next) else {
        return keys.last().map(|k| k.value);
    };
    let a = &keys[next - 1];
    Some(
        a.value
            .interpolate(b.value, blend_factor(a.frame_time, b.frame_time, time)),
    )
}

pub fn sample_vec3(keys: &[KeyFrame<Vec3>], time: f32) -> Option<Vec3> {
    sample_track(keys, time)
}

pub fn sample_quat(keys: &[KeyFrame<Quat>], time: f32) -> Option<Quat> {
    sample_track(keys, time)
}

/// Walk a uniform grid of `sample_count` times with a forward cursor
fn resample_track<T: Interpolate>(keys: &[KeyFrame<T>], sample_count: usize, empty: T) -> Vec<T> {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return vec![empty; sample_count];
    };

    let mut out = Vec::with_capacity(sample_count);
    out.push(first.value);

    let mut cursor = 0;
    for i in 1..sample_count - 1 {
        let time = UniformChannel::frame_time(i, sample_count);
        while cursor + 2 < keys.len() && keys[cursor + 1].frame_time < time {
            cursor += 1;
        }
        let value = match keys.get(cursor + 1) {
            Some(b) => {
                let a = &keys[cursor];
                a.value
                    .interpolate(b.value, blend_factor(a.frame_time, b.frame_time, time))
            }
            None => first.value,
        };
        out.push(value);
    }

    out.push(last.value);
    out
}

/// Number of uniform samples needed to keep every input key's density
pub fn uniform_sample_count(channels: &[RawChannel]) -> usize {
    channels
        .iter()
        .map(RawChannel::max_key_count)
        .max()
        .unwrap_or(0)
        .max(2)
}

/// Resample every channel onto the shared uniform timeline
pub fn resample_channels(channels: &[RawChannel]) -> Vec<UniformChannel> {
    let sample_count = uniform_sample_count(channels);
    channels
        .iter()
        .map(|channel| UniformChannel {
            translations: resample_track(&channel.translations, sample_count, Vec3::ZERO),
            rotations: resample_track(&channel.rotations, sample_count, Quat::IDENTITY),
            scales: resample_track(&channel.scales, sample_count, Vec3::ONE),
        })
        .collect()
}
