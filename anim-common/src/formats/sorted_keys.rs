//! Sorted-key layout
//!
//! Every key of every track is flattened into one list per component
//! (translation, rotation, scale) and tagged with the time of the key before
//! it on the same track (-1 for a track's first key). Sorting by that tag
//! puts each key right where a forward-playing sampler first needs it as the
//! "next" key, so replay is a single cursor walk with no per-track search.
//!
//! ```text
//! track_count u32
//! 3 × list:  key_count u32
//!            key_count × { track u32, prev_time f32, time f32, value }
//! value = 3 × f32 (translation, scale) or 4 × f32 (rotation, xyzw)
//! ```

use glam::{Quat, Vec3};

use crate::channel::{blend_factor, Interpolate, KeyFrame, LocalTransform, RawChannel};

use super::serialization::{ByteReader, ByteWriter};

/// A key tagged for forward replay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationKey<T> {
    /// Channel index (0 = root motion)
    pub track: u32,
    /// Time of the previous key on the same track, -1.0 for the first
    pub prev_time: f32,
    pub time: f32,
    pub value: T,
}

/// Keys of a whole clip, ordered for single-pass replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedKeys {
    pub track_count: u32,
    pub translations: Vec<AnimationKey<Vec3>>,
    pub rotations: Vec<AnimationKey<Quat>>,
    pub scales: Vec<AnimationKey<Vec3>>,
}

fn flatten<T: Copy>(
    channels: &[RawChannel],
    track_of: impl Fn(&RawChannel) -> &[KeyFrame<T>],
) -> Vec<AnimationKey<T>> {
    let mut keys = Vec::new();
    for (track, channel) in channels.iter().enumerate() {
        let mut prev_time = -1.0;
        for key in track_of(channel) {
            keys.push(AnimationKey {
                track: track as u32,
                prev_time,
                time: key.frame_time,
                value: key.value,
            });
            prev_time = key.frame_time;
        }
    }
    // Stable: keys of one track keep their relative order
    keys.sort_by(|a, b| {
        a.prev_time
            .total_cmp(&b.prev_time)
            .then(a.track.cmp(&b.track))
    });
    keys
}

impl SortedKeys {
    /// Flatten and order the keys of a clip's channels
    pub fn from_channels(channels: &[RawChannel]) -> Self {
        Self {
            track_count: channels.len() as u32,
            translations: flatten(channels, |c| c.translations.as_slice()),
            rotations: flatten(channels, |c| c.rotations.as_slice()),
            scales: flatten(channels, |c| c.scales.as_slice()),
        }
    }

    pub fn key_count(&self) -> usize {
        self.translations.len() + self.rotations.len() + self.scales.len()
    }

    /// Serialized size in bytes
    pub fn byte_len(&self) -> usize {
        const KEY_HEADER: usize = 12;
        4 + 3 * 4
            + self.translations.len() * (KEY_HEADER + 12)
            + self.rotations.len() * (KEY_HEADER + 16)
            + self.scales.len() * (KEY_HEADER + 12)
    }

    pub fn write(&self, out: &mut ByteWriter) {
        out.u32(self.track_count);
        write_list(out, &self.translations, ByteWriter::vec3);
        write_list(out, &self.rotations, ByteWriter::quat);
        write_list(out, &self.scales, ByteWriter::vec3);
    }

    /// `None` on truncated input or a key pointing past `track_count`
    pub fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        let track_count = input.u32()?;
        let keys = Self {
            track_count,
            translations: read_list(input, 24, |r| r.vec3())?,
            rotations: read_list(input, 28, |r| r.quat())?,
            scales: read_list(input, 24, |r| r.vec3())?,
        };
        let tracks_valid = keys.translations.iter().all(|k| k.track < track_count)
            && keys.rotations.iter().all(|k| k.track < track_count)
            && keys.scales.iter().all(|k| k.track < track_count);
        tracks_valid.then_some(keys)
    }

    /// Start a replay at time 0
    pub fn cursor(&self) -> ForwardCursor<'_> {
        ForwardCursor::new(self)
    }
}

fn write_list<T: Copy>(
    out: &mut ByteWriter,
    keys: &[AnimationKey<T>],
    write_value: fn(&mut ByteWriter, T),
) {
    out.u32(keys.len() as u32);
    for key in keys {
        out.u32(key.track);
        out.f32(key.prev_time);
        out.f32(key.time);
        write_value(out, key.value);
    }
}

fn read_list<'a, T>(
    input: &mut ByteReader<'a>,
    key_size: usize,
    read_value: impl Fn(&mut ByteReader<'a>) -> Option<T>,
) -> Option<Vec<AnimationKey<T>>> {
    let count = input.count(key_size)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(AnimationKey {
            track: input.u32()?,
            prev_time: input.f32()?,
            time: input.f32()?,
            value: read_value(input)?,
        });
    }
    Some(keys)
}

/// Current and next key of one track during replay
#[derive(Debug, Clone, Copy)]
struct Bracket<T> {
    current: Option<KeyFrame<T>>,
    next: Option<KeyFrame<T>>,
}

/// Replay state over one key list
#[derive(Debug, Clone)]
struct ListCursor<T> {
    position: usize,
    brackets: Vec<Bracket<T>>,
}

impl<T: Interpolate> ListCursor<T> {
    fn new(track_count: usize) -> Self {
        Self {
            position: 0,
            brackets: vec![
                Bracket {
                    current: None,
                    next: None,
                };
                track_count
            ],
        }
    }

    fn reset(&mut self) {
        self.position = 0;
        for bracket in &mut self.brackets {
            bracket.current = None;
            bracket.next = None;
        }
    }

    /// Consume every key whose predecessor lies at or before `time`
    fn advance(&mut self, keys: &[AnimationKey<T>], time: f32) {
        while let Some(key) = keys.get(self.position) {
            if key.prev_time > time {
                break;
            }
            if let Some(bracket) = self.brackets.get_mut(key.track as usize) {
                bracket.current = bracket.next;
                bracket.next = Some(KeyFrame::new(key.time, key.value));
            }
            self.position += 1;
        }
    }

    fn sample(&self, track: usize, time: f32) -> Option<T> {
        let bracket = self.brackets.get(track)?;
        match (bracket.current, bracket.next) {
            (Some(current), Some(next)) => Some(current.value.interpolate(
                next.value,
                blend_factor(current.frame_time, next.frame_time, time),
            )),
            (None, Some(only)) | (Some(only), None) => Some(only.value),
            (None, None) => None,
        }
    }
}

/// Single forward cursor replaying [`SortedKeys`]
///
/// Sampling at non-decreasing times walks each key list once. Sampling at an
/// earlier time than the previous call restarts from the beginning, which is
/// what happens when a clip loops.
#[derive(Debug, Clone)]
pub struct ForwardCursor<'a> {
    keys: &'a SortedKeys,
    last_time: f32,
    translations: ListCursor<Vec3>,
    rotations: ListCursor<Quat>,
    scales: ListCursor<Vec3>,
}

impl<'a> ForwardCursor<'a> {
    pub fn new(keys: &'a SortedKeys) -> Self {
        let tracks = keys.track_count as usize;
        Self {
            keys,
            last_time: 0.0,
            translations: ListCursor::new(tracks),
            rotations: ListCursor::new(tracks),
            scales: ListCursor::new(tracks),
        }
    }

    fn seek(&mut self, time: f32) {
        if time < self.last_time {
            self.translations.reset();
            self.rotations.reset();
            self.scales.reset();
        }
        self.last_time = time;
        self.translations.advance(&self.keys.translations, time);
        self.rotations.advance(&self.keys.rotations, time);
        self.scales.advance(&self.keys.scales, time);
    }

    /// Local transform of every track at normalized `time`
    ///
    /// Tracks without keys report the identity component.
    pub fn sample(&mut self, time: f32) -> Vec<LocalTransform> {
        let time = time.clamp(0.0, 1.0);
        self.seek(time);
        (0..self.keys.track_count as usize)
            .map(|track| LocalTransform {
                translation: self
                    .translations
                    .sample(track, time)
                    .unwrap_or(Vec3::ZERO),
                rotation: self.rotations.sample(track, time).unwrap_or(Quat::IDENTITY),
                scale: self.scales.sample(track, time).unwrap_or(Vec3::ONE),
            })
            .collect()
    }
}
