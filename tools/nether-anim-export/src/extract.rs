//! Per-bone channel extraction
//!
//! Turns a clip's node curves into one [`RawChannel`] per skeleton bone,
//! preceded by the root-motion channel. Key times are normalized to [0, 1]
//! and every track is guaranteed to start at 0.0 and end at 1.0.

use glam::{Quat, Vec3};
use hashbrown::HashMap;
use nether_anim_common::channel::{hold, is_unit_quat};
use nether_anim_common::{KeyFrame, LocalTransform, RawChannel, Skeleton};

use crate::diagnostics::Diagnostics;
use crate::source::{NodeCurve, SourceClip, SourceKey};

/// Ticks-per-second values below this are treated as unset
const MIN_TICKS_PER_SECOND: f32 = 1e-4;

/// Smallest clip duration handed to the encoder, seconds
pub const MIN_DURATION_SECONDS: f32 = 1e-4;

/// Clip length in seconds
///
/// A missing tick rate counts as 1 tick per second. A non-positive result is
/// clamped to [`MIN_DURATION_SECONDS`] and reported.
pub fn clip_duration_seconds(clip: &SourceClip, diagnostics: &mut Diagnostics) -> f32 {
    let ticks_per_second = if clip.ticks_per_second.is_finite()
        && clip.ticks_per_second >= MIN_TICKS_PER_SECOND
    {
        clip.ticks_per_second
    } else {
        1.0
    };
    let seconds = clip.duration / ticks_per_second;
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        diagnostics.data_quality(format!(
            "Clip '{}' has non-positive duration {}; clamped to {}s",
            clip.name, clip.duration, MIN_DURATION_SECONDS
        ));
        MIN_DURATION_SECONDS
    }
}

/// Tick span used to normalize key times
///
/// Falls back to the last key time when the clip declares no duration.
fn normalization_span(clip: &SourceClip) -> f32 {
    if clip.duration.is_finite() && clip.duration > 0.0 {
        return clip.duration;
    }
    clip.curves
        .iter()
        .filter_map(NodeCurve::last_time)
        .reduce(f32::max)
        .filter(|t| *t > 0.0)
        .unwrap_or(1.0)
}

/// Problems found while normalizing one track
#[derive(Debug, Default)]
struct TrackReport {
    dropped: usize,
    unsorted: bool,
}

/// Normalize times, drop non-finite keys, sort, and pin both ends
fn normalize_track<T: Copy>(
    keys: &[SourceKey<T>],
    span: f32,
    finite: impl Fn(&T) -> bool,
    report: &mut TrackReport,
) -> Vec<KeyFrame<T>> {
    let mut out: Vec<KeyFrame<T>> = Vec::with_capacity(keys.len() + 2);
    for key in keys {
        if !key.time.is_finite() || !finite(&key.value) {
            report.dropped += 1;
            continue;
        }
        out.push(KeyFrame::new((key.time / span).clamp(0.0, 1.0), key.value));
    }

    if out.windows(2).any(|w| w[1].frame_time < w[0].frame_time) {
        report.unsorted = true;
        out.sort_by(|a, b| a.frame_time.total_cmp(&b.frame_time));
    }

    if let Some(first) = out.first().copied()
        && first.frame_time > 0.0
    {
        out.insert(0, KeyFrame::new(0.0, first.value));
    }
    if let Some(last) = out.last().copied()
        && last.frame_time < 1.0
    {
        out.push(KeyFrame::new(1.0, last.value));
    }
    out
}

/// Bring every rotation to unit length; returns (renormalized, reset)
fn normalize_rotations(keys: &mut [KeyFrame<Quat>]) -> (usize, usize) {
    let mut renormalized = 0;
    let mut reset = 0;
    for key in keys {
        if is_unit_quat(key.value) {
            continue;
        }
        let length = key.value.length();
        if length.is_finite() && length > f32::EPSILON {
            key.value = key.value.normalize();
            renormalized += 1;
        } else {
            key.value = Quat::IDENTITY;
            reset += 1;
        }
    }
    (renormalized, reset)
}

/// Extract `skeleton.bone_count() + 1` channels from `clip`
///
/// Channel 0 (root motion) is an identity hold until root motion is
/// separated. Bones without a curve, and curves missing a track, hold the
/// bone's bind pose and are recorded as missing source data.
pub fn extract_channels(
    clip: &SourceClip,
    skeleton: &Skeleton,
    diagnostics: &mut Diagnostics,
) -> Vec<RawChannel> {
    let span = normalization_span(clip);
    let mut channels = Vec::with_capacity(skeleton.bone_count() + 1);
    channels.push(RawChannel::hold(LocalTransform::IDENTITY));

    let mut curves: HashMap<&str, &NodeCurve> = HashMap::with_capacity(clip.curves.len());
    let mut ignored = 0usize;
    for curve in &clip.curves {
        if skeleton.bone_index(&curve.node).is_none() {
            ignored += 1;
            continue;
        }
        if curves.insert(curve.node.as_str(), curve).is_some() {
            diagnostics.data_quality(format!(
                "Clip '{}' has several curves for '{}'; using the last",
                clip.name, curve.node
            ));
        }
    }
    if ignored > 0 {
        tracing::debug!(
            "Clip '{}': {} curve(s) target nodes outside the skeleton",
            clip.name,
            ignored
        );
    }

    let mut held_bones: Vec<&str> = Vec::new();
    let mut held_tracks = 0usize;
    let mut dropped = 0usize;
    let mut unsorted = 0usize;
    let mut renormalized = 0usize;
    let mut reset = 0usize;

    for bone in skeleton.bones() {
        let Some(curve) = curves.get(bone.name.as_str()) else {
            held_bones.push(&bone.name);
            channels.push(RawChannel::hold(bone.bind));
            continue;
        };

        let mut report = TrackReport::default();
        let mut translations =
            normalize_track(&curve.translations, span, |v: &Vec3| v.is_finite(), &mut report);
        let mut rotations =
            normalize_track(&curve.rotations, span, |q: &Quat| q.is_finite(), &mut report);
        let mut scales =
            normalize_track(&curve.scales, span, |v: &Vec3| v.is_finite(), &mut report);
        dropped += report.dropped;
        unsorted += usize::from(report.unsorted);

        let (r, z) = normalize_rotations(&mut rotations);
        renormalized += r;
        reset += z;

        if translations.is_empty() {
            translations = hold(bone.bind.translation);
            held_tracks += 1;
        }
        if rotations.is_empty() {
            rotations = hold(bone.bind.rotation);
            held_tracks += 1;
        }
        if scales.is_empty() {
            scales = hold(bone.bind.scale);
            held_tracks += 1;
        }

        channels.push(RawChannel {
            translations,
            rotations,
            scales,
        });
    }

    let clip_name = &clip.name;
    if !held_bones.is_empty() {
        diagnostics.missing_source(format!(
            "Clip '{clip_name}': {} bone(s) without a curve hold their bind pose: {:?}",
            held_bones.len(),
            held_bones
        ));
    }
    if held_tracks > 0 {
        diagnostics.missing_source(format!(
            "Clip '{clip_name}': {held_tracks} missing track(s) hold the bind pose"
        ));
    }
    if dropped > 0 {
        diagnostics.data_quality(format!(
            "Clip '{clip_name}': dropped {dropped} key(s) with non-finite time or value"
        ));
    }
    if unsorted > 0 {
        diagnostics.data_quality(format!(
            "Clip '{clip_name}': sorted {unsorted} track(s) with out-of-order keys"
        ));
    }
    if renormalized > 0 {
        diagnostics.data_quality(format!(
            "Clip '{clip_name}': renormalized {renormalized} non-unit rotation key(s)"
        ));
    }
    if reset > 0 {
        diagnostics.data_quality(format!(
            "Clip '{clip_name}': replaced {reset} degenerate rotation key(s) with identity"
        ));
    }

    channels
}
