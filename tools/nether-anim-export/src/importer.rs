//! Import entry points
//!
//! Runs the pipeline for one clip: extract channels, separate root motion,
//! then encode either as sorted keys or through the quantized codec.

use hashbrown::HashSet;
use nether_anim_common::{
    CodecError, CodecSettings, EncodedAnimation, QuantizedCodec, Skeleton,
};
use rayon::prelude::*;

use crate::diagnostics::Diagnostics;
use crate::encode::{encode_compressed, encode_sorted_keys};
use crate::extract::{clip_duration_seconds, extract_channels};
use crate::resample::resample_channels;
use crate::root_motion::{separate_root_motion, RootMotionMask};
use crate::skeleton_builder::build_skeleton;
use crate::source::{SourceClip, SourceScene};

/// How a clip is encoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodingMode {
    /// Exact keys in forward-scan order, no resampling
    SortedKeys,
    /// Uniform resampling followed by [`QuantizedCodec`]
    Quantized(CodecSettings),
}

impl Default for EncodingMode {
    fn default() -> Self {
        Self::Quantized(CodecSettings::default())
    }
}

/// Per-clip import options
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImportSettings {
    pub root_motion: RootMotionMask,
    pub encoding: EncodingMode,
}

/// Whether a clip can drive a skeleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    MissingClip,
    /// The clip has no curves, or targets nodes that are not bones
    Incompatible { unknown_bones: Vec<String> },
}

/// Import failures that leave no usable clip
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("clip '{clip}' does not match the skeleton (unknown bones: {unknown_bones:?})")]
    IncompatibleSkeleton {
        clip: String,
        unknown_bones: Vec<String>,
    },

    #[error("failed to encode clip '{clip}'")]
    Encoding {
        clip: String,
        #[source]
        source: CodecError,
    },
}

/// An encoded clip with the issues recovered while importing it
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedClip {
    pub animation: EncodedAnimation,
    pub diagnostics: Diagnostics,
}

/// Build the scene's skeleton; `None` if the scene has no bones
pub fn import_skeleton(scene: &SourceScene) -> Option<Skeleton> {
    build_skeleton(scene)
}

/// Sanitized names of every clip, in scene order
pub fn animation_names(scene: &SourceScene) -> Vec<String> {
    scene
        .clips
        .iter()
        .map(|clip| {
            if !(clip.duration.is_finite() && clip.duration > 0.0) {
                tracing::warn!(
                    "Clip '{}' has non-positive duration {}",
                    clip.name,
                    clip.duration
                );
            }
            clip.sanitized_name().to_string()
        })
        .collect()
}

fn clip_compatibility(clip: &SourceClip, skeleton: &Skeleton) -> Compatibility {
    if clip.curves.is_empty() {
        return Compatibility::Incompatible {
            unknown_bones: Vec::new(),
        };
    }
    // First occurrence order, each name once
    let mut seen: HashSet<&str> = HashSet::new();
    let unknown_bones: Vec<String> = clip
        .curves
        .iter()
        .filter(|c| skeleton.bone_index(&c.node).is_none() && seen.insert(c.node.as_str()))
        .map(|c| c.node.clone())
        .collect();
    if unknown_bones.is_empty() {
        Compatibility::Compatible
    } else {
        Compatibility::Incompatible { unknown_bones }
    }
}

/// Check that every curve of `clip_name` targets a bone of `skeleton`
pub fn check_compatibility(
    scene: &SourceScene,
    clip_name: &str,
    skeleton: &Skeleton,
) -> Compatibility {
    match scene.clip(clip_name) {
        Some(clip) => clip_compatibility(clip, skeleton),
        None => Compatibility::MissingClip,
    }
}

/// Import one clip
///
/// A missing clip is `Ok(None)`. An incompatible clip or a codec failure is
/// an error and produces nothing.
pub fn import_animation(
    scene: &SourceScene,
    clip_name: &str,
    skeleton: &Skeleton,
    settings: &ImportSettings,
) -> Result<Option<ImportedClip>, ImportError> {
    let Some(clip) = scene.clip(clip_name) else {
        tracing::warn!("Clip '{}' not found in scene", clip_name);
        return Ok(None);
    };
    let name = clip.sanitized_name();

    if let Compatibility::Incompatible { unknown_bones } = clip_compatibility(clip, skeleton) {
        return Err(ImportError::IncompatibleSkeleton {
            clip: name.to_string(),
            unknown_bones,
        });
    }

    let mut diagnostics = Diagnostics::new();
    let duration = clip_duration_seconds(clip, &mut diagnostics);
    let mut channels = extract_channels(clip, skeleton, &mut diagnostics);
    separate_root_motion(&mut channels, skeleton, &settings.root_motion, &mut diagnostics);

    let animation = match settings.encoding {
        EncodingMode::SortedKeys => encode_sorted_keys(name, &channels, duration),
        EncodingMode::Quantized(codec_settings) => {
            let uniform = resample_channels(&channels);
            encode_compressed(name, &uniform, &QuantizedCodec::new(codec_settings), duration)
                .map_err(|source| ImportError::Encoding {
                    clip: name.to_string(),
                    source,
                })?
        }
    };

    tracing::debug!(
        "Imported clip '{}': {} tracks, {:.3}s, {} ({} bytes)",
        name,
        animation.track_count,
        animation.duration,
        animation.payload.kind_name(),
        animation.payload.byte_len()
    );

    Ok(Some(ImportedClip {
        animation,
        diagnostics,
    }))
}

/// Import every clip of `scene` in parallel
///
/// Results come back in scene order, keyed by sanitized clip name.
pub fn import_all<F>(
    scene: &SourceScene,
    skeleton: &Skeleton,
    settings_for: F,
) -> Vec<(String, Result<Option<ImportedClip>, ImportError>)>
where
    F: Fn(&str) -> ImportSettings + Sync,
{
    scene
        .clips
        .par_iter()
        .map(|clip| {
            let name = clip.sanitized_name();
            let settings = settings_for(name);
            (
                name.to_string(),
                import_animation(scene, &clip.name, skeleton, &settings),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NodeCurve, SourceKey, SourceNode};
    use glam::Vec3;
    use nether_anim_common::AnimationPayload;

    fn scene() -> SourceScene {
        let mut hips = NodeCurve::new("hips");
        hips.translations = vec![
            SourceKey::new(0.0, Vec3::ZERO),
            SourceKey::new(30.0, Vec3::new(0.0, 0.0, 2.0)),
        ];
        let mut tail = NodeCurve::new("tail");
        tail.translations = vec![SourceKey::new(0.0, Vec3::ZERO)];

        SourceScene {
            root: SourceNode::new("scene").with_child(
                SourceNode::new("hips").with_child(SourceNode::new("spine")),
            ),
            deform_bones: vec!["hips".to_string(), "spine".to_string()],
            clips: vec![
                SourceClip {
                    name: "Armature|Walk".to_string(),
                    duration: 30.0,
                    ticks_per_second: 30.0,
                    curves: vec![hips],
                },
                SourceClip {
                    name: "Wag".to_string(),
                    duration: 10.0,
                    ticks_per_second: 30.0,
                    curves: vec![tail],
                },
            ],
        }
    }

    #[test]
    fn test_names_are_sanitized() {
        assert_eq!(animation_names(&scene()), vec!["Walk", "Wag"]);
    }

    #[test]
    fn test_compatibility() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        assert_eq!(skeleton.bone_count(), 2);
        assert_eq!(
            check_compatibility(&scene, "Walk", &skeleton),
            Compatibility::Compatible
        );
        assert_eq!(
            check_compatibility(&scene, "Jump", &skeleton),
            Compatibility::MissingClip
        );
        // "tail" is a curve target but not reachable in the hierarchy
        assert_eq!(
            check_compatibility(&scene, "Wag", &skeleton),
            Compatibility::Incompatible {
                unknown_bones: vec!["tail".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_bones_listed_once_in_order() {
        let mut scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let wag = &mut scene.clips[1];
        wag.curves.push(NodeCurve::new("ear"));
        wag.curves.push(NodeCurve::new("hips"));
        wag.curves.push(NodeCurve::new("tail"));
        wag.curves.push(NodeCurve::new("ear"));

        assert_eq!(
            check_compatibility(&scene, "Wag", &skeleton),
            Compatibility::Incompatible {
                unknown_bones: vec!["tail".to_string(), "ear".to_string()]
            }
        );
    }

    #[test]
    fn test_import_sorted_keys() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let settings = ImportSettings {
            encoding: EncodingMode::SortedKeys,
            ..ImportSettings::default()
        };
        let imported = import_animation(&scene, "Walk", &skeleton, &settings)
            .unwrap()
            .unwrap();
        assert_eq!(imported.animation.name, "Walk");
        assert_eq!(imported.animation.duration, 1.0);
        assert_eq!(imported.animation.track_count, 3);
        assert_eq!(
            imported.animation.root_motion.translation_end,
            Vec3::new(0.0, 0.0, 2.0)
        );
        assert!(matches!(
            imported.animation.payload,
            AnimationPayload::SortedKeys(_)
        ));
    }

    #[test]
    fn test_import_missing_and_incompatible() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let settings = ImportSettings::default();
        assert!(
            import_animation(&scene, "Jump", &skeleton, &settings)
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            import_animation(&scene, "Wag", &skeleton, &settings),
            Err(ImportError::IncompatibleSkeleton { .. })
        ));
    }

    #[test]
    fn test_import_invalid_codec_settings_fails() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let settings = ImportSettings {
            encoding: EncodingMode::Quantized(CodecSettings {
                position_tolerance: -1.0,
                ..CodecSettings::default()
            }),
            ..ImportSettings::default()
        };
        assert!(matches!(
            import_animation(&scene, "Walk", &skeleton, &settings),
            Err(ImportError::Encoding {
                source: CodecError::InvalidSettings(_),
                ..
            })
        ));
    }

    #[test]
    fn test_import_all_keeps_order() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let results = import_all(&scene, &skeleton, |_| ImportSettings::default());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Walk");
        assert!(matches!(results[0].1, Ok(Some(_))));
        assert!(results[1].1.is_err());
    }
}
