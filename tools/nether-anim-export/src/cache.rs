//! Memoized clip imports
//!
//! Keyed by everything that changes the output: clip, skeleton (topology,
//! bind poses and root transform, via its fingerprint), mask and encoding. Lookups lock briefly; imports run with the lock released, so two
//! threads racing on the same key may both import and the first insert wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use nether_anim_common::Skeleton;

use crate::importer::{import_animation, EncodingMode, ImportError, ImportSettings, ImportedClip};
use crate::root_motion::RootMotionMask;
use crate::source::SourceScene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EncodingKey {
    SortedKeys,
    /// Tolerance bit patterns
    Quantized([u32; 4]),
}

impl From<EncodingMode> for EncodingKey {
    fn from(mode: EncodingMode) -> Self {
        match mode {
            EncodingMode::SortedKeys => Self::SortedKeys,
            EncodingMode::Quantized(s) => Self::Quantized([
                s.position_tolerance.to_bits(),
                s.rotation_tolerance.to_bits(),
                s.scale_tolerance.to_bits(),
                s.shell_distance.to_bits(),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClipKey {
    clip: String,
    skeleton: u64,
    mask: RootMotionMask,
    encoding: EncodingKey,
}

impl ClipKey {
    fn new(clip: &str, skeleton: &Skeleton, settings: &ImportSettings) -> Self {
        Self {
            clip: clip.to_string(),
            skeleton: skeleton.fingerprint(),
            mask: settings.root_motion,
            encoding: settings.encoding.into(),
        }
    }
}

/// Thread-safe cache of imported clips
///
/// Only successful imports are stored; missing clips and failures are
/// retried on the next request.
#[derive(Debug, Default)]
pub struct ClipCache {
    entries: Mutex<HashMap<ClipKey, Arc<ImportedClip>>>,
}

impl ClipCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ClipKey, Arc<ImportedClip>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached import or run it
    pub fn get_or_import(
        &self,
        scene: &SourceScene,
        clip_name: &str,
        skeleton: &Skeleton,
        settings: &ImportSettings,
    ) -> Result<Option<Arc<ImportedClip>>, ImportError> {
        let key = ClipKey::new(clip_name, skeleton, settings);
        if let Some(hit) = self.entries().get(&key) {
            tracing::trace!("Clip cache hit: {}", clip_name);
            return Ok(Some(Arc::clone(hit)));
        }

        let Some(imported) = import_animation(scene, clip_name, skeleton, settings)? else {
            return Ok(None);
        };
        let entry = self
            .entries()
            .entry(key)
            .or_insert_with(|| Arc::new(imported))
            .clone();
        Ok(Some(entry))
    }

    pub fn contains(&self, clip_name: &str, skeleton: &Skeleton, settings: &ImportSettings) -> bool {
        self.entries()
            .contains_key(&ClipKey::new(clip_name, skeleton, settings))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::import_skeleton;
    use crate::source::{NodeCurve, SourceClip, SourceKey, SourceNode};
    use glam::Vec3;
    use nether_anim_common::AnimationPayload;

    fn scene() -> SourceScene {
        let mut hips = NodeCurve::new("hips");
        hips.translations = vec![
            SourceKey::new(0.0, Vec3::ZERO),
            SourceKey::new(1.0, Vec3::new(1.0, 0.0, 4.0)),
        ];
        SourceScene {
            root: SourceNode::new("scene").with_child(SourceNode::new("hips")),
            deform_bones: vec!["hips".to_string()],
            clips: vec![SourceClip {
                name: "Run".to_string(),
                duration: 1.0,
                ticks_per_second: 1.0,
                curves: vec![hips],
            }],
        }
    }

    #[test]
    fn test_repeat_request_hits_cache() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let cache = ClipCache::new();
        let settings = ImportSettings::default();

        let first = cache.get_or_import(&scene, "Run", &skeleton, &settings).unwrap().unwrap();
        let second = cache.get_or_import(&scene, "Run", &skeleton, &settings).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("Run", &skeleton, &settings));
    }

    #[test]
    fn test_masks_are_distinct_entries() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let cache = ClipCache::new();
        let unmasked = ImportSettings::default();
        let ground = ImportSettings {
            root_motion: RootMotionMask::ground(),
            ..ImportSettings::default()
        };

        let a = cache.get_or_import(&scene, "Run", &skeleton, &unmasked).unwrap().unwrap();
        let b = cache.get_or_import(&scene, "Run", &skeleton, &ground).unwrap().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(a.animation.root_motion.translation_end, Vec3::new(1.0, 0.0, 4.0));
        assert_eq!(b.animation.root_motion.translation_end, Vec3::new(1.0, 0.0, 4.0));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    fn rigged_scene(arm_bind: Vec3) -> SourceScene {
        let mut arm = nether_anim_common::LocalTransform::IDENTITY;
        arm.translation = arm_bind;
        SourceScene {
            root: SourceNode::new("scene").with_child(
                SourceNode::new("hips").with_child(SourceNode::new("arm").with_transform(arm)),
            ),
            deform_bones: vec!["hips".to_string(), "arm".to_string()],
            ..scene()
        }
    }

    #[test]
    fn test_bind_pose_is_part_of_key() {
        let short = rigged_scene(Vec3::new(0.0, 1.0, 0.0));
        let long = rigged_scene(Vec3::new(0.0, 9.0, 0.0));
        let short_skeleton = import_skeleton(&short).unwrap();
        let long_skeleton = import_skeleton(&long).unwrap();
        let cache = ClipCache::new();
        let settings = ImportSettings {
            encoding: EncodingMode::SortedKeys,
            ..ImportSettings::default()
        };

        let a = cache.get_or_import(&short, "Run", &short_skeleton, &settings).unwrap().unwrap();
        let b = cache.get_or_import(&long, "Run", &long_skeleton, &settings).unwrap().unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!Arc::ptr_eq(&a, &b));

        // The arm has no curve, so it holds whichever bind pose it was imported with
        let AnimationPayload::SortedKeys(keys) = &b.animation.payload else {
            panic!("expected sorted keys");
        };
        assert_eq!(keys.cursor().sample(0.5)[2].translation, Vec3::new(0.0, 9.0, 0.0));
    }

    #[test]
    fn test_encoding_is_part_of_key() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let cache = ClipCache::new();
        let sorted = ImportSettings {
            encoding: EncodingMode::SortedKeys,
            ..ImportSettings::default()
        };
        cache.get_or_import(&scene, "Run", &skeleton, &sorted).unwrap();
        assert!(!cache.contains("Run", &skeleton, &ImportSettings::default()));
    }

    #[test]
    fn test_missing_clip_not_cached() {
        let scene = scene();
        let skeleton = import_skeleton(&scene).unwrap();
        let cache = ClipCache::new();
        let result = cache
            .get_or_import(&scene, "Jump", &skeleton, &ImportSettings::default())
            .unwrap();
        assert!(result.is_none());
        assert!(cache.is_empty());

        cache.get_or_import(&scene, "Run", &skeleton, &ImportSettings::default()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
