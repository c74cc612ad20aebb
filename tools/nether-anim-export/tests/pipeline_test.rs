//! End-to-end import scenarios on in-memory scenes.

use glam::{Quat, Vec3};

use nether_anim_common::channel::is_unit_quat;
use nether_anim_common::{AnimationCodec, AnimationPayload, QuantizedCodec};
use nether_anim_export::diagnostics::Diagnostics;
use nether_anim_export::extract::extract_channels;
use nether_anim_export::resample::{resample_channels, sample_quat, sample_vec3};
use nether_anim_export::root_motion::separate_root_motion;
use nether_anim_export::{
    check_compatibility, import_animation, import_skeleton, ClipCache, Compatibility,
    EncodingMode, ImportError, ImportSettings, NodeCurve, RootMotionMask, SourceClip, SourceKey,
    SourceNode, SourceScene,
};

fn one_bone_scene(curve: NodeCurve, duration: f32, ticks_per_second: f32) -> SourceScene {
    SourceScene {
        root: SourceNode::new("scene").with_child(SourceNode::new("hips")),
        deform_bones: vec!["hips".to_string()],
        clips: vec![SourceClip {
            name: "Clip".to_string(),
            duration,
            ticks_per_second,
            curves: vec![curve],
        }],
    }
}

fn sorted_keys() -> ImportSettings {
    ImportSettings {
        encoding: EncodingMode::SortedKeys,
        ..ImportSettings::default()
    }
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_keys_pinned_to_clip_bounds() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = vec![
        SourceKey::new(6.0, Vec3::X),
        SourceKey::new(24.0, Vec3::Y),
    ];
    let scene = one_bone_scene(hips, 30.0, 30.0);
    let skeleton = import_skeleton(&scene).unwrap();

    let mut diagnostics = Diagnostics::new();
    let channels = extract_channels(&scene.clips[0], &skeleton, &mut diagnostics);
    assert_eq!(channels.len(), 2);

    let hips = &channels[1];
    let times: Vec<f32> = hips.translations.iter().map(|k| k.frame_time).collect();
    assert_eq!(times, vec![0.0, 0.2, 0.8, 1.0]);
    assert_eq!(hips.translations[0].value, Vec3::X);
    assert_eq!(hips.translations[3].value, Vec3::Y);

    // Untouched tracks hold the bind pose
    let rotation_times: Vec<f32> = hips.rotations.iter().map(|k| k.frame_time).collect();
    assert_eq!(rotation_times, vec![0.0, 1.0]);
    assert!(hips.rotations.iter().all(|k| k.value == Quat::IDENTITY));
    assert!(hips.scales.iter().all(|k| k.value == Vec3::ONE));
}

// ============================================================================
// Root motion
// ============================================================================

#[test]
fn test_vertical_mask_scenario() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = vec![
        SourceKey::new(0.0, Vec3::ZERO),
        SourceKey::new(1.0, Vec3::new(1.0, 0.0, 5.0)),
    ];
    let scene = one_bone_scene(hips, 1.0, 1.0);
    let skeleton = import_skeleton(&scene).unwrap();
    let settings = ImportSettings {
        root_motion: RootMotionMask {
            masked: true,
            translation: [false, false, true],
            yaw: false,
        },
        encoding: EncodingMode::SortedKeys,
    };

    let imported = import_animation(&scene, "Clip", &skeleton, &settings)
        .unwrap()
        .unwrap();
    assert_eq!(
        imported.animation.root_motion.translation_end,
        Vec3::new(0.0, 0.0, 5.0)
    );
    let AnimationPayload::SortedKeys(keys) = &imported.animation.payload else {
        panic!("expected sorted keys");
    };
    let end = keys.cursor().sample(1.0);
    assert_eq!(end[0].translation, Vec3::new(0.0, 0.0, 5.0));
    assert_eq!(end[1].translation, Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_two_roots_conserve_trajectories() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = vec![
        SourceKey::new(0.0, Vec3::ZERO),
        SourceKey::new(0.4, Vec3::new(0.2, 0.9, 1.5)),
        SourceKey::new(1.0, Vec3::new(0.0, 1.0, 4.0)),
    ];
    hips.rotations = vec![
        SourceKey::new(0.0, Quat::IDENTITY),
        SourceKey::new(1.0, Quat::from_rotation_y(1.2) * Quat::from_rotation_z(0.3)),
    ];
    let mut prop = NodeCurve::new("prop");
    prop.translations = vec![
        SourceKey::new(0.0, Vec3::new(2.0, 0.0, 0.0)),
        SourceKey::new(0.7, Vec3::new(2.0, 1.0, 3.0)),
        SourceKey::new(1.0, Vec3::new(1.0, 0.0, 0.0)),
    ];
    prop.rotations = vec![
        SourceKey::new(0.0, Quat::from_rotation_x(0.5)),
        SourceKey::new(0.5, Quat::from_rotation_y(-0.7)),
    ];
    let clip = SourceClip {
        name: "Carry".to_string(),
        duration: 1.0,
        ticks_per_second: 1.0,
        curves: vec![hips, prop.clone()],
    };
    let scene = SourceScene {
        root: SourceNode::new("scene")
            .with_child(SourceNode::new("hips"))
            .with_child(SourceNode::new("prop")),
        deform_bones: vec!["hips".to_string()],
        clips: vec![clip],
    };
    let skeleton = import_skeleton(&scene).unwrap();
    assert_eq!(skeleton.roots().count(), 2);

    for mask in [RootMotionMask::default(), RootMotionMask::ground()] {
        let mut diagnostics = Diagnostics::new();
        let authored = extract_channels(&scene.clips[0], &skeleton, &mut diagnostics);
        let mut channels = authored.clone();
        separate_root_motion(&mut channels, &skeleton, &mask, &mut diagnostics);

        for bone in 1..channels.len() {
            for key in &channels[bone].translations {
                let t = key.frame_time;
                let motion = sample_vec3(&channels[0].translations, t).unwrap();
                let expected = sample_vec3(&authored[bone].translations, t).unwrap();
                assert!((motion + key.value - expected).length() < 1e-5);
            }
            for key in &channels[bone].rotations {
                let t = key.frame_time;
                assert!(is_unit_quat(key.value));
                let motion = sample_quat(&channels[0].rotations, t).unwrap();
                let expected = sample_quat(&authored[bone].rotations, t).unwrap();
                assert!((motion * key.value).angle_between(expected) < 1e-4);
            }
        }
        assert!(channels[0].rotations.iter().all(|k| is_unit_quat(k.value)));
    }
}

// ============================================================================
// Compatibility
// ============================================================================

#[test]
fn test_unknown_bones_are_incompatible() {
    let mut tail = NodeCurve::new("tail");
    tail.rotations = vec![SourceKey::new(0.0, Quat::IDENTITY)];
    let mut scene = one_bone_scene(NodeCurve::new("hips"), 1.0, 1.0);
    let skeleton = import_skeleton(&scene).unwrap();
    scene.clips[0].curves.push(tail);

    assert_eq!(
        check_compatibility(&scene, "Clip", &skeleton),
        Compatibility::Incompatible {
            unknown_bones: vec!["tail".to_string()]
        }
    );
    let err = import_animation(&scene, "Clip", &skeleton, &sorted_keys()).unwrap_err();
    assert!(matches!(err, ImportError::IncompatibleSkeleton { .. }));
    assert!(err.to_string().contains("tail"));
}

#[test]
fn test_clip_without_curves_is_incompatible() {
    let mut scene = one_bone_scene(NodeCurve::new("hips"), 1.0, 1.0);
    let skeleton = import_skeleton(&scene).unwrap();
    scene.clips[0].curves.clear();
    assert_eq!(
        check_compatibility(&scene, "Clip", &skeleton),
        Compatibility::Incompatible {
            unknown_bones: Vec::new()
        }
    );
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_degenerate_clip_still_decodes() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = vec![SourceKey::new(0.0, Vec3::new(0.0, 1.0, 0.0))];
    let scene = one_bone_scene(hips, 0.0, 24.0);
    let skeleton = import_skeleton(&scene).unwrap();

    let imported = import_animation(&scene, "Clip", &skeleton, &ImportSettings::default())
        .unwrap()
        .unwrap();
    assert!(imported.animation.duration > 0.0);
    assert!(imported.diagnostics.mentions("non-positive duration"));

    let AnimationPayload::Compressed { blob, .. } = &imported.animation.payload else {
        panic!("expected compressed payload");
    };
    let decoded = QuantizedCodec::default().decompress(blob).unwrap();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.iter().all(|c| c.sample_count() == 2));
    assert!((decoded[0].translations[1] - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-3);
}

#[test]
fn test_quantized_stays_close_to_uniform() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = (0..=10)
        .map(|i| {
            let t = i as f32 / 10.0;
            SourceKey::new(t, Vec3::new(t.sin(), 0.5 * t, t * t))
        })
        .collect();
    hips.rotations = (0..=4)
        .map(|i| SourceKey::new(i as f32 / 4.0, Quat::from_rotation_y(i as f32 * 0.6)))
        .collect();
    let scene = one_bone_scene(hips, 1.0, 1.0);
    let skeleton = import_skeleton(&scene).unwrap();

    let mut diagnostics = Diagnostics::new();
    let mut channels = extract_channels(&scene.clips[0], &skeleton, &mut diagnostics);
    separate_root_motion(
        &mut channels,
        &skeleton,
        &RootMotionMask::default(),
        &mut diagnostics,
    );
    let uniform = resample_channels(&channels);

    let codec = QuantizedCodec::default();
    let decoded = codec.decompress(&codec.compress(&uniform).unwrap()).unwrap();
    for (a, b) in uniform.iter().zip(&decoded) {
        for (x, y) in a.translations.iter().zip(&b.translations) {
            assert!((*x - *y).abs().max_element() <= 1e-3);
        }
        for (x, y) in a.rotations.iter().zip(&b.rotations) {
            assert!(is_unit_quat(*y));
            assert!(x.angle_between(*y) < 1e-3);
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn test_cache_separates_masks() {
    let mut hips = NodeCurve::new("hips");
    hips.translations = vec![
        SourceKey::new(0.0, Vec3::ZERO),
        SourceKey::new(1.0, Vec3::new(1.0, 0.0, 5.0)),
    ];
    let scene = one_bone_scene(hips, 1.0, 1.0);
    let skeleton = import_skeleton(&scene).unwrap();
    let cache = ClipCache::new();

    let z_only = ImportSettings {
        root_motion: RootMotionMask {
            masked: true,
            translation: [false, false, true],
            yaw: false,
        },
        ..sorted_keys()
    };
    let full = cache.get_or_import(&scene, "Clip", &skeleton, &sorted_keys()).unwrap().unwrap();
    let partial = cache.get_or_import(&scene, "Clip", &skeleton, &z_only).unwrap().unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(full.animation.root_motion.translation_end, Vec3::new(1.0, 0.0, 5.0));
    assert_eq!(partial.animation.root_motion.translation_end, Vec3::new(0.0, 0.0, 5.0));
}
