//! glTF loader (glTF/GLB -> SourceScene)
//!
//! Scene root nodes hang under a synthetic untagged root. Every skin joint is
//! a deformation bone. Each animation becomes a clip measured in seconds
//! (one tick per second).

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation;
use hashbrown::{HashMap, HashSet};
use nether_anim_common::LocalTransform;
use std::path::Path;

use crate::source::{NodeCurve, SourceClip, SourceKey, SourceNode, SourceScene};

/// Name of the synthetic node holding the scene roots
pub const SCENE_ROOT_NAME: &str = "__scene_root";

/// Load a glTF or GLB file
pub fn load_gltf(path: &Path) -> Result<SourceScene> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;

    let names: Vec<String> = document.nodes().map(|n| node_name(&n)).collect();
    let root = build_hierarchy(&document, &names);

    let mut deform_bones = Vec::new();
    let mut seen = HashSet::new();
    for skin in document.skins() {
        for joint in skin.joints() {
            if seen.insert(joint.index()) {
                deform_bones.push(names[joint.index()].clone());
            }
        }
    }

    let clips = document
        .animations()
        .map(|animation| read_clip(&animation, &buffers, &names))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Loaded {:?}: {} nodes, {} joints, {} clips",
        path,
        names.len(),
        deform_bones.len(),
        clips.len()
    );

    Ok(SourceScene {
        root,
        deform_bones,
        clips,
    })
}

fn node_name(node: &gltf::Node) -> String {
    match node.name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("node_{}", node.index()),
    }
}

fn node_transform(node: &gltf::Node) -> LocalTransform {
    let (t, r, s) = node.transform().decomposed();
    LocalTransform {
        translation: Vec3::from_array(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from_array(s),
    }
}

fn build_hierarchy(document: &gltf::Document, names: &[String]) -> SourceNode {
    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            // No scene: every node that is nobody's child
            let children: HashSet<usize> = document
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()))
                .collect();
            document
                .nodes()
                .filter(|n| !children.contains(&n.index()))
                .collect()
        }
    };

    // Pre-order list of (node, slot of its parent); `None` hangs off the scene root
    let mut order: Vec<(SourceNode, Option<usize>)> = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(gltf::Node, Option<usize>)> =
        roots.into_iter().rev().map(|n| (n, None)).collect();
    while let Some((node, parent)) = stack.pop() {
        if !visited.insert(node.index()) {
            tracing::warn!("Node '{}' is reachable twice, ignoring repeat", names[node.index()]);
            continue;
        }
        let slot = order.len();
        let out = SourceNode::new(names[node.index()].clone()).with_transform(node_transform(&node));
        order.push((out, parent));
        let children: Vec<gltf::Node> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|c| (c, Some(slot))));
    }

    // Descendants sit after their ancestor, so popping attaches complete subtrees
    let mut root = SourceNode::new(SCENE_ROOT_NAME);
    while let Some((mut node, parent)) = order.pop() {
        node.children.reverse();
        match parent {
            Some(slot) => order[slot].0.children.push(node),
            None => root.children.push(node),
        }
    }
    root.children.reverse();
    root
}

fn read_clip(
    animation: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    names: &[String],
) -> Result<SourceClip> {
    let clip_name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut curves: Vec<NodeCurve> = Vec::new();
    let mut curve_of_node: HashMap<usize, usize> = HashMap::new();
    let mut duration = 0.0f32;

    for channel in animation.channels() {
        let node = channel.target().node().index();
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f32> = reader
            .read_inputs()
            .with_context(|| format!("Clip '{}': channel has no input times", clip_name))?
            .collect();
        let Some(outputs) = reader.read_outputs() else {
            tracing::warn!("Clip '{}': channel without outputs skipped", clip_name);
            continue;
        };
        let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;

        if let Some(&last) = times.last() {
            duration = duration.max(last);
        }

        let slot = *curve_of_node.entry(node).or_insert_with(|| {
            curves.push(NodeCurve::new(names[node].clone()));
            curves.len() - 1
        });
        let curve = &mut curves[slot];

        match outputs {
            ReadOutputs::Translations(values) => {
                curve.translations = zip_keys(&times, values.map(Vec3::from_array), cubic);
            }
            ReadOutputs::Rotations(values) => {
                curve.rotations = zip_keys(&times, values.into_f32().map(Quat::from_array), cubic);
            }
            ReadOutputs::Scales(values) => {
                curve.scales = zip_keys(&times, values.map(Vec3::from_array), cubic);
            }
            ReadOutputs::MorphTargetWeights(_) => {}
        }
    }

    // Channels that only carried morph weights
    curves.retain(|c| !(c.translations.is_empty() && c.rotations.is_empty() && c.scales.is_empty()));

    Ok(SourceClip {
        name: clip_name,
        duration,
        ticks_per_second: 1.0,
        curves,
    })
}

/// Pair input times with output values
///
/// Cubic-spline samplers store (in-tangent, value, out-tangent) per key;
/// only the value is kept.
fn zip_keys<T>(times: &[f32], values: impl Iterator<Item = T>, cubic: bool) -> Vec<SourceKey<T>> {
    let values: Vec<T> = if cubic {
        values.skip(1).step_by(3).collect()
    } else {
        values.collect()
    };
    times
        .iter()
        .zip(values)
        .map(|(&time, value)| SourceKey::new(time, value))
        .collect()
}
