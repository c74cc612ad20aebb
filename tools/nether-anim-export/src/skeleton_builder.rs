//! Bone discovery in a scene hierarchy
//!
//! A node is a bone when its name is a deformation bone or the target of any
//! animation curve. Bones are emitted in depth-first pre-order so a parent
//! always precedes its children.

use hashbrown::HashSet;
use nether_anim_common::{Bone, LocalTransform, Skeleton};

use crate::source::{SourceNode, SourceScene};

/// Names that make a node a bone: deformation bones plus curve targets
fn tagged_names(scene: &SourceScene) -> HashSet<&str> {
    let mut names: HashSet<&str> = scene.deform_bones.iter().map(String::as_str).collect();
    for clip in &scene.clips {
        names.extend(clip.curves.iter().map(|c| c.node.as_str()));
    }
    names
}

/// Tagged names inside subtrees that will not be visited
fn collect_pruned<'a>(roots: &'a [SourceNode], tagged: &HashSet<&str>, out: &mut Vec<&'a str>) {
    let mut stack: Vec<&SourceNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if tagged.contains(node.name.as_str()) {
            out.push(&node.name);
        }
        stack.extend(node.children.iter().rev());
    }
}

/// Build the skeleton of `scene`
///
/// Returns `None` if nothing is tagged. Below a bone, an untagged node ends
/// the branch: its subtree is not searched, so bones never skip a level of
/// the hierarchy. Above the first bone, untagged nodes are walked through and
/// their combined transform becomes the skeleton's root transform.
pub fn build_skeleton(scene: &SourceScene) -> Option<Skeleton> {
    let tagged = tagged_names(scene);
    if tagged.is_empty() {
        tracing::warn!("Scene has no deformation bones and no animation curves");
        return None;
    }

    let mut bones: Vec<Bone> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pruned: Vec<&str> = Vec::new();
    let mut root_transform = LocalTransform::IDENTITY;

    // (node, index of the nearest bone ancestor, transform of untagged ancestors)
    let mut stack: Vec<(&SourceNode, Option<usize>, LocalTransform)> =
        vec![(&scene.root, None, LocalTransform::IDENTITY)];
    while let Some((node, parent, above)) = stack.pop() {
        let name = node.name.as_str();
        let is_tagged = tagged.contains(name);
        let is_bone = is_tagged && seen.insert(name);
        if is_tagged && !is_bone {
            tracing::warn!("Duplicate bone name '{}' skipped", name);
        }

        let (child_parent, child_above) = if is_bone {
            if bones.is_empty() {
                root_transform = above;
            }
            bones.push(Bone::new(name, parent, node.transform));
            (Some(bones.len() - 1), LocalTransform::IDENTITY)
        } else if parent.is_some() {
            collect_pruned(&node.children, &tagged, &mut pruned);
            continue;
        } else {
            (None, above.mul_transform(&node.transform))
        };

        // Reversed so the first child pops first
        for child in node.children.iter().rev() {
            stack.push((child, child_parent, child_above));
        }
    }

    if !pruned.is_empty() {
        tracing::debug!(
            "{} tagged node(s) below an untagged link were not made bones: {:?}",
            pruned.len(),
            pruned
        );
    }

    if bones.is_empty() {
        tracing::warn!("No scene node matches a deformation bone or curve target");
        return None;
    }

    let bone_count = bones.len();
    let skeleton = Skeleton::from_bones(bones).map(|s| s.with_root_transform(root_transform));
    if skeleton.is_none() {
        tracing::warn!(
            "Discovered {} bones but they do not form a valid skeleton",
            bone_count
        );
    }
    skeleton
}
