//! Format-neutral view of an authored scene
//!
//! Loaders (see [`crate::gltf_source`]) translate a file into a
//! [`SourceScene`]; everything downstream works on this model only.
//! Key times are in the clip's ticks, as authored.

use glam::{Quat, Vec3};
use nether_anim_common::LocalTransform;

/// One time-stamped value as authored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceKey<T> {
    /// Ticks
    pub time: f32,
    pub value: T,
}

impl<T> SourceKey<T> {
    pub const fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Keys targeting one node, by node name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCurve {
    pub node: String,
    pub translations: Vec<SourceKey<Vec3>>,
    pub rotations: Vec<SourceKey<Quat>>,
    pub scales: Vec<SourceKey<Vec3>>,
}

impl NodeCurve {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..Self::default()
        }
    }

    /// Largest key time over all tracks
    pub fn last_time(&self) -> Option<f32> {
        self.translations
            .iter()
            .map(|k| k.time)
            .chain(self.rotations.iter().map(|k| k.time))
            .chain(self.scales.iter().map(|k| k.time))
            .filter(|t| t.is_finite())
            .reduce(f32::max)
    }
}

/// An authored animation clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceClip {
    /// Raw name, possibly prefixed with an armature (`"Armature|Walk"`)
    pub name: String,
    /// Ticks
    pub duration: f32,
    pub ticks_per_second: f32,
    pub curves: Vec<NodeCurve>,
}

impl SourceClip {
    /// Name with any DCC armature prefix removed
    pub fn sanitized_name(&self) -> &str {
        sanitize_clip_name(&self.name)
    }
}

/// Strip everything up to and including the last `|`
///
/// Exporters commonly name clips `"Armature|Walk"`.
pub fn sanitize_clip_name(raw: &str) -> &str {
    match raw.rfind('|') {
        Some(split) => &raw[split + 1..],
        None => raw,
    }
}

/// Node of the scene hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub name: String,
    /// Relative to the parent node
    pub transform: LocalTransform,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: LocalTransform::IDENTITY,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: LocalTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SourceNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A loaded scene: hierarchy, deformation bones and clips
#[derive(Debug, Clone, PartialEq)]
pub struct SourceScene {
    pub root: SourceNode,
    /// Names of nodes that deform a mesh (skin joints)
    pub deform_bones: Vec<String>,
    pub clips: Vec<SourceClip>,
}

impl SourceScene {
    /// Find a clip by sanitized or raw name
    pub fn clip(&self, name: &str) -> Option<&SourceClip> {
        self.clips
            .iter()
            .find(|c| c.sanitized_name() == name)
            .or_else(|| self.clips.iter().find(|c| c.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clip_name() {
        assert_eq!(sanitize_clip_name("Armature|Walk"), "Walk");
        assert_eq!(sanitize_clip_name("Rig|Armature|Run"), "Run");
        assert_eq!(sanitize_clip_name("Idle"), "Idle");
        assert_eq!(sanitize_clip_name("Trailing|"), "");
    }

    #[test]
    fn test_clip_lookup_by_either_name() {
        let scene = SourceScene {
            root: SourceNode::new("root"),
            deform_bones: Vec::new(),
            clips: vec![SourceClip {
                name: "Armature|Walk".to_string(),
                duration: 30.0,
                ticks_per_second: 30.0,
                curves: Vec::new(),
            }],
        };
        assert!(scene.clip("Walk").is_some());
        assert!(scene.clip("Armature|Walk").is_some());
        assert!(scene.clip("Run").is_none());
    }

    #[test]
    fn test_curve_last_time() {
        let mut curve = NodeCurve::new("hips");
        assert_eq!(curve.last_time(), None);
        curve.translations.push(SourceKey::new(4.0, Vec3::ZERO));
        curve.rotations.push(SourceKey::new(7.5, Quat::IDENTITY));
        curve.scales.push(SourceKey::new(f32::NAN, Vec3::ONE));
        assert_eq!(curve.last_time(), Some(7.5));
    }
}
