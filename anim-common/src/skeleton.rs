//! Bone hierarchy
//!
//! Bones are stored in depth-first pre-order: a parent always precedes its
//! children, so a single forward pass can accumulate world transforms.

use std::collections::HashMap;

use xxhash_rust::xxh3::xxh3_64;

use crate::channel::LocalTransform;

/// Sentinel used for "no parent" in serialized parent indices
pub const NO_PARENT: u32 = u32::MAX;

/// A single bone
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Unique within the skeleton
    pub name: String,
    /// Index of the parent bone, always smaller than this bone's index
    pub parent: Option<usize>,
    /// Bind pose relative to the parent
    pub bind: LocalTransform,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, bind: LocalTransform) -> Self {
        Self {
            name: name.into(),
            parent,
            bind,
        }
    }
}

/// Immutable, validated bone hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<Bone>,
    by_name: HashMap<String, usize>,
    root_transform: LocalTransform,
}

impl Skeleton {
    /// Validate and freeze a bone list
    ///
    /// Returns `None` if the list is empty, a name repeats, or a parent index
    /// does not point at an earlier bone.
    pub fn from_bones(bones: Vec<Bone>) -> Option<Self> {
        if bones.is_empty() {
            return None;
        }

        let mut by_name = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent
                && parent >= index
            {
                return None;
            }
            if by_name.insert(bone.name.clone(), index).is_some() {
                return None;
            }
        }

        Some(Self {
            bones,
            by_name,
            root_transform: LocalTransform::IDENTITY,
        })
    }

    /// Attach the combined transform of the non-bone nodes above the first root
    pub fn with_root_transform(mut self, transform: LocalTransform) -> Self {
        self.root_transform = transform;
        self
    }

    /// Scene-space placement of the hierarchy; identity unless imported
    /// beneath transformed non-bone nodes
    pub fn root_transform(&self) -> LocalTransform {
        self.root_transform
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Index of the bone called `name`
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Indices of every bone without a parent, in skeleton order
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index)
    }

    /// The first root in skeleton order (index 0 by construction)
    pub fn primary_root(&self) -> usize {
        0
    }

    /// Stable 64-bit identity of the skeleton
    ///
    /// Covers names, parents, bind poses and the root transform, so any change
    /// that alters an imported clip also changes the fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = Vec::with_capacity(self.bones.len() * 64 + 40);
        push_transform(&mut bytes, &self.root_transform);
        for bone in &self.bones {
            bytes.extend_from_slice(&(bone.name.len() as u32).to_le_bytes());
            bytes.extend_from_slice(bone.name.as_bytes());
            let parent = bone.parent.map_or(NO_PARENT, |p| p as u32);
            bytes.extend_from_slice(&parent.to_le_bytes());
            push_transform(&mut bytes, &bone.bind);
        }
        xxh3_64(&bytes)
    }
}

fn push_transform(bytes: &mut Vec<u8>, transform: &LocalTransform) {
    let t = transform.translation;
    let r = transform.rotation;
    let s = transform.scale;
    for value in [t.x, t.y, t.z, r.x, r.y, r.z, r.w, s.x, s.y, s.z] {
        bytes.extend_from_slice(&value.to_bits().to_le_bytes());
    }
}
