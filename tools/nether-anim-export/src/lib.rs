//! nether-anim-export library
//!
//! Imports skeletons and animation clips from authored scenes and encodes
//! them for the runtime: bone discovery, channel extraction, root-motion
//! separation, resampling and encoding, plus the glTF loader, manifest
//! builds and a memoizing clip cache.

pub mod cache;
pub mod diagnostics;
pub mod encode;
pub mod extract;
pub mod gltf_source;
pub mod importer;
pub mod manifest;
pub mod resample;
pub mod root_motion;
pub mod skeleton_builder;
pub mod source;

pub use cache::ClipCache;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use gltf_source::load_gltf;
pub use importer::{
    animation_names, check_compatibility, import_all, import_animation, import_skeleton,
    Compatibility, EncodingMode, ImportError, ImportSettings, ImportedClip,
};
pub use root_motion::RootMotionMask;
pub use source::{NodeCurve, SourceClip, SourceKey, SourceNode, SourceScene};
