//! Manifest parsing and pack building
//!
//! Parses anim.toml and turns one source file into one animation pack.
//! Relative paths are resolved against the manifest's directory.

use anyhow::{bail, Context, Result};
use hashbrown::HashMap;
use nether_anim_common::{CodecSettings, PackWriter, PACK_EXT};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::cache::ClipCache;
use crate::diagnostics::Diagnostics;
use crate::gltf_source::load_gltf;
use crate::importer::{animation_names, import_skeleton, EncodingMode, ImportError, ImportSettings};
use crate::root_motion::RootMotionMask;

/// Root manifest structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimManifest {
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub encoding: EncodingConfig,
    /// Export only these clips (sanitized names)
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub clips: HashMap<String, ClipConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputConfig {
    /// Defaults to the source path with the pack extension
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingKind {
    SortedKeys,
    #[default]
    Quantized,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub mode: EncodingKind,
    pub position_tolerance: f32,
    pub rotation_tolerance: f32,
    pub scale_tolerance: f32,
    pub shell_distance: f32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let codec = CodecSettings::default();
        Self {
            mode: EncodingKind::default(),
            position_tolerance: codec.position_tolerance,
            rotation_tolerance: codec.rotation_tolerance,
            scale_tolerance: codec.scale_tolerance,
            shell_distance: codec.shell_distance,
        }
    }
}

impl EncodingConfig {
    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings {
            position_tolerance: self.position_tolerance,
            rotation_tolerance: self.rotation_tolerance,
            scale_tolerance: self.scale_tolerance,
            shell_distance: self.shell_distance,
        }
    }

    pub fn mode(&self) -> EncodingMode {
        match self.mode {
            EncodingKind::SortedKeys => EncodingMode::SortedKeys,
            EncodingKind::Quantized => EncodingMode::Quantized(self.codec_settings()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClipConfig {
    pub root_motion: RootMotionMask,
}

impl AnimManifest {
    /// Import settings for a clip; unlisted clips are unmasked
    pub fn settings_for(&self, clip: &str) -> ImportSettings {
        ImportSettings {
            root_motion: self
                .clips
                .get(clip)
                .map(|c| c.root_motion)
                .unwrap_or_default(),
            encoding: self.encoding.mode(),
        }
    }

    pub fn source_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.source.path)
    }

    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        match &self.output.path {
            Some(path) => base_dir.join(path),
            None => self.source_path(base_dir).with_extension(PACK_EXT),
        }
    }
}

/// Load and parse a manifest file
pub fn load_manifest(path: &Path) -> Result<AnimManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {:?}", path))?;
    let manifest: AnimManifest = toml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
    Ok(manifest)
}

/// Directory relative manifest paths are resolved against
pub fn manifest_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Validate a manifest without building
pub fn validate(manifest: &AnimManifest, base_dir: &Path) -> Result<()> {
    let source = manifest.source_path(base_dir);
    if !source.exists() {
        bail!("Animation source not found: {:?}", source);
    }
    if manifest.encoding.mode == EncodingKind::Quantized {
        manifest
            .encoding
            .codec_settings()
            .validate()
            .context("Invalid [encoding] settings")?;
    }
    if let Some(include) = &manifest.include {
        for name in manifest.clips.keys() {
            if !include.contains(name) {
                tracing::warn!("Clip settings for '{}' are unused: not in include list", name);
            }
        }
    }
    Ok(())
}

/// One exported clip
#[derive(Debug)]
pub struct ClipReport {
    pub name: String,
    pub payload_kind: &'static str,
    pub payload_bytes: usize,
    pub diagnostics: Diagnostics,
}

/// Summary of a finished build
#[derive(Debug)]
pub struct BuildReport {
    pub output: PathBuf,
    pub bone_count: usize,
    pub clips: Vec<ClipReport>,
    /// Clips left out because they do not fit the skeleton
    pub skipped: Vec<String>,
}

/// Build the pack described by `manifest`
///
/// Clips named in `include` must import; without an include list,
/// incompatible clips are skipped with a warning. Encoding failures always
/// fail the build.
pub fn build_pack(
    manifest: &AnimManifest,
    base_dir: &Path,
    output_override: Option<&Path>,
) -> Result<BuildReport> {
    validate(manifest, base_dir)?;
    let source = manifest.source_path(base_dir);
    let scene = load_gltf(&source)?;
    let skeleton =
        import_skeleton(&scene).with_context(|| format!("No skeleton found in {:?}", source))?;

    let explicit = manifest.include.is_some();
    let names = match &manifest.include {
        Some(include) => include.clone(),
        None => animation_names(&scene),
    };

    let cache = ClipCache::new();
    let results: Vec<_> = names
        .par_iter()
        .map(|name| {
            let result = cache.get_or_import(&scene, name, &skeleton, &manifest.settings_for(name));
            (name, result)
        })
        .collect();

    let mut writer = PackWriter::new();
    writer.add_skeleton(&skeleton);
    let mut clips = Vec::new();
    let mut skipped = Vec::new();
    for (name, result) in results {
        match result {
            Ok(Some(imported)) => {
                writer.add_clip(&imported.animation);
                clips.push(ClipReport {
                    name: name.clone(),
                    payload_kind: imported.animation.payload.kind_name(),
                    payload_bytes: imported.animation.payload.byte_len(),
                    diagnostics: imported.diagnostics.clone(),
                });
            }
            Ok(None) => bail!("Clip '{}' not found in {:?}", name, source),
            Err(err @ ImportError::IncompatibleSkeleton { .. }) if !explicit => {
                tracing::warn!("Skipping: {}", err);
                skipped.push(name.clone());
            }
            Err(err) => return Err(err).with_context(|| format!("Failed to import {:?}", source)),
        }
    }

    let output = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest.output_path(base_dir));
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file =
        File::create(&output).with_context(|| format!("Failed to create output: {:?}", output))?;
    writer
        .write_to(BufWriter::new(file))
        .with_context(|| format!("Failed to write pack: {:?}", output))?;

    tracing::info!(
        "Built {:?}: {} bones, {} clips ({} skipped)",
        output,
        skeleton.bone_count(),
        clips.len(),
        skipped.len()
    );

    Ok(BuildReport {
        output,
        bone_count: skeleton.bone_count(),
        clips,
        skipped,
    })
}
