//! nether-anim-export - Nethercore animation import tool
//!
//! Converts skeletal animation sources (glTF/GLB) into animation packs
//! (.ncanim) holding a skeleton and encoded clips.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nether_anim_common::codec::builtin_codec;
use nether_anim_common::{AnimationPayload, PackReader, PackWriter, Skeleton, PACK_EXT};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use nether_anim_export::manifest::{self, EncodingKind, EncodingConfig};
use nether_anim_export::{
    animation_names, check_compatibility, import_animation, import_skeleton, load_gltf,
    Compatibility, Diagnostics, ImportSettings, RootMotionMask,
};

#[derive(Parser)]
#[command(name = "nether-anim-export")]
#[command(about = "Nethercore animation import tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Axis {
    X,
    Y,
    Z,
}

#[derive(Subcommand)]
enum Commands {
    /// List clips in a source file and whether they fit its skeleton
    List {
        /// Input glTF/GLB file
        input: PathBuf,
    },

    /// Export only the skeleton of a source file
    Skeleton {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Output .ncanim file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export one clip together with its skeleton
    Clip {
        /// Input glTF/GLB file
        input: PathBuf,

        /// Clip name (armature prefix optional)
        #[arg(short, long)]
        name: String,

        /// Masked root motion: translation axes to extract (e.g. x,z)
        #[arg(long, value_delimiter = ',', conflicts_with = "unmasked")]
        mask_translation: Vec<Axis>,

        /// Masked root motion: extract heading about +Y
        #[arg(long, conflicts_with = "unmasked")]
        yaw: bool,

        /// Move the whole root transform into root motion (default)
        #[arg(long)]
        unmasked: bool,

        /// Encoding mode
        #[arg(long, value_enum, default_value_t = EncodingKind::Quantized)]
        mode: EncodingKind,

        /// Output .ncanim file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a pack from a manifest file
    Build {
        /// Path to anim.toml manifest
        #[arg(default_value = "anim.toml")]
        manifest: PathBuf,

        /// Output pack (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to anim.toml manifest
        #[arg(default_value = "anim.toml")]
        manifest: PathBuf,
    },

    /// Print the contents of a pack
    Inspect {
        /// Input .ncanim file
        pack: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { input } => list_clips(&input)?,

        Commands::Skeleton { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension(PACK_EXT));
            tracing::info!("Exporting skeleton {:?} -> {:?}", input, output);
            let skeleton = load_skeleton(&input)?;
            let mut writer = PackWriter::new();
            writer.add_skeleton(&skeleton);
            write_pack(&writer, &output)?;
            tracing::info!("Done! {} bones", skeleton.bone_count());
        }

        Commands::Clip {
            input,
            name,
            mask_translation,
            yaw,
            unmasked,
            mode,
            output,
        } => {
            let root_motion = if unmasked || (mask_translation.is_empty() && !yaw) {
                RootMotionMask::default()
            } else {
                let mut mask = RootMotionMask {
                    masked: true,
                    yaw,
                    ..RootMotionMask::default()
                };
                for axis in mask_translation {
                    mask.translation[axis as usize] = true;
                }
                mask
            };
            let encoding = EncodingConfig {
                mode,
                ..EncodingConfig::default()
            };
            let settings = ImportSettings {
                root_motion,
                encoding: encoding.mode(),
            };

            let output = output.unwrap_or_else(|| input.with_extension(PACK_EXT));
            tracing::info!("Exporting clip '{}' {:?} -> {:?}", name, input, output);
            export_clip(&input, &name, &settings, &output)?;
            tracing::info!("Done!");
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building animation pack from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            let report =
                manifest::build_pack(&config, manifest::manifest_dir(&manifest), output.as_deref())?;
            for clip in &report.clips {
                println!(
                    "{}: {} ({} bytes)",
                    clip.name, clip.payload_kind, clip.payload_bytes
                );
                print_diagnostics(&clip.diagnostics);
            }
            for name in &report.skipped {
                println!("{}: skipped (incompatible with skeleton)", name);
            }
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config, manifest::manifest_dir(&manifest))?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Inspect { pack } => inspect_pack(&pack)?,
    }

    Ok(())
}

fn load_skeleton(input: &Path) -> Result<Skeleton> {
    let scene = load_gltf(input)?;
    import_skeleton(&scene).with_context(|| format!("No skeleton found in {:?}", input))
}

fn write_pack(writer: &PackWriter, output: &Path) -> Result<()> {
    let file =
        File::create(output).with_context(|| format!("Failed to create output: {:?}", output))?;
    writer
        .write_to(BufWriter::new(file))
        .with_context(|| format!("Failed to write pack: {:?}", output))
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        println!("  {}", diagnostic);
    }
}

fn list_clips(input: &Path) -> Result<()> {
    let scene = load_gltf(input)?;
    let skeleton = import_skeleton(&scene);
    match &skeleton {
        Some(skeleton) => println!("Skeleton: {} bones", skeleton.bone_count()),
        None => println!("Skeleton: none"),
    }

    let names = animation_names(&scene);
    println!("Clips: {}", names.len());
    for name in names {
        let status = match &skeleton {
            None => "no skeleton".to_string(),
            Some(skeleton) => match check_compatibility(&scene, &name, skeleton) {
                Compatibility::Compatible => "compatible".to_string(),
                Compatibility::MissingClip => "missing".to_string(),
                Compatibility::Incompatible { unknown_bones } if unknown_bones.is_empty() => {
                    "incompatible (no curves)".to_string()
                }
                Compatibility::Incompatible { unknown_bones } => {
                    format!("incompatible (unknown bones: {})", unknown_bones.join(", "))
                }
            },
        };
        println!("  {}: {}", name, status);
    }
    Ok(())
}

fn export_clip(input: &Path, name: &str, settings: &ImportSettings, output: &Path) -> Result<()> {
    let scene = load_gltf(input)?;
    let skeleton =
        import_skeleton(&scene).with_context(|| format!("No skeleton found in {:?}", input))?;

    let Some(imported) = import_animation(&scene, name, &skeleton, settings)
        .with_context(|| format!("Failed to import clip '{}'", name))?
    else {
        bail!(
            "Clip '{}' not found in {:?}. Available clips: {:?}",
            name,
            input,
            animation_names(&scene)
        );
    };
    print_diagnostics(&imported.diagnostics);

    let mut writer = PackWriter::new();
    writer.add_skeleton(&skeleton);
    writer.add_clip(&imported.animation);
    write_pack(&writer, output)
}

fn inspect_pack(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open pack: {:?}", path))?;
    let mut reader = PackReader::open(BufReader::new(file))
        .with_context(|| format!("Failed to read pack: {:?}", path))?;

    println!(
        "Pack version {}, {} sections",
        reader.header().version,
        reader.header().section_count
    );
    if let Some(skeleton) = reader.skeleton()? {
        println!("Skeleton: {} bones", skeleton.bone_count());
        for bone in skeleton.bones() {
            let parent = bone
                .parent
                .map(|p| skeleton.bones()[p].name.as_str())
                .unwrap_or("-");
            println!("  {} (parent: {})", bone.name, parent);
        }
    }

    for clip in reader.clips()? {
        let delta = clip.root_motion.translation_delta();
        println!(
            "Clip '{}': {:.3}s, {} tracks, {} ({} bytes), root motion ({:.3}, {:.3}, {:.3})",
            clip.name,
            clip.duration,
            clip.track_count,
            clip.payload.kind_name(),
            clip.payload.byte_len(),
            delta.x,
            delta.y,
            delta.z
        );
        if let AnimationPayload::Compressed { codec, blob } = &clip.payload {
            let decoder = builtin_codec(*codec)
                .with_context(|| format!("Clip '{}' uses unknown codec {}", clip.name, codec.0))?;
            let channels = decoder
                .decompress(blob)
                .with_context(|| format!("Clip '{}' does not decode", clip.name))?;
            let samples = channels.first().map_or(0, |c| c.sample_count());
            println!("  decodes to {} channels x {} samples", channels.len(), samples);
        }
    }
    Ok(())
}
