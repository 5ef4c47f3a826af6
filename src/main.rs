//! wiexport CLI
//!
//! Command-line interface for exporting scene snapshots to engine archives,
//! checking snapshots, and inspecting written archives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use wiexport_export::{
    flatten_skeleton, read_mesh_record, read_stream, Archive, DecodedMesh, ExportOptions,
    ExportReport, ExportStatus, FileArchive, MemoryArchive, RecordKind, SceneExporter, Severity,
    STREAM_MAGIC,
};
use wiexport_scene::logging::{init_with_config, TracingConfig};
use wiexport_scene::{
    ObjectRole, ParseOptions, SceneParser, SnapshotEvaluator, SnapshotParser, SourceScene,
};

/// wiexport - scene flattening and binary export for the engine
#[derive(Parser)]
#[command(name = "wiexport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot to an archive
    Export(ExportArgs),

    /// Show a summary of a scene snapshot
    Info(InfoArgs),

    /// Check a snapshot without writing anything
    Validate(ValidateArgs),

    /// List the records of a written archive
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Scene snapshot (.json, .yaml, .yml)
    #[arg(short, long)]
    input: PathBuf,

    /// Archive to write
    #[arg(short, long)]
    output: PathBuf,

    /// Export options file (.yaml, .yml, .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a C header holding the archive bytes instead of the archive
    #[arg(long)]
    header: bool,

    /// Also write the legacy text sections into this directory
    #[arg(long)]
    legacy_dir: Option<PathBuf>,

    /// Skip meshes and mesh objects
    #[arg(long)]
    no_objects: bool,

    /// Skip armatures
    #[arg(long)]
    no_armatures: bool,

    /// Skip actions
    #[arg(long)]
    no_actions: bool,

    /// Skip materials
    #[arg(long)]
    no_materials: bool,

    /// Skip lights
    #[arg(long)]
    no_lights: bool,

    /// Skip hit spheres
    #[arg(long)]
    no_hitspheres: bool,

    /// Skip cameras
    #[arg(long)]
    no_cameras: bool,

    /// Skip the world record
    #[arg(long)]
    no_world: bool,

    /// Skip decals
    #[arg(long)]
    no_decals: bool,

    /// Build meshes on the calling thread only
    #[arg(long)]
    serial: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Scene snapshot
    #[arg(short, long)]
    input: PathBuf,

    /// List every object with its role
    #[arg(short, long)]
    detailed: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Scene snapshot
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    /// Archive stream, or a bare mesh record
    path: PathBuf,

    /// Decode the mesh record with this name
    #[arg(long)]
    mesh: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_config(TracingConfig::for_verbosity(cli.verbose));

    match cli.command {
        Commands::Export(args) => cmd_export(args, cli.format),
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Validate(args) => cmd_validate(args),
        Commands::Inspect(args) => cmd_inspect(args, cli.format),
    }
}

fn load_scene(path: &Path, options: &ParseOptions) -> Result<SourceScene> {
    if !path.exists() {
        bail!("File not found: {:?}", path);
    }
    let parser = SnapshotParser::for_path(path)
        .with_context(|| format!("Unsupported snapshot {:?}", path))?;
    let scene = parser
        .parse_file_with_options(path, options)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    info!(scene = %scene.name, objects = scene.objects.len(), "Snapshot loaded");
    Ok(scene)
}

fn export_options(args: &ExportArgs) -> Result<ExportOptions> {
    let mut options = match &args.config {
        Some(path) => ExportOptions::from_file(path)
            .with_context(|| format!("Failed to load export options {:?}", path))?,
        None => ExportOptions::default(),
    };

    let families = &mut options.families;
    families.objects &= !args.no_objects;
    families.armatures &= !args.no_armatures;
    families.actions &= !args.no_actions;
    families.materials &= !args.no_materials;
    families.lights &= !args.no_lights;
    families.hitspheres &= !args.no_hitspheres;
    families.cameras &= !args.no_cameras;
    families.world &= !args.no_world;
    families.decals &= !args.no_decals;

    options.parallel_meshes &= !args.serial;
    options.legacy_text |= args.legacy_dir.is_some();
    options.header_file |= args.header;
    options.check().context("Invalid export options")?;
    Ok(options)
}

/// C identifier derived from the output file stem
fn header_symbol(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("scene");
    let mut symbol: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if symbol.is_empty() || symbol.starts_with(|c: char| c.is_ascii_digit()) {
        symbol.insert(0, '_');
    }
    symbol
}

fn cmd_export(args: ExportArgs, format: OutputFormat) -> Result<()> {
    let scene = load_scene(&args.input, &ParseOptions::default())?;
    let options = export_options(&args)?;
    let header = options.header_file;
    let exporter = SceneExporter::new(options);
    let mut evaluator = SnapshotEvaluator::new(&scene);

    let report = if header {
        let mut archive = MemoryArchive::new();
        let report = exporter.export(&scene, &mut evaluator, &mut archive);
        if report.is_finished() {
            let path = args.output.with_extension("h");
            archive
                .save_header_file(&path, &header_symbol(&args.output))
                .with_context(|| format!("Failed to write header {:?}", path))?;
            info!(path = %path.display(), "Header written");
        }
        report
    } else {
        let mut archive = FileArchive::open(&args.output)
            .with_context(|| format!("Failed to open archive {:?}", args.output))?;
        exporter.export(&scene, &mut evaluator, &mut archive)
    };

    if let (Some(dir), Some(legacy)) = (&args.legacy_dir, &report.legacy) {
        let stem = args
            .output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(scene.name.as_str());
        let written = legacy
            .write_to_dir(dir, stem)
            .with_context(|| format!("Failed to write legacy text into {:?}", dir))?;
        info!(files = written.len(), "Legacy text written");
    }

    print_report(&report, format)?;

    match &report.status {
        ExportStatus::Finished => Ok(()),
        ExportStatus::NotOpened => bail!("Archive {:?} is not open", args.output),
        ExportStatus::Error(message) => bail!("Export failed: {}", message),
    }
}

fn print_report(report: &ExportReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            let status = match &report.status {
                ExportStatus::Finished => "finished".to_string(),
                ExportStatus::NotOpened => "archive not opened".to_string(),
                ExportStatus::Error(message) => format!("error: {}", message),
            };
            println!("Export {}", status);
            let stats = &report.stats;
            if report.is_finished() {
                for kind in RecordKind::ALL {
                    let count = stats.record_count(kind);
                    if count > 0 {
                        println!("  {:<10} {:>8}", kind, count);
                    }
                }
                println!("  Vertices:         {:>8}", stats.vertices);
                println!("  Indices:          {:>8}", stats.indices);
                println!("  Keyframe samples: {:>8}", stats.keyframe_samples);
                println!("  Bytes written:    {:>8}", stats.bytes_written);
            }

            if !report.diagnostics.is_empty() {
                println!("\nDiagnostics:");
                for diagnostic in report.diagnostics.iter() {
                    let tag = match diagnostic.severity {
                        Severity::Info => "info",
                        Severity::Warning => "warn",
                    };
                    println!("  [{}] {}", tag, diagnostic);
                }
            }
        }
    }
    Ok(())
}

fn cmd_info(args: InfoArgs, format: OutputFormat) -> Result<()> {
    let scene = load_scene(&args.input, &ParseOptions::default())?;
    let roles: Vec<(&str, ObjectRole)> = scene
        .objects
        .iter()
        .map(|o| (o.name.as_str(), ObjectRole::classify(o)))
        .collect();
    let triangles: usize = scene.meshes.iter().map(|m| m.triangle_count()).sum();
    let mut per_role: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, role) in &roles {
        *per_role.entry(role.name()).or_insert(0) += 1;
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "name": scene.name,
                "frame_start": scene.frame_start,
                "frame_end": scene.frame_end,
                "objects": roles.iter().map(|(name, role)| {
                    serde_json::json!({ "name": name, "role": role.name() })
                }).collect::<Vec<_>>(),
                "roles": per_role,
                "meshes": scene.meshes.len(),
                "triangles": triangles,
                "armatures": scene.armatures.len(),
                "actions": scene.actions.len(),
                "materials": scene.materials.len(),
                "world": scene.world.is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Scene: {}", scene.name);
            println!("  Frames:     {}..{}", scene.frame_start, scene.frame_end);
            println!("  Objects:    {}", scene.objects.len());
            for (role, count) in &per_role {
                println!("    {:<10} {}", role, count);
            }
            println!("  Meshes:     {} ({} triangles)", scene.meshes.len(), triangles);
            println!("  Armatures:  {}", scene.armatures.len());
            println!("  Actions:    {}", scene.actions.len());
            println!("  Materials:  {}", scene.materials.len());
            println!("  World:      {}", if scene.world.is_some() { "yes" } else { "no" });

            if args.detailed {
                println!("\nObjects:");
                for (name, role) in &roles {
                    println!("  {:<10} {}", role.name(), name);
                }
            }
        }
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let options = ParseOptions {
        strict_validation: true,
        ..Default::default()
    };
    let scene = load_scene(&args.input, &options)?;

    for object in &scene.objects {
        if let Some(armature) = scene.armature_of(object) {
            let skeleton = flatten_skeleton(object, armature)
                .with_context(|| format!("Armature of object '{}' is broken", object.name))?;
            info!(armature = %skeleton.name, bones = skeleton.bones.len(), "Skeleton valid");
        }
    }

    for action in &scene.actions {
        if !action.has_curves() {
            warn!(action = %action.name, "Action has no curves");
        }
    }

    println!("{:?}: OK", args.input);
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> Result<()> {
    let bytes = fs::read(&args.path).with_context(|| format!("Failed to read {:?}", args.path))?;

    if !bytes.starts_with(STREAM_MAGIC) {
        let mesh = read_mesh_record(&bytes)
            .with_context(|| format!("{:?} is neither an archive nor a mesh record", args.path))?;
        return print_mesh(&args.path.display().to_string(), &mesh, format);
    }

    let stream = read_stream(&bytes).context("Failed to read archive stream")?;

    if let Some(name) = &args.mesh {
        let Some(record) = stream
            .records_of(RecordKind::Mesh)
            .find(|r| &r.name == name)
        else {
            bail!("No mesh record named '{}'", name);
        };
        let mesh = read_mesh_record(&record.payload)
            .with_context(|| format!("Failed to decode mesh '{}'", name))?;
        return print_mesh(name, &mesh, format);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stream)?);
        }
        OutputFormat::Text => {
            println!("Archive: {:?}", args.path);
            println!("  Root:     {}", stream.root);
            println!("  Version:  {}", stream.version);
            println!("  Records:  {}", stream.records.len());
            println!();
            for record in &stream.records {
                println!("  {:<10} {:<32} {:>8} B", record.kind, record.name, record.payload.len());
            }
        }
    }
    Ok(())
}

fn print_mesh(name: &str, mesh: &DecodedMesh, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "name": name,
                "version": mesh.version,
                "billboard": mesh.billboard,
                "parent": mesh.parent,
                "materials": mesh.materials,
                "vertices": mesh.vertices.len(),
                "indices": mesh.indices.len(),
                "soft_body": mesh.soft_body.is_some(),
                "subsets": mesh.subsets,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Mesh: {}", name);
            println!("  Version:    {}", mesh.version);
            println!("  Parent:     {}", mesh.parent.as_deref().unwrap_or("-"));
            println!("  Materials:  {}", mesh.materials.join(", "));
            println!("  Vertices:   {}", mesh.vertices.len());
            println!("  Indices:    {}", mesh.indices.len());
            println!("  Soft body:  {}", if mesh.soft_body.is_some() { "yes" } else { "no" });
            println!("\nSubsets:");
            for subset in &mesh.subsets {
                println!(
                    "  material {:>4}  offset {:>8}  count {:>8}",
                    subset.material_id.value(),
                    subset.index_offset,
                    subset.index_count
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_symbol() {
        assert_eq!(header_symbol(Path::new("out/level-01.wiscene")), "level_01");
        assert_eq!(header_symbol(Path::new("3d.wiscene")), "_3d");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "wiexport", "export", "-i", "a.json", "-o", "a.wiscene", "--no-lights", "--serial",
            "--legacy-dir", "text",
        ]);
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        let options = export_options(&args).unwrap();
        assert!(!options.families.lights);
        assert!(options.families.cameras);
        assert!(!options.parallel_meshes);
        assert!(options.legacy_text);
        assert!(!options.header_file);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
