//! Top-level scene export
//!
//! One call flattens a whole scene: every record is built in memory first,
//! then the stream is written and the archive closed. A structural error
//! discards the archive before anything is committed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};
use wiexport_core::{EntityId, Error, Result};
use wiexport_scene::{
    ObjectData, ObjectRole, PoseEvaluator, SourceMaterial, SourceMesh, SourceObject, SourceScene,
};

use crate::animation::{extract_action, ExtractedAction};
use crate::archive::{write_header, write_record, Archive, RecordKind};
use crate::convert::Transform;
use crate::diagnostics::Diagnostics;
use crate::mesh::{build_indexed_mesh, prepare_faces, MeshInput};
use crate::records::{
    write_action_record, write_armature_record, write_camera_record, write_light_record,
    write_material_record, write_mesh_record, write_object_record, write_world_record,
    MeshRecord, Wind, MESH_FORMAT_VERSION,
};
use crate::skeleton::{flatten_skeleton, FlatSkeleton};
use crate::text::{LegacySections, LegacyTextWriter};

/// Name of the material substituted for meshes without any
pub const DEFAULT_MATERIAL_NAME: &str = "default_material";

/// Entity families to export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFamilies {
    /// Mesh objects and their meshes
    pub objects: bool,
    pub armatures: bool,
    pub actions: bool,
    pub materials: bool,
    pub lights: bool,
    pub hitspheres: bool,
    pub cameras: bool,
    pub world: bool,
    pub decals: bool,
}

impl Default for ExportFamilies {
    fn default() -> Self {
        Self {
            objects: true,
            armatures: true,
            actions: true,
            materials: true,
            lights: true,
            hitspheres: true,
            cameras: true,
            world: true,
            decals: true,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub families: ExportFamilies,
    /// Dump the archive as a C header instead of a binary file
    pub header_file: bool,
    /// Produce the legacy text sections alongside the archive
    pub legacy_text: bool,
    /// Build independent meshes on the rayon pool
    pub parallel_meshes: bool,
    /// Format version written to the stream and mesh records
    pub version: i32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            families: ExportFamilies::default(),
            header_file: false,
            legacy_text: false,
            parallel_meshes: true,
            version: MESH_FORMAT_VERSION,
        }
    }
}

impl ExportOptions {
    /// Load options from a YAML (`.yaml`, `.yml`) or JSON (`.json`) file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::from(e).with_context(format!("reading {}", path.display())),
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let options: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| Error::InvalidConfig {
                message: format!("{}: {}", path.display(), e),
            })?,
            "json" => serde_json::from_str(&text).map_err(|e| Error::InvalidConfig {
                message: format!("{}: {}", path.display(), e),
            })?,
            _ => {
                return Err(Error::UnsupportedFormat {
                    format: format!("options file '{}'", path.display()),
                })
            }
        };
        options.check()?;
        Ok(options)
    }

    pub fn check(&self) -> Result<()> {
        if self.version <= 0 {
            return Err(Error::InvalidConfig {
                message: format!("version must be positive, got {}", self.version),
            });
        }
        Ok(())
    }
}

/// Tri-state result of one export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ExportStatus {
    Finished,
    /// The archive was not open when the export started
    NotOpened,
    Error(String),
}

/// Counters over one export
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportStats {
    pub records: BTreeMap<RecordKind, usize>,
    pub vertices: usize,
    pub indices: usize,
    pub keyframe_samples: usize,
    pub bytes_written: u64,
}

impl ExportStats {
    pub fn record_count(&self, kind: RecordKind) -> usize {
        self.records.get(&kind).copied().unwrap_or(0)
    }
}

/// Outcome of [`SceneExporter::export`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub status: ExportStatus,
    pub diagnostics: Diagnostics,
    pub stats: ExportStats,
    /// Text sections, when enabled and the export finished
    #[serde(skip)]
    pub legacy: Option<LegacySections>,
}

impl ExportReport {
    pub fn is_finished(&self) -> bool {
        self.status == ExportStatus::Finished
    }

    fn failed(status: ExportStatus, diagnostics: Diagnostics) -> Self {
        Self {
            status,
            diagnostics,
            stats: ExportStats::default(),
            legacy: None,
        }
    }
}

/// State of one export invocation
#[derive(Debug)]
pub struct ExportContext {
    next_id: u64,
    root: EntityId,
    materials: HashMap<String, EntityId>,
    default_material: Option<EntityId>,
    pub diagnostics: Diagnostics,
}

impl Default for ExportContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportContext {
    pub fn new() -> Self {
        let mut ctx = Self {
            next_id: 1,
            root: EntityId::INVALID,
            materials: HashMap::new(),
            default_material: None,
            diagnostics: Diagnostics::new(),
        };
        ctx.root = ctx.allocate();
        ctx
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Entity of a named material, created on first use
    pub fn material(&mut self, name: &str) -> EntityId {
        if let Some(&id) = self.materials.get(name) {
            return id;
        }
        let id = self.allocate();
        self.materials.insert(name.to_string(), id);
        id
    }

    pub fn find_material(&self, name: &str) -> Option<EntityId> {
        self.materials.get(name).copied()
    }

    /// The implicit default material, created on first use
    pub fn default_material(&mut self) -> EntityId {
        match self.default_material {
            Some(id) => id,
            None => {
                let id = self.allocate();
                debug!(id = %id, "Default material created");
                self.default_material = Some(id);
                id
            }
        }
    }

    pub fn has_default_material(&self) -> bool {
        self.default_material.is_some()
    }
}

/// One mesh to build, with everything resolved up front
struct MeshUnit<'a> {
    object: &'a SourceObject,
    mesh: &'a SourceMesh,
    material_ids: Vec<EntityId>,
    material_names: Vec<String>,
    default_material: EntityId,
}

/// A built mesh record
struct BuiltMesh {
    name: String,
    payload: Vec<u8>,
    vertices: usize,
    indices: usize,
    diagnostics: Diagnostics,
}

fn build_mesh_unit(unit: &MeshUnit<'_>, version: i32) -> Result<BuiltMesh> {
    let span = info_span!("mesh", name = %unit.mesh.name);
    let _guard = span.enter();

    let faces = prepare_faces(&unit.mesh.faces);
    let input = MeshInput {
        name: &unit.mesh.name,
        vertices: &unit.mesh.vertices,
        faces: &faces,
        group_names: &unit.object.vertex_groups,
        materials: &unit.material_ids,
        default_material: unit.default_material,
        soft_body: unit.object.soft_body.is_some(),
    };
    let mesh = build_indexed_mesh(&input)?;

    let mut diagnostics = Diagnostics::new();
    let scope = format!("mesh '{}'", unit.mesh.name);
    if mesh.normals_generated {
        diagnostics.info(&scope, "has no normals, smooth normals generated");
    }
    if !unit.mesh.has_uvs() {
        diagnostics.info(&scope, "has no UVs, zero UVs written");
    }

    let record = MeshRecord {
        mesh: &mesh,
        billboard: unit.mesh.billboard(),
        parent: unit.object.parent.as_deref(),
        material_names: &unit.material_names,
        source_bounds: unit.mesh.bounding_box(),
        soft_body: unit.object.soft_body.as_ref(),
    };
    let payload = write_mesh_record(&record, version)?;
    debug!(
        vertices = mesh.vertex_count(),
        indices = mesh.index_count(),
        subsets = mesh.subsets.len(),
        "Mesh built"
    );

    Ok(BuiltMesh {
        name: unit.mesh.name.clone(),
        payload,
        vertices: mesh.vertex_count(),
        indices: mesh.index_count(),
        diagnostics,
    })
}

/// In-memory records of a whole export, in write order
#[derive(Default)]
struct PendingRecords {
    records: Vec<(RecordKind, String, Vec<u8>)>,
}

impl PendingRecords {
    fn push(&mut self, kind: RecordKind, name: impl Into<String>, payload: Vec<u8>) {
        self.records.push((kind, name.into(), payload));
    }
}

/// Flattens a scene into an archive
#[derive(Debug, Clone, Default)]
pub struct SceneExporter {
    options: ExportOptions,
}

impl SceneExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export `scene` into `archive`, sampling animation through `evaluator`.
    ///
    /// Soft problems end up in the report's diagnostics. Structural errors
    /// discard the archive and yield [`ExportStatus::Error`].
    pub fn export<E, A>(&self, scene: &SourceScene, evaluator: &mut E, archive: &mut A) -> ExportReport
    where
        E: PoseEvaluator + ?Sized,
        A: Archive + ?Sized,
    {
        let span = info_span!("export", scene = %scene.name);
        let _guard = span.enter();

        if !archive.is_open() {
            warn!("Archive is not open, nothing exported");
            return ExportReport::failed(ExportStatus::NotOpened, Diagnostics::new());
        }

        let mut ctx = ExportContext::new();
        let mut text = self.options.legacy_text.then(LegacyTextWriter::new);
        let mut stats = ExportStats::default();

        let pending = match self.build(scene, evaluator, &mut ctx, text.as_mut(), &mut stats) {
            Ok(pending) => pending,
            Err(e) => return self.abort(archive, e, ctx.diagnostics),
        };

        if let Err(e) = self.commit(scene, &pending, archive, &mut stats) {
            return self.abort(archive, e, ctx.diagnostics);
        }

        let legacy = text.map(|mut writer| {
            writer.errors(&ctx.diagnostics);
            writer.finish()
        });
        info!(
            records = pending.records.len(),
            bytes = stats.bytes_written,
            diagnostics = ctx.diagnostics.len(),
            "Export finished"
        );
        ExportReport {
            status: ExportStatus::Finished,
            diagnostics: ctx.diagnostics,
            stats,
            legacy,
        }
    }

    fn abort<A: Archive + ?Sized>(&self, archive: &mut A, err: Error, diagnostics: Diagnostics) -> ExportReport {
        warn!(error = %err, "Export failed, archive discarded");
        archive.discard();
        ExportReport::failed(ExportStatus::Error(err.to_string()), diagnostics)
    }

    fn commit<A: Archive + ?Sized>(
        &self,
        scene: &SourceScene,
        pending: &PendingRecords,
        archive: &mut A,
        stats: &mut ExportStats,
    ) -> Result<()> {
        write_header(archive, self.options.version as u32, &scene.name)?;
        for (kind, name, payload) in &pending.records {
            write_record(archive, *kind, name, payload)?;
            *stats.records.entry(*kind).or_insert(0) += 1;
        }
        stats.bytes_written = archive.bytes_written();
        archive.close()
    }

    fn build<E: PoseEvaluator + ?Sized>(
        &self,
        scene: &SourceScene,
        evaluator: &mut E,
        ctx: &mut ExportContext,
        mut text: Option<&mut LegacyTextWriter>,
        stats: &mut ExportStats,
    ) -> Result<PendingRecords> {
        scene.validate()?;

        let families = &self.options.families;
        let roles: Vec<(&SourceObject, ObjectRole)> = scene
            .objects
            .iter()
            .map(|o| (o, ObjectRole::classify(o)))
            .collect();

        // flatten every armature before anything else so a broken hierarchy
        // aborts the export before any sampling happens
        let mut skeletons = Vec::new();
        for (object, role) in &roles {
            if *role == ObjectRole::Armature {
                if let Some(armature) = scene.armature_of(object) {
                    skeletons.push(flatten_skeleton(object, armature)?);
                }
            }
        }

        for material in &scene.materials {
            ctx.material(&material.name);
        }
        let units = self.mesh_units(scene, &roles, ctx)?;

        let mut pending = PendingRecords::default();

        if families.materials {
            for material in &scene.materials {
                self.material(material, ctx, text.as_deref_mut(), &mut pending)?;
            }
            if ctx.has_default_material() {
                let default = SourceMaterial::new(DEFAULT_MATERIAL_NAME);
                self.material(&default, ctx, text.as_deref_mut(), &mut pending)?;
            }
        }

        if families.objects {
            let built: Vec<Result<BuiltMesh>> = if self.options.parallel_meshes {
                units
                    .par_iter()
                    .map(|u| build_mesh_unit(u, self.options.version))
                    .collect()
            } else {
                units
                    .iter()
                    .map(|u| build_mesh_unit(u, self.options.version))
                    .collect()
            };
            for result in built {
                let mesh = result?;
                stats.vertices += mesh.vertices;
                stats.indices += mesh.indices;
                ctx.diagnostics.extend(mesh.diagnostics);
                pending.push(RecordKind::Mesh, mesh.name, mesh.payload);
            }

            for (object, role) in &roles {
                if *role == ObjectRole::Mesh {
                    pending.push(RecordKind::Object, &object.name, write_object_record(object, role)?);
                    if let Some(text) = text.as_deref_mut() {
                        text.object(object);
                    }
                }
            }
        }

        for skeleton in &skeletons {
            if families.armatures {
                pending.push(RecordKind::Armature, &skeleton.name, write_armature_record(skeleton)?);
                if let Some(text) = text.as_deref_mut() {
                    text.armature(skeleton);
                }
            }
            if families.actions {
                let actions = self.actions(scene, skeleton, evaluator, ctx);
                for action in &actions {
                    stats.keyframe_samples += action.sample_count();
                    pending.push(RecordKind::Action, &action.name, write_action_record(action)?);
                }
                if let Some(text) = text.as_deref_mut() {
                    text.actions(skeleton, &actions);
                }
            }
        }

        let mut winds = Vec::new();
        for (object, role) in &roles {
            match (role, &object.data) {
                (ObjectRole::Light, ObjectData::Light(light)) if families.lights => {
                    match write_light_record(object, light)? {
                        Some(payload) => {
                            pending.push(RecordKind::Light, &object.name, payload);
                            if let Some(text) = text.as_deref_mut() {
                                text.light(object, light);
                            }
                        }
                        None => ctx.diagnostics.warn(
                            format!("light '{}'", object.name),
                            format!("{:?} lights are not supported, skipped", light.kind),
                        ),
                    }
                }
                (ObjectRole::Camera, ObjectData::Camera(camera)) if families.cameras => {
                    pending.push(RecordKind::Camera, &object.name, write_camera_record(object, camera)?);
                    if let Some(text) = text.as_deref_mut() {
                        text.camera(object);
                    }
                }
                (ObjectRole::HitSphere { property }, _) if families.hitspheres => {
                    pending.push(RecordKind::Object, &object.name, write_object_record(object, role)?);
                    if let Some(text) = text.as_deref_mut() {
                        text.hitsphere(object, property);
                    }
                }
                (ObjectRole::Decal { texture, normal }, _) if families.decals => {
                    pending.push(RecordKind::Object, &object.name, write_object_record(object, role)?);
                    if let Some(text) = text.as_deref_mut() {
                        text.decal(object, texture.as_deref(), normal.as_deref());
                    }
                }
                (ObjectRole::WindField { strength }, _) => winds.push(Wind {
                    rotation: Transform::from_source(&object.transform).rotation,
                    strength: *strength,
                }),
                _ => {}
            }
        }

        if families.world {
            match &scene.world {
                Some(world) => pending.push(RecordKind::World, "world", write_world_record(world, &winds)?),
                None => ctx.diagnostics.warn("world", "World Information cannot be read!"),
            }
            if let Some(text) = text.as_deref_mut() {
                text.world(scene.world.as_ref(), &winds);
            }
        }

        Ok(pending)
    }

    /// Resolve each distinct mesh once, creating the default material on
    /// first need
    fn mesh_units<'a>(
        &self,
        scene: &'a SourceScene,
        roles: &[(&'a SourceObject, ObjectRole)],
        ctx: &mut ExportContext,
    ) -> Result<Vec<MeshUnit<'a>>> {
        let mut seen = HashSet::new();
        let mut units = Vec::new();
        if !self.options.families.objects {
            return Ok(units);
        }

        for (object, role) in roles {
            let object: &'a SourceObject = *object;
            if *role != ObjectRole::Mesh {
                continue;
            }
            let Some(name) = object.mesh_name() else {
                continue;
            };
            if !seen.insert(name) {
                debug!(mesh = name, object = %object.name, "Mesh already exported");
                continue;
            }
            let mesh = scene
                .mesh(name)
                .ok_or_else(|| Error::invalid_reference(format!("mesh '{}'", name)))?;

            let material_ids = mesh
                .materials
                .iter()
                .map(|m| {
                    ctx.find_material(m).ok_or_else(|| {
                        Error::invalid_reference(format!("mesh '{}' uses unknown material '{}'", mesh.name, m))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let (default_material, material_names) = if material_ids.is_empty() {
                (ctx.default_material(), vec![DEFAULT_MATERIAL_NAME.to_string()])
            } else {
                (EntityId::INVALID, mesh.materials.clone())
            };

            units.push(MeshUnit {
                object,
                mesh,
                material_ids,
                material_names,
                default_material,
            });
        }
        Ok(units)
    }

    fn material(
        &self,
        material: &SourceMaterial,
        ctx: &mut ExportContext,
        text: Option<&mut LegacyTextWriter>,
        pending: &mut PendingRecords,
    ) -> Result<()> {
        for slot in material.textures.iter().filter(|t| !t.has_image()) {
            ctx.diagnostics.warn(
                format!("material '{}'", material.name),
                format!("{:?} texture slot has no image, skipped", slot.usage),
            );
        }
        pending.push(RecordKind::Material, &material.name, write_material_record(material)?);
        if let Some(text) = text {
            text.material(material);
        }
        Ok(())
    }

    /// Extract every action of one armature, one at a time on the shared cursor
    fn actions<E: PoseEvaluator + ?Sized>(
        &self,
        scene: &SourceScene,
        skeleton: &FlatSkeleton,
        evaluator: &mut E,
        ctx: &mut ExportContext,
    ) -> Vec<ExtractedAction> {
        scene
            .actions_for(&skeleton.name, &skeleton.data_name)
            .filter_map(|action| {
                extract_action(&mut *evaluator, skeleton, action, scene.frame_start, &mut ctx.diagnostics)
            })
            .collect()
    }
}
