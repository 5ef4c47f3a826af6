//! Binary record writer and mesh record reader
//!
//! Every number is fixed-width little-endian. Strings are an `i32` byte
//! length followed by the raw UTF-8 bytes, without terminator; an absent
//! string is written as length 0. Optional sections always emit their
//! presence flag or count so a reader can skip them without a schema.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use wiexport_core::{BoundingBox, Color, EntityId, Error, Quat, Result, Vec2, Vec3};
use wiexport_scene::{
    Camera, Light, LightKind, ObjectRole, RigidBody, SoftBody, SourceMaterial, SourceObject,
    TextureUsage, World,
};

use crate::animation::{ChannelValue, ExtractedAction};
use crate::convert::{convert_position, parent_inverse, Transform};
use crate::mesh::{IndexedMesh, SkinWeight, SoftBodyData, Subset, Vertex};
use crate::skeleton::FlatSkeleton;

/// Mesh record format version
pub const MESH_FORMAT_VERSION: i32 = 1000;

/// Placeholder for an unset soft-body vertex group
const NO_GROUP: &str = "*";

/// Little-endian byte buffer for one record
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) -> Result<()> {
        Ok(self.buf.write_u8(v)?)
    }

    pub fn flag(&mut self, v: bool) -> Result<()> {
        self.u8(v as u8)
    }

    pub fn i32(&mut self, v: i32) -> Result<()> {
        Ok(self.buf.write_i32::<LittleEndian>(v)?)
    }

    pub fn u32(&mut self, v: u32) -> Result<()> {
        Ok(self.buf.write_u32::<LittleEndian>(v)?)
    }

    pub fn u64(&mut self, v: u64) -> Result<()> {
        Ok(self.buf.write_u64::<LittleEndian>(v)?)
    }

    pub fn f32(&mut self, v: f32) -> Result<()> {
        Ok(self.buf.write_f32::<LittleEndian>(v)?)
    }

    /// A collection length as `i32`
    pub fn count(&mut self, n: usize) -> Result<()> {
        let n = i32::try_from(n)
            .map_err(|_| Error::invalid_data(format!("count {} does not fit a record", n)))?;
        self.i32(n)
    }

    pub fn string(&mut self, s: &str) -> Result<()> {
        self.count(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn opt_string(&mut self, s: Option<&str>) -> Result<()> {
        self.string(s.unwrap_or(""))
    }

    pub fn vec2(&mut self, v: Vec2) -> Result<()> {
        self.f32(v.x)?;
        self.f32(v.y)
    }

    pub fn vec3(&mut self, v: Vec3) -> Result<()> {
        self.f32(v.x)?;
        self.f32(v.y)?;
        self.f32(v.z)
    }

    /// Quaternion as `(x, y, z, w)`
    pub fn quat(&mut self, q: Quat) -> Result<()> {
        for c in q.to_array() {
            self.f32(c)?;
        }
        Ok(())
    }

    /// Colour as RGB, alpha dropped
    pub fn rgb(&mut self, c: Color) -> Result<()> {
        self.f32(c.r)?;
        self.f32(c.g)?;
        self.f32(c.b)
    }

    /// Translation, rotation, scale
    pub fn transform(&mut self, t: &Transform) -> Result<()> {
        self.vec3(t.translation)?;
        self.quat(t.rotation)?;
        self.vec3(t.scale)
    }

    pub fn opt_transform(&mut self, t: Option<&Transform>) -> Result<()> {
        self.flag(t.is_some())?;
        match t {
            Some(t) => self.transform(t),
            None => Ok(()),
        }
    }
}

/// Little-endian reader over one record
pub struct RecordReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn map_err(&self, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof {
                offset: self.cursor.position(),
            }
        } else {
            Error::Io(err)
        }
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|e| self.map_err(e))
    }

    pub fn flag(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<LittleEndian>().map_err(|e| self.map_err(e))
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<LittleEndian>().map_err(|e| self.map_err(e))
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(|e| self.map_err(e))
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(|e| self.map_err(e))
    }

    /// A non-negative `i32` count that the remaining bytes can hold
    pub fn count(&mut self, min_item_size: usize) -> Result<usize> {
        let offset = self.position();
        let n = self.i32()?;
        let n = usize::try_from(n)
            .map_err(|_| Error::invalid_data(format!("negative count {} at offset {}", n, offset)))?;
        if n.saturating_mul(min_item_size) > self.remaining() {
            return Err(Error::UnexpectedEof { offset });
        }
        Ok(n)
    }

    pub fn bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.cursor.read_exact(&mut bytes).map_err(|e| self.map_err(e))?;
        Ok(bytes)
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.count(1)?;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes).map_err(|e| Error::invalid_data(format!("string is not UTF-8: {}", e)))
    }

    /// A string where length 0 means absent
    pub fn opt_string(&mut self) -> Result<Option<String>> {
        let s = self.string()?;
        Ok((!s.is_empty()).then_some(s))
    }

    pub fn vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    pub fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }
}

/// Everything written alongside one indexed mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshRecord<'a> {
    pub mesh: &'a IndexedMesh,
    pub billboard: Option<&'a str>,
    /// Armature object the mesh is skinned to
    pub parent: Option<&'a str>,
    pub material_names: &'a [String],
    /// Bounds in source space
    pub source_bounds: Option<BoundingBox>,
    pub soft_body: Option<&'a SoftBody>,
}

fn write_vertex(w: &mut RecordWriter, v: &Vertex) -> Result<()> {
    w.vec3(v.position)?;
    w.vec3(v.normal)?;
    w.vec2(v.uv)?;
    w.i32(v.material_index as i32)?;
    w.count(v.weights.len())?;
    for weight in &v.weights {
        w.string(&weight.bone)?;
        w.f32(weight.weight)?;
    }
    Ok(())
}

/// Serialize one mesh record
pub fn write_mesh_record(record: &MeshRecord<'_>, version: i32) -> Result<Vec<u8>> {
    let mesh = record.mesh;
    let mut w = RecordWriter::new();

    w.i32(version)?;
    w.opt_string(record.billboard)?;
    w.opt_string(record.parent)?;

    w.count(record.material_names.len())?;
    for name in record.material_names {
        w.string(name)?;
    }

    w.count(mesh.vertices.len())?;
    for v in &mesh.vertices {
        write_vertex(&mut w, v)?;
    }

    w.count(mesh.indices.len())?;
    for &i in &mesh.indices {
        w.u32(i)?;
    }

    w.flag(mesh.soft_body.is_some())?;
    if let Some(soft) = &mesh.soft_body {
        w.count(soft.indices.len())?;
        w.count(soft.vertices.len() * 3)?;
        for &i in &soft.indices {
            w.u32(i)?;
        }
        for v in &soft.vertices {
            w.vec3(*v)?;
        }
    }

    let bounds = record.source_bounds.unwrap_or(BoundingBox::ZERO);
    for corner in bounds.corners() {
        w.vec3(convert_position(corner))?;
    }

    w.flag(record.soft_body.is_some())?;
    if let Some(settings) = record.soft_body {
        w.f32(settings.mass)?;
        w.f32(settings.friction)?;
        for group in [&settings.goal_group, &settings.mass_group, &settings.spring_group] {
            w.string(if group.is_empty() { NO_GROUP } else { group })?;
        }
    }

    w.count(mesh.subsets.len())?;
    for subset in &mesh.subsets {
        w.u64(subset.material_id.value())?;
        w.u32(subset.index_offset)?;
        w.u32(subset.index_count)?;
    }

    Ok(w.into_bytes())
}

/// Soft-body settings as stored in a mesh record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftBodySettings {
    pub mass: f32,
    pub friction: f32,
    /// Goal, mass and spring vertex groups, `None` when unset
    pub groups: [Option<String>; 3],
}

/// A decoded mesh record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMesh {
    pub version: i32,
    pub billboard: Option<String>,
    pub parent: Option<String>,
    pub materials: Vec<String>,
    /// Decoded vertices; `source_index` is not stored and reads as 0
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub soft_body: Option<SoftBodyData>,
    pub bounds: [Vec3; 8],
    pub soft_settings: Option<SoftBodySettings>,
    pub subsets: Vec<Subset>,
}

/// Decode a mesh record written by [`write_mesh_record`].
///
/// Any positive version decodes with the same layout.
pub fn read_mesh_record(bytes: &[u8]) -> Result<DecodedMesh> {
    let mut r = RecordReader::new(bytes);

    let version = r.i32()?;
    if version <= 0 {
        return Err(Error::UnsupportedVersion {
            version,
            supported: MESH_FORMAT_VERSION,
        });
    }
    let billboard = r.opt_string()?;
    let parent = r.opt_string()?;

    let material_count = r.count(4)?;
    let materials = (0..material_count)
        .map(|_| r.string())
        .collect::<Result<Vec<_>>>()?;

    let vertex_count = r.count(40)?;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let position = r.vec3()?;
        let normal = r.vec3()?;
        let uv = r.vec2()?;
        let material_index = r.i32()? as u32;
        let weight_count = r.count(8)?;
        let mut weights = smallvec::SmallVec::new();
        for _ in 0..weight_count {
            let bone = r.string()?;
            let weight = r.f32()?;
            weights.push(SkinWeight { bone, weight });
        }
        vertices.push(Vertex {
            position,
            normal,
            uv,
            material_index,
            weights,
            source_index: 0,
        });
    }

    let index_count = r.count(4)?;
    let indices = (0..index_count).map(|_| r.u32()).collect::<Result<Vec<_>>>()?;

    let soft_body = if r.flag()? {
        let index_count = r.count(4)?;
        let float_count = r.count(4)?;
        if float_count % 3 != 0 {
            return Err(Error::invalid_data(format!(
                "soft-body vertex float count {} is not a multiple of 3",
                float_count
            )));
        }
        let indices = (0..index_count).map(|_| r.u32()).collect::<Result<Vec<_>>>()?;
        let vertices = (0..float_count / 3)
            .map(|_| r.vec3())
            .collect::<Result<Vec<_>>>()?;
        Some(SoftBodyData { indices, vertices })
    } else {
        None
    };

    let mut bounds = [Vec3::ZERO; 8];
    for corner in &mut bounds {
        *corner = r.vec3()?;
    }

    let soft_settings = if r.flag()? {
        let mass = r.f32()?;
        let friction = r.f32()?;
        let mut groups: [Option<String>; 3] = Default::default();
        for group in &mut groups {
            let name = r.string()?;
            *group = (name != NO_GROUP && !name.is_empty()).then_some(name);
        }
        Some(SoftBodySettings {
            mass,
            friction,
            groups,
        })
    } else {
        None
    };

    let subset_count = r.count(16)?;
    let mut subsets = Vec::with_capacity(subset_count);
    for _ in 0..subset_count {
        subsets.push(Subset {
            material_id: EntityId::new(r.u64()?),
            index_offset: r.u32()?,
            index_count: r.u32()?,
        });
    }

    Ok(DecodedMesh {
        version,
        billboard,
        parent,
        materials,
        vertices,
        indices,
        soft_body,
        bounds,
        soft_settings,
        subsets,
    })
}

fn texture_code(usage: TextureUsage) -> u8 {
    match usage {
        TextureUsage::Diffuse => 0,
        TextureUsage::Normal => 1,
        TextureUsage::Specular => 2,
        TextureUsage::Displacement => 3,
        TextureUsage::Reflection => 4,
    }
}

/// Material record; texture slots without an image are left out
pub fn write_material_record(material: &SourceMaterial) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.string(&material.name)?;

    let base = material.surface_color();
    w.rgb(base)?;
    w.f32(base.a)?;
    w.f32(material.metalness)?;
    w.f32(material.roughness)?;
    w.f32(material.alpha)?;
    w.f32(material.refraction_index)?;
    w.rgb(material.specular_color)?;
    w.f32(material.specular_intensity)?;
    w.u32(material.specular_hardness)?;
    w.f32(material.reflectivity)?;
    w.f32(material.friction)?;

    let flags = [
        material.cast_shadow,
        material.shadeless,
        material.transparent,
        material.sky,
        material.water,
        material.subsurface,
    ]
    .iter()
    .enumerate()
    .fold(0u32, |acc, (bit, &set)| acc | ((set as u32) << bit));
    w.u32(flags)?;
    w.vec3(material.moving_texture)?;

    let slots: Vec<_> = material.textures.iter().filter(|t| t.has_image()).collect();
    w.count(slots.len())?;
    for slot in slots {
        w.u8(texture_code(slot.usage))?;
        w.string(&slot.image)?;
        w.flag(slot.premultiplied)?;
        w.string(&slot.blend)?;
    }
    Ok(w.into_bytes())
}

fn write_rigid_body(w: &mut RecordWriter, body: Option<&RigidBody>) -> Result<()> {
    w.flag(body.is_some())?;
    if let Some(body) = body {
        w.string(&body.collision_shape)?;
        w.f32(if body.enabled { body.mass } else { 0.0 })?;
        w.f32(body.friction)?;
        w.f32(body.restitution)?;
        w.f32(body.linear_damping)?;
        w.string(&body.body_type)?;
        w.flag(body.kinematic)?;
    }
    Ok(())
}

fn write_role(w: &mut RecordWriter, role: &ObjectRole) -> Result<()> {
    w.string(role.name())?;
    match role {
        ObjectRole::Decal { texture, normal } => {
            w.opt_string(texture.as_deref())?;
            w.opt_string(normal.as_deref())
        }
        ObjectRole::HitSphere { property } => w.string(property),
        ObjectRole::WindField { strength } => w.f32(*strength),
        _ => Ok(()),
    }
}

/// Object record: role, placement, parenting and collision settings
pub fn write_object_record(object: &SourceObject, role: &ObjectRole) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.string(&object.name)?;
    w.string(object.data.type_name())?;
    write_role(&mut w, role)?;
    w.opt_string(object.mesh_name())?;
    w.opt_string(object.parent.as_deref())?;
    w.opt_string(object.parent_bone.as_deref())?;
    w.opt_transform(parent_inverse(object).as_ref())?;
    w.transform(&Transform::from_source(&object.transform))?;
    write_rigid_body(&mut w, object.rigid_body.as_ref())?;
    Ok(w.into_bytes())
}

/// Armature record: object transform then the flattened bones
pub fn write_armature_record(skeleton: &FlatSkeleton) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.string(&skeleton.name)?;
    w.string(&skeleton.data_name)?;
    w.transform(&skeleton.transform)?;

    w.count(skeleton.bones.len())?;
    for bone in &skeleton.bones {
        w.string(&bone.name)?;
        w.opt_string(bone.parent.as_deref())?;
        w.i32(bone.parent_index.map_or(-1, |i| i as i32))?;
        w.transform(&bone.rest)?;
        w.f32(bone.length)?;
        let flags = (bone.connected as u8)
            | (bone.physics as u8) << 1
            | (bone.cloth as u8) << 2
            | (bone.ragdoll as u8) << 3;
        w.u8(flags)?;
        w.count(bone.springs.len())?;
        for partner in &bone.springs {
            w.string(partner)?;
        }
    }
    Ok(w.into_bytes())
}

/// Action record: per bone, the sparse rotation, translation and scale
/// streams in that order
pub fn write_action_record(action: &ExtractedAction) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.string(&action.name)?;
    w.string(&action.armature)?;
    w.f32(action.frame_start)?;
    w.f32(action.frame_end)?;
    w.i32(action.duration())?;

    w.count(action.tracks.len())?;
    for track in &action.tracks {
        w.string(&track.bone)?;
        w.count(track.channels.len())?;
        for channel in &track.channels {
            w.u8(channel.kind.letter() as u8)?;
            w.count(channel.samples.len())?;
            for sample in &channel.samples {
                w.i32(sample.frame)?;
                match sample.value {
                    ChannelValue::Rotation(q) => w.quat(q)?,
                    ChannelValue::Translation(v) | ChannelValue::Scale(v) => w.vec3(v)?,
                }
            }
        }
    }
    Ok(w.into_bytes())
}

fn light_code(kind: LightKind) -> Option<u8> {
    match kind {
        LightKind::Sun => Some(0),
        LightKind::Point => Some(1),
        LightKind::Spot => Some(2),
        LightKind::Hemi | LightKind::Area => None,
    }
}

/// Light record; `None` for light kinds the engine has no counterpart for
pub fn write_light_record(object: &SourceObject, light: &Light) -> Result<Option<Vec<u8>>> {
    let Some(code) = light_code(light.kind) else {
        return Ok(None);
    };
    let mut w = RecordWriter::new();
    w.string(&object.name)?;
    w.u8(code)?;
    w.opt_string(object.parent.as_deref())?;
    w.opt_string(object.parent_bone.as_deref())?;
    w.opt_transform(parent_inverse(object).as_ref())?;
    w.transform(&Transform::from_source(&object.transform))?;
    w.rgb(light.color)?;
    w.f32(light.energy)?;
    w.f32(light.distance)?;
    w.flag(light.shadow)?;
    w.f32(light.spot_size)?;
    w.count(light.textures.len())?;
    for texture in &light.textures {
        w.string(texture)?;
    }
    Ok(Some(w.into_bytes()))
}

/// Camera record
pub fn write_camera_record(object: &SourceObject, camera: &Camera) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.string(&object.name)?;
    w.opt_string(object.parent.as_deref())?;
    w.opt_string(object.parent_bone.as_deref())?;
    w.opt_transform(parent_inverse(object).as_ref())?;
    w.transform(&Transform::from_source(&object.transform))?;
    w.f32(camera.fov)?;
    w.f32(camera.clip_start)?;
    w.f32(camera.clip_end)?;
    Ok(w.into_bytes())
}

/// A scene wind field in engine space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wind {
    pub rotation: Quat,
    pub strength: f32,
}

/// World record: sky colours, optional mist and the wind fields
pub fn write_world_record(world: &World, winds: &[Wind]) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new();
    w.rgb(world.horizon)?;
    w.rgb(world.zenith)?;
    w.rgb(world.ambient)?;
    w.flag(world.mist.is_some())?;
    if let Some(mist) = &world.mist {
        w.f32(mist.start)?;
        w.f32(mist.depth)?;
        w.f32(mist.height)?;
    }
    w.count(winds.len())?;
    for wind in winds {
        w.quat(wind.rotation)?;
        w.f32(wind.strength)?;
    }
    Ok(w.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use wiexport_scene::TextureSlot;

    fn tiny_mesh() -> IndexedMesh {
        let vertex = |x: f32| Vertex {
            position: Vec3::new(x, 0.0, 0.0),
            normal: Vec3::Y,
            uv: Vec2::new(x, 1.0),
            material_index: 0,
            weights: smallvec![SkinWeight {
                bone: "spine".into(),
                weight: 1.0
            }],
            source_index: 0,
        };
        IndexedMesh {
            name: "Tri".into(),
            vertices: vec![vertex(0.0), vertex(1.0), vertex(2.0)],
            indices: vec![0, 1, 2],
            subsets: vec![Subset {
                material_id: EntityId::new(7),
                index_offset: 0,
                index_count: 3,
            }],
            soft_body: None,
            normals_generated: false,
        }
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut w = RecordWriter::new();
        w.string("abc").unwrap();
        w.opt_string(None).unwrap();
        assert_eq!(w.into_bytes(), vec![3, 0, 0, 0, b'a', b'b', b'c', 0, 0, 0, 0]);
    }

    #[test]
    fn test_mesh_record_layout() {
        let mesh = tiny_mesh();
        let names = vec!["Skin".to_string()];
        let record = MeshRecord {
            mesh: &mesh,
            billboard: None,
            parent: Some("Rig"),
            material_names: &names,
            source_bounds: mesh.bounding_box(),
            soft_body: None,
        };
        let bytes = write_mesh_record(&record, MESH_FORMAT_VERSION).unwrap();

        assert_eq!(&bytes[0..4], &1000i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_le_bytes());
        assert_eq!(&bytes[12..15], b"Rig");

        let decoded = read_mesh_record(&bytes).unwrap();
        assert_eq!(decoded.parent.as_deref(), Some("Rig"));
        assert_eq!(decoded.billboard, None);
        assert_eq!(decoded.materials, names);
        assert_eq!(decoded.vertices, mesh.vertices);
        assert_eq!(decoded.indices, vec![0, 1, 2]);
        assert_eq!(decoded.subsets, mesh.subsets);
        assert!(decoded.soft_body.is_none());
        assert!(decoded.soft_settings.is_none());
        assert_eq!(decoded.bounds[7], Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_soft_body_sections() {
        let mut mesh = tiny_mesh();
        mesh.soft_body = Some(SoftBodyData {
            indices: vec![0, 1, 2],
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        });
        let settings = SoftBody {
            mass: 2.0,
            friction: 0.25,
            goal_group: "pin".into(),
            mass_group: String::new(),
            spring_group: String::new(),
        };
        let record = MeshRecord {
            mesh: &mesh,
            billboard: Some("leaf"),
            parent: None,
            material_names: &[],
            source_bounds: None,
            soft_body: Some(&settings),
        };
        let decoded = read_mesh_record(&write_mesh_record(&record, MESH_FORMAT_VERSION).unwrap()).unwrap();

        assert_eq!(decoded.billboard.as_deref(), Some("leaf"));
        assert_eq!(decoded.soft_body, mesh.soft_body);
        let soft = decoded.soft_settings.unwrap();
        assert_eq!(soft.mass, 2.0);
        assert_eq!(soft.groups, [Some("pin".to_string()), None, None]);
    }

    #[test]
    fn test_truncated_record() {
        let mesh = tiny_mesh();
        let record = MeshRecord {
            mesh: &mesh,
            billboard: None,
            parent: None,
            material_names: &[],
            source_bounds: None,
            soft_body: None,
        };
        let bytes = write_mesh_record(&record, MESH_FORMAT_VERSION).unwrap();
        let err = read_mesh_record(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
    }

    #[test]
    fn test_configured_version_reads_back() {
        let mesh = tiny_mesh();
        let record = MeshRecord {
            mesh: &mesh,
            billboard: None,
            parent: None,
            material_names: &[],
            source_bounds: None,
            soft_body: None,
        };
        let decoded = read_mesh_record(&write_mesh_record(&record, 2000).unwrap()).unwrap();
        assert_eq!(decoded.version, 2000);
        assert_eq!(decoded.indices, vec![0, 1, 2]);

        let bytes = write_mesh_record(&record, 0).unwrap();
        assert!(matches!(
            read_mesh_record(&bytes),
            Err(Error::UnsupportedVersion { version: 0, .. })
        ));
    }

    #[test]
    fn test_material_skips_empty_slots() {
        let mut material = SourceMaterial::new("Skin");
        material.textures.push(TextureSlot::new(TextureUsage::Diffuse, "skin.png"));
        material.textures.push(TextureSlot::new(TextureUsage::Normal, ""));
        let with_empty = write_material_record(&material).unwrap();

        material.textures.pop();
        let without = write_material_record(&material).unwrap();
        assert_eq!(with_empty, without);
    }
}
