//! Vertex welding and indexed mesh building
//!
//! Face corners are welded on `(source vertex, normal, uv)`, never on the raw
//! position: one tool vertex splits into several output vertices wherever its
//! corners disagree on normal or UV (hard edges, UV seams).

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;
use wiexport_core::{BoundingBox, EntityId, Error, Result, Vec2, Vec3};
use wiexport_scene::{SourceFace, SourceVertex};

use crate::convert::convert_position;

/// Bit-exact welding key: source vertex index, normal bits, uv bits
pub type WeldKey = (u32, [u32; 3], [u32; 2]);

/// Influence of one bone on a vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinWeight {
    pub bone: String,
    pub weight: f32,
}

/// An output vertex, in engine space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub material_index: u32,
    pub weights: SmallVec<[SkinWeight; 4]>,
    /// Tool vertex this one was welded from
    pub source_index: u32,
}

/// A contiguous run of indices drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subset {
    pub material_id: EntityId,
    pub index_offset: u32,
    pub index_count: u32,
}

impl Subset {
    pub fn range(&self) -> Range<usize> {
        let start = self.index_offset as usize;
        start..start + self.index_count as usize
    }
}

/// Soft-body simulation inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftBodyData {
    /// Source vertex index of every emitted index
    pub indices: Vec<u32>,
    /// Every source position, converted
    pub vertices: Vec<Vec3>,
}

/// Welded vertex buffer, index buffer and material subsets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub subsets: Vec<Subset>,
    pub soft_body: Option<SoftBodyData>,
    /// Normals were synthesized because the source supplied none
    pub normals_generated: bool,
}

impl IndexedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Bounds of the output positions
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices.iter().map(|v| v.position))
    }
}

/// Everything the welder reads for one mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshInput<'a> {
    pub name: &'a str,
    pub vertices: &'a [SourceVertex],
    /// Faces grouped by material, see [`prepare_faces`]
    pub faces: &'a [SourceFace],
    /// Vertex group names, indexed by `GroupWeight::group`
    pub group_names: &'a [String],
    /// Material entity of every material slot, may be empty
    pub materials: &'a [EntityId],
    /// Material used when `materials` is empty
    pub default_material: EntityId,
    pub soft_body: bool,
}

/// Fan-triangulate polygons, then stable-sort faces by material so each
/// material forms one contiguous group. Faces with fewer than three corners
/// are dropped.
pub fn prepare_faces(faces: &[SourceFace]) -> Vec<SourceFace> {
    let mut out = Vec::with_capacity(faces.len());
    for (index, face) in faces.iter().enumerate() {
        match face.corners.len() {
            0..=2 => {
                debug!(face = index, corners = face.corners.len(), "Skipping degenerate face");
                continue;
            }
            3 => {
                out.push(face.clone());
                continue;
            }
            _ => {}
        }
        for i in 1..face.corners.len() - 1 {
            out.push(SourceFace {
                corners: vec![
                    face.corners[0].clone(),
                    face.corners[i].clone(),
                    face.corners[i + 1].clone(),
                ],
                material_index: face.material_index,
                smooth: face.smooth,
            });
        }
    }
    out.sort_by_key(|f| f.material_index);
    out
}

/// Insertion-ordered welding state
#[derive(Debug, Default)]
struct Welder {
    lookup: HashMap<WeldKey, u32>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Welder {
    /// Index of the vertex for `key`, allocating it on first sight
    fn weld(&mut self, key: WeldKey, make: impl FnOnce() -> Vertex) -> u32 {
        let index = match self.lookup.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.vertices.len() as u32;
                self.vertices.push(make());
                self.lookup.insert(key, index);
                index
            }
        };
        self.indices.push(index);
        index
    }
}

/// Bit pattern of `v` with both zeros folded onto +0.0
fn key_bits(v: f32) -> u32 {
    if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn weld_key(source_index: u32, normal: Vec3, uv: Vec2) -> WeldKey {
    (
        source_index,
        normal.to_array().map(key_bits),
        uv.to_array().map(key_bits),
    )
}

/// Build the indexed mesh from faces already grouped by material.
///
/// Corners are appended in the order given; no triangulation happens here.
/// Fails on a UV that is not a (u, v) pair, on a corner pointing past the
/// vertex list, on a material slot without an entity, and when one
/// material's faces are split into several runs.
pub fn build_indexed_mesh(input: &MeshInput<'_>) -> Result<IndexedMesh> {
    let mut welder = Welder::default();
    let mut subsets = Vec::new();
    let mut finished: HashSet<u32> = HashSet::new();
    let mut current: Option<(u32, usize)> = None;
    let mut soft_indices = Vec::new();
    let no_materials = input.materials.is_empty();

    for (face_index, face) in input.faces.iter().enumerate() {
        let material_index = if no_materials { 0 } else { face.material_index };

        if current.map(|(m, _)| m) != Some(material_index) {
            if let Some((previous, start)) = current {
                subsets.push(make_subset(input, previous, start, welder.indices.len())?);
                finished.insert(previous);
            }
            if finished.contains(&material_index) {
                return Err(Error::UngroupedMaterials {
                    material_index,
                    face: face_index,
                });
            }
            current = Some((material_index, welder.indices.len()));
        }

        for corner in &face.corners {
            let source = input
                .vertices
                .get(corner.vertex_index as usize)
                .ok_or_else(|| {
                    Error::invalid_reference(format!(
                        "mesh '{}' face {} references vertex {} of {}",
                        input.name,
                        face_index,
                        corner.vertex_index,
                        input.vertices.len()
                    ))
                })?;

            let uv = match corner.uv.as_deref() {
                None => Vec2::ZERO,
                Some([u, v]) => Vec2::new(*u, *v),
                Some(other) => {
                    return Err(Error::MalformedAttribute {
                        mesh: input.name.to_string(),
                        face: face_index,
                        count: other.len(),
                    })
                }
            };
            let normal = corner.normal.unwrap_or(source.normal);

            welder.weld(weld_key(corner.vertex_index, normal, uv), || Vertex {
                position: convert_position(source.position),
                normal: convert_position(normal),
                uv,
                material_index,
                weights: source
                    .groups
                    .iter()
                    .filter_map(|g| {
                        input.group_names.get(g.group as usize).map(|name| SkinWeight {
                            bone: name.clone(),
                            weight: g.weight,
                        })
                    })
                    .collect(),
                source_index: corner.vertex_index,
            });
            if input.soft_body {
                soft_indices.push(corner.vertex_index);
            }
        }
    }

    match current {
        Some((last, start)) => subsets.push(make_subset(input, last, start, welder.indices.len())?),
        None if no_materials => subsets.push(Subset {
            material_id: input.default_material,
            index_offset: 0,
            index_count: 0,
        }),
        None => {}
    }

    let mut mesh = IndexedMesh {
        name: input.name.to_string(),
        vertices: welder.vertices,
        indices: welder.indices,
        subsets,
        soft_body: input.soft_body.then(|| SoftBodyData {
            indices: soft_indices,
            vertices: input.vertices.iter().map(|v| convert_position(v.position)).collect(),
        }),
        normals_generated: false,
    };

    let no_normals = mesh.vertices.iter().all(|v| v.normal == Vec3::ZERO);
    let has_extent = mesh.vertices.iter().any(|v| v.position != Vec3::ZERO);
    if no_normals && has_extent {
        debug!(mesh = %mesh.name, "Generating missing normal data");
        compute_normals_smooth_fast(&mut mesh);
        mesh.normals_generated = true;
    }

    debug!(
        mesh = %mesh.name,
        vertices = mesh.vertices.len(),
        indices = mesh.indices.len(),
        subsets = mesh.subsets.len(),
        "Mesh welded"
    );
    Ok(mesh)
}

fn make_subset(input: &MeshInput<'_>, material_index: u32, start: usize, end: usize) -> Result<Subset> {
    let material_id = if input.materials.is_empty() {
        input.default_material
    } else {
        *input
            .materials
            .get(material_index as usize)
            .ok_or_else(|| {
                Error::invalid_reference(format!(
                    "mesh '{}' uses material slot {} of {}",
                    input.name,
                    material_index,
                    input.materials.len()
                ))
            })?
    };
    Ok(Subset {
        material_id,
        index_offset: start as u32,
        index_count: (end - start) as u32,
    })
}

/// Face-averaged vertex normals over every complete triangle of the index
/// buffer. Degenerate triangles contribute nothing.
pub fn compute_normals_smooth_fast(mesh: &mut IndexedMesh) {
    let mut accumulated = vec![Vec3::ZERO; mesh.vertices.len()];

    for tri in mesh.indices.chunks_exact(3) {
        let [i1, i2, i3] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(v1), Some(v2), Some(v3)) =
            (mesh.vertices.get(i1), mesh.vertices.get(i2), mesh.vertices.get(i3))
        else {
            continue;
        };
        let side1 = v1.position - v3.position;
        let side2 = v1.position - v2.position;
        let normal = side1.cross(side2).normalize_or_zero();

        accumulated[i1] += normal;
        accumulated[i2] += normal;
        accumulated[i3] += normal;
    }

    for (vertex, normal) in mesh.vertices.iter_mut().zip(accumulated) {
        vertex.normal = normal.normalize_or_zero();
    }
}
