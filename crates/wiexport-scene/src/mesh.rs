// wiexport-scene/src/mesh.rs
//! Author-time mesh data: shared vertices and per-corner face attributes

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use wiexport_core::{BoundingBox, Vec3};

use crate::object::Properties;

/// A mesh as the authoring tool stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMesh {
    /// Mesh data name
    pub name: String,
    /// Shared vertices, referenced by corners
    pub vertices: Vec<SourceVertex>,
    /// Polygons (any corner count)
    pub faces: Vec<SourceFace>,
    /// Material slot names, may be empty
    #[serde(default)]
    pub materials: Vec<String>,
    /// Custom properties (`billboard`, ...)
    #[serde(default)]
    pub properties: Properties,
}

impl SourceMesh {
    /// Create a new empty mesh
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            faces: Vec::new(),
            materials: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get face count
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Triangles produced by fan-triangulating every polygon
    pub fn triangle_count(&self) -> usize {
        self.faces
            .iter()
            .map(|f| f.corners.len().saturating_sub(2))
            .sum()
    }

    /// Check if any corner carries a UV attribute
    pub fn has_uvs(&self) -> bool {
        self.corners().any(|c| c.uv.is_some())
    }

    /// Check if any corner carries a split normal
    pub fn has_corner_normals(&self) -> bool {
        self.corners().any(|c| c.normal.is_some())
    }

    /// Check if any vertex is weighted to a group
    pub fn has_skin_weights(&self) -> bool {
        self.vertices.iter().any(|v| !v.groups.is_empty())
    }

    /// Name of the billboard target, if tagged
    pub fn billboard(&self) -> Option<&str> {
        self.properties
            .get("billboard")
            .and_then(|p| p.as_str())
            .filter(|s| !s.is_empty())
    }

    /// All face corners in face order
    pub fn corners(&self) -> impl Iterator<Item = &SourceCorner> {
        self.faces.iter().flat_map(|f| f.corners.iter())
    }

    /// Get all unique material indices used by faces
    pub fn material_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.faces.iter().map(|f| f.material_index).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Calculate bounding box from vertex positions (source space)
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices.iter().map(|v| v.position))
    }
}

/// A shared vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVertex {
    /// Position in object space
    pub position: Vec3,
    /// Averaged vertex normal
    #[serde(default)]
    pub normal: Vec3,
    /// Vertex group memberships
    #[serde(default)]
    pub groups: SmallVec<[GroupWeight; 4]>,
}

impl SourceVertex {
    /// Create a vertex with just a position
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            normal: Vec3::ZERO,
            groups: SmallVec::new(),
        }
    }
}

/// Weight of a vertex in one vertex group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupWeight {
    /// Index into the owning object's vertex group names
    pub group: u32,
    pub weight: f32,
}

/// A polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFace {
    /// Corners in winding order
    pub corners: Vec<SourceCorner>,
    /// Material slot of this face
    #[serde(default)]
    pub material_index: u32,
    /// Smooth shading flag
    #[serde(default = "default_smooth")]
    pub smooth: bool,
}

fn default_smooth() -> bool {
    true
}

impl SourceFace {
    /// Create a face from vertex indices with no per-corner attributes
    pub fn from_indices(indices: &[u32]) -> Self {
        Self {
            corners: indices.iter().map(|&i| SourceCorner::new(i)).collect(),
            material_index: 0,
            smooth: true,
        }
    }

    /// Set the material slot
    pub fn with_material(mut self, material_index: u32) -> Self {
        self.material_index = material_index;
        self
    }
}

/// Per-face-corner attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCorner {
    /// Index into `SourceMesh::vertices`
    pub vertex_index: u32,
    /// Split normal, when the tool supplies one
    #[serde(default)]
    pub normal: Option<Vec3>,
    /// UV attribute components of the active layer
    #[serde(default)]
    pub uv: Option<Vec<f32>>,
}

impl SourceCorner {
    pub fn new(vertex_index: u32) -> Self {
        Self {
            vertex_index,
            normal: None,
            uv: None,
        }
    }

    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.uv = Some(vec![u, v]);
        self
    }
}
