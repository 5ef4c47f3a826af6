//! wiexport Export Pipeline
//!
//! Turns a [`wiexport_scene::SourceScene`] into engine records:
//! - coordinate conversion (Z-up to Y-up, quaternion re-basing)
//! - vertex welding into indexed meshes with material subsets
//! - skeleton flattening and sparse keyframe extraction
//! - little-endian binary records framed into an archive stream
//! - the legacy text side channel

pub mod animation;
pub mod archive;
pub mod convert;
pub mod diagnostics;
pub mod exporter;
pub mod mesh;
pub mod records;
pub mod skeleton;
pub mod text;

pub use animation::{
    extract_action, resolve_frame_range, BoneTrack, ChannelState, ChannelStream, ChannelValue,
    ExtractedAction, Sample,
};
pub use archive::{
    header_source, read_stream, write_header, write_record, Archive, ArchiveStream, FileArchive,
    MemoryArchive, RawRecord, RecordKind, STREAM_MAGIC,
};
pub use convert::{
    convert_color, convert_position, convert_rotation, convert_scale, convert_source_rotation,
    parent_inverse, same_rotation, unconvert_rotation, Transform,
};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use exporter::{
    ExportContext, ExportFamilies, ExportOptions, ExportReport, ExportStats, ExportStatus,
    SceneExporter, DEFAULT_MATERIAL_NAME,
};
pub use mesh::{
    build_indexed_mesh, compute_normals_smooth_fast, prepare_faces, IndexedMesh, MeshInput,
    SkinWeight, SoftBodyData, Subset, Vertex, WeldKey,
};
pub use records::{
    read_mesh_record, write_mesh_record, DecodedMesh, MeshRecord, RecordReader, RecordWriter,
    SoftBodySettings, Wind, MESH_FORMAT_VERSION,
};
pub use skeleton::{flatten_skeleton, local_rest_transform, FlatBone, FlatSkeleton};
pub use text::{py_float, LegacySections, LegacyTextWriter};
