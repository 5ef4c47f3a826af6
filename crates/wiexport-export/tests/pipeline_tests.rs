//! Integration tests for the export pipeline
//!
//! These tests cover:
//! - Welding properties over generated meshes
//! - Quaternion re-basing
//! - Keyframe extraction through the snapshot evaluator
//! - Whole-scene exports into file and memory archives

use std::collections::HashSet;

use proptest::prelude::*;
use wiexport_core::{EntityId, Quat, Vec3};
use wiexport_export::{
    build_indexed_mesh, convert_position, convert_rotation, extract_action, flatten_skeleton,
    prepare_faces, read_mesh_record, read_stream, same_rotation, unconvert_rotation, Archive,
    Diagnostics, ExportOptions, ExportStatus, FileArchive, MemoryArchive, MeshInput, RecordKind,
    SceneExporter, Transform,
};
use wiexport_scene::{
    Action, ChannelKind, CurveGroup, FCurve, ObjectData, SceneParser, SnapshotEvaluator,
    SnapshotFormat, SnapshotParser, SourceArmature, SourceBone, SourceCorner, SourceFace,
    SourceObject, SourceScene, SourceVertex,
};

const LEVEL_JSON: &str = r#"{
    "name": "Level",
    "frame_start": 1,
    "frame_end": 40,
    "objects": [
        {"name": "Rig", "data": {"type": "armature", "armature": "RigData"}},
        {"name": "Body", "data": {"type": "mesh", "mesh": "BodyMesh"}, "parent": "Rig"},
        {"name": "HeadHit", "data": {"type": "empty"}, "parent": "Rig", "parent_bone": "head"},
        {"name": "Stain", "data": {"type": "empty"}, "properties": {"decal": 1, "texture": "stain.dds", "normal": "stain_n.dds"}},
        {"name": "Gust", "data": {"type": "empty", "field": {"kind": "wind", "strength": 2.5}}},
        {"name": "Sun", "data": {"type": "light", "kind": "sun"}},
        {"name": "Eye", "data": {"type": "camera"}, "parent": "Rig", "parent_bone": "head"}
    ],
    "meshes": [
        {
            "name": "BodyMesh",
            "vertices": [{"position": [0, 0, 0]}, {"position": [1, 0, 0]}, {"position": [0, 1, 0]}],
            "faces": [{"corners": [{"vertex_index": 0}, {"vertex_index": 1}, {"vertex_index": 2}]}],
            "materials": ["Skin"]
        }
    ],
    "armatures": [
        {
            "name": "RigData",
            "bones": [
                {"name": "root"},
                {"name": "head", "parent": "root"}
            ]
        }
    ],
    "actions": [
        {
            "name": "RigDataNod",
            "groups": [
                {"name": "head", "channels": [
                    {"data_path": "pose.bones[\"head\"].location", "array_index": 2,
                     "keyframes": [{"frame": 1, "value": 0.0}, {"frame": 21, "value": 1.0}]}
                ]}
            ]
        }
    ],
    "materials": [{"name": "Skin"}]
}"#;

fn load_level() -> SourceScene {
    SnapshotParser::new(SnapshotFormat::Json)
        .parse(LEVEL_JSON.as_bytes())
        .unwrap()
}

fn vertex(x: f32, y: f32, z: f32) -> SourceVertex {
    let mut v = SourceVertex::new(Vec3::new(x, y, z));
    v.normal = Vec3::Z;
    v
}

fn quad_vertices() -> Vec<SourceVertex> {
    vec![
        vertex(0.0, 0.0, 0.0),
        vertex(1.0, 0.0, 0.0),
        vertex(1.0, 1.0, 0.0),
        vertex(0.0, 1.0, 0.0),
    ]
}

fn input<'a>(
    vertices: &'a [SourceVertex],
    faces: &'a [SourceFace],
    materials: &'a [EntityId],
) -> MeshInput<'a> {
    MeshInput {
        name: "Test",
        vertices,
        faces,
        group_names: &[],
        materials,
        default_material: EntityId::new(99),
        soft_body: false,
    }
}

/// One armature object with a single bone, plus the given action
fn rig_scene(action: Action, frame_start: i32) -> SourceScene {
    let mut scene = SourceScene::new("Scene");
    scene.frame_start = frame_start;
    let mut armature = SourceArmature::new("RigData");
    armature.add_bone(SourceBone::new("bone"));
    scene.armatures.push(armature);
    scene.objects.push(SourceObject::new(
        "Rig",
        ObjectData::Armature { armature: "RigData".into() },
    ));
    scene.actions.push(action);
    scene
}

fn arb_mesh() -> impl Strategy<Value = (Vec<SourceVertex>, Vec<SourceFace>)> {
    (1usize..8)
        .prop_flat_map(|n| {
            let corner = (0..n as u32, prop::option::of(0u8..3));
            let face = (prop::collection::vec(corner, 3), 0u32..3);
            (Just(n), prop::collection::vec(face, 0..12))
        })
        .prop_map(|(n, faces)| {
            let vertices = (0..n)
                .map(|i| vertex(i as f32, (i * i) as f32, 1.0))
                .collect();
            let faces = faces
                .into_iter()
                .map(|(corners, material_index)| SourceFace {
                    corners: corners
                        .into_iter()
                        .map(|(index, uv)| match uv {
                            Some(u) => SourceCorner::new(index).with_uv(u as f32 * 0.5, 1.0),
                            None => SourceCorner::new(index),
                        })
                        .collect(),
                    material_index,
                    smooth: true,
                })
                .collect();
            (vertices, faces)
        })
}

fn arb_quat() -> impl Strategy<Value = Quat> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
        .prop_filter("non-degenerate", |(x, y, z, w)| x * x + y * y + z * z + w * w > 0.01)
        .prop_map(|(x, y, z, w)| Quat::from_xyzw(x, y, z, w).normalize())
}

mod welding_tests {
    use super::*;

    const MATERIALS: [EntityId; 3] = [EntityId(10), EntityId(11), EntityId(12)];

    proptest! {
        #[test]
        fn test_weld_keys_unique_and_indices_valid((vertices, faces) in arb_mesh()) {
            let prepared = prepare_faces(&faces);
            let mesh = build_indexed_mesh(&input(&vertices, &prepared, &MATERIALS)).unwrap();

            prop_assert_eq!(mesh.indices.len(), prepared.len() * 3);
            prop_assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));

            let keys: HashSet<_> = mesh
                .vertices
                .iter()
                .map(|v| (v.source_index, v.normal.to_array().map(f32::to_bits), v.uv.to_array().map(f32::to_bits)))
                .collect();
            prop_assert_eq!(keys.len(), mesh.vertices.len());

            let corners = prepared.iter().flat_map(|f| f.corners.iter());
            for (corner, &index) in corners.zip(&mesh.indices) {
                prop_assert_eq!(mesh.vertices[index as usize].source_index, corner.vertex_index);
            }
        }

        #[test]
        fn test_subsets_cover_indices((vertices, faces) in arb_mesh()) {
            let prepared = prepare_faces(&faces);
            let mesh = build_indexed_mesh(&input(&vertices, &prepared, &MATERIALS)).unwrap();

            let mut end = 0;
            for subset in &mesh.subsets {
                prop_assert_eq!(subset.index_offset, end);
                end += subset.index_count;
            }
            prop_assert_eq!(end as usize, mesh.indices.len());

            let distinct: HashSet<u32> = prepared.iter().map(|f| f.material_index).collect();
            prop_assert_eq!(mesh.subsets.len(), distinct.len());
        }

        #[test]
        fn test_rewelding_output_is_identity((vertices, faces) in arb_mesh()) {
            let prepared = prepare_faces(&faces);
            let mesh = build_indexed_mesh(&input(&vertices, &prepared, &MATERIALS)).unwrap();

            // every output vertex becomes a source vertex with one single-corner face
            let sources: Vec<SourceVertex> = mesh
                .vertices
                .iter()
                .map(|v| {
                    let mut source = SourceVertex::new(convert_position(v.position));
                    source.normal = convert_position(v.normal);
                    source
                })
                .collect();
            let single: Vec<SourceFace> = mesh
                .vertices
                .iter()
                .enumerate()
                .map(|(i, v)| SourceFace {
                    corners: vec![SourceCorner::new(i as u32).with_uv(v.uv.x, v.uv.y)],
                    material_index: 0,
                    smooth: true,
                })
                .collect();
            let rewelded = build_indexed_mesh(&input(&sources, &single, &MATERIALS[..1])).unwrap();

            prop_assert_eq!(rewelded.vertices.len(), mesh.vertices.len());
            prop_assert_eq!(rewelded.indices, (0..mesh.vertices.len() as u32).collect::<Vec<_>>());
            for (a, b) in rewelded.vertices.iter().zip(&mesh.vertices) {
                prop_assert_eq!(a.position, b.position);
                prop_assert_eq!(a.normal, b.normal);
                prop_assert_eq!(a.uv, b.uv);
            }
        }

        #[test]
        fn test_welding_is_deterministic((vertices, faces) in arb_mesh()) {
            let prepared = prepare_faces(&faces);
            let first = build_indexed_mesh(&input(&vertices, &prepared, &MATERIALS)).unwrap();
            let second = build_indexed_mesh(&input(&vertices, &prepared, &MATERIALS)).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_quad_shares_diagonal() {
        let vertices = quad_vertices();
        let faces = prepare_faces(&[SourceFace::from_indices(&[0, 1, 2, 3])]);
        let mesh = build_indexed_mesh(&input(&vertices, &faces, &[EntityId::new(7)])).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.subsets.len(), 1);
        assert_eq!(mesh.subsets[0].material_id, EntityId::new(7));
        assert_eq!(mesh.subsets[0].index_count, 6);
    }

    #[test]
    fn test_hard_edge_splits_vertices() {
        let vertices = quad_vertices();
        let up = Vec3::Z;
        let side = Vec3::Y;
        let faces = vec![
            SourceFace {
                corners: [0, 1, 2].map(|i| SourceCorner::new(i).with_normal(up)).to_vec(),
                material_index: 0,
                smooth: false,
            },
            SourceFace {
                corners: [0, 2, 3].map(|i| SourceCorner::new(i).with_normal(side)).to_vec(),
                material_index: 0,
                smooth: false,
            },
        ];
        let mesh = build_indexed_mesh(&input(&vertices, &faces, &[EntityId::new(7)])).unwrap();

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), 6);
    }

    #[test]
    fn test_no_materials_uses_default() {
        let vertices = quad_vertices();
        let faces = prepare_faces(&[SourceFace::from_indices(&[0, 1, 2, 3]).with_material(2)]);
        let mesh = build_indexed_mesh(&input(&vertices, &faces, &[])).unwrap();

        assert_eq!(mesh.subsets.len(), 1);
        assert_eq!(mesh.subsets[0].material_id, EntityId::new(99));
        assert_eq!(mesh.subsets[0].index_count, 6);
        assert!(mesh.vertices.iter().all(|v| v.material_index == 0));
    }

    #[test]
    fn test_split_material_run_rejected() {
        let vertices = quad_vertices();
        let faces = vec![
            SourceFace::from_indices(&[0, 1, 2]).with_material(0),
            SourceFace::from_indices(&[0, 2, 3]).with_material(1),
            SourceFace::from_indices(&[1, 2, 3]).with_material(0),
        ];
        let materials = [EntityId::new(1), EntityId::new(2)];
        assert!(build_indexed_mesh(&input(&vertices, &faces, &materials)).is_err());
    }
}

mod conversion_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_rebased_product_flips_sign(a in arb_quat(), b in arb_quat()) {
            let product = convert_rotation(a) * convert_rotation(b);
            let converted = convert_rotation(a * b);
            prop_assert!(same_rotation(product, converted, 1e-4));
            prop_assert!(product.dot(converted) < -0.999);
        }

        #[test]
        fn test_rotation_commutes_with_position(
            q in arb_quat(),
            (x, y, z) in (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
        ) {
            let v = Vec3::new(x, y, z);
            let rotated_then_converted = convert_position(q * v);
            let converted_then_rotated = convert_rotation(q) * convert_position(v);
            prop_assert!(rotated_then_converted.abs_diff_eq(converted_then_rotated, 1e-3 * (1.0 + v.length())));
        }

        #[test]
        fn test_unconvert_inverts(q in arb_quat()) {
            prop_assert_eq!(unconvert_rotation(convert_rotation(q)), q);
        }
    }

    #[test]
    fn test_identity_rebases_to_negative_w() {
        assert_eq!(Transform::IDENTITY.rotation, Quat::from_xyzw(0.0, 0.0, 0.0, -1.0));
        assert_eq!(convert_rotation(Quat::IDENTITY), Transform::IDENTITY.rotation);
        assert_eq!(unconvert_rotation(Transform::IDENTITY.rotation), Quat::IDENTITY);
    }
}

mod animation_tests {
    use super::*;

    fn extract(scene: &SourceScene) -> wiexport_export::ExtractedAction {
        let skeleton = flatten_skeleton(&scene.objects[0], &scene.armatures[0]).unwrap();
        let mut evaluator = SnapshotEvaluator::new(scene);
        let mut diagnostics = Diagnostics::new();
        extract_action(
            &mut evaluator,
            &skeleton,
            &scene.actions[0],
            scene.frame_start,
            &mut diagnostics,
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn test_sample_frames_strictly_increase(mut keys in prop::collection::vec(-50i32..50, 1..10)) {
            keys.sort_unstable();
            let mut curve = FCurve::new("pose.bones[\"bone\"].rotation_quaternion", 3);
            for &key in &keys {
                curve = curve.with_key(key as f32, 1.0);
            }
            let action = Action::new("RigSpin").with_group(CurveGroup::new("bone").with_curve(curve));
            let scene = rig_scene(action, 1);
            let extracted = extract(&scene);

            prop_assert!(extracted.frame_start <= 1.0);
            let channel = extracted.track("bone").unwrap().channel(ChannelKind::Rotation).unwrap();
            let distinct: HashSet<i32> = keys.iter().copied().collect();
            prop_assert_eq!(channel.samples.len(), distinct.len());
            prop_assert!(channel.samples.windows(2).all(|w| w[0].frame < w[1].frame));
            for sample in &channel.samples {
                prop_assert!(sample.frame as f32 >= extracted.frame_start);
                prop_assert!(sample.frame as f32 <= extracted.frame_end);
            }
        }
    }

    #[test]
    fn test_sparse_channels_keep_own_frames() {
        let action = Action::new("RigMove").with_group(
            CurveGroup::new("bone")
                .with_curve(
                    FCurve::new("pose.bones[\"bone\"].rotation_quaternion", 3)
                        .with_key(0.0, 1.0)
                        .with_key(10.0, 1.0),
                )
                .with_curve(FCurve::new("pose.bones[\"bone\"].location", 0).with_key(5.0, 2.0)),
        );
        let scene = rig_scene(action, 0);
        let extracted = extract(&scene);

        assert_eq!(extracted.frame_start, 0.0);
        assert_eq!(extracted.frame_end, 10.0);
        assert_eq!(extracted.duration(), 10);
        let track = extracted.track("bone").unwrap();
        let frames = |kind: ChannelKind| -> Vec<i32> {
            track.channel(kind).unwrap().samples.iter().map(|s| s.frame).collect()
        };
        assert_eq!(frames(ChannelKind::Rotation), vec![0, 10]);
        assert_eq!(frames(ChannelKind::Translation), vec![5]);
        assert!(frames(ChannelKind::Scale).is_empty());
    }

    #[test]
    fn test_late_action_starts_at_scene_start() {
        let action = Action::new("RigLate").with_group(
            CurveGroup::new("bone")
                .with_curve(FCurve::new("pose.bones[\"bone\"].scale", 1).with_key(30.0, 1.0)),
        );
        let scene = rig_scene(action, 1);
        let extracted = extract(&scene);
        assert_eq!(extracted.frame_start, 1.0);
        assert_eq!(extracted.frame_end, 30.0);
    }
}

mod archive_tests {
    use super::*;

    #[test]
    fn test_close_moves_partial_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wiscene");

        let mut archive = FileArchive::open(&path).unwrap();
        assert!(dir.path().join("out.wiscene.partial").exists());
        archive.write(b"WISC").unwrap();
        archive.close().unwrap();

        assert!(!dir.path().join("out.wiscene.partial").exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"WISC");
        assert_eq!(archive.bytes_written(), 4);
        assert!(!archive.is_open());
    }

    #[test]
    fn test_drop_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wiscene");
        {
            let mut archive = FileArchive::open(&path).unwrap();
            archive.write(b"partial data").unwrap();
        }
        assert!(!path.exists());
        assert!(!dir.path().join("out.wiscene.partial").exists());
    }

    #[test]
    fn test_closed_archive_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = FileArchive::open(dir.path().join("a.wiscene")).unwrap();
        archive.close().unwrap();
        assert!(archive.write(b"late").is_err());
    }
}

mod export_tests {
    use super::*;

    #[test]
    fn test_level_export_to_file() {
        let scene = load_level();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.wiscene");

        let mut archive = FileArchive::open(&path).unwrap();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::default().export(&scene, &mut evaluator, &mut archive);
        assert!(report.is_finished(), "{:?}", report.status);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(report.stats.bytes_written, bytes.len() as u64);
        let stream = read_stream(&bytes).unwrap();
        assert_eq!(stream.root, "Level");
        assert_eq!(stream.version, 1000);
        assert_eq!(stream.records[0].kind, RecordKind::Material);
        assert_eq!(stream.records_of(RecordKind::Mesh).count(), 1);
        assert_eq!(stream.records_of(RecordKind::Object).count(), 3);
        assert_eq!(stream.records_of(RecordKind::Armature).count(), 1);
        assert_eq!(stream.records_of(RecordKind::Action).count(), 1);
        assert_eq!(stream.records_of(RecordKind::Light).count(), 1);
        assert_eq!(stream.records_of(RecordKind::Camera).count(), 1);
        assert_eq!(stream.records_of(RecordKind::World).count(), 0);
        assert_eq!(report.stats.keyframe_samples, 2);

        let mesh_record = stream.records_of(RecordKind::Mesh).next().unwrap();
        assert_eq!(mesh_record.name, "BodyMesh");
        let mesh = read_mesh_record(&mesh_record.payload).unwrap();
        assert_eq!(mesh.materials, vec!["Skin".to_string()]);
        assert_eq!(mesh.parent.as_deref(), Some("Rig"));
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.subsets.len(), 1);
        assert_eq!(mesh.subsets[0].index_count, 3);
    }

    #[test]
    fn test_untargeted_actions_match_armature_data() {
        let walk = |name: &str| {
            Action::new(name).with_group(CurveGroup::new("bone").with_curve(
                FCurve::new(r#"pose.bones["bone"].location"#, 0)
                    .with_key(1.0, 0.0)
                    .with_key(5.0, 1.0),
            ))
        };
        let mut scene = rig_scene(walk("RigDataWalk"), 1);
        scene.objects[0].name = "Armature".into();
        scene.actions.push(walk("ArmatureWalk"));

        let mut archive = MemoryArchive::new();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::default().export(&scene, &mut evaluator, &mut archive);
        assert!(report.is_finished(), "{:?}", report.status);

        let stream = read_stream(archive.bytes()).unwrap();
        let names: Vec<&str> = stream
            .records_of(RecordKind::Action)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["RigDataWalk"]);
    }

    #[test]
    fn test_missing_bone_group_is_reported() {
        let scene = load_level();
        let mut archive = MemoryArchive::new();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::default().export(&scene, &mut evaluator, &mut archive);

        assert!(report.is_finished());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("[bone root] has not got any fcurves")));
    }

    #[test]
    fn test_failed_export_leaves_no_file() {
        let mut scene = load_level();
        scene.meshes[0].faces[0].corners[0].uv = Some(vec![0.5]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.wiscene");

        let mut archive = FileArchive::open(&path).unwrap();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::default().export(&scene, &mut evaluator, &mut archive);

        assert!(matches!(report.status, ExportStatus::Error(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("level.wiscene.partial").exists());
    }

    #[test]
    fn test_disabled_families_are_skipped() {
        let scene = load_level();
        let mut options = ExportOptions::default();
        options.families.actions = false;
        options.families.lights = false;
        options.families.world = false;

        let mut archive = MemoryArchive::new();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::new(options).export(&scene, &mut evaluator, &mut archive);

        assert!(report.is_finished());
        assert_eq!(report.stats.record_count(RecordKind::Action), 0);
        assert_eq!(report.stats.record_count(RecordKind::Light), 0);
        assert_eq!(report.stats.record_count(RecordKind::Armature), 1);
        assert!(!report.diagnostics.iter().any(|d| d.scope == "world"));
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let scene = load_level();
        let run = |parallel: bool| {
            let options = ExportOptions {
                parallel_meshes: parallel,
                ..Default::default()
            };
            let mut archive = MemoryArchive::new();
            let mut evaluator = SnapshotEvaluator::new(&scene);
            SceneExporter::new(options).export(&scene, &mut evaluator, &mut archive);
            archive.bytes().to_vec()
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn test_legacy_text_written_to_dir() {
        let scene = load_level();
        let options = ExportOptions {
            legacy_text: true,
            ..Default::default()
        };
        let mut archive = MemoryArchive::new();
        let mut evaluator = SnapshotEvaluator::new(&scene);
        let report = SceneExporter::new(options).export(&scene, &mut evaluator, &mut archive);
        let legacy = report.legacy.expect("legacy sections requested");

        let dir = tempfile::tempdir().unwrap();
        let written = legacy.write_to_dir(dir.path(), "Level").unwrap();
        assert_eq!(written.len(), 10);

        let objects = std::fs::read_to_string(dir.path().join("Level.wio")).unwrap();
        assert!(objects.contains("//OBJECT-Body"));
        assert!(objects.contains("mb BodyMesh"));
        let armatures = std::fs::read_to_string(dir.path().join("Level.wia")).unwrap();
        assert!(armatures.contains("//ARMATURE-RigData"));
        assert!(armatures.contains("b head\np root"));
        let errors = std::fs::read_to_string(dir.path().join("Level.wierror")).unwrap();
        assert!(errors.contains("World Information cannot be read!"));
    }
}
