//! Legacy text side channel
//!
//! One text section per entity family, each line a command letter followed
//! by space-separated fields. Rotations print as converted `(x, y, z, w)`,
//! which reads `x z y -w` in source terms, and floats print the way the
//! legacy tool printed them (`1.0`, `0.5`, `1e-05`).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use wiexport_core::{Error, Quat, Result, Vec3};
use wiexport_scene::{
    Light, LightKind, ParticleSettings, SourceMaterial, SourceObject, TextureUsage, World,
};

use crate::animation::ExtractedAction;
use crate::convert::{parent_inverse, Transform};
use crate::diagnostics::Diagnostics;
use crate::records::Wind;
use crate::skeleton::FlatSkeleton;

/// Format a float like the legacy tool: shortest round-trip digits, always
/// with a fraction or exponent, scientific below `1e-4` and from `1e16`.
pub fn py_float(v: f32) -> String {
    let v = f64::from(v);
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    // `{:e}` gives the shortest round-trip digits as `d.ddde<exp>`
    let sci = format!("{:e}", v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if !(-4..16).contains(&exp) {
        let (head, tail) = digits.split_at(1);
        let mantissa = if tail.is_empty() {
            head.to_string()
        } else {
            format!("{}.{}", head, tail)
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exp.abs());
    }

    if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        return format!("{}0.{}{}", sign, zeros, digits);
    }
    let int_len = exp as usize + 1;
    if digits.len() <= int_len {
        let pad = "0".repeat(int_len - digits.len());
        format!("{}{}{}.0", sign, digits, pad)
    } else {
        let (int_part, frac) = digits.split_at(int_len);
        format!("{}{}.{}", sign, int_part, frac)
    }
}

fn push_floats(out: &mut String, values: impl IntoIterator<Item = f32>) {
    for v in values {
        out.push(' ');
        out.push_str(&py_float(v));
    }
}

fn push_vec3(out: &mut String, v: Vec3) {
    push_floats(out, v.to_array());
}

fn push_quat(out: &mut String, q: Quat) {
    push_floats(out, q.to_array());
}

fn bool_digit(v: bool) -> u8 {
    v as u8
}

/// The text written for every family, plus the diagnostic log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySections {
    pub objects: String,
    pub materials: String,
    pub armatures: String,
    pub actions: String,
    pub lights: String,
    pub hitspheres: String,
    pub world: String,
    pub cameras: String,
    pub decals: String,
    pub errors: String,
}

impl LegacySections {
    /// Every section with its file extension
    pub fn files(&self) -> [(&'static str, &str); 10] {
        [
            ("wio", &self.objects),
            ("wim", &self.materials),
            ("wia", &self.armatures),
            ("wiact", &self.actions),
            ("wil", &self.lights),
            ("wih", &self.hitspheres),
            ("wiw", &self.world),
            ("wic", &self.cameras),
            ("wid", &self.decals),
            ("wierror", &self.errors),
        ]
    }

    /// Write `<stem>.<ext>` for every section into `dir`
    pub fn write_to_dir(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::from(e).with_context(format!("creating {}", dir.display())))?;
        let mut written = Vec::with_capacity(10);
        for (ext, text) in self.files() {
            let path = dir.join(format!("{}.{}", stem, ext));
            fs::write(&path, text)
                .map_err(|e| Error::from(e).with_context(format!("writing {}", path.display())))?;
            written.push(path);
        }
        debug!(dir = %dir.display(), files = written.len(), "Legacy text sections written");
        Ok(written)
    }
}

/// Builds [`LegacySections`] entity by entity
#[derive(Debug)]
pub struct LegacyTextWriter {
    sections: LegacySections,
}

impl Default for LegacyTextWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyTextWriter {
    pub fn new() -> Self {
        let sections = LegacySections {
            cameras: "CAMERALIST\n".to_string(),
            hitspheres: "HITSPHERELIST\n".to_string(),
            decals: "DECALS\n".to_string(),
            ..Default::default()
        };
        Self { sections }
    }

    fn inverse_line(out: &mut String, inverse: &Transform) {
        out.push('I');
        push_vec3(out, inverse.translation);
        push_quat(out, inverse.rotation);
        push_vec3(out, inverse.scale);
        out.push('\n');
    }

    /// Parent, parent bone and parent-inverse lines
    fn parenting(out: &mut String, object: &SourceObject) {
        if let Some(parent) = &object.parent {
            let _ = writeln!(out, "p {}", parent);
        }
        if let Some(bone) = &object.parent_bone {
            let _ = writeln!(out, "b {}", bone);
        }
        if let Some(inverse) = parent_inverse(object) {
            Self::inverse_line(out, &inverse);
        }
    }

    /// A mesh object with its particle systems and rigid body
    pub fn object(&mut self, object: &SourceObject) {
        let out = &mut self.sections.objects;
        let t = Transform::from_source(&object.transform);

        let _ = writeln!(out, "//OBJECT-{}", object.name);
        Self::parenting(out, object);
        out.push('r');
        push_quat(out, t.rotation);
        out.push_str("\ns");
        push_vec3(out, t.scale);
        out.push_str("\nt");
        push_vec3(out, t.translation);
        out.push('\n');
        if let Some(mesh) = object.mesh_name() {
            let _ = writeln!(out, "mb {}", mesh);
        }

        for system in &object.particle_systems {
            match &system.settings {
                ParticleSettings::Emitter {
                    visible,
                    particle_size,
                    factor_random,
                    normal_factor,
                    count,
                    lifetime,
                    lifetime_random,
                    billboard_size,
                    tangent_phase,
                } => {
                    let _ = write!(
                        out,
                        "E {} {} {}",
                        system.name,
                        bool_digit(*visible),
                        system.material
                    );
                    push_floats(out, [*particle_size, *factor_random, *normal_factor]);
                    let _ = write!(out, " {}", count);
                    push_floats(
                        out,
                        [
                            *lifetime,
                            *lifetime_random,
                            billboard_size[0],
                            billboard_size[1],
                            *tangent_phase,
                        ],
                    );
                    out.push('\n');
                }
                ParticleSettings::Hair {
                    hair_length,
                    count,
                    density_group,
                    length_group,
                } => {
                    let or_void = |g: &str| if g.is_empty() { "void".to_string() } else { g.to_string() };
                    let _ = writeln!(
                        out,
                        "H {} {} {} {} {} {}",
                        system.name,
                        system.material,
                        py_float(*hair_length),
                        count,
                        or_void(density_group),
                        or_void(length_group)
                    );
                }
            }
        }

        if let Some(body) = &object.rigid_body {
            let mass = if body.enabled {
                py_float(body.mass)
            } else {
                "0".to_string()
            };
            let _ = writeln!(
                out,
                "P {} {} {} {} {} {} {}",
                body.collision_shape,
                mass,
                py_float(body.friction),
                py_float(body.restitution),
                py_float(body.linear_damping),
                body.body_type,
                bool_digit(body.kinematic)
            );
        }
    }

    pub fn material(&mut self, material: &SourceMaterial) {
        let out = &mut self.sections.materials;
        let _ = writeln!(out, "//MATERIAL-{}", material.name);
        if !material.cast_shadow {
            out.push_str("X\n");
        }
        let _ = writeln!(out, "f {}", py_float(material.friction));
        let color = material.surface_color();
        out.push('d');
        push_floats(out, [color.r, color.g, color.b]);
        out.push('\n');
        if material.shadeless {
            out.push_str("h\n");
        }

        for slot in material.textures.iter().filter(|t| t.has_image()) {
            match slot.usage {
                TextureUsage::Displacement => {
                    let _ = writeln!(out, "D {}", slot.image);
                }
                TextureUsage::Reflection => {
                    let _ = writeln!(out, "r {}", slot.image);
                }
                TextureUsage::Normal => {
                    let _ = writeln!(out, "n {}", slot.image);
                }
                TextureUsage::Specular => {
                    let _ = writeln!(out, "S {}", slot.image);
                }
                TextureUsage::Diffuse => {
                    let _ = writeln!(out, "t {} {}", slot.image, bool_digit(slot.premultiplied));
                    let _ = writeln!(out, "b {}", slot.blend);
                }
            }
        }

        if material.transparent {
            let _ = writeln!(out, "a {}", py_float(material.alpha));
            let _ = writeln!(out, "R {}", py_float(material.refraction_index));
        }
        if material.subsurface {
            out.push_str("u\n");
        }
        let specular = material.specular_color;
        out.push('s');
        push_floats(
            out,
            [specular.r, specular.g, specular.b, material.specular_intensity],
        );
        let _ = writeln!(out, "\np {}", material.specular_hardness);
        let _ = writeln!(out, "e {}", py_float(material.reflectivity));
        if material.sky {
            out.push_str("k\n");
        }
        if material.moving_texture != Vec3::ZERO {
            out.push('m');
            push_vec3(out, material.moving_texture);
            out.push('\n');
        }
        if material.water {
            out.push_str("w\n");
        }
    }

    pub fn armature(&mut self, skeleton: &FlatSkeleton) {
        let out = &mut self.sections.armatures;
        let t = &skeleton.transform;
        let _ = writeln!(out, "//ARMATURE-{}", skeleton.data_name);
        out.push('r');
        push_quat(out, t.rotation);
        out.push_str("\ns");
        push_vec3(out, t.scale);
        out.push_str("\nt");
        push_vec3(out, t.translation);
        out.push('\n');

        for bone in &skeleton.bones {
            let _ = writeln!(out, "b {}", bone.name);
            if let Some(parent) = &bone.parent {
                let _ = writeln!(out, "p {}", parent);
            }
            if bone.physics {
                out.push_str("P\n");
            }
            if bone.cloth {
                out.push_str("C\n");
            }
            if bone.ragdoll {
                out.push_str("g\n");
            }
            if bone.connected {
                out.push_str("c\n");
            }
            for partner in &bone.springs {
                let _ = writeln!(out, "i {}", partner);
            }
            out.push('l');
            push_quat(out, bone.rest_rotation());
            push_vec3(out, bone.rest_translation());
            let _ = writeln!(out, "\nh {}", py_float(bone.length));
        }
    }

    /// The actions extracted for one armature
    pub fn actions(&mut self, skeleton: &FlatSkeleton, actions: &[ExtractedAction]) {
        let out = &mut self.sections.actions;
        let _ = writeln!(out, "//ARMATURE-{}", skeleton.data_name);
        for action in actions {
            let _ = writeln!(out, "C {}", action.name);
            let _ = writeln!(out, "A {}", action.duration());
            for track in &action.tracks {
                let _ = writeln!(out, "b {}", track.bone);
                for channel in &track.channels {
                    for sample in &channel.samples {
                        let _ = write!(out, "{} {}", channel.kind.letter(), sample.frame);
                        push_floats(out, sample.value.components());
                        out.push('\n');
                    }
                }
            }
        }
    }

    /// Returns `false` for light kinds the legacy format has no letter for
    pub fn light(&mut self, object: &SourceObject, light: &Light) -> bool {
        let out = &mut self.sections.lights;
        let shadow = bool_digit(light.shadow);
        match light.kind {
            LightKind::Sun => {
                let _ = writeln!(out, "D {}", object.name);
            }
            LightKind::Point => {
                let _ = writeln!(out, "P {} {}", object.name, shadow);
            }
            LightKind::Spot => {
                let _ = writeln!(out, "S {} {} {}", object.name, shadow, py_float(light.spot_size));
            }
            LightKind::Hemi | LightKind::Area => return false,
        }

        let t = Transform::from_source(&object.transform);
        Self::parenting(out, object);
        out.push('t');
        push_vec3(out, t.translation);
        out.push_str("\nr");
        push_quat(out, t.rotation);
        out.push_str("\nc");
        push_floats(out, [light.color.r, light.color.g, light.color.b]);
        let _ = writeln!(out, "\ne {}", py_float(light.energy));
        let _ = writeln!(out, "d {}", py_float(light.distance));
        for texture in &light.textures {
            let _ = writeln!(out, "l {}", texture);
        }
        true
    }

    pub fn hitsphere(&mut self, object: &SourceObject, property: &str) {
        let out = &mut self.sections.hitspheres;
        let t = &object.transform;
        let _ = write!(out, "H {}", object.name);
        push_floats(out, [t.scale.x, t.location.x, t.location.z, t.location.y]);
        let _ = writeln!(
            out,
            " {} {}",
            object.parent.as_deref().unwrap_or(""),
            property
        );
        if let Some(bone) = &object.parent_bone {
            let _ = writeln!(out, "b {}", bone);
        }
        if let Some(inverse) = parent_inverse(object) {
            Self::inverse_line(out, &inverse);
        }
    }

    pub fn decal(&mut self, object: &SourceObject, texture: Option<&str>, normal: Option<&str>) {
        let out = &mut self.sections.decals;
        let t = Transform::from_source(&object.transform);
        let _ = write!(out, "d {}", object.name);
        push_vec3(out, t.scale);
        push_vec3(out, t.translation);
        push_quat(out, t.rotation);
        out.push('\n');
        if let Some(texture) = texture {
            let _ = writeln!(out, "t {}", texture);
        }
        if let Some(normal) = normal {
            let _ = writeln!(out, "n {}", normal);
        }
    }

    /// Only cameras parented to a bone are listed; returns whether this one was
    pub fn camera(&mut self, object: &SourceObject) -> bool {
        let (Some(parent), Some(bone)) = (&object.parent, &object.parent_bone) else {
            return false;
        };
        let out = &mut self.sections.cameras;
        let t = Transform::from_source(&object.transform);
        let _ = write!(out, "c {} {} {}", object.name, parent, bone);
        push_vec3(out, t.translation);
        push_quat(out, t.rotation);
        out.push('\n');
        if let Some(inverse) = parent_inverse(object) {
            Self::inverse_line(out, &inverse);
        }
        true
    }

    pub fn world(&mut self, world: Option<&World>, winds: &[Wind]) {
        let out = &mut self.sections.world;
        if let Some(world) = world {
            for (letter, c) in [('h', world.horizon), ('z', world.zenith), ('a', world.ambient)] {
                out.push(letter);
                push_floats(out, [c.r, c.g, c.b]);
                out.push('\n');
            }
            if let Some(mist) = &world.mist {
                out.push('m');
                push_floats(out, [mist.start, mist.depth, mist.height]);
                out.push('\n');
            }
        }
        for wind in winds {
            out.push('W');
            push_quat(out, wind.rotation);
            push_floats(out, [wind.strength]);
            out.push('\n');
        }
    }

    /// Append every diagnostic to the error log
    pub fn errors(&mut self, diagnostics: &Diagnostics) {
        for d in diagnostics.iter() {
            let _ = writeln!(self.sections.errors, "{}", d);
        }
    }

    pub fn finish(self) -> LegacySections {
        self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiexport_core::{Color, Mat4};
    use wiexport_scene::{Empty, ObjectData, SourceTransform, TextureSlot};

    #[test]
    fn test_py_float() {
        assert_eq!(py_float(1.0), "1.0");
        assert_eq!(py_float(-1.0), "-1.0");
        assert_eq!(py_float(0.5), "0.5");
        assert_eq!(py_float(0.0), "0.0");
        assert_eq!(py_float(250.0), "250.0");
        assert_eq!(py_float(0.25), "0.25");
        assert_eq!(py_float(0.1), "0.10000000149011612");
        assert_eq!(py_float(1e-5), "9.999999747378752e-06");
        assert_eq!(py_float(0.0001), "9.999999747378752e-05");
        assert_eq!(py_float(0.001), "0.0010000000474974513");
        assert_eq!(py_float(1e20), "1.0000000200408773e+20");
        assert_eq!(py_float(65536.0), "65536.0");
    }

    #[test]
    fn test_identity_object_lines() {
        let mut writer = LegacyTextWriter::new();
        let object = SourceObject::new("Cube", ObjectData::Mesh { mesh: "CubeMesh".into() });
        writer.object(&object);
        let text = writer.finish().objects;
        assert_eq!(
            text,
            "//OBJECT-Cube\nr 0.0 0.0 0.0 -1.0\ns 1.0 1.0 1.0\nt 0.0 0.0 0.0\nmb CubeMesh\n"
        );
    }

    #[test]
    fn test_parented_object_has_inverse_line() {
        let mut object = SourceObject::new("Sword", ObjectData::Mesh { mesh: "SwordMesh".into() });
        object.parent = Some("Rig".into());
        object.parent_bone = Some("hand".into());
        object.transform = SourceTransform {
            location: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        object.parent_inverse = Mat4::IDENTITY;

        let mut writer = LegacyTextWriter::new();
        writer.object(&object);
        let text = writer.finish().objects;
        assert!(text.contains("p Rig\nb hand\nI 0.0 0.0 0.0 0.0 0.0 0.0 -1.0 1.0 1.0 1.0\n"));
        assert!(text.contains("t 1.0 3.0 2.0\n"));
    }

    #[test]
    fn test_material_lines() {
        let mut material = SourceMaterial::new("Glass");
        material.cast_shadow = false;
        material.transparent = true;
        material.alpha = 0.5;
        material.diffuse = Color::rgb(1.0, 0.5, 0.25);
        material.base_color = None;
        let mut diffuse = TextureSlot::new(TextureUsage::Diffuse, "glass.png");
        diffuse.premultiplied = true;
        material.textures.push(diffuse);

        let mut writer = LegacyTextWriter::new();
        writer.material(&material);
        let text = writer.finish().materials;
        assert!(text.starts_with("//MATERIAL-Glass\nX\nf 0.5\nd 1.0 0.5 0.25\n"));
        assert!(text.contains("t glass.png 1\nb MIX\n"));
        assert!(text.contains("a 0.5\nR 1.0\n"));
    }

    #[test]
    fn test_unparented_camera_not_listed() {
        let mut writer = LegacyTextWriter::new();
        let camera = SourceObject::new("Cam", ObjectData::Camera(wiexport_scene::Camera {
            fov: 0.8,
            clip_start: 0.1,
            clip_end: 100.0,
        }));
        assert!(!writer.camera(&camera));
        assert_eq!(writer.finish().cameras, "CAMERALIST\n");
    }

    #[test]
    fn test_hitsphere_line() {
        let mut hit = SourceObject::new("HeadHit", ObjectData::Empty(Empty::default()));
        hit.parent = Some("Rig".into());
        hit.transform.location = Vec3::new(0.0, 0.0, 1.5);

        let mut writer = LegacyTextWriter::new();
        writer.hitsphere(&hit, "hit");
        let text = writer.finish().hitspheres;
        assert!(text.starts_with("HITSPHERELIST\nH HeadHit 1.0 0.0 1.5 0.0 Rig hit\nI "));
    }
}
