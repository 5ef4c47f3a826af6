//! Coordinate and orientation conversion
//!
//! The authoring tool is right-handed Z-up, the engine is Y-up. Every vector
//! swaps Y and Z; every quaternion additionally flips the sign of `w`. The
//! same map must be applied to every rotation in a scene (object transforms,
//! bone rest poses, sampled poses, parent inverses) or relative and absolute
//! transforms drift apart.

use wiexport_core::{Color, Mat4, Quat, Vec3, Vec4};
use wiexport_scene::{SourceObject, SourceRotation, SourceTransform};

/// Source position or direction to engine space: `(x, z, y)`
pub fn convert_position(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

/// Source scale to engine space, same axis swap, no sign change
pub fn convert_scale(s: Vec3) -> Vec3 {
    Vec3::new(s.x, s.z, s.y)
}

/// Source quaternion to engine space.
///
/// A source `(w, x, y, z)` becomes the engine `(x, z, y, -w)`. The map is
/// its own inverse, see [`unconvert_rotation`].
pub fn convert_rotation(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, q.z, q.y, -q.w)
}

/// Engine quaternion back to source space
pub fn unconvert_rotation(q: Quat) -> Quat {
    convert_rotation(q)
}

/// Converts a stored rotation. Euler angles become a quaternion in source
/// space first; converting angle by angle is not equivalent.
pub fn convert_source_rotation(rotation: &SourceRotation) -> Quat {
    convert_rotation(rotation.to_quat())
}

/// Colour as an RGBA vector
pub fn convert_color(c: Color) -> Vec4 {
    Vec4::new(c.r, c.g, c.b, c.a)
}

/// A decomposed transform in engine space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Engine identity: the converted source identity rotation
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::from_xyzw(0.0, 0.0, 0.0, -1.0),
        scale: Vec3::ONE,
    };

    /// Convert an object's local transform
    pub fn from_source(t: &SourceTransform) -> Self {
        Self {
            translation: convert_position(t.location),
            rotation: convert_source_rotation(&t.rotation),
            scale: convert_scale(t.scale),
        }
    }

    /// Decompose a source matrix, then convert each part
    pub fn from_source_matrix(m: &Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation: convert_position(translation),
            rotation: convert_rotation(rotation),
            scale: convert_scale(scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Converted parent-inverse of a parented object
pub fn parent_inverse(object: &SourceObject) -> Option<Transform> {
    object
        .is_parented()
        .then(|| Transform::from_source_matrix(&object.parent_inverse))
}

/// Same rotation regardless of quaternion sign
pub fn same_rotation(a: Quat, b: Quat, epsilon: f32) -> bool {
    (a.dot(b).abs() - 1.0).abs() <= epsilon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_swap() {
        assert_eq!(convert_position(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(convert_scale(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_identity_rotation() {
        let q = convert_rotation(Quat::IDENTITY);
        assert_eq!((q.x, q.y, q.z, q.w), (0.0, 0.0, 0.0, -1.0));
        assert_eq!(unconvert_rotation(q), Quat::IDENTITY);
        assert_eq!(Transform::from_source(&SourceTransform::default()), Transform::IDENTITY);
    }

    #[test]
    fn test_component_order() {
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        let c = convert_rotation(q);
        assert_eq!((c.x, c.y, c.z, c.w), (0.1, 0.3, 0.2, -0.9));
    }

    #[test]
    fn test_euler_converted_in_source_space() {
        let angles = [0.3, -1.1, 2.0];
        let from_euler = convert_source_rotation(&SourceRotation::Euler(angles));
        let from_quat = convert_rotation(wiexport_scene::euler_xyz_to_quat(angles));
        assert!(same_rotation(from_euler, from_quat, 1e-6));
    }

    #[test]
    fn test_matrix_decomposition() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 3.0, 4.0),
            Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        );
        let t = Transform::from_source_matrix(&m);
        assert!((t.translation - Vec3::new(1.0, 3.0, 2.0)).length() < 1e-5);
        assert!((t.scale - Vec3::new(2.0, 4.0, 3.0)).length() < 1e-5);
        assert!(same_rotation(t.rotation, Transform::IDENTITY.rotation, 1e-5));
    }

    #[test]
    fn test_parent_inverse_only_when_parented() {
        use wiexport_scene::{Empty, ObjectData};

        let mut object = SourceObject::new("Hit", ObjectData::Empty(Empty::default()));
        object.parent_inverse = Mat4::from_translation(Vec3::new(0.0, 1.0, 2.0));
        assert!(parent_inverse(&object).is_none());

        object.parent = Some("Rig".into());
        let inverse = parent_inverse(&object).unwrap();
        assert!((inverse.translation - Vec3::new(0.0, 2.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_color() {
        assert_eq!(
            convert_color(Color::new(0.1, 0.2, 0.3, 0.4)),
            Vec4::new(0.1, 0.2, 0.3, 0.4)
        );
    }
}
