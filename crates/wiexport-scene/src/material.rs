// wiexport-scene/src/material.rs
//! Material and texture slot data

use serde::{Deserialize, Serialize};
use wiexport_core::{Color, Vec3};

/// What a texture slot feeds in the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureUsage {
    Diffuse,
    Normal,
    Specular,
    Displacement,
    Reflection,
}

/// An image bound to a material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSlot {
    pub usage: TextureUsage,
    /// Image file name, empty when the slot has no image
    #[serde(default)]
    pub image: String,
    /// Colour is premultiplied with alpha
    #[serde(default)]
    pub premultiplied: bool,
    /// Blend mode as the tool names it (`MIX`, `ADD`, ...)
    #[serde(default = "default_blend")]
    pub blend: String,
}

fn default_blend() -> String {
    "MIX".to_string()
}

impl TextureSlot {
    pub fn new(usage: TextureUsage, image: impl Into<String>) -> Self {
        Self {
            usage,
            image: image.into(),
            premultiplied: false,
            blend: default_blend(),
        }
    }

    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }
}

/// Surface description of a material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMaterial {
    pub name: String,
    /// Principled base colour, takes precedence over `diffuse`
    pub base_color: Option<Color>,
    /// Flat diffuse colour
    pub diffuse: Color,
    pub metalness: f32,
    pub roughness: f32,
    pub alpha: f32,
    pub transparent: bool,
    pub refraction_index: f32,
    pub specular_color: Color,
    pub specular_intensity: f32,
    pub specular_hardness: u32,
    pub reflectivity: f32,
    pub friction: f32,
    pub cast_shadow: bool,
    pub shadeless: bool,
    pub sky: bool,
    pub water: bool,
    pub subsurface: bool,
    /// UV scroll speed
    pub moving_texture: Vec3,
    pub textures: Vec<TextureSlot>,
}

impl Default for SourceMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: None,
            diffuse: Color::WHITE,
            metalness: 0.0,
            roughness: 0.5,
            alpha: 1.0,
            transparent: false,
            refraction_index: 1.0,
            specular_color: Color::WHITE,
            specular_intensity: 0.5,
            specular_hardness: 50,
            reflectivity: 0.0,
            friction: 0.5,
            cast_shadow: true,
            shadeless: false,
            sky: false,
            water: false,
            subsurface: false,
            moving_texture: Vec3::ZERO,
            textures: Vec::new(),
        }
    }
}

impl SourceMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Base colour of the surface, principled first
    pub fn surface_color(&self) -> Color {
        self.base_color.unwrap_or(self.diffuse)
    }

    /// First slot with the given usage
    pub fn texture(&self, usage: TextureUsage) -> Option<&TextureSlot> {
        self.textures.iter().find(|t| t.usage == usage)
    }
}
