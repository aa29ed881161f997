//! Surface materials
//!
//! Physically based parameters uploaded to the active program before each
//! mesh draw. Every setter marks the material dirty.

use crate::core::{Entity, Identity};
use crate::foundation::math::Vec3;
use crate::render::api::RenderContext;

/// PBR surface description
#[derive(Debug)]
pub struct Material {
    entity: Entity,
    emission: Vec3,
    albedo: Vec3,
    opacity: f32,
    roughness: f32,
    metalness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self::from_entity(Entity::new())
    }
}

impl Material {
    /// Grey, mostly dielectric, fully opaque material
    pub fn new(name: &str) -> Self {
        Self::from_entity(Entity::named(name))
    }

    fn from_entity(entity: Entity) -> Self {
        Self {
            entity,
            emission: Vec3::zeros(),
            albedo: Vec3::new(0.6, 0.6, 0.6),
            opacity: 1.0,
            roughness: 0.5,
            metalness: 0.01,
        }
    }

    /// Emissive term
    pub fn emission(&self) -> Vec3 {
        self.emission
    }

    /// Set the emissive term
    pub fn set_emission(&mut self, emission: Vec3) {
        self.emission = emission;
        self.set_dirty(true);
    }

    /// Base color
    pub fn albedo(&self) -> Vec3 {
        self.albedo
    }

    /// Set the base color
    pub fn set_albedo(&mut self, albedo: Vec3) {
        self.albedo = albedo;
        self.set_dirty(true);
    }

    /// Opacity (1 = solid, 0 = invisible)
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the opacity, clamped to `[0, 1]`
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.set_dirty(true);
    }

    /// Roughness
    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    /// Set the roughness, clamped to `[0, 1]`
    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
        self.set_dirty(true);
    }

    /// Metalness
    pub fn metalness(&self) -> f32 {
        self.metalness
    }

    /// Set the metalness, clamped to `[0, 1]`
    pub fn set_metalness(&mut self, metalness: f32) {
        self.metalness = metalness.clamp(0.0, 1.0);
        self.set_dirty(true);
    }

    /// Upload the parameters to the active program
    pub fn apply(&self, ctx: &mut RenderContext<'_>) {
        ctx.set_vec3("mtlEmission", self.emission);
        ctx.set_vec3("mtlAlbedo", self.albedo);
        ctx.set_float("mtlOpacity", self.opacity);
        ctx.set_float("mtlRoughness", self.roughness);
        ctx.set_float("mtlMetalness", self.metalness);
    }
}

impl Identity for Material {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_mark_dirty() {
        let mut material = Material::new("steel");
        material.set_dirty(false);

        material.set_metalness(0.9);
        assert!(material.is_dirty());
        assert_eq!(material.name(), "steel");
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut material = Material::new("glass");
        material.set_opacity(1.5);
        material.set_roughness(-0.2);
        assert_eq!(material.opacity(), 1.0);
        assert_eq!(material.roughness(), 0.0);
    }
}
