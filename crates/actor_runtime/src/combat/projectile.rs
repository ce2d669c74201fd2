use std::f32::consts::FRAC_PI_2;

use crate::ids::{ModelRef, SoundRef, VisualHandle};
use crate::math::{Mat4, Vec3};
use crate::scene::SceneGraph;

/// Units per second. Flight is a constant-velocity ray: no gravity, drag, or
/// collision.
pub const PROJECTILE_SPEED: f32 = 16.0;

pub const MODEL_EVENT_DETONATE: &str = "detonate";

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub visual: VisualHandle,
    pub model: ModelRef,
    pub position: Vec3,
    pub direction: Vec3,
    pub impact_sound: Option<SoundRef>,
}

impl Projectile {
    /// Moves the projectile one step along its direction and writes the new
    /// transform back to the scene graph.
    pub fn advance(&mut self, dt: f32, scene: &mut dyn SceneGraph) {
        // The visual's transform is authoritative; fall back to the cached
        // position if the node is gone.
        if let Some(world) = scene.world_transform(self.visual) {
            self.position = world.translation();
        }
        self.position += self.direction * (PROJECTILE_SPEED * dt);
        scene.set_local_transform(self.visual, flight_transform(self.position, self.direction));
    }
}

/// Yaw in the ground plane for a travel direction.
pub fn facing_for_direction(direction: Vec3) -> f32 {
    FRAC_PI_2 - direction.x.atan2(direction.y)
}

pub fn flight_transform(position: Vec3, direction: Vec3) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_rotation_z(facing_for_direction(direction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_points_along_travel_direction() {
        let east = facing_for_direction(Vec3::new(1.0, 0.0, 0.0));
        assert!(east.abs() < 1e-6);
        let north = facing_for_direction(Vec3::new(0.0, 1.0, 0.0));
        assert!((north - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn flight_transform_rotates_local_forward_onto_direction() {
        let direction = Vec3::new(0.6, 0.8, 0.0);
        let transform = flight_transform(Vec3::ZERO, direction);
        let forward = transform.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!((forward - direction).length() < 1e-5);
    }
}
