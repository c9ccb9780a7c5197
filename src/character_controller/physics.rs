use avian3d::prelude::*;
use bevy::prelude::*;

use crate::animation::{AnimationLayers, ClipLibrary, LayeredAnimator};
use crate::character_controller::components::*;
use crate::character_controller::input::ControlState;
use crate::character_controller::states::{CharacterStep, GroundProbe, MotionBody};
use crate::config::CharacterConfig;
use crate::physics::GameLayer;
use crate::weapon::Weaponry;
use crate::weapon::actions::MountPoint;

/// [`MotionBody`] over the avian components of a character.
pub struct AvianBody<'a> {
    pub velocity: &'a mut LinearVelocity,
    pub impulse: &'a mut ExternalImpulse,
}

impl MotionBody for AvianBody<'_> {
    fn linear_velocity(&self) -> Vec3 {
        self.velocity.0
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity.0 = velocity;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.impulse.apply_impulse(impulse);
    }
}

/// [`GroundProbe`] casting a ray against walkable layers, skipping the character itself.
pub struct RayProbe<'a, 'w, 's> {
    pub spatial_query: &'a SpatialQuery<'w, 's>,
    pub filter: SpatialQueryFilter,
}

impl GroundProbe for RayProbe<'_, '_, '_> {
    fn distance_below(&self, origin: Vec3, max_distance: f32) -> Option<f32> {
        self.spatial_query
            .cast_ray(origin, Dir3::NEG_Y, max_distance, true, &self.filter)
            .map(|hit| hit.distance)
    }
}

/// Feeds the contacts of the last physics step into [`Locomotion`].
pub fn detect_ground_contacts(
    collisions: Collisions,
    config: Res<CharacterConfig>,
    poses: Query<(&Position, &Rotation)>,
    mut characters: Query<(Entity, &Transform, &mut Locomotion), With<CharacterController>>,
) {
    let tuning = &config.movement;
    for (entity, transform, mut locomotion) in &mut characters {
        let Ok((position, rotation)) = poses.get(entity) else {
            continue;
        };
        for pair in collisions.collisions_with(entity) {
            if !pair.is_touching() {
                continue;
            }
            // Manifold normals point from the first collider to the second
            let first = pair.collider1 == entity;
            let sign = if first { -1.0 } else { 1.0 };
            for manifold in &pair.manifolds {
                let normal = manifold.normal * sign;
                for contact in &manifold.points {
                    let point = if first {
                        contact.global_point1(position, rotation)
                    } else {
                        contact.global_point2(position, rotation)
                    };
                    locomotion.register_contact(transform.translation, point, normal, tuning);
                }
            }
        }
    }
}

/// Runs one fixed tick for every character and applies weapon mount changes.
pub fn character_fixed_step(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<CharacterConfig>,
    library: Res<ClipLibrary>,
    spatial_query: SpatialQuery,
    mut characters: Query<
        (
            Entity,
            &Transform,
            &CharacterRig,
            &mut Locomotion,
            &mut ControlState,
            &mut Weaponry,
            &mut LinearVelocity,
            &mut ExternalImpulse,
        ),
        With<CharacterController>,
    >,
    mut animators: Query<(&mut AnimationPlayer, &mut AnimationLayers)>,
) {
    for (entity, transform, rig, mut locomotion, mut state, mut weaponry, mut velocity, mut impulse) in
        &mut characters
    {
        let Ok((mut player, mut layers)) = animators.get_mut(rig.animator) else {
            continue;
        };

        let probe = RayProbe {
            spatial_query: &spatial_query,
            filter: SpatialQueryFilter::from_mask(GameLayer::ground_mask()).with_excluded_entities([entity]),
        };
        let mut body = AvianBody {
            velocity: &mut velocity,
            impulse: &mut impulse,
        };
        let mut anim = LayeredAnimator {
            player: &mut player,
            layers: &mut layers,
            library: &library,
        };

        let tick = CharacterStep {
            locomotion: &mut locomotion,
            weapon: &mut weaponry.actions,
            controls: &mut state.controls,
            transform,
            tuning: &config.movement,
            body: &mut body,
            probe: &probe,
            anim: &mut anim,
        }
        .run(time.delta());

        if let (Some(mount), Some(mounts)) = (tick.mount, rig.mounts) {
            let locator = match mount {
                MountPoint::Hand => mounts.hand_locator,
                MountPoint::Back => mounts.back_locator,
            };
            commands.entity(locator).add_child(mounts.weapon);
            debug!("weapon mounted on {mount:?}");
        }
    }
}
