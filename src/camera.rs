use avian3d::prelude::*;
use bevy::prelude::*;

use crate::character_controller::ControlState;
use crate::game_states::AppState;
use crate::physics::GameLayer;
use crate::player::Player;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera).add_systems(
            PostUpdate,
            third_person_camera
                .after(TransformSystem::TransformPropagate)
                .run_if(in_state(AppState::InGame)),
        );
    }
}

#[derive(Component)]
pub struct ThirdPersonCamera {
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Height of the aim point above the character origin.
    pub height_offset: f32,
}

impl Default for ThirdPersonCamera {
    fn default() -> Self {
        Self {
            distance: 4.0,
            min_distance: 1.0,
            max_distance: 15.0,
            height_offset: 1.7,
        }
    }
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        DistanceFog {
            color: Color::srgb_u8(43, 44, 100),
            falloff: FogFalloff::Exponential { density: 15e-3 },
            ..default()
        },
        Transform::from_xyz(0.0, 3.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
        ThirdPersonCamera::default(),
    ));
}

/// Places the camera behind the character along its look direction, pulled
/// in when level geometry is in the way.
fn third_person_camera(
    spatial_query: SpatialQuery,
    characters: Query<(&Transform, &ControlState), (With<Player>, Without<ThirdPersonCamera>)>,
    mut cameras: Query<(&mut Transform, &ThirdPersonCamera)>,
) -> Result {
    let (character, state) = characters.single()?;
    let (mut transform, camera) = cameras.single_mut()?;

    let look = character.rotation * Quat::from_rotation_x(-state.pitch.to_radians());
    let aim_point = character.translation + character.rotation * Vec3::Y * camera.height_offset;
    let back = Dir3::new(look * Vec3::Z)?;

    let filter = SpatialQueryFilter::from_mask(GameLayer::camera_mask());
    let mut distance = camera.distance;
    if let Some(hit) = spatial_query.cast_ray(aim_point, back, distance, true, &filter) {
        distance = distance.min(hit.distance);
    }
    let distance = distance.clamp(camera.min_distance, camera.max_distance);

    transform.translation = aim_point + back * distance;
    transform.rotation = look;
    Ok(())
}
