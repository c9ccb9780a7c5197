use std::f32::consts::PI;

use avian3d::prelude::*;
use bevy::pbr::CascadeShadowConfigBuilder;
use bevy::prelude::*;

use crate::game_states::AppState;
use crate::physics::GameLayer;
use crate::weapon::WeaponHit;

pub(crate) struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<Dummy>()
            .add_systems(Startup, setup)
            .add_systems(Update, count_hits.run_if(in_state(AppState::InGame)));
    }
}

const FLOOR_SIZE: f32 = 60.0;
const WALL_HEIGHT: f32 = 4.0;

/// A training target that keeps score of the hits it took.
#[derive(Component, Reflect, Default)]
#[reflect(Component)]
pub struct Dummy {
    pub hits: u32,
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Name::new("Floor"),
        RigidBody::Static,
        Collider::cuboid(FLOOR_SIZE, 1.0, FLOOR_SIZE),
        GameLayer::level(),
        Mesh3d(meshes.add(Cuboid::new(FLOOR_SIZE, 1.0, FLOOR_SIZE))),
        MeshMaterial3d(materials.add(Color::srgb(0.35, 0.4, 0.35))),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    // Keeps the character from walking off the edge
    let half = FLOOR_SIZE * 0.5;
    for (position, size) in [
        (Vec3::new(half, WALL_HEIGHT * 0.5, 0.0), Vec3::new(1.0, WALL_HEIGHT, FLOOR_SIZE)),
        (Vec3::new(-half, WALL_HEIGHT * 0.5, 0.0), Vec3::new(1.0, WALL_HEIGHT, FLOOR_SIZE)),
        (Vec3::new(0.0, WALL_HEIGHT * 0.5, half), Vec3::new(FLOOR_SIZE, WALL_HEIGHT, 1.0)),
        (Vec3::new(0.0, WALL_HEIGHT * 0.5, -half), Vec3::new(FLOOR_SIZE, WALL_HEIGHT, 1.0)),
    ] {
        commands.spawn((
            Name::new("InvisibleWall"),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            CollisionLayers::new(GameLayer::InvisWall, LayerMask::ALL),
            Transform::from_translation(position),
        ));
    }

    let dummy_mesh = meshes.add(Capsule3d::new(0.4, 1.0));
    let dummy_material = materials.add(Color::srgb(0.8, 0.7, 0.6));
    for (index, x) in [-3.0, 0.0, 3.0].into_iter().enumerate() {
        commands.spawn((
            Name::new(format!("Dummy{index}")),
            Dummy::default(),
            RigidBody::Static,
            Collider::capsule(0.4, 1.0),
            GameLayer::dummy(),
            Mesh3d(dummy_mesh.clone()),
            MeshMaterial3d(dummy_material.clone()),
            Transform::from_xyz(x, 0.9, -5.0),
        ));
    }

    // Light
    commands.spawn((
        Transform::from_rotation(Quat::from_euler(EulerRot::ZYX, 0.0, 1.0, -PI / 4.)),
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        CascadeShadowConfigBuilder {
            first_cascade_far_bound: 20.0,
            maximum_distance: 80.0,
            ..default()
        }
        .build(),
    ));
}

fn count_hits(mut hits: EventReader<WeaponHit>, mut dummies: Query<(&Name, &mut Dummy)>) {
    for hit in hits.read() {
        if let Ok((name, mut dummy)) = dummies.get_mut(hit.target) {
            dummy.hits += 1;
            info!("{name} took a hit ({} total)", dummy.hits);
        }
    }
}
