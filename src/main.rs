mod animation;
mod camera;
mod character_controller;
mod config;
mod game_states;
mod physics;
mod player;
mod weapon;
mod world;

use bevy::log::LogPlugin;
use bevy::prelude::*;

/// Rate of the fixed tick driving characters and physics.
const FIXED_HZ: f64 = 60.0;

fn main() {
    let mut app = App::new();

    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Skinned armor".into(),
                    ..default()
                }),
                ..default()
            })
            .set(LogPlugin {
                filter: "info,wgpu=warn,naga=off,skinned_armor=debug".into(),
                ..default()
            }),
    )
    .insert_resource(Time::<Fixed>::from_hz(FIXED_HZ))
    .add_plugins((
        config::ConfigPlugin,
        game_states::GameStatePlugin,
        physics::PhysicsPlugin,
        animation::AnimationLayersPlugin,
        character_controller::CharacterControllerPlugin,
        weapon::WeaponPlugin,
        player::PlayerPlugin,
        world::WorldPlugin,
        camera::CameraPlugin,
    ));

    #[cfg(feature = "inspector")]
    app.add_plugins((
        bevy_inspector_egui::bevy_egui::EguiPlugin {
            enable_multipass_for_primary_context: true,
        },
        bevy_inspector_egui::quick::WorldInspectorPlugin::new(),
    ));

    app.run();
}
