use avian3d::prelude::*;
use bevy::animation::AnimationTarget;
use bevy::prelude::*;
use bevy::scene::SceneInstanceReady;

use crate::animation::{AnimationLayers, ClipLibrary};
use crate::character_controller::{CharacterController, CharacterRig, WeaponMounts};
use crate::config::{CharacterConfig, RigNames};
use crate::game_states::AppState;
use crate::physics::GameLayer;
use crate::weapon::{Blade, Weaponry};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_player)
            .add_systems(Update, finish_rig.run_if(in_state(AppState::Loading)));
    }
}

#[derive(Component)]
pub struct Player;

/// The character scene has been instantiated.
#[derive(Component)]
struct SceneReady;

const BODY_RADIUS: f32 = 0.35;
const BODY_HEIGHT: f32 = 1.8;

fn spawn_player(mut commands: Commands, config: Res<CharacterConfig>, asset_server: Res<AssetServer>) {
    // The origin sits at the feet, the capsule is lifted onto it
    let body = Collider::compound(vec![(
        Position::from_xyz(0.0, BODY_HEIGHT * 0.5, 0.0),
        Rotation::default(),
        Collider::capsule(BODY_RADIUS, BODY_HEIGHT - 2.0 * BODY_RADIUS),
    )]);

    commands
        .spawn((
            Name::new("Player"),
            Player,
            SceneRoot(asset_server.load(config.model.clone())),
            Transform::from_translation(config.spawn_point()),
            CharacterController,
            RigidBody::Dynamic,
            body,
            GameLayer::character(),
            Mass(1.0),
            NoAutoMass,
            Weaponry::new(&config.weapon, config.clips.combo.len()),
        ))
        .observe(|trigger: Trigger<SceneInstanceReady>, mut commands: Commands| {
            commands.entity(trigger.target()).insert(SceneReady);
        });
}

/// Looks up the scene nodes the character needs and builds its animation
/// graph. Leaves the loading state once every character is set up.
fn finish_rig(
    mut commands: Commands,
    config: Res<CharacterConfig>,
    asset_server: Res<AssetServer>,
    mut library: ResMut<ClipLibrary>,
    mut clips: ResMut<Assets<AnimationClip>>,
    mut graphs: ResMut<Assets<AnimationGraph>>,
    mut characters: Query<(Entity, &mut Weaponry), (With<SceneReady>, Without<CharacterRig>)>,
    children: Query<&Children>,
    names: Query<&Name>,
    players: Query<(), With<AnimationPlayer>>,
    targets: Query<&AnimationTarget>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if characters.is_empty() || !library.is_loaded(&asset_server) {
        return;
    }

    for (entity, mut weaponry) in &mut characters {
        let descendants: Vec<Entity> = children.iter_descendants(entity).collect();
        let Some(animator) = descendants.iter().copied().find(|e| players.contains(*e)) else {
            warn!("character {entity} has no animation player");
            continue;
        };

        let graph = match library.graph() {
            Some(graph) => graph,
            None => library.build_graph(
                &config.rig.upper_body,
                descendants.iter().filter_map(|e| targets.get(*e).ok()),
                &mut clips,
                &mut graphs,
            ),
        };
        commands
            .entity(animator)
            .insert((AnimationGraphHandle(graph), AnimationLayers::default()));

        let mounts = find_mounts(&config.rig, &descendants, &names);
        match mounts {
            Some(mounts) => {
                commands
                    .entity(mounts.weapon)
                    .insert(Blade::sensor(entity));
                commands.entity(mounts.back_locator).add_child(mounts.weapon);
                weaponry.actions.activate();
            }
            None => warn!(
                "character {entity} is missing '{}', '{}' or '{}', weapon actions disabled",
                config.rig.back_locator, config.rig.hand_locator, config.rig.weapon
            ),
        }

        let head = find_node(&config.rig.head, &descendants, &names);
        if head.is_none() {
            debug!("character {entity} has no '{}' bone, head stays animated", config.rig.head);
        }

        commands.entity(entity).insert(CharacterRig { animator, mounts, head });
        info!("character {entity} ready");
        next_state.set(AppState::InGame);
    }
}

fn find_node(wanted: &str, descendants: &[Entity], names: &Query<&Name>) -> Option<Entity> {
    descendants
        .iter()
        .copied()
        .find(|e| names.get(*e).is_ok_and(|name| name.as_str() == wanted))
}

fn find_mounts(rig: &RigNames, descendants: &[Entity], names: &Query<&Name>) -> Option<WeaponMounts> {
    Some(WeaponMounts {
        back_locator: find_node(&rig.back_locator, descendants, names)?,
        hand_locator: find_node(&rig.hand_locator, descendants, names)?,
        weapon: find_node(&rig.weapon, descendants, names)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::SystemState;

    fn spawn_rig(world: &mut World, names: &[&str]) -> Vec<Entity> {
        names.iter().map(|name| world.spawn(Name::new(name.to_string())).id()).collect()
    }

    #[test]
    fn mounts_are_found_by_name() {
        let mut world = World::new();
        let nodes = spawn_rig(&mut world, &["Hips", "GreatswordLocator", "RighthandLocator", "Weapon"]);
        let mut state: SystemState<Query<&Name>> = SystemState::new(&mut world);
        let names = state.get(&world);

        let mounts = find_mounts(&RigNames::default(), &nodes, &names).expect("complete rig");
        assert_eq!(mounts.back_locator, nodes[1]);
        assert_eq!(mounts.hand_locator, nodes[2]);
        assert_eq!(mounts.weapon, nodes[3]);
    }

    #[test]
    fn missing_locator_disables_mounts() {
        let mut world = World::new();
        let nodes = spawn_rig(&mut world, &["GreatswordLocator", "Weapon"]);
        let mut state: SystemState<Query<&Name>> = SystemState::new(&mut world);
        let names = state.get(&world);

        assert_eq!(find_mounts(&RigNames::default(), &nodes, &names), None);
    }

    #[test]
    fn head_bone_is_found_by_name() {
        let mut world = World::new();
        let nodes = spawn_rig(&mut world, &["Neck", "Head", "HeadTop_End"]);
        let mut state: SystemState<Query<&Name>> = SystemState::new(&mut world);
        let names = state.get(&world);

        assert_eq!(find_node(&RigNames::default().head, &nodes, &names), Some(nodes[1]));
        assert_eq!(find_node("Tail", &nodes, &names), None);
    }
}
