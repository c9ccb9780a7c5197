use avian3d::prelude::*;
use bevy::prelude::*;

use crate::animation::AnimationTrigger;
use crate::character_controller::{CharacterRig, CharacterSet, Controls};
use crate::config::{CharacterConfig, WeaponTuning};
use crate::physics::GameLayer;

pub mod actions;
pub mod damage;
pub mod queue;

use actions::{WeaponActions, WeaponState};
use damage::DamageState;
pub use damage::{DamageWindow, WeaponHit};

pub struct WeaponPlugin;

impl Plugin for WeaponPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<WeaponStatus>()
            .add_event::<WeaponHit>()
            .add_observer(route_damage_triggers)
            .add_systems(
                FixedUpdate,
                (
                    detect_weapon_contacts.in_set(CharacterSet::Sense),
                    publish_weapon_status.after(CharacterSet::Act),
                ),
            );
    }
}

/// Weapon logic of a character.
#[derive(Component, Debug, Clone)]
#[require(WeaponStatus)]
pub struct Weaponry {
    pub actions: WeaponActions,
    pub damage: DamageWindow,
}

impl Weaponry {
    pub fn new(tuning: &WeaponTuning, combo_len: usize) -> Self {
        Self {
            actions: WeaponActions::new(combo_len, tuning.input_hold()),
            damage: DamageWindow::default(),
        }
    }
}

/// Snapshot of [`Weaponry`] shown in the inspector.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct WeaponStatus {
    pub state: WeaponState,
    pub combo_index: usize,
    pub attack_queued: bool,
    pub damage: DamageState,
}

impl From<&Weaponry> for WeaponStatus {
    fn from(weaponry: &Weaponry) -> Self {
        Self {
            state: weaponry.actions.state(),
            combo_index: weaponry.actions.combo_index(),
            attack_queued: weaponry.actions.queue().input().contains(Controls::PRIMARY),
            damage: weaponry.damage.state(),
        }
    }
}

/// The weapon node, reporting contacts to its wielder.
#[derive(Component, Debug, Clone, Copy)]
pub struct Blade {
    pub owner: Entity,
}

impl Blade {
    /// Components turning a weapon node into a hit sensor.
    pub fn sensor(owner: Entity) -> impl Bundle {
        (
            Blade { owner },
            Collider::cuboid(0.12, 1.4, 0.04),
            Sensor,
            GameLayer::weapon(),
            CollidingEntities::default(),
        )
    }
}

/// Forwards damage window tags from attack clips to the character owning the player.
fn route_damage_triggers(
    trigger: Trigger<AnimationTrigger>,
    config: Res<CharacterConfig>,
    mut wielders: Query<(&CharacterRig, &mut Weaponry)>,
) {
    let animator = trigger.target();
    for (rig, mut weaponry) in &mut wielders {
        if rig.animator == animator {
            weaponry
                .damage
                .on_trigger(&trigger.event().tag, &config.weapon.trigger_prefix);
        }
    }
}

fn publish_weapon_status(mut wielders: Query<(&Weaponry, &mut WeaponStatus), Changed<Weaponry>>) {
    for (weaponry, mut status) in &mut wielders {
        status.set_if_neq(WeaponStatus::from(weaponry));
    }
}

fn detect_weapon_contacts(
    blades: Query<(&Blade, &CollidingEntities)>,
    layers: Query<&CollisionLayers>,
    mut wielders: Query<&mut Weaponry>,
    mut hits: EventWriter<WeaponHit>,
) {
    for (blade, touching) in &blades {
        let Ok(mut weaponry) = wielders.get_mut(blade.owner) else {
            continue;
        };
        for &other in touching.iter() {
            let is_static = layers.get(other).is_ok_and(GameLayer::is_static);
            if let Some(hit) = weaponry.damage.on_contact(blade.owner, other, is_static) {
                info!("{:?} hit {:?}", hit.attacker, hit.target);
                hits.write(hit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::testing::{physics_app, run_steps};
    use bevy::ecs::system::RunSystemOnce;

    #[derive(Resource, Default)]
    struct Hits(Vec<WeaponHit>);

    fn record_hits(mut events: EventReader<WeaponHit>, mut hits: ResMut<Hits>) {
        hits.0.extend(events.read().copied());
    }

    fn blade_app() -> App {
        let mut app = physics_app();
        app.insert_resource(Gravity(Vec3::ZERO))
            .init_resource::<Hits>()
            .add_event::<WeaponHit>()
            .add_systems(FixedUpdate, (detect_weapon_contacts, record_hits).chain());
        app
    }

    /// A wielder standing at the origin with its blade out.
    fn spawn_wielder(app: &mut App, swinging: bool) -> Entity {
        let mut weaponry = Weaponry::new(&WeaponTuning::default(), 3);
        if swinging {
            weaponry.damage.on_trigger("weaponDmgON", "weaponDmg");
        }
        let wielder = app
            .world_mut()
            .spawn((weaponry, RigidBody::Kinematic, Transform::default()))
            .id();
        app.world_mut().entity_mut(wielder).insert(Blade::sensor(wielder));
        wielder
    }

    fn spawn_target(app: &mut App, layers: CollisionLayers) -> Entity {
        app.world_mut()
            .spawn((
                RigidBody::Dynamic,
                Collider::capsule(0.4, 1.0),
                layers,
                Transform::from_xyz(0.0, 0.0, 0.1),
            ))
            .id()
    }

    #[test]
    fn open_window_hits_a_dummy_once() {
        let mut app = blade_app();
        let wielder = spawn_wielder(&mut app, true);
        let dummy = spawn_target(&mut app, GameLayer::dummy());

        run_steps(&mut app, 30);
        assert_eq!(
            app.world().resource::<Hits>().0,
            vec![WeaponHit {
                attacker: wielder,
                target: dummy
            }]
        );
    }

    #[test]
    fn closed_window_lets_the_blade_pass() {
        let mut app = blade_app();
        spawn_wielder(&mut app, false);
        spawn_target(&mut app, GameLayer::dummy());

        run_steps(&mut app, 30);
        assert!(app.world().resource::<Hits>().0.is_empty());
    }

    #[test]
    fn level_geometry_takes_no_hits() {
        let mut app = blade_app();
        spawn_wielder(&mut app, true);
        spawn_target(&mut app, GameLayer::level());

        run_steps(&mut app, 30);
        assert!(app.world().resource::<Hits>().0.is_empty());
    }

    #[test]
    fn clip_tags_reach_the_wielder_of_that_animator() {
        let mut world = World::new();
        world.init_resource::<CharacterConfig>();
        world.add_observer(route_damage_triggers);

        let animator = world.spawn_empty().id();
        let other_animator = world.spawn_empty().id();
        let rig = |animator: Entity| CharacterRig {
            animator,
            mounts: None,
            head: None,
        };
        let wielder = world
            .spawn((rig(animator), Weaponry::new(&WeaponTuning::default(), 3)))
            .id();
        let bystander = world
            .spawn((rig(other_animator), Weaponry::new(&WeaponTuning::default(), 3)))
            .id();

        world.trigger_targets(
            AnimationTrigger {
                tag: "weaponDmgON".into(),
            },
            animator,
        );

        assert!(world.get::<Weaponry>(wielder).unwrap().damage.is_open());
        assert!(!world.get::<Weaponry>(bystander).unwrap().damage.is_open());
    }

    #[test]
    fn status_mirrors_the_weapon() {
        let mut world = World::new();
        let mut weaponry = Weaponry::new(&WeaponTuning::default(), 3);
        weaponry.actions.activate();
        weaponry.damage.on_trigger("weaponDmgON", "weaponDmg");
        let wielder = world.spawn(weaponry).id();

        world.run_system_once(publish_weapon_status).unwrap();
        assert_eq!(
            world.get::<WeaponStatus>(wielder),
            Some(&WeaponStatus {
                state: WeaponState::Unequipped,
                combo_index: 0,
                attack_queued: false,
                damage: DamageState::On,
            })
        );
    }
}
