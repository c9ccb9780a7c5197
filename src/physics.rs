use avian3d::prelude::*;
use bevy::prelude::*;

pub(crate) struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PhysicsPlugins::default());
    }
}

#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    #[default]
    Static,
    InvisWall,
    Character,
    Dummy,
    Weapon,
}

impl GameLayer {
    /// Characters stand on everything but never touch a blade.
    pub fn character() -> CollisionLayers {
        CollisionLayers::new(GameLayer::Character, LayerMask::ALL & !LayerMask::from(GameLayer::Weapon))
    }

    /// Blades pass through level geometry and their wielder.
    pub fn weapon() -> CollisionLayers {
        CollisionLayers::new(
            GameLayer::Weapon,
            LayerMask::ALL & !LayerMask::from([GameLayer::Static, GameLayer::Character]),
        )
    }

    pub fn dummy() -> CollisionLayers {
        CollisionLayers::new(GameLayer::Dummy, LayerMask::ALL)
    }

    pub fn level() -> CollisionLayers {
        CollisionLayers::new(GameLayer::Static, LayerMask::ALL)
    }

    /// What the camera may collide with.
    pub fn camera_mask() -> LayerMask {
        LayerMask::ALL & !LayerMask::from([GameLayer::Character, GameLayer::Dummy, GameLayer::Weapon])
    }

    /// Body layers a grounded character can stand on.
    pub fn ground_mask() -> LayerMask {
        LayerMask::from([GameLayer::Static, GameLayer::InvisWall, GameLayer::Dummy])
    }

    pub fn is_static(layers: &CollisionLayers) -> bool {
        layers.memberships.has_all(GameLayer::Static)
    }
}
