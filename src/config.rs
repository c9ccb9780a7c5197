use std::fs;
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_PATH: &str = "assets/config/character.ron";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<CharacterConfig>()
            .insert_resource(CharacterConfig::load_or_default(CONFIG_PATH));
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Everything tunable about the playable character.
#[derive(Resource, Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[reflect(Resource)]
#[serde(default)]
pub struct CharacterConfig {
    pub model: String,
    pub spawn: [f32; 3],
    pub movement: MovementTuning,
    pub weapon: WeaponTuning,
    pub rig: RigNames,
    pub clips: ClipPaths,
}

#[derive(Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MovementTuning {
    pub move_force: f32,
    pub inair_move_force: f32,
    pub brake_force: f32,
    pub jump_force: f32,
    /// Seconds the character may lose ground contact and still count as grounded.
    pub inair_threshold_time: f32,
    pub max_stepdown_height: f32,
    pub ground_probe_distance: f32,
    pub run_speed_scale: f32,
    pub run_speed_min: f32,
    pub run_speed_max: f32,
    /// Degrees of yaw per pixel of mouse motion.
    pub yaw_sensitivity: f32,
    /// Contacts below `center.y + ground_contact_height` may count as ground.
    pub ground_contact_height: f32,
    pub ground_normal_min_y: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            move_force: 0.8,
            inair_move_force: 0.02,
            brake_force: 0.2,
            jump_force: 7.0,
            inair_threshold_time: 0.1,
            max_stepdown_height: 0.5,
            ground_probe_distance: 50.0,
            run_speed_scale: 0.3,
            run_speed_min: 0.5,
            run_speed_max: 2.0,
            yaw_sensitivity: 0.1,
            ground_contact_height: 1.0,
            ground_normal_min_y: 0.75,
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WeaponTuning {
    /// How long a buffered press survives, in milliseconds.
    pub input_hold_ms: u64,
    /// Animation trigger tags starting with this control the damage window.
    pub trigger_prefix: String,
}

impl WeaponTuning {
    pub fn input_hold(&self) -> Duration {
        Duration::from_millis(self.input_hold_ms)
    }
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            input_hold_ms: 1200,
            trigger_prefix: "weaponDmg".into(),
        }
    }
}

/// Names of the nodes looked up inside the character scene.
#[derive(Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RigNames {
    pub back_locator: String,
    pub hand_locator: String,
    pub weapon: String,
    /// Bone turned toward the look pitch after animation.
    pub head: String,
    /// Bone paths (joined with '/') animated by the weapon layer.
    pub upper_body: Vec<String>,
}

impl Default for RigNames {
    fn default() -> Self {
        Self {
            back_locator: "GreatswordLocator".into(),
            hand_locator: "RighthandLocator".into(),
            weapon: "Weapon".into(),
            head: "Head".into(),
            upper_body: vec![
                "Armature/Hips/Spine".into(),
                "Armature/Hips/Spine/Chest".into(),
                "Armature/Hips/Spine/Chest/Neck".into(),
                "Armature/Hips/Spine/Chest/Neck/Head".into(),
                "Armature/Hips/Spine/Chest/Shoulder.L".into(),
                "Armature/Hips/Spine/Chest/Shoulder.L/UpperArm.L".into(),
                "Armature/Hips/Spine/Chest/Shoulder.L/UpperArm.L/LowerArm.L".into(),
                "Armature/Hips/Spine/Chest/Shoulder.R".into(),
                "Armature/Hips/Spine/Chest/Shoulder.R/UpperArm.R".into(),
                "Armature/Hips/Spine/Chest/Shoulder.R/UpperArm.R/LowerArm.R".into(),
            ],
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ComboClip {
    pub path: String,
    /// `(seconds, tag)` pairs fired as animation triggers while the clip plays.
    pub triggers: Vec<(f32, String)>,
}

impl ComboClip {
    fn new(path: &str, on: f32, off: f32) -> Self {
        Self {
            path: path.into(),
            triggers: vec![(on, "weaponDmgON".into()), (off, "weaponDmgOFF".into())],
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClipPaths {
    pub idle: String,
    pub run: String,
    pub jump_start: String,
    pub jump_loop: String,
    pub unsheath: String,
    pub sheath: String,
    pub equip_idle: String,
    pub combo: Vec<ComboClip>,
}

impl Default for ClipPaths {
    fn default() -> Self {
        const MODEL: &str = "models/girlbot.glb";
        let clip = |index: usize| format!("{MODEL}#Animation{index}");
        Self {
            idle: clip(0),
            run: clip(1),
            jump_start: clip(2),
            jump_loop: clip(3),
            unsheath: clip(4),
            sheath: clip(5),
            equip_idle: clip(6),
            combo: vec![
                ComboClip::new(&clip(7), 0.25, 0.55),
                ComboClip::new(&clip(8), 0.2, 0.5),
                ComboClip::new(&clip(9), 0.3, 0.7),
            ],
        }
    }
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            model: "models/girlbot.glb#Scene0".into(),
            spawn: [0.0, 1.0, 0.0],
            movement: MovementTuning::default(),
            weapon: WeaponTuning::default(),
            rig: RigNames::default(),
            clips: ClipPaths::default(),
        }
    }
}

impl CharacterConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn read(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn load_or_default(path: &str) -> Self {
        match Self::read(path) {
            Ok(config) => {
                info!("loaded character config from '{path}'");
                config
            }
            Err(e) => {
                warn!("{e}, using default character config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clips.combo.is_empty() {
            return Err(ConfigError::Invalid("at least one combo clip is required"));
        }
        if self.weapon.input_hold_ms == 0 {
            return Err(ConfigError::Invalid("input_hold_ms must be positive"));
        }
        if self.movement.run_speed_min > self.movement.run_speed_max {
            return Err(ConfigError::Invalid("run_speed_min exceeds run_speed_max"));
        }
        Ok(())
    }

    pub fn spawn_point(&self) -> Vec3 {
        Vec3::from(self.spawn)
    }
}
