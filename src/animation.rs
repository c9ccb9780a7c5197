use std::collections::{HashMap, HashSet};

use bevy::animation::{AnimationTarget, AnimationTargetId, RepeatAnimation};
use bevy::prelude::*;

use crate::config::CharacterConfig;
use crate::game_states::AppState;

pub struct AnimationLayersPlugin;

impl Plugin for AnimationLayersPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<AnimationTrigger>()
            .add_systems(Startup, load_clips)
            .add_systems(
                Update,
                advance_layer_fades.run_if(in_state(AppState::InGame)),
            );
    }
}

// Mask groups of the character skeleton. Weapon layer clips only touch the
// upper body, body layer clips touch everything.
const MASK_GROUP_UPPER_BODY: u32 = 0;
const MASK_GROUP_REST: u32 = 1;

/// Graph nodes playing one clip.
///
/// Body clips are split in two so the weapon layer can take over the upper
/// body: `main` drives everything below it and `upper` the rest. Weapon clips
/// only have a `main` node, masked to the upper body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipNodes {
    pub main: AnimationNodeIndex,
    pub upper: Option<AnimationNodeIndex>,
}

impl ClipNodes {
    fn iter(self) -> impl Iterator<Item = AnimationNodeIndex> {
        std::iter::once(self.main).chain(self.upper)
    }
}

/// Every clip the character logic knows how to ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum Clip {
    Idle,
    Run,
    JumpStart,
    JumpLoop,
    UnSheath,
    Sheath,
    EquipIdle,
    Combo(usize),
}

impl Clip {
    fn layer(self) -> AnimLayer {
        match self {
            Clip::UnSheath | Clip::Sheath | Clip::EquipIdle => AnimLayer::Weapon,
            _ => AnimLayer::Body,
        }
    }
}

/// Body locomotion layer and the upper-body weapon overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum AnimLayer {
    Body,
    Weapon,
}

/// What the character logic needs from an animation player. Fade and blend
/// times are in seconds.
pub trait AnimationDriver {
    /// Starts `clip` if it isn't already playing, and fades it in on `layer`.
    fn play(&mut self, clip: Clip, layer: AnimLayer, looped: bool, fade: f32) -> bool;
    /// Like [`AnimationDriver::play`], but fades out everything else on `layer`.
    /// Returns false when the request can't be honored right now.
    fn play_exclusive(&mut self, clip: Clip, layer: AnimLayer, looped: bool, fade: f32) -> bool;
    fn stop_layer(&mut self, layer: AnimLayer, fade: f32);
    fn is_at_end(&self, clip: Clip) -> bool;
    fn set_time(&mut self, clip: Clip, time: f32);
    fn set_speed(&mut self, clip: Clip, speed: f32);
}

/// Tag embedded in a clip, fired on the animation player entity when playback
/// crosses its time.
#[derive(Event, Reflect, Clone, Debug)]
pub struct AnimationTrigger {
    pub tag: String,
}

/// Clip handles loaded from the config and, once built, their graph nodes.
#[derive(Resource, Default)]
pub struct ClipLibrary {
    handles: Vec<(Clip, Handle<AnimationClip>)>,
    triggers: Vec<(Clip, f32, String)>,
    nodes: HashMap<Clip, ClipNodes>,
    graph: Option<Handle<AnimationGraph>>,
}

impl ClipLibrary {
    pub fn from_config(config: &CharacterConfig, asset_server: &AssetServer) -> Self {
        let paths = &config.clips;
        let mut handles = vec![
            (Clip::Idle, asset_server.load(paths.idle.clone())),
            (Clip::Run, asset_server.load(paths.run.clone())),
            (Clip::JumpStart, asset_server.load(paths.jump_start.clone())),
            (Clip::JumpLoop, asset_server.load(paths.jump_loop.clone())),
            (Clip::UnSheath, asset_server.load(paths.unsheath.clone())),
            (Clip::Sheath, asset_server.load(paths.sheath.clone())),
            (Clip::EquipIdle, asset_server.load(paths.equip_idle.clone())),
        ];
        let mut triggers = Vec::new();
        for (index, combo) in paths.combo.iter().enumerate() {
            handles.push((Clip::Combo(index), asset_server.load(combo.path.clone())));
            for (time, tag) in &combo.triggers {
                triggers.push((Clip::Combo(index), *time, tag.clone()));
            }
        }

        Self {
            handles,
            triggers,
            ..default()
        }
    }

    pub fn is_loaded(&self, asset_server: &AssetServer) -> bool {
        self.handles
            .iter()
            .all(|(_, handle)| asset_server.is_loaded_with_dependencies(handle.id()))
    }

    pub fn graph(&self) -> Option<Handle<AnimationGraph>> {
        self.graph.clone()
    }

    pub fn nodes(&self, clip: Clip) -> Option<ClipNodes> {
        self.nodes.get(&clip).copied()
    }

    /// Embeds the configured triggers into the combo clips and builds the
    /// two-layer graph. `targets` are the animated bones of the character.
    pub fn build_graph<'a>(
        &mut self,
        upper_body: &[String],
        targets: impl IntoIterator<Item = &'a AnimationTarget>,
        clips: &mut Assets<AnimationClip>,
        graphs: &mut Assets<AnimationGraph>,
    ) -> Handle<AnimationGraph> {
        for (clip, time, tag) in &self.triggers {
            let Some((_, handle)) = self.handles.iter().find(|(c, _)| c == clip) else {
                continue;
            };
            if let Some(animation) = clips.get_mut(handle) {
                animation.add_event(*time, AnimationTrigger { tag: tag.clone() });
            }
        }

        let mut graph = AnimationGraph::new();
        let upper_body: HashSet<AnimationTargetId> = upper_body
            .iter()
            .map(|path| AnimationTargetId::from_iter(path.split('/')))
            .collect();

        // Every animated bone goes into exactly one group, otherwise it would
        // ignore the weapon layer mask.
        for target in targets {
            let group = if upper_body.contains(&target.id) {
                MASK_GROUP_UPPER_BODY
            } else {
                MASK_GROUP_REST
            };
            graph.add_target_to_mask_group(target.id, group);
        }

        // Both halves of a combo clip fire its events. Damage tags only act
        // on state changes, so the second one is a no-op.
        for (clip, handle) in &self.handles {
            let upper_only = 1 << MASK_GROUP_REST;
            let nodes = match clip.layer() {
                AnimLayer::Body => ClipNodes {
                    main: graph.add_clip_with_mask(handle.clone(), 1 << MASK_GROUP_UPPER_BODY, 1.0, graph.root),
                    upper: Some(graph.add_clip_with_mask(handle.clone(), upper_only, 1.0, graph.root)),
                },
                AnimLayer::Weapon => ClipNodes {
                    main: graph.add_clip_with_mask(handle.clone(), upper_only, 1.0, graph.root),
                    upper: None,
                },
            };
            self.nodes.insert(*clip, nodes);
        }

        let handle = graphs.add(graph);
        self.graph = Some(handle.clone());
        handle
    }
}

fn load_clips(
    mut commands: Commands,
    config: Res<CharacterConfig>,
    asset_server: Res<AssetServer>,
) {
    commands.insert_resource(ClipLibrary::from_config(&config, &asset_server));
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Blend {
    layer: AnimLayer,
    weight: f32,
    target: f32,
    fade: f32,
}

/// Per-clip layer membership and fade state, kept next to the
/// [`AnimationPlayer`] it drives.
#[derive(Component, Default)]
pub struct AnimationLayers {
    blends: HashMap<Clip, Blend>,
}

impl AnimationLayers {
    fn fade_out_layer(
        &mut self,
        player: &mut AnimationPlayer,
        library: &ClipLibrary,
        layer: AnimLayer,
        fade: f32,
        keep: Option<Clip>,
    ) {
        self.blends.retain(|clip, blend| {
            if blend.layer != layer || Some(*clip) == keep {
                return true;
            }
            if fade <= 0.0 {
                stop_clip(player, library, *clip);
                return false;
            }
            blend.target = 0.0;
            blend.fade = fade;
            true
        });
    }

    /// How much of the upper body the weapon layer currently owns.
    fn weapon_cover(&self) -> f32 {
        self.blends
            .values()
            .filter(|blend| blend.layer == AnimLayer::Weapon)
            .map(|blend| blend.weight)
            .sum::<f32>()
            .min(1.0)
    }

    /// Moves weights toward their fade targets by `delta` seconds and drops
    /// clips that faded out or were stopped.
    pub fn advance(&mut self, player: &mut AnimationPlayer, library: &ClipLibrary, delta: f32) {
        self.blends.retain(|clip, blend| {
            let Some(nodes) = library.nodes(*clip) else {
                return false;
            };
            if !player.is_playing_animation(nodes.main) {
                return false;
            }
            let step = if blend.fade > 0.0 { delta / blend.fade } else { 1.0 };
            blend.weight = if blend.weight < blend.target {
                (blend.weight + step).min(blend.target)
            } else {
                (blend.weight - step).max(blend.target)
            };
            if blend.target <= 0.0 && blend.weight <= 0.0 {
                stop_clip(player, library, *clip);
                return false;
            }
            true
        });
        self.apply(player, library);
    }

    /// Writes clip weights to the player. The upper half of a body clip
    /// yields to whatever the weapon layer plays.
    fn apply(&self, player: &mut AnimationPlayer, library: &ClipLibrary) {
        let cover = self.weapon_cover();
        for (clip, blend) in &self.blends {
            let Some(nodes) = library.nodes(*clip) else {
                continue;
            };
            if let Some(active) = player.animation_mut(nodes.main) {
                active.set_weight(blend.weight);
            }
            let Some(upper) = nodes.upper else {
                continue;
            };
            if let Some(active) = player.animation_mut(upper) {
                active.set_weight(blend.weight * (1.0 - cover));
            }
        }
    }
}

fn stop_clip(player: &mut AnimationPlayer, library: &ClipLibrary, clip: Clip) {
    if let Some(nodes) = library.nodes(clip) {
        for node in nodes.iter() {
            player.stop(node);
        }
    }
}

/// [`AnimationDriver`] over a Bevy [`AnimationPlayer`].
pub struct LayeredAnimator<'a> {
    pub player: &'a mut AnimationPlayer,
    pub layers: &'a mut AnimationLayers,
    pub library: &'a ClipLibrary,
}

impl AnimationDriver for LayeredAnimator<'_> {
    fn play(&mut self, clip: Clip, layer: AnimLayer, looped: bool, fade: f32) -> bool {
        let Some(nodes) = self.library.nodes(clip) else {
            return false;
        };
        let weight = match self.layers.blends.get(&clip) {
            Some(blend) if self.player.is_playing_animation(nodes.main) => blend.weight,
            _ if fade > 0.0 => 0.0,
            _ => 1.0,
        };
        for node in nodes.iter() {
            let active = self.player.play(node);
            if looped {
                active.repeat();
            } else {
                active.set_repeat(RepeatAnimation::Never);
            }
        }
        self.layers.blends.insert(
            clip,
            Blend {
                layer,
                weight,
                target: 1.0,
                fade,
            },
        );
        self.layers.apply(self.player, self.library);
        true
    }

    fn play_exclusive(&mut self, clip: Clip, layer: AnimLayer, looped: bool, fade: f32) -> bool {
        if self.library.nodes(clip).is_none() {
            return false;
        }
        self.layers
            .fade_out_layer(self.player, self.library, layer, fade, Some(clip));
        self.play(clip, layer, looped, fade)
    }

    fn stop_layer(&mut self, layer: AnimLayer, fade: f32) {
        self.layers
            .fade_out_layer(self.player, self.library, layer, fade, None);
        self.layers.apply(self.player, self.library);
    }

    fn is_at_end(&self, clip: Clip) -> bool {
        self.library
            .nodes(clip)
            .and_then(|nodes| self.player.animation(nodes.main))
            .is_some_and(|active| active.is_finished())
    }

    fn set_time(&mut self, clip: Clip, time: f32) {
        let Some(nodes) = self.library.nodes(clip) else {
            return;
        };
        for node in nodes.iter() {
            let Some(active) = self.player.animation_mut(node) else {
                continue;
            };
            if time <= 0.0 {
                active.replay();
            } else {
                active.seek_to(time);
            }
        }
    }

    fn set_speed(&mut self, clip: Clip, speed: f32) {
        let Some(nodes) = self.library.nodes(clip) else {
            return;
        };
        for node in nodes.iter() {
            if let Some(active) = self.player.animation_mut(node) {
                active.set_speed(speed);
            }
        }
    }
}

fn advance_layer_fades(
    time: Res<Time>,
    library: Res<ClipLibrary>,
    mut animators: Query<(&mut AnimationPlayer, &mut AnimationLayers)>,
) {
    let delta = time.delta_secs();
    for (mut player, mut layers) in &mut animators {
        layers.advance(&mut player, &library, delta);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Play(Clip, AnimLayer, bool),
        PlayExclusive(Clip, AnimLayer, bool),
        StopLayer(AnimLayer, f32),
        SetTime(Clip, f32),
        SetSpeed(Clip, f32),
    }

    /// Records requests; clips finish only when a test says so.
    #[derive(Default)]
    pub struct FakeAnimator {
        pub calls: Vec<Call>,
        pub playing: HashMap<Clip, AnimLayer>,
        pub finished: HashSet<Clip>,
        pub locked: HashSet<AnimLayer>,
        pub speeds: HashMap<Clip, f32>,
    }

    impl FakeAnimator {
        pub fn finish(&mut self, clip: Clip) {
            self.finished.insert(clip);
        }

        pub fn is_playing(&self, clip: Clip) -> bool {
            self.playing.contains_key(&clip)
        }

        pub fn layer_clips(&self, layer: AnimLayer) -> Vec<Clip> {
            self.playing
                .iter()
                .filter(|(_, l)| **l == layer)
                .map(|(clip, _)| *clip)
                .collect()
        }

        pub fn clear_calls(&mut self) {
            self.calls.clear();
        }
    }

    impl AnimationDriver for FakeAnimator {
        fn play(&mut self, clip: Clip, layer: AnimLayer, looped: bool, _fade: f32) -> bool {
            self.calls.push(Call::Play(clip, layer, looped));
            self.playing.insert(clip, layer);
            true
        }

        fn play_exclusive(&mut self, clip: Clip, layer: AnimLayer, looped: bool, _fade: f32) -> bool {
            if self.locked.contains(&layer) {
                return false;
            }
            self.calls.push(Call::PlayExclusive(clip, layer, looped));
            self.playing.retain(|c, l| *l != layer || *c == clip);
            self.playing.insert(clip, layer);
            true
        }

        fn stop_layer(&mut self, layer: AnimLayer, fade: f32) {
            self.calls.push(Call::StopLayer(layer, fade));
            self.playing.retain(|_, l| *l != layer);
        }

        fn is_at_end(&self, clip: Clip) -> bool {
            self.playing.contains_key(&clip) && self.finished.contains(&clip)
        }

        fn set_time(&mut self, clip: Clip, time: f32) {
            self.calls.push(Call::SetTime(clip, time));
            if time <= 0.0 {
                self.finished.remove(&clip);
            }
        }

        fn set_speed(&mut self, clip: Clip, speed: f32) {
            self.calls.push(Call::SetSpeed(clip, speed));
            self.speeds.insert(clip, speed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weapon_clips_live_on_the_weapon_layer() {
        assert_eq!(Clip::UnSheath.layer(), AnimLayer::Weapon);
        assert_eq!(Clip::Sheath.layer(), AnimLayer::Weapon);
        assert_eq!(Clip::EquipIdle.layer(), AnimLayer::Weapon);
        assert_eq!(Clip::Combo(2).layer(), AnimLayer::Body);
        assert_eq!(Clip::Run.layer(), AnimLayer::Body);
    }

    #[test]
    fn unbuilt_library_refuses_playback() {
        let library = ClipLibrary::default();
        let mut player = AnimationPlayer::default();
        let mut layers = AnimationLayers::default();
        let mut animator = LayeredAnimator {
            player: &mut player,
            layers: &mut layers,
            library: &library,
        };
        assert!(!animator.play_exclusive(Clip::Idle, AnimLayer::Body, true, 0.2));
        assert!(!animator.is_at_end(Clip::Idle));
    }

    /// Graph nodes for idle and the weapon idle, with no clip data behind them.
    fn idle_library() -> ClipLibrary {
        let mut library = ClipLibrary {
            handles: vec![(Clip::Idle, Handle::default()), (Clip::EquipIdle, Handle::default())],
            ..default()
        };
        let mut clips = Assets::<AnimationClip>::default();
        let mut graphs = Assets::<AnimationGraph>::default();
        library.build_graph(&[], std::iter::empty(), &mut clips, &mut graphs);
        library
    }

    fn weight(player: &AnimationPlayer, node: AnimationNodeIndex) -> f32 {
        player.animation(node).map_or(-1.0, |active| active.weight())
    }

    #[test]
    fn body_clips_are_split_at_the_upper_body() {
        let library = idle_library();
        let idle = library.nodes(Clip::Idle).unwrap();
        let equip = library.nodes(Clip::EquipIdle).unwrap();
        assert!(idle.upper.is_some());
        assert_eq!(equip.upper, None);
        assert_ne!(idle.main, equip.main);
    }

    #[test]
    fn weapon_layer_owns_the_upper_body() {
        let library = idle_library();
        let mut player = AnimationPlayer::default();
        let mut layers = AnimationLayers::default();
        let mut animator = LayeredAnimator {
            player: &mut player,
            layers: &mut layers,
            library: &library,
        };
        assert!(animator.play_exclusive(Clip::Idle, AnimLayer::Body, true, 0.0));
        assert!(animator.play_exclusive(Clip::EquipIdle, AnimLayer::Weapon, true, 0.0));

        let idle = library.nodes(Clip::Idle).unwrap();
        let equip = library.nodes(Clip::EquipIdle).unwrap();
        assert_eq!(weight(&player, idle.main), 1.0);
        assert_eq!(weight(&player, idle.upper.unwrap()), 0.0);
        assert_eq!(weight(&player, equip.main), 1.0);
    }

    #[test]
    fn upper_body_returns_to_the_body_layer_as_the_weapon_fades() {
        let library = idle_library();
        let mut player = AnimationPlayer::default();
        let mut layers = AnimationLayers::default();
        let mut animator = LayeredAnimator {
            player: &mut player,
            layers: &mut layers,
            library: &library,
        };
        animator.play_exclusive(Clip::Idle, AnimLayer::Body, true, 0.0);
        animator.play_exclusive(Clip::EquipIdle, AnimLayer::Weapon, true, 0.0);
        animator.stop_layer(AnimLayer::Weapon, 0.4);

        let idle = library.nodes(Clip::Idle).unwrap();
        let equip = library.nodes(Clip::EquipIdle).unwrap();
        layers.advance(&mut player, &library, 0.1);
        assert!((weight(&player, equip.main) - 0.75).abs() < 1e-5);
        assert!((weight(&player, idle.upper.unwrap()) - 0.25).abs() < 1e-5);
        assert_eq!(weight(&player, idle.main), 1.0);

        layers.advance(&mut player, &library, 0.4);
        assert!(!player.is_playing_animation(equip.main));
        assert_eq!(weight(&player, idle.upper.unwrap()), 1.0);
    }

    #[test]
    fn fresh_clips_fade_in() {
        let library = idle_library();
        let mut player = AnimationPlayer::default();
        let mut layers = AnimationLayers::default();
        let mut animator = LayeredAnimator {
            player: &mut player,
            layers: &mut layers,
            library: &library,
        };
        animator.play(Clip::Idle, AnimLayer::Body, true, 0.2);

        let idle = library.nodes(Clip::Idle).unwrap();
        assert_eq!(weight(&player, idle.main), 0.0);
        layers.advance(&mut player, &library, 0.1);
        assert!((weight(&player, idle.main) - 0.5).abs() < 1e-5);
        assert!((weight(&player, idle.upper.unwrap()) - 0.5).abs() < 1e-5);
    }
}
