use crate::ids::{ActorId, ItemRef, ModelRef, SoundRef};
use crate::math::Vec3;
use crate::scene::SceneGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventorySlot {
    RightWeapon,
    LeftWeapon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmmunitionDef {
    pub model: ModelRef,
    pub shot_sound: Option<SoundRef>,
    pub impact_sound: Option<SoundRef>,
}

/// Equipment/inventory lookups consumed by combat.
pub trait Equipment {
    fn equipped_weapon(&self, actor: ActorId, slot: InventorySlot) -> Option<ItemRef>;

    fn ammunition(&self, weapon: ItemRef) -> Option<AmmunitionDef>;
}

pub trait Audio {
    fn play_sound_at(&mut self, sound: &SoundRef, position: Vec3);
}

/// Collaborator handles threaded through every tick. Tests swap in fakes.
pub struct Services<'a> {
    pub scene: &'a mut dyn SceneGraph,
    pub equipment: &'a dyn Equipment,
    pub audio: &'a mut dyn Audio,
}

impl<'a> Services<'a> {
    pub fn new(
        scene: &'a mut dyn SceneGraph,
        equipment: &'a dyn Equipment,
        audio: &'a mut dyn Audio,
    ) -> Self {
        Self {
            scene,
            equipment,
            audio,
        }
    }
}

/// Equipment source with nothing equipped; every attack takes the melee path.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unarmed;

impl Equipment for Unarmed {
    fn equipped_weapon(&self, _actor: ActorId, _slot: InventorySlot) -> Option<ItemRef> {
        None
    }

    fn ammunition(&self, _weapon: ItemRef) -> Option<AmmunitionDef> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl Audio for SilentAudio {
    fn play_sound_at(&mut self, _sound: &SoundRef, _position: Vec3) {}
}
