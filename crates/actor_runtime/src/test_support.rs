use std::collections::HashMap;

use crate::ids::{ActorId, ItemRef, ModelRef, SoundRef};
use crate::math::Vec3;
use crate::services::{AmmunitionDef, Audio, Equipment, InventorySlot};

#[derive(Debug, Default)]
pub(crate) struct FakeEquipment {
    weapons: HashMap<ActorId, ItemRef>,
    ammunition: HashMap<ItemRef, AmmunitionDef>,
}

impl FakeEquipment {
    pub(crate) fn arm(&mut self, actor: ActorId, weapon: ItemRef) {
        self.weapons.insert(actor, weapon);
    }

    pub(crate) fn arm_ranged(&mut self, actor: ActorId, weapon: ItemRef) {
        self.arm(actor, weapon);
        self.ammunition.insert(weapon, blaster_bolt());
    }
}

impl Equipment for FakeEquipment {
    fn equipped_weapon(&self, actor: ActorId, slot: InventorySlot) -> Option<ItemRef> {
        match slot {
            InventorySlot::RightWeapon => self.weapons.get(&actor).copied(),
            InventorySlot::LeftWeapon => None,
        }
    }

    fn ammunition(&self, weapon: ItemRef) -> Option<AmmunitionDef> {
        self.ammunition.get(&weapon).cloned()
    }
}

pub(crate) fn blaster_bolt() -> AmmunitionDef {
    AmmunitionDef {
        model: ModelRef("w_bolt_red".to_string()),
        shot_sound: Some(SoundRef("cb_sh_blaster".to_string())),
        impact_sound: Some(SoundRef("cb_imp_blaster".to_string())),
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingAudio {
    pub(crate) played: Vec<(SoundRef, Vec3)>,
}

impl Audio for RecordingAudio {
    fn play_sound_at(&mut self, sound: &SoundRef, position: Vec3) {
        self.played.push((sound.clone(), position));
    }
}

pub(crate) fn assert_vec3_close(actual: Vec3, expected: Vec3, epsilon: f32) {
    assert!(
        (actual - expected).length() <= epsilon,
        "{actual:?} vs {expected:?}"
    );
}
