use std::collections::BTreeMap;

use actor_runtime::combat::{TARGET_IMPACT_ANCHOR, WEAPON_ATTACHMENT, WEAPON_MUZZLE_ANCHOR};
use actor_runtime::{
    ActorId, AmmunitionDef, Equipment, IdAllocator, InventorySlot, ItemRef, Mat4, ModelRef,
    ModelUsage, SceneArena, SceneGraph, Vec3, VisualHandle,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::content::Armory;

const UNARMED_DAMAGE: u32 = 1;
const MUZZLE_OFFSET: Vec3 = Vec3::new(0.3, 0.0, 0.0);
const WEAPON_GRIP_OFFSET: Vec3 = Vec3::new(0.25, 0.0, 1.1);
const IMPACT_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub model: String,
    /// `WeaponDef` name held in the right hand.
    pub weapon: Option<String>,
}

/// Host-side record of who each actor is and what they carry. Serves the
/// equipment lookups combat makes.
#[derive(Debug)]
pub struct Roster {
    armory: Armory,
    entries: BTreeMap<ActorId, RosterEntry>,
    equipped: BTreeMap<ActorId, ItemRef>,
    items: BTreeMap<ItemRef, String>,
    item_ids: IdAllocator,
}

impl Roster {
    pub fn new(armory: Armory) -> Self {
        Self {
            armory,
            entries: BTreeMap::new(),
            equipped: BTreeMap::new(),
            items: BTreeMap::new(),
            item_ids: IdAllocator::default(),
        }
    }

    pub fn register(&mut self, actor: ActorId, entry: RosterEntry) {
        if let Some(weapon) = &entry.weapon {
            if self.armory.weapon(weapon).is_some() {
                let item = ItemRef(self.item_ids.allocate());
                self.items.insert(item, weapon.clone());
                self.equipped.insert(actor, item);
            } else {
                warn!(actor_id = actor.0, weapon = weapon.as_str(), "unknown_weapon_left_unequipped");
            }
        }
        self.entries.insert(actor, entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ActorId, &RosterEntry)> {
        self.entries.iter()
    }

    pub fn name_of(&self, actor: ActorId) -> &str {
        self.entries
            .get(&actor)
            .map(|entry| entry.name.as_str())
            .unwrap_or("unknown")
    }

    pub fn damage_for(&self, attacker: ActorId) -> u32 {
        self.equipped
            .get(&attacker)
            .and_then(|item| self.items.get(item))
            .and_then(|weapon| self.armory.weapon(weapon))
            .map(|weapon| weapon.damage)
            .unwrap_or(UNARMED_DAMAGE)
    }

    /// Builds the creature visual for an entry: body, impact anchor, and the
    /// right-hand weapon with its muzzle anchor.
    pub fn attach_visuals(&self, entry: &RosterEntry, scene: &mut SceneArena) -> VisualHandle {
        let body = scene.attach_visual(&ModelRef(entry.model.clone()), ModelUsage::Creature);
        scene.set_anchor(
            body,
            TARGET_IMPACT_ANCHOR,
            Mat4::from_translation(Vec3::new(0.0, 0.0, IMPACT_HEIGHT)),
        );
        let Some(weapon) = entry
            .weapon
            .as_deref()
            .and_then(|name| self.armory.weapon(name))
        else {
            return body;
        };
        if let Some(hand) = scene.attach_child(body, WEAPON_ATTACHMENT, &weapon.model, ModelUsage::Equipment)
        {
            scene.set_local_transform(hand, Mat4::from_translation(WEAPON_GRIP_OFFSET));
            if weapon.ammunition.is_some() {
                scene.set_anchor(hand, WEAPON_MUZZLE_ANCHOR, Mat4::from_translation(MUZZLE_OFFSET));
            }
        }
        body
    }
}

impl Equipment for Roster {
    fn equipped_weapon(&self, actor: ActorId, slot: InventorySlot) -> Option<ItemRef> {
        match slot {
            InventorySlot::RightWeapon => self.equipped.get(&actor).copied(),
            InventorySlot::LeftWeapon => None,
        }
    }

    fn ammunition(&self, weapon: ItemRef) -> Option<AmmunitionDef> {
        let name = self.items.get(&weapon)?;
        let def = self.armory.weapon(name)?;
        self.armory.ammunition_for(def).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::content::{parse_armory, DEFAULT_ARMORY_XML};

    fn roster() -> Roster {
        Roster::new(parse_armory(Path::new("builtin"), DEFAULT_ARMORY_XML).expect("armory"))
    }

    fn entry(weapon: Option<&str>) -> RosterEntry {
        RosterEntry {
            name: "trooper".to_string(),
            model: "c_trooper".to_string(),
            weapon: weapon.map(ToString::to_string),
        }
    }

    #[test]
    fn ranged_weapon_resolves_ammunition() {
        let mut roster = roster();
        roster.register(ActorId(0), entry(Some("blaster_pistol")));

        let item = roster
            .equipped_weapon(ActorId(0), InventorySlot::RightWeapon)
            .expect("equipped");
        assert!(roster.ammunition(item).is_some());
        assert!(roster
            .equipped_weapon(ActorId(0), InventorySlot::LeftWeapon)
            .is_none());
        assert_eq!(roster.damage_for(ActorId(0)), 4);
    }

    #[test]
    fn melee_weapon_has_no_ammunition_and_unknown_weapon_is_unarmed() {
        let mut roster = roster();
        roster.register(ActorId(0), entry(Some("vibroblade")));
        roster.register(ActorId(1), entry(Some("lightsaber")));

        let blade = roster
            .equipped_weapon(ActorId(0), InventorySlot::RightWeapon)
            .expect("blade");
        assert!(roster.ammunition(blade).is_none());
        assert!(roster
            .equipped_weapon(ActorId(1), InventorySlot::RightWeapon)
            .is_none());
        assert_eq!(roster.damage_for(ActorId(1)), UNARMED_DAMAGE);
    }

    #[test]
    fn ranged_visuals_carry_muzzle_and_impact_anchors() {
        let roster = roster();
        let mut scene = SceneArena::new();

        let body = roster.attach_visuals(&entry(Some("blaster_pistol")), &mut scene);

        let hand = scene
            .find_attachment(body, WEAPON_ATTACHMENT)
            .expect("weapon attachment");
        let muzzle = scene
            .find_named_anchor(hand, WEAPON_MUZZLE_ANCHOR)
            .expect("muzzle");
        let expected = WEAPON_GRIP_OFFSET + MUZZLE_OFFSET;
        assert!((muzzle.translation() - expected).length() < 1e-5);
        assert!(scene.find_named_anchor(body, TARGET_IMPACT_ANCHOR).is_some());
    }
}
