use crate::ids::{ActorId, IntentId, ItemRef, VisualHandle};
use crate::math::{Mat4, Vec3};
use crate::scene::{ModelUsage, SceneGraph};
use crate::services::{InventorySlot, Services};

use super::projectile::{Projectile, MODEL_EVENT_DETONATE};

pub const WEAPON_ATTACHMENT: &str = "rhand";
pub const WEAPON_MUZZLE_ANCHOR: &str = "bullethook";
pub const TARGET_IMPACT_ANCHOR: &str = "impact";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    ProjectileInFlight,
}

/// Why `fire` did or did not leave the round in flight. Everything except
/// `Fired` means the caller falls back to melee resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Fired,
    NoRangedWeapon,
    NoAmmunition,
    MissingVisual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combatant {
    pub actor: ActorId,
    pub visual: Option<VisualHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombatRound {
    pub(crate) attacker: ActorId,
    pub(crate) target: ActorId,
    pub(crate) intent: Option<IntentId>,
    pub(crate) phase: RoundPhase,
    pub(crate) projectile: Option<Projectile>,
    pub(crate) weapon: Option<ItemRef>,
}

impl CombatRound {
    pub fn new(attacker: ActorId, target: ActorId, intent: Option<IntentId>) -> Self {
        Self {
            attacker,
            target,
            intent,
            phase: RoundPhase::Idle,
            projectile: None,
            weapon: None,
        }
    }

    pub fn attacker(&self) -> ActorId {
        self.attacker
    }

    pub fn target(&self) -> ActorId {
        self.target
    }

    pub fn intent(&self) -> Option<IntentId> {
        self.intent
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn projectile(&self) -> Option<&Projectile> {
        self.projectile.as_ref()
    }

    pub fn weapon(&self) -> Option<ItemRef> {
        self.weapon
    }

    /// `Idle -> ProjectileInFlight`. Missing anchors fall back to node origins;
    /// a missing weapon, ammunition or visual leaves the round idle.
    pub fn fire(
        &mut self,
        attacker: Combatant,
        target: Combatant,
        services: &mut Services<'_>,
    ) -> FireOutcome {
        let Some(weapon) = services
            .equipment
            .equipped_weapon(attacker.actor, InventorySlot::RightWeapon)
        else {
            return FireOutcome::NoRangedWeapon;
        };
        let Some(ammunition) = services.equipment.ammunition(weapon) else {
            return FireOutcome::NoAmmunition;
        };
        let (Some(attacker_visual), Some(target_visual)) = (attacker.visual, target.visual)
        else {
            return FireOutcome::MissingVisual;
        };
        let Some(origin) = projectile_origin(&*services.scene, attacker_visual) else {
            return FireOutcome::MissingVisual;
        };
        let Some(aim_point) = aim_point(&*services.scene, target_visual) else {
            return FireOutcome::MissingVisual;
        };
        let direction = (aim_point - origin).normalize_or_zero();

        // Drop any projectile left over from a previous exchange.
        self.reset(&mut *services.scene);

        let visual = services
            .scene
            .attach_visual(&ammunition.model, ModelUsage::Projectile);
        services.scene.signal_event(visual, MODEL_EVENT_DETONATE);
        services
            .scene
            .set_local_transform(visual, Mat4::from_translation(origin));

        if let Some(shot_sound) = &ammunition.shot_sound {
            services.audio.play_sound_at(shot_sound, origin);
        }

        self.weapon = Some(weapon);
        self.projectile = Some(Projectile {
            visual,
            model: ammunition.model,
            position: origin,
            direction,
            impact_sound: ammunition.impact_sound,
        });
        self.phase = RoundPhase::ProjectileInFlight;
        FireOutcome::Fired
    }

    pub fn update(&mut self, dt: f32, scene: &mut dyn SceneGraph) {
        if self.phase != RoundPhase::ProjectileInFlight {
            return;
        }
        if let Some(projectile) = self.projectile.as_mut() {
            projectile.advance(dt, scene);
        }
    }

    /// `ProjectileInFlight -> Idle`. Returns false when there was nothing to
    /// detach.
    pub fn reset(&mut self, scene: &mut dyn SceneGraph) -> bool {
        self.phase = RoundPhase::Idle;
        match self.projectile.take() {
            Some(projectile) => {
                scene.detach_visual(projectile.visual);
                true
            }
            None => false,
        }
    }
}

/// Muzzle anchor on the weapon held in the right hand, else the weapon's
/// origin, else the attacker's own origin.
pub fn projectile_origin(scene: &dyn SceneGraph, attacker_visual: VisualHandle) -> Option<Vec3> {
    match scene.find_attachment(attacker_visual, WEAPON_ATTACHMENT) {
        Some(weapon_visual) => scene
            .find_named_anchor(weapon_visual, WEAPON_MUZZLE_ANCHOR)
            .or_else(|| scene.world_transform(weapon_visual))
            .or_else(|| scene.world_transform(attacker_visual))
            .map(|transform| transform.translation()),
        None => scene
            .world_transform(attacker_visual)
            .map(|transform| transform.translation()),
    }
}

/// Impact anchor on the target, else the target's origin.
pub fn aim_point(scene: &dyn SceneGraph, target_visual: VisualHandle) -> Option<Vec3> {
    scene
        .find_named_anchor(target_visual, TARGET_IMPACT_ANCHOR)
        .or_else(|| scene.world_transform(target_visual))
        .map(|transform| transform.translation())
}
