mod coordinator;
mod projectile;
mod round;

pub use coordinator::{AttackStart, CombatCoordinator, CombatEvent, DEFAULT_MELEE_RANGE};
pub use projectile::{
    facing_for_direction, flight_transform, Projectile, MODEL_EVENT_DETONATE, PROJECTILE_SPEED,
};
pub use round::{
    aim_point, projectile_origin, CombatRound, Combatant, FireOutcome, RoundPhase,
    TARGET_IMPACT_ANCHOR, WEAPON_ATTACHMENT, WEAPON_MUZZLE_ANCHOR,
};
