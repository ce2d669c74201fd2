pub mod combat;
mod effects;
mod ids;
mod intent;
mod intent_queue;
pub mod math;
mod scene;
mod services;
mod snapshot;
mod timer;
mod world;

#[cfg(test)]
mod test_support;

pub use combat::{
    AttackStart, CombatCoordinator, CombatEvent, CombatRound, Combatant, FireOutcome, Projectile,
    RoundPhase, DEFAULT_MELEE_RANGE, PROJECTILE_SPEED,
};
pub use effects::{
    AppliedEffect, DurationType, Effect, EffectApplication, EffectLedger, EffectTarget,
};
pub use ids::{
    ActorId, FeatId, IdAllocator, IntentId, ItemRef, ModelRef, SkillId, SoundRef, VisualHandle,
};
pub use intent::{Intent, IntentKind, IntentKindTag};
pub use intent_queue::{DelayedIntent, IntentQueue, QueueTickReport, QueuedIntent};
pub use math::{Mat4, Vec3};
pub use scene::{ModelUsage, SceneArena, SceneGraph, VisualNode};
pub use services::{AmmunitionDef, Audio, Equipment, InventorySlot, Services, SilentAudio, Unarmed};
pub use snapshot::{
    validate_snapshot, ActorSnapshot, ProjectileSnapshot, RoundSnapshot, SnapshotError,
    WorldSnapshot, SNAPSHOT_VERSION,
};
pub use timer::{sanitize_dt, Timer};
pub use world::{
    ActorRecord, ActorSpawn, ActorWorld, Vitals, WorldConfig, WorldEvent, WorldSystemId,
    DEFAULT_ARRIVAL_THRESHOLD, DEFAULT_IMPACT_DELAY_SECONDS, WORLD_SYSTEM_ORDER,
};
