use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combat::{CombatCoordinator, CombatEvent, DEFAULT_MELEE_RANGE};
use crate::effects::{DurationType, Effect, EffectApplication, EffectLedger, EffectTarget};
use crate::ids::{ActorId, FeatId, IdAllocator, IntentId, SkillId, VisualHandle};
use crate::intent::Intent;
use crate::intent_queue::IntentQueue;
use crate::math::{Mat4, Vec3};
use crate::scene::SceneGraph;
use crate::services::Services;
use crate::timer::{sanitize_dt, Timer};

mod systems;

pub use systems::{WorldSystemId, WORLD_SYSTEM_ORDER};

pub const DEFAULT_ARRIVAL_THRESHOLD: f32 = 0.1;
pub const DEFAULT_IMPACT_DELAY_SECONDS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Distance at which a move intent counts as arrived.
    pub arrival_threshold: f32,
    /// Flight time before a fired projectile is resolved as an impact.
    pub impact_delay_seconds: f32,
    pub melee_range: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            arrival_threshold: DEFAULT_ARRIVAL_THRESHOLD,
            impact_delay_seconds: DEFAULT_IMPACT_DELAY_SECONDS,
            melee_range: DEFAULT_MELEE_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub hit_points: u32,
    pub max_hit_points: u32,
    /// Units per second before movement multipliers.
    pub move_speed: f32,
    pub dead: bool,
}

impl Vitals {
    pub fn new(max_hit_points: u32, move_speed: f32) -> Self {
        Self {
            hit_points: max_hit_points,
            max_hit_points,
            move_speed,
            dead: false,
        }
    }

    /// False from the moment hit points reach zero, before cleanup marks the
    /// actor dead.
    pub fn is_alive(&self) -> bool {
        !self.dead && self.hit_points > 0
    }
}

impl EffectTarget for Vitals {
    fn apply_instant(&mut self, effect: &Effect) {
        match *effect {
            Effect::Heal { amount } => {
                if !self.dead {
                    self.hit_points = self.hit_points.saturating_add(amount).min(self.max_hit_points);
                }
            }
            Effect::Damage { amount } => {
                self.hit_points = self.hit_points.saturating_sub(amount);
            }
            Effect::Resurrect => {
                if self.dead {
                    self.dead = false;
                    self.hit_points = self.max_hit_points.max(1);
                }
            }
            Effect::Slow { .. }
            | Effect::Haste { .. }
            | Effect::AttackBonus { .. }
            | Effect::Paralyze => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSpawn {
    pub position: Vec3,
    pub vitals: Vitals,
    pub visual: Option<VisualHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorRecord {
    pub id: ActorId,
    pub position: Vec3,
    pub visual: Option<VisualHandle>,
    pub queue: IntentQueue,
    pub ledger: EffectLedger,
    pub vitals: Vitals,
}

impl ActorRecord {
    fn apply_effect(
        &mut self,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
    ) -> EffectApplication {
        self.ledger
            .apply_effect(effect, duration_type, duration, &mut self.vitals)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    IntentDrained {
        actor: ActorId,
        intent: IntentId,
    },
    IntentPromoted {
        actor: ActorId,
        intent: IntentId,
    },
    AnimationStarted {
        actor: ActorId,
        animation: String,
    },
    FeatUsed {
        actor: ActorId,
        target: ActorId,
        feat: FeatId,
    },
    SkillUsed {
        actor: ActorId,
        target: ActorId,
        skill: SkillId,
    },
    AttackAborted {
        actor: ActorId,
        target: ActorId,
    },
    EffectApplied {
        actor: ActorId,
        effect: Effect,
        duration_type: DurationType,
    },
    EffectExpired {
        actor: ActorId,
        effect: Effect,
    },
    Combat(CombatEvent),
    ActorDied {
        actor: ActorId,
        dropped_intents: usize,
        dropped_effects: usize,
    },
}

/// Drives every actor's intent queue and effect ledger together with the
/// shared combat coordinator, one fixed step at a time.
#[derive(Debug)]
pub struct ActorWorld {
    config: WorldConfig,
    actors: BTreeMap<ActorId, ActorRecord>,
    ids: IdAllocator,
    coordinator: CombatCoordinator,
    pending_impacts: BTreeMap<ActorId, Timer>,
    events: Vec<WorldEvent>,
    last_tick_order: Vec<WorldSystemId>,
}

impl Default for ActorWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl ActorWorld {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            actors: BTreeMap::new(),
            ids: IdAllocator::default(),
            coordinator: CombatCoordinator::new(config.melee_range),
            pending_impacts: BTreeMap::new(),
            events: Vec::new(),
            last_tick_order: Vec::new(),
        }
    }

    pub fn config(&self) -> WorldConfig {
        self.config
    }

    pub fn spawn_actor(&mut self, spawn: ActorSpawn, scene: &mut dyn SceneGraph) -> ActorId {
        let id = ActorId(self.ids.allocate());
        if let Some(visual) = spawn.visual {
            scene.set_local_transform(visual, Mat4::from_translation(spawn.position));
        }
        self.actors.insert(
            id,
            ActorRecord {
                id,
                position: spawn.position,
                visual: spawn.visual,
                queue: IntentQueue::new(),
                ledger: EffectLedger::new(),
                vitals: spawn.vitals,
            },
        );
        info!(actor_id = id.0, "actor_spawned");
        id
    }

    /// Removes the actor, its rounds in either role, and its visual.
    pub fn despawn_actor(&mut self, actor: ActorId, services: &mut Services<'_>) -> bool {
        let Some(record) = self.actors.remove(&actor) else {
            return false;
        };
        self.coordinator.cancel_rounds_involving(actor, services);
        if let Some(visual) = record.visual {
            services.scene.detach_visual(visual);
        }
        self.route_combat_events();
        info!(actor_id = actor.0, "actor_despawned");
        true
    }

    pub fn actor(&self, actor: ActorId) -> Option<&ActorRecord> {
        self.actors.get(&actor)
    }

    pub fn actor_mut(&mut self, actor: ActorId) -> Option<&mut ActorRecord> {
        self.actors.get_mut(&actor)
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorRecord> {
        self.actors.values()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn coordinator(&self) -> &CombatCoordinator {
        &self.coordinator
    }

    pub fn enqueue(&mut self, actor: ActorId, intent: Intent) -> Option<IntentId> {
        self.actors
            .get_mut(&actor)
            .map(|record| record.queue.enqueue(intent))
    }

    pub fn enqueue_front(&mut self, actor: ActorId, intent: Intent) -> Option<IntentId> {
        self.actors
            .get_mut(&actor)
            .map(|record| record.queue.enqueue_front(intent))
    }

    pub fn delay(&mut self, actor: ActorId, intent: Intent, seconds: f32) -> Option<IntentId> {
        self.actors
            .get_mut(&actor)
            .map(|record| record.queue.delay(intent, seconds))
    }

    /// Drops the actor's current and queued intents and tears down its own
    /// round. Delayed intents still promote later. Nothing is notified.
    pub fn clear_intents(&mut self, actor: ActorId, services: &mut Services<'_>) -> usize {
        let Some(record) = self.actors.get_mut(&actor) else {
            return 0;
        };
        let dropped = record.queue.clear_all();
        self.coordinator.cancel_round(actor, services);
        self.route_combat_events();
        dropped
    }

    pub fn apply_effect(
        &mut self,
        actor: ActorId,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
    ) -> Option<EffectApplication> {
        let record = self.actors.get_mut(&actor)?;
        let application = record.apply_effect(effect, duration_type, duration);
        debug!(
            actor_id = actor.0,
            effect = effect.name(),
            duration_type = ?duration_type,
            "effect_applied"
        );
        self.events.push(WorldEvent::EffectApplied {
            actor,
            effect,
            duration_type,
        });
        Some(application)
    }

    /// Runs every system once in fixed order.
    pub fn tick(&mut self, dt: f32, services: &mut Services<'_>) {
        if !(dt.is_finite() && dt >= 0.0) {
            warn!(dt, "invalid_tick_delta_clamped");
        }
        let dt = sanitize_dt(dt);
        self.last_tick_order.clear();
        for system_id in WORLD_SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            self.run_system(system_id, dt, services);
        }
    }

    pub fn last_tick_order(&self) -> &[WorldSystemId] {
        &self.last_tick_order
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Time left before the attacker's projectile is resolved, if one is in
    /// flight.
    pub fn pending_impact(&self, attacker: ActorId) -> Option<f32> {
        self.pending_impacts.get(&attacker).map(Timer::remaining)
    }

    /// World position of an actor: its visual when attached, else the cached
    /// position.
    pub fn actor_position(&self, actor: ActorId, scene: &dyn SceneGraph) -> Option<Vec3> {
        let record = self.actors.get(&actor)?;
        Some(
            record
                .visual
                .and_then(|visual| scene.world_transform(visual))
                .map(|transform| transform.translation())
                .unwrap_or(record.position),
        )
    }

    fn route_combat_events(&mut self) {
        for event in self.coordinator.drain_events() {
            match event {
                CombatEvent::RoundFinished {
                    attacker,
                    intent: Some(intent),
                    ..
                }
                | CombatEvent::RoundCancelled {
                    attacker,
                    intent: Some(intent),
                    ..
                } => {
                    if let Some(record) = self.actors.get_mut(&attacker) {
                        record.queue.mark_completed(intent);
                    }
                }
                _ => {}
            }
            self.events.push(WorldEvent::Combat(event));
        }
        // Impact timers only live as long as their round.
        let coordinator = &self.coordinator;
        self.pending_impacts
            .retain(|attacker, _| coordinator.round(*attacker).is_some());
    }

    pub(crate) fn from_parts(
        config: WorldConfig,
        actors: BTreeMap<ActorId, ActorRecord>,
        next_actor_id: u64,
        coordinator: CombatCoordinator,
        pending_impacts: BTreeMap<ActorId, Timer>,
    ) -> Self {
        Self {
            config,
            actors,
            ids: IdAllocator::starting_at(next_actor_id),
            coordinator,
            pending_impacts,
            events: Vec::new(),
            last_tick_order: Vec::new(),
        }
    }

    pub(crate) fn next_actor_id(&self) -> u64 {
        self.ids.peek_next()
    }

    pub(crate) fn pending_impacts(&self) -> impl Iterator<Item = (&ActorId, &Timer)> {
        self.pending_impacts.iter()
    }
}
