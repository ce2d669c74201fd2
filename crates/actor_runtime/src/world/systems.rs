use tracing::{debug, info};

use crate::combat::{facing_for_direction, AttackStart, Combatant};
use crate::effects::{DurationType, Effect};
use crate::ids::{ActorId, FeatId, IntentId, SkillId};
use crate::intent::IntentKind;
use crate::math::{Mat4, Vec3};
use crate::services::Services;
use crate::timer::Timer;

use super::{ActorWorld, WorldEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldSystemId {
    Intents,
    Combat,
    Effects,
    Cleanup,
}

impl WorldSystemId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Intents => "Intents",
            Self::Combat => "Combat",
            Self::Effects => "Effects",
            Self::Cleanup => "Cleanup",
        }
    }
}

pub const WORLD_SYSTEM_ORDER: [WorldSystemId; 4] = [
    WorldSystemId::Intents,
    WorldSystemId::Combat,
    WorldSystemId::Effects,
    WorldSystemId::Cleanup,
];

/// What the front intent asks for once its own bookkeeping is done.
enum FrontAction {
    Running,
    Completed,
    Move(Vec3),
    Attack(ActorId),
    Feat(ActorId, FeatId),
    Skill(ActorId, SkillId),
    ApplyEffect {
        target: ActorId,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
    },
}

impl ActorWorld {
    pub(super) fn run_system(
        &mut self,
        system_id: WorldSystemId,
        dt: f32,
        services: &mut Services<'_>,
    ) {
        match system_id {
            WorldSystemId::Intents => self.run_intents(dt, services),
            WorldSystemId::Combat => self.run_combat(dt, services),
            WorldSystemId::Effects => self.run_effects(dt),
            WorldSystemId::Cleanup => self.run_cleanup(services),
        }
    }

    fn run_intents(&mut self, dt: f32, services: &mut Services<'_>) {
        let actor_ids = self.actors.keys().copied().collect::<Vec<_>>();
        for actor in actor_ids {
            let Some(record) = self.actors.get_mut(&actor) else {
                continue;
            };
            if record.vitals.dead {
                continue;
            }
            let report = record.queue.tick(dt);
            let front = record.queue.current().map(|queued| queued.id);
            let paralyzed = record.ledger.is_paralyzed();
            for intent in &report.drained {
                self.events.push(WorldEvent::IntentDrained {
                    actor,
                    intent: *intent,
                });
            }
            for intent in &report.promoted {
                self.events.push(WorldEvent::IntentPromoted {
                    actor,
                    intent: *intent,
                });
            }

            // A freshly promoted front starts on the next tick.
            let Some(front) = front else {
                continue;
            };
            if paralyzed || report.promoted.contains(&front) {
                continue;
            }
            self.run_front_intent(actor, front, dt, services);
        }
    }

    fn run_front_intent(
        &mut self,
        actor: ActorId,
        intent_id: IntentId,
        dt: f32,
        services: &mut Services<'_>,
    ) {
        let Some(action) = self.prepare_front(actor, dt) else {
            return;
        };
        let completed = match action {
            FrontAction::Running => false,
            FrontAction::Completed => true,
            FrontAction::Move(point) => self.step_move(actor, point, dt, services),
            FrontAction::Attack(target) => self.start_attack(actor, intent_id, target, services),
            FrontAction::Feat(target, feat) => {
                self.events
                    .push(WorldEvent::FeatUsed { actor, target, feat });
                true
            }
            FrontAction::Skill(target, skill) => {
                self.events
                    .push(WorldEvent::SkillUsed { actor, target, skill });
                true
            }
            FrontAction::ApplyEffect {
                target,
                effect,
                duration_type,
                duration,
            } => {
                if self
                    .apply_effect(target, effect, duration_type, duration)
                    .is_none()
                {
                    debug!(actor_id = actor.0, target_id = target.0, "effect_target_missing");
                }
                true
            }
        };
        if completed {
            if let Some(record) = self.actors.get_mut(&actor) {
                record.queue.mark_completed(intent_id);
            }
        }
    }

    // Advances per-intent state in place and reports what is left to do
    // against the rest of the world.
    fn prepare_front(&mut self, actor: ActorId, dt: f32) -> Option<FrontAction> {
        let front = self.actors.get_mut(&actor)?.queue.current_mut()?;
        let action = match front.intent.kind_mut() {
            IntentKind::MoveToPoint { point } => FrontAction::Move(*point),
            IntentKind::PlayAnimation {
                animation,
                timer,
                started,
            } => {
                if !*started {
                    *started = true;
                    self.events.push(WorldEvent::AnimationStarted {
                        actor,
                        animation: animation.clone(),
                    });
                }
                advance_timed(timer, dt)
            }
            IntentKind::Wait { timer } => advance_timed(timer, dt),
            IntentKind::UseFeat { target, feat } => FrontAction::Feat(*target, *feat),
            IntentKind::UseSkill { target, skill } => FrontAction::Skill(*target, *skill),
            IntentKind::AttackObject { started: true, .. } => FrontAction::Running,
            IntentKind::AttackObject { target, started } => {
                *started = true;
                FrontAction::Attack(*target)
            }
            IntentKind::ApplyEffect {
                target,
                effect,
                duration_type,
                duration,
            } => FrontAction::ApplyEffect {
                target: *target,
                effect: *effect,
                duration_type: *duration_type,
                duration: *duration,
            },
        };
        Some(action)
    }

    // Returns true on arrival.
    fn step_move(
        &mut self,
        actor: ActorId,
        point: Vec3,
        dt: f32,
        services: &mut Services<'_>,
    ) -> bool {
        let Some(position) = self.actor_position(actor, &*services.scene) else {
            return true;
        };
        let arrival_threshold = self.config.arrival_threshold;
        let Some(record) = self.actors.get_mut(&actor) else {
            return true;
        };
        let to_point = point - position;
        let distance = to_point.length();
        if distance <= arrival_threshold {
            return true;
        }

        let speed = record.vitals.move_speed.max(0.0) * record.ledger.movement_multiplier().max(0.0);
        let direction = to_point.normalize_or_zero();
        let next = if speed * dt >= distance {
            point
        } else {
            position + direction * (speed * dt)
        };
        record.position = next;
        if let Some(visual) = record.visual {
            services.scene.set_local_transform(
                visual,
                Mat4::from_translation(next) * Mat4::from_rotation_z(facing_for_direction(direction)),
            );
        }
        next.distance(point) <= arrival_threshold
    }

    // Returns true when the attack intent has nothing left to wait for.
    fn start_attack(
        &mut self,
        actor: ActorId,
        intent: IntentId,
        target: ActorId,
        services: &mut Services<'_>,
    ) -> bool {
        let target_visual = match self.actors.get(&target) {
            Some(record) if record.vitals.is_alive() => record.visual,
            _ => {
                debug!(actor_id = actor.0, target_id = target.0, "attack_target_unavailable");
                self.events.push(WorldEvent::AttackAborted { actor, target });
                return true;
            }
        };
        let attacker_visual = self.actors.get(&actor).and_then(|record| record.visual);
        let start = self.coordinator.begin_attack(
            Combatant {
                actor,
                visual: attacker_visual,
            },
            Combatant {
                actor: target,
                visual: target_visual,
            },
            Some(intent),
            services,
        );
        if start == AttackStart::Ranged {
            self.pending_impacts
                .insert(actor, Timer::new(self.config.impact_delay_seconds));
        }
        // Melee and out-of-range starts already queued their round-end event;
        // routing it in the combat step completes the intent.
        false
    }

    fn run_combat(&mut self, dt: f32, services: &mut Services<'_>) {
        self.coordinator.tick(dt, services);

        let mut due = Vec::new();
        for (attacker, timer) in self.pending_impacts.iter_mut() {
            timer.advance(dt);
            if timer.is_expired() {
                due.push(*attacker);
            }
        }
        for attacker in due {
            self.pending_impacts.remove(&attacker);
            self.coordinator.resolve_impact(attacker, services);
        }

        self.route_combat_events();
    }

    fn run_effects(&mut self, dt: f32) {
        for record in self.actors.values_mut() {
            for effect in record.ledger.tick(dt) {
                debug!(actor_id = record.id.0, effect = effect.name(), "effect_expired");
                self.events.push(WorldEvent::EffectExpired {
                    actor: record.id,
                    effect,
                });
            }
        }
    }

    fn run_cleanup(&mut self, services: &mut Services<'_>) {
        let newly_dead = self
            .actors
            .values()
            .filter(|record| !record.vitals.dead && record.vitals.hit_points == 0)
            .map(|record| record.id)
            .collect::<Vec<_>>();
        for actor in newly_dead {
            let Some(record) = self.actors.get_mut(&actor) else {
                continue;
            };
            record.vitals.dead = true;
            let dropped_intents = record.queue.clear_all() + record.queue.clear_delayed();
            let dropped_effects = record.ledger.clear_all();
            self.coordinator.cancel_rounds_involving(actor, services);
            info!(
                actor_id = actor.0,
                dropped_intents, dropped_effects, "actor_died"
            );
            self.events.push(WorldEvent::ActorDied {
                actor,
                dropped_intents,
                dropped_effects,
            });
        }
        self.route_combat_events();
    }
}

fn advance_timed(timer: &mut Timer, dt: f32) -> FrontAction {
    timer.advance(dt);
    if timer.is_expired() {
        FrontAction::Completed
    } else {
        FrontAction::Running
    }
}
