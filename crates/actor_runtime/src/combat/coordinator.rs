use std::collections::BTreeMap;

use tracing::debug;

use crate::ids::{ActorId, IntentId};
use crate::math::Vec3;
use crate::services::Services;
use crate::timer::sanitize_dt;

use super::round::{CombatRound, Combatant, FireOutcome};

pub const DEFAULT_MELEE_RANGE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStart {
    Ranged,
    Melee,
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    ProjectileFired {
        attacker: ActorId,
        target: ActorId,
        origin: Vec3,
    },
    MeleeExchange {
        attacker: ActorId,
        target: ActorId,
    },
    AttackOutOfRange {
        attacker: ActorId,
        target: ActorId,
    },
    ProjectileImpact {
        attacker: ActorId,
        target: ActorId,
        position: Vec3,
    },
    RoundFinished {
        attacker: ActorId,
        target: ActorId,
        intent: Option<IntentId>,
    },
    RoundCancelled {
        attacker: ActorId,
        target: ActorId,
        intent: Option<IntentId>,
    },
}

/// Owns every live combat round, keyed by attacker, and is the only code that
/// attaches or detaches projectile visuals.
#[derive(Debug)]
pub struct CombatCoordinator {
    rounds: BTreeMap<ActorId, CombatRound>,
    events: Vec<CombatEvent>,
    melee_range: f32,
}

impl Default for CombatCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MELEE_RANGE)
    }
}

impl CombatCoordinator {
    pub fn new(melee_range: f32) -> Self {
        Self {
            rounds: BTreeMap::new(),
            events: Vec::new(),
            melee_range: melee_range.max(0.0),
        }
    }

    /// Starts an exchange. A ranged round stays live until `resolve_impact` or
    /// a cancel; the melee path resolves immediately and keeps no round.
    pub fn begin_attack(
        &mut self,
        attacker: Combatant,
        target: Combatant,
        intent: Option<IntentId>,
        services: &mut Services<'_>,
    ) -> AttackStart {
        if let Some(mut previous) = self.rounds.remove(&attacker.actor) {
            previous.reset(&mut *services.scene);
            self.events.push(CombatEvent::RoundCancelled {
                attacker: previous.attacker,
                target: previous.target,
                intent: previous.intent,
            });
        }

        let mut round = CombatRound::new(attacker.actor, target.actor, intent);
        let outcome = round.fire(attacker, target, services);
        if outcome == FireOutcome::Fired {
            let origin = round
                .projectile()
                .map(|projectile| projectile.position)
                .unwrap_or_default();
            debug!(
                attacker = attacker.actor.0,
                target = target.actor.0,
                "projectile_fired"
            );
            self.events.push(CombatEvent::ProjectileFired {
                attacker: attacker.actor,
                target: target.actor,
                origin,
            });
            self.rounds.insert(attacker.actor, round);
            return AttackStart::Ranged;
        }

        debug!(
            attacker = attacker.actor.0,
            target = target.actor.0,
            reason = ?outcome,
            "ranged_path_aborted"
        );
        if !self.within_melee_range(attacker, target, services) {
            self.events.push(CombatEvent::AttackOutOfRange {
                attacker: attacker.actor,
                target: target.actor,
            });
            self.events.push(CombatEvent::RoundCancelled {
                attacker: attacker.actor,
                target: target.actor,
                intent,
            });
            return AttackStart::OutOfRange;
        }
        self.events.push(CombatEvent::MeleeExchange {
            attacker: attacker.actor,
            target: target.actor,
        });
        self.events.push(CombatEvent::RoundFinished {
            attacker: attacker.actor,
            target: target.actor,
            intent,
        });
        AttackStart::Melee
    }

    pub fn tick(&mut self, dt: f32, services: &mut Services<'_>) {
        let dt = sanitize_dt(dt);
        for round in self.rounds.values_mut() {
            round.update(dt, &mut *services.scene);
        }
    }

    /// Ends the attacker's ranged exchange at its current projectile position.
    /// Returns false, and does nothing, when the attacker has no live round.
    pub fn resolve_impact(&mut self, attacker: ActorId, services: &mut Services<'_>) -> bool {
        let Some(mut round) = self.rounds.remove(&attacker) else {
            return false;
        };
        let impact = round
            .projectile()
            .map(|projectile| (projectile.position, projectile.impact_sound.clone()));
        round.reset(&mut *services.scene);

        if let Some((position, impact_sound)) = impact {
            if let Some(sound) = impact_sound {
                services.audio.play_sound_at(&sound, position);
            }
            self.events.push(CombatEvent::ProjectileImpact {
                attacker: round.attacker,
                target: round.target,
                position,
            });
        }
        debug!(
            attacker = round.attacker.0,
            target = round.target.0,
            "round_finished"
        );
        self.events.push(CombatEvent::RoundFinished {
            attacker: round.attacker,
            target: round.target,
            intent: round.intent,
        });
        true
    }

    /// Tears down the attacker's round without resolving it (death, lost
    /// range, area change).
    pub fn cancel_round(&mut self, attacker: ActorId, services: &mut Services<'_>) -> bool {
        let Some(mut round) = self.rounds.remove(&attacker) else {
            return false;
        };
        round.reset(&mut *services.scene);
        debug!(
            attacker = round.attacker.0,
            target = round.target.0,
            "round_cancelled"
        );
        self.events.push(CombatEvent::RoundCancelled {
            attacker: round.attacker,
            target: round.target,
            intent: round.intent,
        });
        true
    }

    /// Cancels every round where `actor` is the attacker or the target.
    pub fn cancel_rounds_involving(&mut self, actor: ActorId, services: &mut Services<'_>) -> usize {
        let attackers = self
            .rounds
            .values()
            .filter(|round| round.attacker == actor || round.target == actor)
            .map(|round| round.attacker)
            .collect::<Vec<_>>();
        let mut cancelled = 0;
        for attacker in attackers {
            if self.cancel_round(attacker, services) {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Detaches every projectile and forgets all rounds without events.
    pub fn clear(&mut self, services: &mut Services<'_>) {
        for round in self.rounds.values_mut() {
            round.reset(&mut *services.scene);
        }
        self.rounds.clear();
        self.events.clear();
    }

    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn round(&self, attacker: ActorId) -> Option<&CombatRound> {
        self.rounds.get(&attacker)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &CombatRound> {
        self.rounds.values()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn melee_range(&self) -> f32 {
        self.melee_range
    }

    pub(crate) fn insert_restored(&mut self, round: CombatRound) {
        self.rounds.insert(round.attacker, round);
    }

    // Unknown positions count as in range.
    fn within_melee_range(
        &self,
        attacker: Combatant,
        target: Combatant,
        services: &Services<'_>,
    ) -> bool {
        let position_of = |combatant: Combatant| {
            combatant
                .visual
                .and_then(|visual| services.scene.world_transform(visual))
                .map(|transform| transform.translation())
        };
        match (position_of(attacker), position_of(target)) {
            (Some(from), Some(to)) => from.distance(to) <= self.melee_range,
            _ => true,
        }
    }
}
