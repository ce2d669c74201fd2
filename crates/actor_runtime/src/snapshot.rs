//! Serializable form of an [`ActorWorld`].
//!
//! Visuals are not part of a snapshot. The host re-creates actor visuals and
//! hands their handles to [`ActorWorld::restore`]; projectile visuals are
//! re-attached from the saved model and flight state.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::combat::{
    flight_transform, CombatCoordinator, CombatRound, Projectile, RoundPhase, MODEL_EVENT_DETONATE,
};
use crate::effects::{AppliedEffect, DurationType, EffectLedger};
use crate::ids::{ActorId, IntentId, ItemRef, ModelRef, SoundRef, VisualHandle};
use crate::intent::IntentKind;
use crate::intent_queue::{DelayedIntent, IntentQueue, QueuedIntent};
use crate::math::{Mat4, Vec3};
use crate::scene::{ModelUsage, SceneGraph};
use crate::timer::Timer;
use crate::world::{ActorRecord, ActorWorld, Vitals, WorldConfig};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub snapshot_version: u32,
    pub next_actor_id: u64,
    pub actors: Vec<ActorSnapshot>,
    pub rounds: Vec<RoundSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub actor: ActorId,
    pub position: Vec3,
    pub vitals: Vitals,
    pub next_intent_id: u64,
    pub active_intents: Vec<QueuedIntent>,
    pub delayed_intents: Vec<DelayedIntent>,
    pub effects: Vec<AppliedEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub attacker: ActorId,
    pub target: ActorId,
    pub intent: Option<IntentId>,
    pub weapon: Option<ItemRef>,
    pub projectile: Option<ProjectileSnapshot>,
    pub impact_timer: Option<Timer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub model: ModelRef,
    pub position: Vec3,
    pub direction: Vec3,
    pub impact_sound: Option<SoundRef>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("validation failed at snapshot_version: expected {expected}, got {found}")]
    UnsupportedVersion { expected: u32, found: u32 },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> SnapshotError {
    SnapshotError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(
    path: impl Into<String>,
    expected: impl Display,
    actual: impl Display,
) -> SnapshotError {
    invalid(path, format!("expected {expected}, got {actual}"))
}

fn check_finite_vec(path: &str, value: Vec3) -> Result<(), SnapshotError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(path, "finite vector", format!("{value:?}")))
    }
}

fn check_non_negative(path: &str, value: f32) -> Result<(), SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(expected_actual(path, "finite non-negative number", value))
    }
}

fn check_timer(path: &str, timer: &Timer) -> Result<(), SnapshotError> {
    check_non_negative(&format!("{path}.duration"), timer.duration())?;
    check_non_negative(&format!("{path}.elapsed"), timer.elapsed())
}

fn check_intent_kind(path: &str, kind: &IntentKind) -> Result<(), SnapshotError> {
    match kind {
        IntentKind::MoveToPoint { point } => check_finite_vec(&format!("{path}.point"), *point),
        IntentKind::PlayAnimation { timer, .. } | IntentKind::Wait { timer } => {
            check_timer(&format!("{path}.timer"), timer)
        }
        IntentKind::ApplyEffect { duration, .. } => {
            check_non_negative(&format!("{path}.duration"), *duration)
        }
        IntentKind::UseFeat { .. } | IntentKind::UseSkill { .. } | IntentKind::AttackObject { .. } => {
            Ok(())
        }
    }
}

impl ActorWorld {
    pub fn snapshot(&self) -> WorldSnapshot {
        let actors = self
            .actors()
            .map(|record| ActorSnapshot {
                actor: record.id,
                position: record.position,
                vitals: record.vitals,
                next_intent_id: record.queue.next_id(),
                active_intents: record.queue.iter().cloned().collect(),
                delayed_intents: record.queue.delayed().cloned().collect(),
                effects: record.ledger.iter().copied().collect(),
            })
            .collect();
        let impact_timers = self
            .pending_impacts()
            .map(|(attacker, timer)| (*attacker, *timer))
            .collect::<BTreeMap<_, _>>();
        let rounds = self
            .coordinator()
            .rounds()
            .map(|round| RoundSnapshot {
                attacker: round.attacker(),
                target: round.target(),
                intent: round.intent(),
                weapon: round.weapon(),
                projectile: round.projectile().map(|projectile| ProjectileSnapshot {
                    model: projectile.model.clone(),
                    position: projectile.position,
                    direction: projectile.direction,
                    impact_sound: projectile.impact_sound.clone(),
                }),
                impact_timer: impact_timers.get(&round.attacker()).copied(),
            })
            .collect();
        WorldSnapshot {
            snapshot_version: SNAPSHOT_VERSION,
            next_actor_id: self.next_actor_id(),
            actors,
            rounds,
        }
    }

    /// Rebuilds a world from a validated snapshot. Nothing is attached to the
    /// scene unless validation passes.
    pub fn restore(
        snapshot: WorldSnapshot,
        config: WorldConfig,
        visuals: &BTreeMap<ActorId, VisualHandle>,
        scene: &mut dyn SceneGraph,
    ) -> Result<Self, SnapshotError> {
        validate_snapshot(&snapshot)?;

        let mut actors = BTreeMap::new();
        for saved in snapshot.actors {
            let visual = visuals.get(&saved.actor).copied();
            if let Some(visual) = visual {
                scene.set_local_transform(visual, Mat4::from_translation(saved.position));
            }
            actors.insert(
                saved.actor,
                ActorRecord {
                    id: saved.actor,
                    position: saved.position,
                    visual,
                    queue: IntentQueue::restore(
                        saved.active_intents,
                        saved.delayed_intents,
                        saved.next_intent_id,
                    ),
                    ledger: EffectLedger::restore(saved.effects),
                    vitals: saved.vitals,
                },
            );
        }

        let mut coordinator = CombatCoordinator::new(config.melee_range);
        let mut pending_impacts = BTreeMap::new();
        for saved in snapshot.rounds {
            let projectile = saved.projectile.map(|flight| {
                let visual = scene.attach_visual(&flight.model, ModelUsage::Projectile);
                scene.signal_event(visual, MODEL_EVENT_DETONATE);
                scene.set_local_transform(visual, flight_transform(flight.position, flight.direction));
                Projectile {
                    visual,
                    model: flight.model,
                    position: flight.position,
                    direction: flight.direction,
                    impact_sound: flight.impact_sound,
                }
            });
            if let Some(timer) = saved.impact_timer {
                pending_impacts.insert(
                    saved.attacker,
                    Timer::restore(timer.duration(), timer.elapsed()),
                );
            }
            coordinator.insert_restored(CombatRound {
                attacker: saved.attacker,
                target: saved.target,
                intent: saved.intent,
                phase: if projectile.is_some() {
                    RoundPhase::ProjectileInFlight
                } else {
                    RoundPhase::Idle
                },
                projectile,
                weapon: saved.weapon,
            });
        }

        info!(
            actors = actors.len(),
            rounds = coordinator.len(),
            "world_restored"
        );
        Ok(Self::from_parts(
            config,
            actors,
            snapshot.next_actor_id,
            coordinator,
            pending_impacts,
        ))
    }
}

pub fn validate_snapshot(snapshot: &WorldSnapshot) -> Result<(), SnapshotError> {
    if snapshot.snapshot_version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            expected: SNAPSHOT_VERSION,
            found: snapshot.snapshot_version,
        });
    }

    let mut known_actors = HashSet::with_capacity(snapshot.actors.len());
    for (index, actor) in snapshot.actors.iter().enumerate() {
        let base = format!("actors[{index}]");
        if !known_actors.insert(actor.actor) {
            return Err(invalid(
                format!("{base}.actor"),
                format!("duplicate actor id {}", actor.actor.0),
            ));
        }
        if actor.actor.0 >= snapshot.next_actor_id {
            return Err(expected_actual(
                format!("{base}.actor"),
                format!("id below next_actor_id {}", snapshot.next_actor_id),
                actor.actor.0,
            ));
        }
        check_finite_vec(&format!("{base}.position"), actor.position)?;
        check_non_negative(&format!("{base}.vitals.move_speed"), actor.vitals.move_speed)?;
        if actor.vitals.hit_points > actor.vitals.max_hit_points {
            return Err(expected_actual(
                format!("{base}.vitals.hit_points"),
                format!("at most {}", actor.vitals.max_hit_points),
                actor.vitals.hit_points,
            ));
        }

        let mut intent_ids = HashSet::new();
        let active = actor
            .active_intents
            .iter()
            .enumerate()
            .map(|(i, queued)| (format!("{base}.active_intents[{i}]"), queued.id, &queued.intent));
        let delayed = actor
            .delayed_intents
            .iter()
            .enumerate()
            .map(|(i, delayed)| (format!("{base}.delayed_intents[{i}]"), delayed.id, &delayed.intent));
        for (path, id, intent) in active.chain(delayed) {
            if !intent_ids.insert(id) {
                return Err(invalid(format!("{path}.id"), format!("duplicate intent id {}", id.0)));
            }
            if id.0 >= actor.next_intent_id {
                return Err(expected_actual(
                    format!("{path}.id"),
                    format!("id below next_intent_id {}", actor.next_intent_id),
                    id.0,
                ));
            }
            check_intent_kind(&format!("{path}.intent.kind"), intent.kind())?;
        }
        for (i, delayed) in actor.delayed_intents.iter().enumerate() {
            check_timer(&format!("{base}.delayed_intents[{i}].timer"), &delayed.timer)?;
        }

        for (i, applied) in actor.effects.iter().enumerate() {
            let path = format!("{base}.effects[{i}]");
            if applied.duration_type == DurationType::Instant {
                return Err(invalid(
                    format!("{path}.duration_type"),
                    "instant effects are never stored",
                ));
            }
            check_non_negative(&format!("{path}.duration"), applied.duration)?;
            check_non_negative(&format!("{path}.elapsed"), applied.elapsed)?;
        }
    }

    let mut attackers = HashSet::with_capacity(snapshot.rounds.len());
    for (index, round) in snapshot.rounds.iter().enumerate() {
        let base = format!("rounds[{index}]");
        if !attackers.insert(round.attacker) {
            return Err(invalid(
                format!("{base}.attacker"),
                format!("second round for attacker {}", round.attacker.0),
            ));
        }
        for (field, actor) in [("attacker", round.attacker), ("target", round.target)] {
            if !known_actors.contains(&actor) {
                return Err(invalid(
                    format!("{base}.{field}"),
                    format!("unknown actor id {}", actor.0),
                ));
            }
        }
        if let Some(projectile) = &round.projectile {
            check_finite_vec(&format!("{base}.projectile.position"), projectile.position)?;
            check_finite_vec(&format!("{base}.projectile.direction"), projectile.direction)?;
        }
        if let Some(timer) = &round.impact_timer {
            check_timer(&format!("{base}.impact_timer"), timer)?;
        }
    }
    Ok(())
}
