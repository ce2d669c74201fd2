use std::collections::BTreeMap;

use actor_runtime::{
    ActorId, ActorSpawn, ActorWorld, CombatEvent, DurationType, Effect, FeatId, Intent, SceneArena,
    Services, SkillId, Vec3, Vitals, WorldConfig, WorldEvent,
};
use tracing::{debug, info};

use crate::content::Armory;

use super::audio::LoggingAudio;
use super::roster::{Roster, RosterEntry};
use super::save::{SaveError, SaveGame, SavedRosterEntry, SAVE_VERSION};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub ticks: u64,
    pub projectiles_fired: u64,
    pub impacts: u64,
    pub melee_exchanges: u64,
    pub cancelled_rounds: u64,
    pub deaths: u64,
    pub sounds: u64,
}

/// The headless host: scene, equipment and audio collaborators around one
/// `ActorWorld`, plus the combat resolution that turns hits into damage.
#[derive(Debug)]
pub struct Simulation {
    scene: SceneArena,
    roster: Roster,
    audio: LoggingAudio,
    world: ActorWorld,
    stats: SimStats,
}

struct DemoActor {
    entry: RosterEntry,
    position: Vec3,
    vitals: Vitals,
}

impl Simulation {
    pub fn new(armory: Armory, config: WorldConfig) -> Self {
        Self {
            scene: SceneArena::new(),
            roster: Roster::new(armory),
            audio: LoggingAudio::default(),
            world: ActorWorld::new(config),
            stats: SimStats::default(),
        }
    }

    /// A trooper with a blaster, a droid that closes in, and a brute with a
    /// vibroblade that charges the trooper.
    pub fn demo(armory: Armory, config: WorldConfig) -> Self {
        let mut sim = Self::new(armory, config);
        let trooper = sim.spawn(DemoActor {
            entry: entry("trooper", "c_trooper", Some("blaster_pistol")),
            position: Vec3::ZERO,
            vitals: Vitals::new(20, 3.0),
        });
        let droid = sim.spawn(DemoActor {
            entry: entry("droid", "c_droid_war", None),
            position: Vec3::new(12.0, 4.0, 0.0),
            vitals: Vitals::new(12, 2.0),
        });
        let brute = sim.spawn(DemoActor {
            entry: entry("brute", "c_gamorrean", Some("vibroblade")),
            position: Vec3::new(-8.0, 0.0, 0.0),
            vitals: Vitals::new(16, 2.5),
        });

        let world = &mut sim.world;
        world.enqueue(trooper, Intent::play_animation("draw_weapon", 0.5));
        world.enqueue(trooper, Intent::attack(droid).issued_by_user());
        world.enqueue(trooper, Intent::attack(droid).issued_by_user());
        world.enqueue(trooper, Intent::use_feat(trooper, FeatId(8)));
        world.delay(trooper, Intent::attack(brute), 3.0);

        world.enqueue(droid, Intent::move_to_point(Vec3::new(6.0, 1.0, 0.0)));
        world.enqueue(
            droid,
            Intent::apply_effect(trooper, Effect::Slow { multiplier: 0.5 }, DurationType::Temporary, 2.0),
        );
        world.enqueue(droid, Intent::use_skill(droid, SkillId(2)));
        world.enqueue(droid, Intent::attack(trooper));

        world.apply_effect(brute, Effect::Haste { multiplier: 1.5 }, DurationType::Permanent, 0.0);
        world.enqueue(brute, Intent::wait(1.0));
        world.enqueue(brute, Intent::move_to_point(Vec3::new(-1.0, 0.0, 0.0)));
        world.enqueue(brute, Intent::attack(trooper));
        world.enqueue(brute, Intent::attack(trooper));

        info!(actors = sim.world.len(), "demo_scenario_ready");
        sim
    }

    fn spawn(&mut self, actor: DemoActor) -> ActorId {
        let visual = self.roster.attach_visuals(&actor.entry, &mut self.scene);
        let id = self.world.spawn_actor(
            ActorSpawn {
                position: actor.position,
                vitals: actor.vitals,
                visual: Some(visual),
            },
            &mut self.scene,
        );
        self.roster.register(id, actor.entry);
        id
    }

    pub fn tick(&mut self, dt: f32) {
        {
            let mut services = Services::new(&mut self.scene, &self.roster, &mut self.audio);
            self.world.tick(dt, &mut services);
        }
        self.stats.ticks = self.stats.ticks.saturating_add(1);
        for event in self.world.drain_events() {
            self.handle_event(event);
        }
    }

    // Stands in for the combat-resolution collaborator: every landed hit
    // deals the attacker's weapon damage.
    fn handle_event(&mut self, event: WorldEvent) {
        match event {
            WorldEvent::Combat(CombatEvent::ProjectileFired { attacker, target, .. }) => {
                self.stats.projectiles_fired += 1;
                debug!(
                    attacker = self.roster.name_of(attacker),
                    target = self.roster.name_of(target),
                    "projectile_fired"
                );
            }
            WorldEvent::Combat(CombatEvent::ProjectileImpact { attacker, target, .. }) => {
                self.stats.impacts += 1;
                self.land_hit(attacker, target);
            }
            WorldEvent::Combat(CombatEvent::MeleeExchange { attacker, target }) => {
                self.stats.melee_exchanges += 1;
                self.land_hit(attacker, target);
            }
            WorldEvent::Combat(CombatEvent::RoundCancelled { attacker, target, .. }) => {
                self.stats.cancelled_rounds += 1;
                debug!(
                    attacker = self.roster.name_of(attacker),
                    target = self.roster.name_of(target),
                    "round_cancelled"
                );
            }
            WorldEvent::ActorDied { actor, .. } => {
                self.stats.deaths += 1;
                info!(actor = self.roster.name_of(actor), "actor_died");
            }
            other => debug!(event = ?other, "world_event"),
        }
    }

    fn land_hit(&mut self, attacker: ActorId, target: ActorId) {
        let damage = self.roster.damage_for(attacker);
        self.world
            .apply_effect(target, Effect::Damage { amount: damage }, DurationType::Instant, 0.0);
        info!(
            attacker = self.roster.name_of(attacker),
            target = self.roster.name_of(target),
            damage,
            "hit_landed"
        );
    }

    pub fn world(&self) -> &ActorWorld {
        &self.world
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            sounds: self.audio.played(),
            ..self.stats
        }
    }

    /// True once nobody has anything left to do and no projectile is in the
    /// air.
    pub fn is_settled(&self) -> bool {
        self.world.coordinator().is_empty()
            && self.world.actors().all(|record| record.queue.is_idle())
    }

    pub fn to_save(&self) -> SaveGame {
        SaveGame {
            save_version: SAVE_VERSION,
            tick: self.stats.ticks,
            roster: self
                .roster
                .entries()
                .map(|(actor, entry)| SavedRosterEntry {
                    actor: *actor,
                    entry: entry.clone(),
                })
                .collect(),
            world: self.world.snapshot(),
        }
    }

    pub fn from_save(armory: Armory, config: WorldConfig, save: SaveGame) -> Result<Self, SaveError> {
        super::save::validate_save(&save)?;
        let mut scene = SceneArena::new();
        let mut roster = Roster::new(armory);
        let mut visuals = BTreeMap::new();
        for saved in save.roster {
            visuals.insert(saved.actor, roster.attach_visuals(&saved.entry, &mut scene));
            roster.register(saved.actor, saved.entry);
        }
        let world = ActorWorld::restore(save.world, config, &visuals, &mut scene)?;
        info!(tick = save.tick, actors = world.len(), "save_restored");
        Ok(Self {
            scene,
            roster,
            audio: LoggingAudio::default(),
            world,
            stats: SimStats {
                ticks: save.tick,
                ..SimStats::default()
            },
        })
    }
}

fn entry(name: &str, model: &str, weapon: Option<&str>) -> RosterEntry {
    RosterEntry {
        name: name.to_string(),
        model: model.to_string(),
        weapon: weapon.map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::app::save::{read_save, write_save};
    use crate::content::{parse_armory, DEFAULT_ARMORY_XML};

    const DT: f32 = 1.0 / 60.0;

    fn armory() -> Armory {
        parse_armory(Path::new("builtin"), DEFAULT_ARMORY_XML).expect("armory")
    }

    fn run_ticks(sim: &mut Simulation, ticks: u32) {
        for _ in 0..ticks {
            sim.tick(DT);
        }
    }

    #[test]
    fn demo_exchanges_fire_and_blows() {
        let mut sim = Simulation::demo(armory(), WorldConfig::default());

        run_ticks(&mut sim, 60 * 12);

        let stats = sim.stats();
        assert!(stats.projectiles_fired >= 2, "{stats:?}");
        assert!(stats.impacts >= 2, "{stats:?}");
        assert!(stats.melee_exchanges >= 1, "{stats:?}");
        assert!(stats.sounds >= 4, "{stats:?}");
    }

    #[test]
    fn demo_eventually_settles() {
        let mut sim = Simulation::demo(armory(), WorldConfig::default());

        run_ticks(&mut sim, 60 * 30);

        assert!(sim.is_settled());
    }

    #[test]
    fn save_round_trip_through_disk_continues_the_run() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("saves").join("actor_sim.json");
        let mut sim = Simulation::demo(armory(), WorldConfig::default());
        run_ticks(&mut sim, 45);

        let save = sim.to_save();
        write_save(&path, &save).expect("write save");
        let loaded = read_save(&path).expect("read save");
        assert_eq!(loaded, save);

        let mut restored =
            Simulation::from_save(armory(), WorldConfig::default(), loaded).expect("restore");
        assert_eq!(restored.world().snapshot(), sim.world().snapshot());

        sim.tick(DT);
        restored.tick(DT);
        assert_eq!(restored.world().snapshot(), sim.world().snapshot());
        assert_eq!(restored.stats().ticks, sim.stats().ticks);
    }
}
