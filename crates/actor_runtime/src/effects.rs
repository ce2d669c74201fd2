use serde::{Deserialize, Serialize};

use crate::timer::{sanitize_duration, sanitize_dt};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Heal { amount: u32 },
    Damage { amount: u32 },
    Resurrect,
    Slow { multiplier: f32 },
    Haste { multiplier: f32 },
    AttackBonus { amount: i32 },
    Paralyze,
}

impl Effect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Heal { .. } => "heal",
            Self::Damage { .. } => "damage",
            Self::Resurrect => "resurrect",
            Self::Slow { .. } => "slow",
            Self::Haste { .. } => "haste",
            Self::AttackBonus { .. } => "attack_bonus",
            Self::Paralyze => "paralyze",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationType {
    #[default]
    Instant,
    Temporary,
    Permanent,
}

/// Receiver of one-shot effect mutations.
pub trait EffectTarget {
    fn apply_instant(&mut self, effect: &Effect);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedEffect {
    pub effect: Effect,
    pub duration_type: DurationType,
    pub duration: f32,
    pub elapsed: f32,
}

impl AppliedEffect {
    pub fn remaining(&self) -> Option<f32> {
        match self.duration_type {
            DurationType::Temporary => Some((self.duration - self.elapsed).max(0.0)),
            DurationType::Instant | DurationType::Permanent => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectApplication {
    AppliedInstantly,
    Stored,
}

/// Time-indexed bag of effects applied to one actor.
///
/// Effects are kept in arrival order. Stacking and overwrite rules are not
/// resolved here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectLedger {
    effects: Vec<AppliedEffect>,
}

impl EffectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_effect(
        &mut self,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
        target: &mut dyn EffectTarget,
    ) -> EffectApplication {
        if duration_type == DurationType::Instant {
            target.apply_instant(&effect);
            return EffectApplication::AppliedInstantly;
        }
        self.effects.push(AppliedEffect {
            effect,
            duration_type,
            duration: sanitize_duration(duration),
            elapsed: 0.0,
        });
        EffectApplication::Stored
    }

    /// Advances temporary effects and returns the ones that expired this
    /// tick, in arrival order.
    pub fn tick(&mut self, dt: f32) -> Vec<Effect> {
        let dt = sanitize_dt(dt);
        let mut expired = Vec::new();
        self.effects.retain_mut(|applied| {
            if applied.duration_type != DurationType::Temporary {
                return true;
            }
            applied.elapsed += dt;
            if applied.elapsed >= applied.duration {
                expired.push(applied.effect);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Drops every stored effect. Instant mutations already applied stay.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.effects.len();
        self.effects.clear();
        removed
    }

    pub(crate) fn restore(effects: Vec<AppliedEffect>) -> Self {
        Self { effects }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppliedEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn movement_multiplier(&self) -> f32 {
        self.effects
            .iter()
            .map(|applied| match applied.effect {
                Effect::Slow { multiplier } | Effect::Haste { multiplier } => multiplier,
                _ => 1.0,
            })
            .product()
    }

    pub fn is_paralyzed(&self) -> bool {
        self.effects
            .iter()
            .any(|applied| matches!(applied.effect, Effect::Paralyze))
    }

    pub fn attack_bonus(&self) -> i32 {
        self.effects
            .iter()
            .map(|applied| match applied.effect {
                Effect::AttackBonus { amount } => amount,
                _ => 0,
            })
            .sum()
    }
}
