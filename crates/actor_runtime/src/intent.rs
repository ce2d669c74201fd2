use serde::{Deserialize, Serialize};

use crate::effects::{DurationType, Effect};
use crate::ids::{ActorId, FeatId, SkillId};
use crate::math::Vec3;
use crate::timer::Timer;

/// Closed catalog of actor behaviors. Per-kind progress lives in the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntentKind {
    MoveToPoint {
        point: Vec3,
    },
    PlayAnimation {
        animation: String,
        timer: Timer,
        started: bool,
    },
    Wait {
        timer: Timer,
    },
    UseFeat {
        target: ActorId,
        feat: FeatId,
    },
    UseSkill {
        target: ActorId,
        skill: SkillId,
    },
    AttackObject {
        target: ActorId,
        started: bool,
    },
    ApplyEffect {
        target: ActorId,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKindTag {
    MoveToPoint,
    PlayAnimation,
    Wait,
    UseFeat,
    UseSkill,
    AttackObject,
    ApplyEffect,
}

impl IntentKindTag {
    pub fn name(self) -> &'static str {
        match self {
            Self::MoveToPoint => "move_to_point",
            Self::PlayAnimation => "play_animation",
            Self::Wait => "wait",
            Self::UseFeat => "use_feat",
            Self::UseSkill => "use_skill",
            Self::AttackObject => "attack_object",
            Self::ApplyEffect => "apply_effect",
        }
    }
}

impl IntentKind {
    pub fn tag(&self) -> IntentKindTag {
        match self {
            Self::MoveToPoint { .. } => IntentKindTag::MoveToPoint,
            Self::PlayAnimation { .. } => IntentKindTag::PlayAnimation,
            Self::Wait { .. } => IntentKindTag::Wait,
            Self::UseFeat { .. } => IntentKindTag::UseFeat,
            Self::UseSkill { .. } => IntentKindTag::UseSkill,
            Self::AttackObject { .. } => IntentKindTag::AttackObject,
            Self::ApplyEffect { .. } => IntentKindTag::ApplyEffect,
        }
    }

    /// The other actor this intent acts on, if any.
    pub fn target_actor(&self) -> Option<ActorId> {
        match self {
            Self::UseFeat { target, .. }
            | Self::UseSkill { target, .. }
            | Self::AttackObject { target, .. }
            | Self::ApplyEffect { target, .. } => Some(*target),
            Self::MoveToPoint { .. } | Self::PlayAnimation { .. } | Self::Wait { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    kind: IntentKind,
    completed: bool,
    user_issued: bool,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            completed: false,
            user_issued: false,
        }
    }

    pub fn move_to_point(point: Vec3) -> Self {
        Self::new(IntentKind::MoveToPoint { point })
    }

    pub fn play_animation(animation: impl Into<String>, duration_seconds: f32) -> Self {
        Self::new(IntentKind::PlayAnimation {
            animation: animation.into(),
            timer: Timer::new(duration_seconds),
            started: false,
        })
    }

    pub fn wait(duration_seconds: f32) -> Self {
        Self::new(IntentKind::Wait {
            timer: Timer::new(duration_seconds),
        })
    }

    pub fn use_feat(target: ActorId, feat: FeatId) -> Self {
        Self::new(IntentKind::UseFeat { target, feat })
    }

    pub fn use_skill(target: ActorId, skill: SkillId) -> Self {
        Self::new(IntentKind::UseSkill { target, skill })
    }

    pub fn attack(target: ActorId) -> Self {
        Self::new(IntentKind::AttackObject {
            target,
            started: false,
        })
    }

    pub fn apply_effect(
        target: ActorId,
        effect: Effect,
        duration_type: DurationType,
        duration: f32,
    ) -> Self {
        Self::new(IntentKind::ApplyEffect {
            target,
            effect,
            duration_type,
            duration,
        })
    }

    /// Marks the intent as issued by the player rather than AI or script.
    pub fn issued_by_user(mut self) -> Self {
        self.user_issued = true;
        self
    }

    pub fn kind(&self) -> &IntentKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut IntentKind {
        &mut self.kind
    }

    pub fn tag(&self) -> IntentKindTag {
        self.kind.tag()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    pub fn is_user_issued(&self) -> bool {
        self.user_issued
    }
}
