use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ids::{IdAllocator, IntentId};
use crate::intent::Intent;
use crate::timer::Timer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedIntent {
    pub id: IntentId,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedIntent {
    pub id: IntentId,
    pub intent: Intent,
    pub timer: Timer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueTickReport {
    pub drained: Vec<IntentId>,
    pub promoted: Vec<IntentId>,
}

/// Per-actor ordered intents plus timer-gated delayed intents.
///
/// Only the front of `active` is live. Completed intents are removed from the
/// front during `tick`, never ahead of time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentQueue {
    active: VecDeque<QueuedIntent>,
    delayed: Vec<DelayedIntent>,
    ids: IdAllocator,
}

impl IntentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, intent: Intent) -> IntentId {
        let id = self.allocate_id();
        self.active.push_back(QueuedIntent { id, intent });
        id
    }

    /// Pre-empts the current intent; it stays queued right behind this one.
    pub fn enqueue_front(&mut self, intent: Intent) -> IntentId {
        let id = self.allocate_id();
        self.active.push_front(QueuedIntent { id, intent });
        id
    }

    pub fn delay(&mut self, intent: Intent, seconds: f32) -> IntentId {
        let id = self.allocate_id();
        self.delayed.push(DelayedIntent {
            id,
            intent,
            timer: Timer::new(seconds),
        });
        id
    }

    /// Drops the current and every queued intent. Delayed intents keep
    /// counting down. No intent observes this.
    pub fn clear_all(&mut self) -> usize {
        let dropped = self.active.len();
        self.active.clear();
        dropped
    }

    /// Drops the timer-gated side list.
    pub fn clear_delayed(&mut self) -> usize {
        let dropped = self.delayed.len();
        self.delayed.clear();
        dropped
    }

    pub fn tick(&mut self, dt: f32) -> QueueTickReport {
        let mut report = QueueTickReport::default();
        self.remove_completed(&mut report);
        self.promote_delayed(dt, &mut report);
        report
    }

    fn remove_completed(&mut self, report: &mut QueueTickReport) {
        while self
            .active
            .front()
            .is_some_and(|queued| queued.intent.is_completed())
        {
            if let Some(queued) = self.active.pop_front() {
                report.drained.push(queued.id);
            }
        }
    }

    // Each delayed entry is moved out and either promoted or put back, so an
    // intent can never be both promoted and left behind in `delayed`.
    fn promote_delayed(&mut self, dt: f32, report: &mut QueueTickReport) {
        if self.delayed.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.delayed);
        for mut delayed in pending {
            let fired = delayed.timer.advance(dt);
            if fired || delayed.timer.is_expired() {
                report.promoted.push(delayed.id);
                self.active.push_back(QueuedIntent {
                    id: delayed.id,
                    intent: delayed.intent,
                });
            } else {
                self.delayed.push(delayed);
            }
        }
    }

    pub fn mark_completed(&mut self, id: IntentId) -> bool {
        match self.active.iter_mut().find(|queued| queued.id == id) {
            Some(queued) => {
                queued.intent.mark_completed();
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&QueuedIntent> {
        self.active.front()
    }

    pub fn current_mut(&mut self) -> Option<&mut QueuedIntent> {
        self.active.front_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedIntent> {
        self.active.iter()
    }

    pub fn delayed(&self) -> impl Iterator<Item = &DelayedIntent> {
        self.delayed.iter()
    }

    pub fn has_user_intents_pending(&self) -> bool {
        self.active
            .iter()
            .any(|queued| queued.intent.is_user_issued())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    /// True when nothing is active or waiting on a timer.
    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.delayed.is_empty()
    }

    pub(crate) fn restore(
        active: Vec<QueuedIntent>,
        delayed: Vec<DelayedIntent>,
        next_id: u64,
    ) -> Self {
        Self {
            active: active.into(),
            delayed,
            ids: IdAllocator::starting_at(next_id),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.ids.peek_next()
    }

    fn allocate_id(&mut self) -> IntentId {
        IntentId(self.ids.allocate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ActorId;
    use crate::math::Vec3;

    fn current_id(queue: &IntentQueue) -> Option<IntentId> {
        queue.current().map(|queued| queued.id)
    }

    #[test]
    fn enqueue_is_fifo() {
        let mut queue = IntentQueue::new();
        let first = queue.enqueue(Intent::wait(1.0));
        let second = queue.enqueue(Intent::wait(1.0));

        assert_eq!(current_id(&queue), Some(first));
        queue.mark_completed(first);
        queue.tick(0.0);
        assert_eq!(current_id(&queue), Some(second));
    }

    #[test]
    fn tick_drains_a_cascade_of_completed_intents() {
        let mut queue = IntentQueue::new();
        let ids = (0..3)
            .map(|_| queue.enqueue(Intent::wait(1.0)))
            .collect::<Vec<_>>();
        let survivor = queue.enqueue(Intent::wait(1.0));
        for id in &ids {
            queue.mark_completed(*id);
        }

        let report = queue.tick(0.016);

        assert_eq!(report.drained, ids);
        assert_eq!(current_id(&queue), Some(survivor));
        assert!(!queue.current().expect("front").intent.is_completed());
    }

    #[test]
    fn completed_intent_behind_the_front_is_not_removed_early() {
        let mut queue = IntentQueue::new();
        let front = queue.enqueue(Intent::wait(1.0));
        let behind = queue.enqueue(Intent::wait(1.0));
        queue.mark_completed(behind);

        let report = queue.tick(0.1);

        assert!(report.drained.is_empty());
        assert_eq!(queue.len(), 2);
        queue.mark_completed(front);
        let report = queue.tick(0.1);
        assert_eq!(report.drained, vec![front, behind]);
        assert!(queue.is_empty());
    }

    #[test]
    fn enqueue_front_preempts_without_dropping_previous_front() {
        let mut queue = IntentQueue::new();
        let walk = queue.enqueue(Intent::move_to_point(Vec3::new(5.0, 0.0, 0.0)));
        let feat = queue.enqueue_front(Intent::attack(ActorId(9)).issued_by_user());

        assert_eq!(current_id(&queue), Some(feat));
        assert_eq!(queue.len(), 2);
        queue.mark_completed(feat);
        queue.tick(0.0);
        assert_eq!(current_id(&queue), Some(walk));
    }

    #[test]
    fn delayed_intent_promotes_once_after_cumulative_five_seconds() {
        let mut queue = IntentQueue::new();
        let delayed = queue.delay(Intent::wait(1.0), 5.0);

        let first = queue.tick(2.0);
        assert!(first.promoted.is_empty());
        assert!(queue.is_empty());
        let second = queue.tick(2.0);
        assert!(second.promoted.is_empty());
        assert!(queue.is_empty());

        let third = queue.tick(2.0);
        assert_eq!(third.promoted, vec![delayed]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.delayed_len(), 0);

        let fourth = queue.tick(2.0);
        assert!(fourth.promoted.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn promoted_intent_goes_to_the_back() {
        let mut queue = IntentQueue::new();
        let running = queue.enqueue(Intent::wait(10.0));
        let delayed = queue.delay(Intent::wait(1.0), 0.5);

        queue.tick(1.0);

        let order = queue.iter().map(|queued| queued.id).collect::<Vec<_>>();
        assert_eq!(order, vec![running, delayed]);
    }

    #[test]
    fn expired_but_unfired_delayed_entry_is_promoted_exactly_once() {
        let mut timer = Timer::new(1.0);
        timer.advance(2.0);
        let mut queue = IntentQueue::restore(
            Vec::new(),
            vec![DelayedIntent {
                id: IntentId(0),
                intent: Intent::wait(1.0),
                timer,
            }],
            1,
        );

        assert_eq!(queue.tick(0.0).promoted, vec![IntentId(0)]);
        assert!(queue.tick(0.0).promoted.is_empty());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.delayed_len(), 0);
    }

    #[test]
    fn clear_all_keeps_delayed_intents_counting_down() {
        let mut queue = IntentQueue::new();
        queue.enqueue(Intent::wait(1.0));
        queue.enqueue(Intent::wait(1.0));
        let later = queue.delay(Intent::wait(1.0), 2.0);

        assert_eq!(queue.clear_all(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.delayed_len(), 1);

        assert!(queue.tick(1.0).promoted.is_empty());
        assert_eq!(queue.tick(1.0).promoted, vec![later]);
        assert_eq!(queue.current().map(|queued| queued.id), Some(later));
    }

    #[test]
    fn clear_delayed_leaves_active_intents() {
        let mut queue = IntentQueue::new();
        let now = queue.enqueue(Intent::wait(1.0));
        queue.delay(Intent::wait(1.0), 2.0);

        assert_eq!(queue.clear_delayed(), 1);
        assert_eq!(queue.delayed_len(), 0);
        assert_eq!(queue.current().map(|queued| queued.id), Some(now));
        assert!(queue.tick(5.0).promoted.is_empty());
    }

    #[test]
    fn user_pending_checks_only_active_intents() {
        let mut queue = IntentQueue::new();
        queue.delay(Intent::wait(1.0).issued_by_user(), 1.0);
        assert!(!queue.has_user_intents_pending());
        queue.enqueue(Intent::wait(1.0).issued_by_user());
        assert!(queue.has_user_intents_pending());
    }

    #[test]
    fn ids_stay_unique_across_insertion_paths() {
        let mut queue = IntentQueue::new();
        let a = queue.enqueue(Intent::wait(1.0));
        let b = queue.enqueue_front(Intent::wait(1.0));
        let c = queue.delay(Intent::wait(1.0), 1.0);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert!(!queue.mark_completed(c));
    }
}
