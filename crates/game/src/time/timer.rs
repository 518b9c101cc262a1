use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponTimer {
    EquipFinished,
    StopReload,
    ReloadWeapon,
    HandleFiring,
    HandleShot,
    BurstStop,
    BurstRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterTimer {
    Regenerate,
    Ragdoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectileTimer {
    Fuse,
    StoppedFuse,
    BounceFuse,
}

/// What a timer does when it fires. The world routes the key back to the
/// owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Weapon(WeaponTimer),
    Character(CharacterTimer),
    Projectile(ProjectileTimer),
    /// Lifespan ran out; the owner is destroyed.
    Expire,
}

impl From<WeaponTimer> for TimerKey {
    fn from(key: WeaponTimer) -> Self {
        TimerKey::Weapon(key)
    }
}

impl From<ProjectileTimer> for TimerKey {
    fn from(key: ProjectileTimer) -> Self {
        TimerKey::Projectile(key)
    }
}

impl From<CharacterTimer> for TimerKey {
    fn from(key: CharacterTimer) -> Self {
        TimerKey::Character(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

pub trait TimerService {
    fn schedule(
        &mut self,
        owner: EntityId,
        key: TimerKey,
        delay: f32,
        repeating: bool,
    ) -> TimerHandle;

    fn cancel(&mut self, handle: TimerHandle);

    fn is_active(&self, handle: TimerHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueTimer {
    pub handle: TimerHandle,
    pub owner: EntityId,
    pub key: TimerKey,
    pub due: f32,
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: f32,
    order: u64,
    handle: TimerHandle,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest deadline, then the earliest
    // schedule call.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveTimer {
    owner: EntityId,
    key: TimerKey,
    due: f32,
    order: u64,
    interval: Option<f32>,
}

/// Single-threaded timer wheel driven by the simulation tick.
///
/// Timers due at the same instant fire in the order they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: f32,
    next_handle: u64,
    next_order: u64,
    heap: BinaryHeap<Scheduled>,
    active: HashMap<TimerHandle, ActiveTimer>,
}

impl TimerQueue {
    const MIN_INTERVAL: f32 = 0.001;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn set_now(&mut self, now: f32) {
        self.now = now;
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn remaining(&self, handle: TimerHandle) -> Option<f32> {
        self.active
            .get(&handle)
            .map(|timer| (timer.due - self.now).max(0.0))
    }

    pub fn pop_due(&mut self) -> Option<DueTimer> {
        while let Some(top) = self.heap.peek() {
            if top.due > self.now {
                return None;
            }
            let entry = self.heap.pop()?;
            let Some(timer) = self.active.get(&entry.handle).copied() else {
                continue;
            };
            if timer.order != entry.order {
                continue;
            }

            match timer.interval {
                Some(interval) => {
                    let order = self.bump_order();
                    let due = timer.due + interval;
                    self.active.insert(
                        entry.handle,
                        ActiveTimer {
                            due,
                            order,
                            ..timer
                        },
                    );
                    self.heap.push(Scheduled {
                        due,
                        order,
                        handle: entry.handle,
                    });
                }
                None => {
                    self.active.remove(&entry.handle);
                }
            }

            return Some(DueTimer {
                handle: entry.handle,
                owner: timer.owner,
                key: timer.key,
                due: timer.due,
            });
        }
        None
    }

    pub fn cancel_owner(&mut self, owner: EntityId) {
        self.active.retain(|_, timer| timer.owner != owner);
    }

    fn bump_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}

impl TimerService for TimerQueue {
    fn schedule(
        &mut self,
        owner: EntityId,
        key: TimerKey,
        delay: f32,
        repeating: bool,
    ) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let delay = delay.max(0.0);
        let due = self.now + delay;
        let order = self.bump_order();
        let interval = repeating.then_some(delay.max(Self::MIN_INTERVAL));

        self.active.insert(
            handle,
            ActiveTimer {
                owner,
                key,
                due,
                order,
                interval,
            },
        );
        self.heap.push(Scheduled { due, order, handle });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.active.remove(&handle);
    }

    fn is_active(&self, handle: TimerHandle) -> bool {
        self.active.contains_key(&handle)
    }
}

/// Named timers of one entity.
///
/// Every `reset` cancels the previous timer under the same key before
/// scheduling, and `fired` tells a callback whether it is still the live
/// timer for its key.
#[derive(Debug, Clone)]
pub struct TimerSlots<K> {
    handles: HashMap<K, TimerHandle>,
}

impl<K> Default for TimerSlots<K> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }
}

impl<K> TimerSlots<K>
where
    K: Copy + Eq + Hash + Into<TimerKey>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, timers: &mut dyn TimerService, owner: EntityId, key: K, delay: f32) {
        self.clear(timers, key);
        let handle = timers.schedule(owner, key.into(), delay, false);
        self.handles.insert(key, handle);
    }

    pub fn clear(&mut self, timers: &mut dyn TimerService, key: K) {
        if let Some(handle) = self.handles.remove(&key) {
            if timers.is_active(handle) {
                timers.cancel(handle);
            }
        }
    }

    pub fn clear_all(&mut self, timers: &mut dyn TimerService) {
        for (_, handle) in self.handles.drain() {
            if timers.is_active(handle) {
                timers.cancel(handle);
            }
        }
    }

    pub fn is_active(&self, timers: &dyn TimerService, key: K) -> bool {
        self.handles
            .get(&key)
            .is_some_and(|handle| timers.is_active(*handle))
    }

    pub fn fired(&mut self, key: K, handle: TimerHandle) -> bool {
        if self.handles.get(&key) == Some(&handle) {
            self.handles.remove(&key);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue) -> Vec<DueTimer> {
        std::iter::from_fn(|| queue.pop_due()).collect()
    }

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut queue = TimerQueue::new();
        let late = queue.schedule(1, TimerKey::Expire, 0.5, false);
        let first = queue.schedule(2, WeaponTimer::StopReload.into(), 0.1, false);
        let second = queue.schedule(3, WeaponTimer::ReloadWeapon.into(), 0.1, false);

        queue.set_now(0.2);
        let fired: Vec<_> = drain(&mut queue).iter().map(|t| t.handle).collect();
        assert_eq!(fired, vec![first, second]);
        assert!(queue.is_active(late));

        queue.set_now(1.0);
        assert_eq!(drain(&mut queue).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(1, TimerKey::Expire, 0.1, false);
        queue.cancel(handle);
        queue.cancel(handle);

        queue.set_now(1.0);
        assert!(queue.pop_due().is_none());
    }

    #[test]
    fn repeating_timer_rearms() {
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(7, CharacterTimer::Regenerate.into(), 0.25, true);

        queue.set_now(0.3);
        assert_eq!(drain(&mut queue).len(), 1);
        assert!(queue.is_active(handle));

        queue.set_now(0.8);
        assert_eq!(drain(&mut queue).len(), 2);
    }

    #[test]
    fn cancel_owner_drops_every_timer_of_that_entity() {
        let mut queue = TimerQueue::new();
        queue.schedule(1, TimerKey::Expire, 0.1, false);
        queue.schedule(1, WeaponTimer::HandleFiring.into(), 0.2, false);
        let other = queue.schedule(2, TimerKey::Expire, 0.1, false);

        queue.cancel_owner(1);
        queue.set_now(1.0);
        let fired = drain(&mut queue);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].handle, other);
    }

    #[test]
    fn slots_reset_cancels_previous_timer() {
        let mut queue = TimerQueue::new();
        let mut slots = TimerSlots::<WeaponTimer>::new();

        slots.reset(&mut queue, 4, WeaponTimer::HandleFiring, 0.1);
        slots.reset(&mut queue, 4, WeaponTimer::HandleFiring, 0.3);
        assert_eq!(queue.len(), 1);

        queue.set_now(0.2);
        assert!(queue.pop_due().is_none());

        queue.set_now(0.3);
        let due = queue.pop_due().expect("rescheduled timer fires");
        assert!(slots.fired(WeaponTimer::HandleFiring, due.handle));
        assert!(!slots.is_active(&queue, WeaponTimer::HandleFiring));
    }

    #[test]
    fn slots_reject_superseded_handles() {
        let mut queue = TimerQueue::new();
        let mut slots = TimerSlots::<WeaponTimer>::new();

        slots.reset(&mut queue, 4, WeaponTimer::StopReload, 0.1);
        let stale = TimerHandle(999);
        assert!(!slots.fired(WeaponTimer::StopReload, stale));
        assert!(slots.is_active(&queue, WeaponTimer::StopReload));
    }
}
