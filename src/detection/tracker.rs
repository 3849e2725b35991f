//! Tracking of touching pairs from one tick to the next.
//!
//! Pairs touching this tick are compared against the pairs touching
//! on the previous tick to tell apart contacts that just began,
//! contacts that continue and contacts that ended.

use super::{
    registry::{HitId, ReceiveId, Registry},
    shape_shape::Contact,
};
use crate::{
    event::{CollisionEvent, SharedListener},
    math::Vec3,
};
use std::{
    collections::HashSet,
    hash::{Hash, Hasher},
};

/// Identity of a hit-receive relationship across ticks.
///
/// Only the ids take part in equality and hashing.
/// The payload rides along so that exit events can report it
/// even after the hit shape is gone.
#[derive(Clone, Debug)]
pub struct PairKey<P> {
    pub hit_id: HitId,
    pub receive_id: ReceiveId,
    pub payload: P,
}

impl<P> PairKey<P> {
    #[inline]
    fn ids(&self) -> (HitId, ReceiveId) {
        (self.hit_id, self.receive_id)
    }
}

impl<P> PartialEq for PairKey<P> {
    fn eq(&self, other: &Self) -> bool {
        self.ids() == other.ids()
    }
}
impl<P> Eq for PairKey<P> {}

impl<P> Hash for PairKey<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ids().hash(state);
    }
}

/// Number of each kind of event produced by one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionCounts {
    pub enters: usize,
    pub stays: usize,
    pub exits: usize,
}

/// The set of pairs touching on the previous tick and the one being filled this tick.
pub(crate) struct ContactTracker<P> {
    previous: HashSet<PairKey<P>>,
    current: HashSet<PairKey<P>>,
    counts: TransitionCounts,
}

impl<P: Clone> ContactTracker<P> {
    pub fn new() -> Self {
        ContactTracker {
            previous: HashSet::new(),
            current: HashSet::new(),
            counts: TransitionCounts::default(),
        }
    }

    /// Note a pair touching this tick and notify its listener,
    /// with an enter event if the pair wasn't touching on the previous tick
    /// and a stay event if it was.
    ///
    /// Recording the same pair twice in one tick does nothing the second time.
    pub fn record(
        &mut self,
        key: PairKey<P>,
        contact: &Contact,
        listener: Option<&SharedListener<P>>,
    ) {
        if self.current.contains(&key) {
            return;
        }
        let was_touching = self.previous.contains(&key);

        if let Some(listener) = listener {
            let evt = CollisionEvent {
                hit_id: key.hit_id,
                receive_id: key.receive_id,
                contact_point: contact.point,
                contact_normal: contact.normal.into_inner(),
                payload: key.payload.clone(),
            };
            if was_touching {
                listener.on_collision_stay(&evt);
            } else {
                listener.on_collision_enter(&evt);
            }
        }
        if was_touching {
            self.counts.stays += 1;
        } else {
            self.counts.enters += 1;
        }

        self.current.insert(key);
    }

    /// Send exit events for pairs that were touching on the previous tick
    /// but weren't recorded this tick, then make this tick the previous one.
    ///
    /// Exit events carry no contact geometry: point and normal are zero.
    /// Pairs whose receive shape is no longer registered, or has no listener,
    /// are skipped silently. Exits are sent in order of hit id, then receive id.
    pub fn finish_tick(&mut self, registry: &Registry<P>) -> TransitionCounts {
        let mut exits: Vec<&PairKey<P>> = self.previous.difference(&self.current).collect();
        exits.sort_unstable_by_key(|key| key.ids());

        for key in &exits {
            if let Some(listener) = registry.listener_for(key.receive_id) {
                listener.on_collision_exit(&CollisionEvent {
                    hit_id: key.hit_id,
                    receive_id: key.receive_id,
                    contact_point: Vec3::zero(),
                    contact_normal: Vec3::zero(),
                    payload: key.payload.clone(),
                });
            }
        }
        self.counts.exits = exits.len();

        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.clear();
        std::mem::take(&mut self.counts)
    }

    /// Whether the pair was touching as of the last finished tick.
    pub fn is_touching(&self, hit_id: HitId, receive_id: ReceiveId) -> bool {
        self.previous
            .iter()
            .any(|key| key.ids() == (hit_id, receive_id))
    }

    /// Number of pairs touching as of the last finished tick.
    pub fn touching_count(&self) -> usize {
        self.previous.len()
    }

    /// Forget every pair without sending any events.
    pub fn clear(&mut self) {
        self.previous.clear();
        self.current.clear();
        self.counts = TransitionCounts::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collider::{Capsule, LayerMask},
        event::{Event, EventSink},
        math::{Unit, Vec3},
    };
    use std::sync::Arc;

    fn contact() -> Contact {
        Contact {
            point: Vec3::new(1.0, 2.0, 3.0),
            normal: Unit::unit_z(),
        }
    }

    fn key(hit: u32, recv: u32, payload: &'static str) -> PairKey<&'static str> {
        PairKey {
            hit_id: HitId(hit),
            receive_id: ReceiveId(recv),
            payload,
        }
    }

    /// A registry holding one receive bound to the given sink.
    fn registry_with(sink: &Arc<EventSink<&'static str>>) -> (Registry<&'static str>, ReceiveId) {
        let mut reg = Registry::new();
        let listener: SharedListener<&'static str> = sink.clone();
        let id = reg.add_receive(
            Box::new(Capsule::new(Vec3::zero(), Vec3::unit_y(), 0.5)),
            Some(listener),
            LayerMask::ALL,
        );
        (reg, id)
    }

    #[test]
    fn payload_is_not_part_of_identity() {
        let mut set = HashSet::new();
        set.insert(key(1, 1, "jab"));
        assert!(set.contains(&key(1, 1, "uppercut")));
        assert!(!set.contains(&key(1, 2, "jab")));
    }

    #[test]
    fn enter_stay_exit_sequence() {
        let sink = EventSink::shared();
        let (reg, recv) = registry_with(&sink);
        let listener = reg.listener_for(recv).cloned();
        let mut tracker = ContactTracker::new();

        for _ in 0..3 {
            tracker.record(key(5, recv.0, "slash"), &contact(), listener.as_ref());
            tracker.finish_tick(&reg);
        }
        assert!(tracker.is_touching(HitId(5), recv));
        let counts = tracker.finish_tick(&reg);
        assert_eq!(
            counts,
            TransitionCounts {
                enters: 0,
                stays: 0,
                exits: 1
            }
        );
        assert!(!tracker.is_touching(HitId(5), recv));

        let events = sink.drain();
        itertools::assert_equal(
            events.iter().map(|e| match e {
                Event::Enter(_) => "enter",
                Event::Stay(_) => "stay",
                Event::Exit(_) => "exit",
            }),
            ["enter", "stay", "stay", "exit"],
        );
        let exit = events[3].inner();
        assert_eq!(exit.payload, "slash");
        assert_eq!(exit.contact_point, Vec3::zero());
        assert_eq!(exit.contact_normal, Vec3::zero());
        assert_eq!(events[0].inner().contact_point, contact().point);
    }

    #[test]
    fn duplicate_records_count_once() {
        let sink = EventSink::shared();
        let (reg, recv) = registry_with(&sink);
        let listener = reg.listener_for(recv).cloned();
        let mut tracker = ContactTracker::new();

        tracker.record(key(1, recv.0, "a"), &contact(), listener.as_ref());
        tracker.record(key(1, recv.0, "b"), &contact(), listener.as_ref());
        let counts = tracker.finish_tick(&reg);
        assert_eq!(counts.enters, 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn exits_for_missing_receives_are_skipped() {
        let sink = EventSink::shared();
        let (mut reg, recv) = registry_with(&sink);
        let listener = reg.listener_for(recv).cloned();
        let mut tracker = ContactTracker::new();

        tracker.record(key(1, recv.0, "a"), &contact(), listener.as_ref());
        tracker.finish_tick(&reg);
        reg.remove_receive(recv);
        let counts = tracker.finish_tick(&reg);
        assert_eq!(counts.exits, 1);
        itertools::assert_equal(
            sink.drain().iter().map(|e| matches!(e, Event::Enter(_))),
            [true],
        );
        assert_eq!(tracker.touching_count(), 0);
    }

    #[test]
    fn missing_listener_still_tracks_state() {
        let reg: Registry<&'static str> = Registry::new();
        let mut tracker = ContactTracker::new();
        tracker.record(key(1, 1, "a"), &contact(), None);
        let counts = tracker.finish_tick(&reg);
        assert_eq!(counts.enters, 1);
        assert!(tracker.is_touching(HitId(1), ReceiveId(1)));

        tracker.clear();
        assert_eq!(tracker.touching_count(), 0);
    }
}
