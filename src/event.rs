//! Contact lifecycle events and the listeners that receive them.

use crate::detection::{HitId, ReceiveId};
use crate::math::Vec3;
use parking_lot::Mutex;
use std::sync::Arc;

/// Information about a contact between a hit shape and a receive shape.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionEvent<P> {
    pub hit_id: HitId,
    pub receive_id: ReceiveId,
    /// Point on the surface of the receive capsule.
    /// Zero for exit events, where there is no contact anymore.
    pub contact_point: Vec3,
    /// Outward normal of the receive capsule, facing towards the hit shape.
    /// Zero for exit events.
    pub contact_normal: Vec3,
    /// Data attached to the hit shape when it was registered.
    pub payload: P,
}

/// Receiver of contact lifecycle notifications.
///
/// A listener is bound to a receive shape and only hears about pairs involving it.
/// Methods are called from the thread running `HitDetection::update`,
/// never from inside the parallel evaluation.
pub trait CollisionListener<P>: Send + Sync {
    /// The pair started touching this tick.
    fn on_collision_enter(&self, evt: &CollisionEvent<P>);
    /// The pair was touching on the previous tick and still is.
    fn on_collision_stay(&self, evt: &CollisionEvent<P>);
    /// The pair was touching on the previous tick and no longer is.
    fn on_collision_exit(&self, evt: &CollisionEvent<P>);
}

pub type SharedListener<P> = Arc<dyn CollisionListener<P>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Event<P> {
    Enter(CollisionEvent<P>),
    Stay(CollisionEvent<P>),
    Exit(CollisionEvent<P>),
}

impl<P> Event<P> {
    pub fn inner(&self) -> &CollisionEvent<P> {
        match self {
            Event::Enter(e) | Event::Stay(e) | Event::Exit(e) => e,
        }
    }
}

/// A listener that gathers the events it receives until they're drained.
pub struct EventSink<P> {
    events: Mutex<Vec<Event<P>>>,
}

impl<P> EventSink<P> {
    pub fn new() -> Self {
        EventSink {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Create a sink already wrapped for sharing with the detection engine.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn push(&self, evt: Event<P>) {
        self.events.lock().push(evt);
    }

    /// Take every event received so far, oldest first.
    pub fn drain(&self) -> Vec<Event<P>> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<P> Default for EventSink<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send> CollisionListener<P> for EventSink<P> {
    fn on_collision_enter(&self, evt: &CollisionEvent<P>) {
        self.push(Event::Enter(evt.clone()));
    }

    fn on_collision_stay(&self, evt: &CollisionEvent<P>) {
        self.push(Event::Stay(evt.clone()));
    }

    fn on_collision_exit(&self, evt: &CollisionEvent<P>) {
        self.push(Event::Exit(evt.clone()));
    }
}
