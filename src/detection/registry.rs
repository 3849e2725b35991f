//! Storage for registered hit and receive shapes.

use crate::{
    collider::{Capsule, HitGeometry, HitShape, LayerMask, ReceiveGeometry},
    event::SharedListener,
};

/// Identifier of a registered hit shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct HitId(pub u32);

/// Identifier of a registered receive shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiveId(pub u32);

pub(crate) struct HitEntry<P> {
    pub id: HitId,
    pub geometry: Box<dyn HitGeometry>,
    pub layer_mask: LayerMask,
    pub payload: P,
}

pub(crate) struct ReceiveEntry<P> {
    pub id: ReceiveId,
    pub geometry: Box<dyn ReceiveGeometry>,
    pub layer_mask: LayerMask,
    pub listener: Option<SharedListener<P>>,
}

/// The state of a hit shape frozen for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitSnapshot {
    pub id: HitId,
    pub layer_mask: LayerMask,
    pub shape: HitShape,
}

/// The state of a receive shape frozen for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReceiveSnapshot {
    pub id: ReceiveId,
    pub layer_mask: LayerMask,
    pub capsule: Capsule,
}

/// Dense per-tick copies of every registered shape.
///
/// Index `i` of each list corresponds to index `i` of the registry's entries
/// at the time the snapshots were built.
#[derive(Clone, Debug, Default)]
pub struct Snapshots {
    pub hits: Vec<HitSnapshot>,
    pub receives: Vec<ReceiveSnapshot>,
}

impl Snapshots {
    pub fn clear(&mut self) {
        self.hits.clear();
        self.receives.clear();
    }
}

/// Owner of every registered shape.
///
/// Entries are kept in registration order.
/// Removal is a linear scan, which is fine for the tens of shapes
/// alive at any given time in a typical fight.
pub(crate) struct Registry<P> {
    hits: Vec<HitEntry<P>>,
    receives: Vec<ReceiveEntry<P>>,
    next_hit_id: u32,
    next_receive_id: u32,
}

impl<P> Registry<P> {
    pub fn new() -> Self {
        Registry {
            hits: Vec::new(),
            receives: Vec::new(),
            next_hit_id: 1,
            next_receive_id: 1,
        }
    }

    pub fn add_hit(
        &mut self,
        geometry: Box<dyn HitGeometry>,
        layer_mask: LayerMask,
        payload: P,
    ) -> HitId {
        let id = HitId(self.next_hit_id);
        self.next_hit_id += 1;
        self.hits.push(HitEntry {
            id,
            geometry,
            layer_mask,
            payload,
        });
        id
    }

    pub fn add_receive(
        &mut self,
        geometry: Box<dyn ReceiveGeometry>,
        listener: Option<SharedListener<P>>,
        layer_mask: LayerMask,
    ) -> ReceiveId {
        let id = ReceiveId(self.next_receive_id);
        self.next_receive_id += 1;
        self.receives.push(ReceiveEntry {
            id,
            geometry,
            layer_mask,
            listener,
        });
        id
    }

    /// Returns whether an entry with the id existed.
    pub fn remove_hit(&mut self, id: HitId) -> bool {
        match self.hits.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.hits.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns whether an entry with the id existed.
    pub fn remove_receive(&mut self, id: ReceiveId) -> bool {
        match self.receives.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.receives.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn hits(&self) -> &[HitEntry<P>] {
        &self.hits
    }

    pub fn receives(&self) -> &[ReceiveEntry<P>] {
        &self.receives
    }

    /// Find the listener bound to a receive shape.
    /// `None` both if the receive is gone and if it never had a listener.
    pub fn listener_for(&self, id: ReceiveId) -> Option<&SharedListener<P>> {
        self.receives
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.listener.as_ref())
    }

    /// Read every geometry provider and write the results into `snapshots`,
    /// replacing their previous contents.
    pub fn snapshot_into(&self, snapshots: &mut Snapshots) {
        snapshots.clear();
        snapshots
            .hits
            .extend(self.hits.iter().map(|e| HitSnapshot {
                id: e.id,
                layer_mask: e.layer_mask,
                shape: e.geometry.hit_shape(),
            }));
        snapshots
            .receives
            .extend(self.receives.iter().map(|e| ReceiveSnapshot {
                id: e.id,
                layer_mask: e.layer_mask,
                capsule: e.geometry.capsule(),
            }));
    }

    /// Drop every entry. Id counters keep going so ids are never handed out twice.
    pub fn clear(&mut self) {
        self.hits.clear();
        self.receives.clear();
    }
}
