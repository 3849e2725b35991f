//! Copies of a tick's shapes and contacts for drawing debug overlays.

use super::{
    registry::{HitId, HitSnapshot, ReceiveId, ReceiveSnapshot, Snapshots},
    shape_shape::Contact,
};
use crate::math::Vec3;

/// A contact found during a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugContact {
    pub hit_id: HitId,
    pub receive_id: ReceiveId,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Everything the detection engine saw during one tick.
#[derive(Clone, Debug, Default)]
pub struct DebugFrame {
    pub hits: Vec<HitSnapshot>,
    pub receives: Vec<ReceiveSnapshot>,
    pub contacts: Vec<DebugContact>,
    /// Counts committed frames, starting from 1.
    pub frame_index: u64,
}

/// Holds the last committed frame while debugging is enabled.
#[derive(Debug, Default)]
pub(crate) struct DebugRecorder {
    enabled: bool,
    // frame being filled during the current tick
    pending: DebugFrame,
    committed: Option<DebugFrame>,
    frame_counter: u64,
}

impl DebugRecorder {
    /// Disabling drops the stored frame.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.committed = None;
        }
    }

    pub fn begin(&mut self, snapshots: &Snapshots) {
        if !self.enabled {
            return;
        }
        let frame = &mut self.pending;
        frame.hits.clear();
        frame.hits.extend_from_slice(&snapshots.hits);
        frame.receives.clear();
        frame.receives.extend_from_slice(&snapshots.receives);
        frame.contacts.clear();
    }

    pub fn add_contact(&mut self, hit_id: HitId, receive_id: ReceiveId, contact: &Contact) {
        if !self.enabled {
            return;
        }
        self.pending.contacts.push(DebugContact {
            hit_id,
            receive_id,
            point: contact.point,
            normal: contact.normal.into_inner(),
        });
    }

    /// Publish the pending frame, reusing the memory of the old one for the next tick.
    pub fn commit(&mut self) {
        if !self.enabled {
            return;
        }
        self.frame_counter += 1;
        self.pending.frame_index = self.frame_counter;
        let recycled = self.committed.take().unwrap_or_default();
        self.committed = Some(std::mem::replace(&mut self.pending, recycled));
    }

    pub fn frame(&self) -> Option<&DebugFrame> {
        if self.enabled {
            self.committed.as_ref()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.pending = DebugFrame::default();
        self.committed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collider::{Capsule, LayerMask, Sphere},
        math::Unit,
    };

    fn snapshots() -> Snapshots {
        Snapshots {
            hits: vec![HitSnapshot {
                id: HitId(1),
                layer_mask: LayerMask::ALL,
                shape: Sphere::new(Vec3::zero(), 1.0).into(),
            }],
            receives: vec![ReceiveSnapshot {
                id: ReceiveId(1),
                layer_mask: LayerMask::ALL,
                capsule: Capsule::new(Vec3::zero(), Vec3::unit_y(), 0.5),
            }],
        }
    }

    #[test]
    fn disabled_recorder_stays_empty() {
        let mut rec = DebugRecorder::default();
        rec.begin(&snapshots());
        rec.commit();
        assert!(rec.frame().is_none());
    }

    #[test]
    fn frames_are_indexed_and_replaced() {
        let mut rec = DebugRecorder::default();
        rec.set_enabled(true);
        let contact = Contact {
            point: Vec3::unit_x(),
            normal: Unit::unit_x(),
        };

        rec.begin(&snapshots());
        rec.add_contact(HitId(1), ReceiveId(1), &contact);
        rec.commit();
        let frame = rec.frame().expect("Frame should be committed");
        assert_eq!(frame.frame_index, 1);
        assert_eq!(frame.hits.len(), 1);
        assert_eq!(frame.contacts.len(), 1);
        assert_eq!(frame.contacts[0].normal, Vec3::unit_x());

        rec.begin(&snapshots());
        rec.commit();
        let frame = rec.frame().expect("Frame should be committed");
        assert_eq!(frame.frame_index, 2);
        assert!(frame.contacts.is_empty());

        rec.set_enabled(false);
        assert!(rec.frame().is_none());
    }
}
