//! Evaluation of broad phase candidates with the narrow phase tests.
//!
//! Each candidate pair is an independent unit of work that reads the immutable
//! snapshots and writes only its own result slot, so with the `parallel` feature
//! the pairs are split into chunks and spread across the rayon thread pool.
//! The call returns once every chunk is done.

use super::{
    registry::Snapshots,
    shape_shape::{intersection_check, Contact},
};

/// Indices of a hit and a receive shape in the current tick's snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidatePair {
    pub hit_idx: usize,
    pub receive_idx: usize,
}

/// Outcome of evaluating one candidate pair. `None` means no contact.
pub type ContactResult = Option<Contact>;

/// Growable candidate list and the result slots matching it.
///
/// Both are reused from tick to tick. The result slots grow in powers of two
/// whenever a tick has more candidates than ever before and never shrink.
#[derive(Debug, Default)]
pub struct PairBuffers {
    pairs: Vec<CandidatePair>,
    results: Vec<ContactResult>,
}

impl PairBuffers {
    pub fn with_capacity(capacity: usize) -> Self {
        PairBuffers {
            pairs: Vec::with_capacity(capacity),
            results: vec![None; capacity],
        }
    }

    /// Forget this tick's candidates, keeping the memory.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn push(&mut self, pair: CandidatePair) {
        self.pairs.push(pair);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of result slots currently allocated.
    pub fn slot_count(&self) -> usize {
        self.results.len()
    }

    fn ensure_slots(&mut self) {
        let needed = self.pairs.len();
        if needed > self.results.len() {
            let new_len = needed.next_power_of_two();
            log::trace!(
                "Growing contact result slots from {} to {}",
                self.results.len(),
                new_len
            );
            self.results.resize(new_len, None);
        }
    }

    /// Run the narrow phase on every candidate and store the results.
    ///
    /// `chunk_size` is the number of pairs handed to a worker at once
    /// and must be nonzero.
    pub fn evaluate(&mut self, snapshots: &Snapshots, chunk_size: usize) {
        let _span = tracy_span!("evaluate candidates", "evaluate");

        if self.is_empty() {
            return;
        }
        self.ensure_slots();
        let count = self.pairs.len();
        let pairs = &self.pairs[..];
        let results = &mut self.results[..count];

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            results
                .par_chunks_mut(chunk_size)
                .zip(pairs.par_chunks(chunk_size))
                .for_each(|(out, pairs)| evaluate_chunk(pairs, out, snapshots));
        }
        #[cfg(not(feature = "parallel"))]
        {
            for (out, pairs) in results.chunks_mut(chunk_size).zip(pairs.chunks(chunk_size)) {
                evaluate_chunk(pairs, out, snapshots);
            }
        }
    }

    /// Every candidate of the current tick together with its evaluated result.
    ///
    /// Only meaningful after [`evaluate`][Self::evaluate] has run for this tick.
    pub fn iter(&self) -> impl Iterator<Item = (CandidatePair, ContactResult)> + '_ {
        self.pairs.iter().copied().zip(self.results.iter().copied())
    }
}

fn evaluate_chunk(pairs: &[CandidatePair], out: &mut [ContactResult], snapshots: &Snapshots) {
    for (slot, pair) in out.iter_mut().zip(pairs) {
        *slot = evaluate_pair(*pair, snapshots);
    }
}

/// Layer masks are checked before any geometry.
/// Indices out of range count as no contact.
fn evaluate_pair(pair: CandidatePair, snapshots: &Snapshots) -> ContactResult {
    let hit = snapshots.hits.get(pair.hit_idx)?;
    let receive = snapshots.receives.get(pair.receive_idx)?;
    if !hit.layer_mask.interacts_with(receive.layer_mask) {
        return None;
    }
    intersection_check(&hit.shape, &receive.capsule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collider::{Capsule, LayerMask, Sphere},
        detection::{
            registry::{HitSnapshot, ReceiveSnapshot},
            HitId, ReceiveId,
        },
        math::Vec3,
    };

    fn snapshots(hit_count: usize) -> Snapshots {
        Snapshots {
            // every other hit overlaps the receive
            hits: (0..hit_count)
                .map(|i| HitSnapshot {
                    id: HitId(i as u32 + 1),
                    layer_mask: LayerMask::ALL,
                    shape: Sphere::new(
                        Vec3::new(if i % 2 == 0 { 0.5 } else { 10.0 }, 1.0, 0.0),
                        0.5,
                    )
                    .into(),
                })
                .collect(),
            receives: vec![
                ReceiveSnapshot {
                    id: ReceiveId(1),
                    layer_mask: LayerMask::ALL,
                    capsule: Capsule::new(Vec3::zero(), Vec3::new(0.0, 2.0, 0.0), 0.5),
                },
                ReceiveSnapshot {
                    id: ReceiveId(2),
                    layer_mask: LayerMask::NONE,
                    capsule: Capsule::new(Vec3::zero(), Vec3::new(0.0, 2.0, 0.0), 0.5),
                },
            ],
        }
    }

    #[test]
    fn results_line_up_with_pairs() {
        let snaps = snapshots(300);
        let mut bufs = PairBuffers::with_capacity(4);
        for hit_idx in 0..snaps.hits.len() {
            bufs.push(CandidatePair {
                hit_idx,
                receive_idx: 0,
            });
        }
        bufs.evaluate(&snaps, 7);

        assert_eq!(bufs.len(), 300);
        for (pair, result) in bufs.iter() {
            assert_eq!(result.is_some(), pair.hit_idx % 2 == 0, "{:?}", pair);
        }
    }

    #[test]
    fn slots_grow_to_powers_of_two_and_never_shrink() {
        let snaps = snapshots(2);
        let mut bufs = PairBuffers::with_capacity(4);
        assert_eq!(bufs.slot_count(), 4);

        for _ in 0..5 {
            bufs.push(CandidatePair {
                hit_idx: 0,
                receive_idx: 0,
            });
        }
        bufs.evaluate(&snaps, 64);
        assert_eq!(bufs.slot_count(), 8);
        assert!(bufs.iter().all(|(_, r)| r.is_some()));

        bufs.clear();
        bufs.push(CandidatePair {
            hit_idx: 1,
            receive_idx: 0,
        });
        bufs.evaluate(&snaps, 64);
        assert_eq!(bufs.slot_count(), 8);
        itertools::assert_equal(bufs.iter().map(|(_, r)| r.is_some()), [false]);
    }

    #[test]
    fn empty_tick_evaluates_nothing() {
        let snaps = snapshots(1);
        let mut bufs = PairBuffers::with_capacity(0);
        assert!(bufs.is_empty());
        bufs.evaluate(&snaps, 64);
        assert_eq!(bufs.slot_count(), 0);
        assert_eq!(bufs.iter().count(), 0);

        bufs.push(CandidatePair {
            hit_idx: 0,
            receive_idx: 0,
        });
        assert!(!bufs.is_empty());
        bufs.evaluate(&snaps, 64);
        assert_eq!(bufs.slot_count(), 1);

        bufs.clear();
        assert!(bufs.is_empty());
        assert_eq!(bufs.iter().count(), 0);
    }

    #[test]
    fn layer_mismatch_overwrites_previous_contact() {
        let snaps = snapshots(1);
        let mut bufs = PairBuffers::with_capacity(1);
        bufs.push(CandidatePair {
            hit_idx: 0,
            receive_idx: 0,
        });
        bufs.evaluate(&snaps, 64);
        assert!(bufs.iter().all(|(_, r)| r.is_some()));

        // same slot, but now against a receive whose mask rejects everything
        bufs.clear();
        bufs.push(CandidatePair {
            hit_idx: 0,
            receive_idx: 1,
        });
        bufs.evaluate(&snaps, 64);
        assert!(bufs.iter().all(|(_, r)| r.is_none()));
    }
}
