//! Hit detection between attack volumes and the capsules that receive them.
//!
//! Every [`update`][HitDetection::update] runs the same pipeline:
//! 1. read every registered shape into flat per-tick snapshots,
//! 2. rebuild the ground-plane grid from the hit shapes and query it
//!    with each receive capsule to get candidate pairs,
//! 3. run the narrow phase on all candidates (in parallel with the `parallel` feature),
//! 4. compare touching pairs with the previous tick's and notify listeners
//!    with enter, stay and exit events.

use crate::{
    collider::{HitGeometry, LayerMask, ReceiveGeometry},
    event::SharedListener,
};

pub mod batch;
use batch::{CandidatePair, PairBuffers};

pub mod debug;
pub use debug::{DebugContact, DebugFrame};
use debug::DebugRecorder;

pub mod grid;
use grid::{GroundRect, UniformGrid};

pub mod registry;
pub use registry::{HitId, HitSnapshot, ReceiveId, ReceiveSnapshot};
use registry::{Registry, Snapshots};

pub mod shape_shape;
pub use shape_shape::Contact;

pub mod tracker;
use tracker::{ContactTracker, PairKey};
pub use tracker::TransitionCounts;

//

/// Parameters for constructing a [`HitDetection`][self::HitDetection].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct HitDetectionParams {
    /// Side length of the square cells of the broad phase grid, in world units.
    /// Should be somewhat larger than a typical hit shape.
    /// Shapes covering more than [`grid::MAX_CELLS_PER_RECT`] cells are tested
    /// against every other shape instead of going through the grid.
    pub cell_size: f32,
    /// Number of candidate pairs handed to a worker thread at a time.
    pub chunk_size: usize,
    /// Number of candidate pairs to allocate room for up front.
    pub initial_pair_capacity: usize,
}

impl Default for HitDetectionParams {
    fn default() -> Self {
        Self {
            cell_size: 5.0,
            chunk_size: 64,
            initial_pair_capacity: 256,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum DetectionError {
    #[error("Grid cell size must be finite and positive, got {0}")]
    InvalidCellSize(f32),
    #[error("Batch chunk size must be at least 1")]
    InvalidChunkSize,
    #[error("The detection engine has been released")]
    Released,
}

/// The hit detection engine.
///
/// `P` is the type of data attached to hit shapes and handed back in events,
/// e.g. the damage an attack does.
pub struct HitDetection<P = ()> {
    params: HitDetectionParams,
    registry: Registry<P>,
    grid: UniformGrid,
    snapshots: Snapshots,
    pairs: PairBuffers,
    tracker: ContactTracker<P>,
    debug: DebugRecorder,
    // scratch buffer for grid query results
    candidates: Vec<usize>,
    released: bool,
}

impl<P: Clone + Send + Sync + 'static> HitDetection<P> {
    pub fn new(params: HitDetectionParams) -> Result<Self, DetectionError> {
        if !(params.cell_size.is_finite() && params.cell_size > 0.0) {
            return Err(DetectionError::InvalidCellSize(params.cell_size));
        }
        if params.chunk_size == 0 {
            return Err(DetectionError::InvalidChunkSize);
        }

        Ok(HitDetection {
            params,
            registry: Registry::new(),
            grid: UniformGrid::new(params.cell_size),
            snapshots: Snapshots::default(),
            pairs: PairBuffers::with_capacity(params.initial_pair_capacity),
            tracker: ContactTracker::new(),
            debug: DebugRecorder::default(),
            candidates: Vec::new(),
            released: false,
        })
    }

    /// Create an engine with the given grid cell size and defaults for everything else.
    pub fn with_cell_size(cell_size: f32) -> Result<Self, DetectionError> {
        Self::new(HitDetectionParams {
            cell_size,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &HitDetectionParams {
        &self.params
    }

    fn check_alive(&self) -> Result<(), DetectionError> {
        if self.released {
            Err(DetectionError::Released)
        } else {
            Ok(())
        }
    }

    /// Register a hit shape.
    ///
    /// The geometry is read at the start of every update. Pass a plain shape
    /// for something that doesn't move, or an `Arc<RwLock<_>>` around one
    /// to keep moving it from the outside.
    pub fn register_hit(
        &mut self,
        geometry: impl HitGeometry + 'static,
        layer_mask: LayerMask,
        payload: P,
    ) -> Result<HitId, DetectionError> {
        self.check_alive()?;
        let id = self.registry.add_hit(Box::new(geometry), layer_mask, payload);
        log::debug!("Registered hit shape {:?}", id);
        Ok(id)
    }

    /// Register a receive capsule.
    ///
    /// Events for pairs involving this capsule go to `listener`.
    /// Without a listener the capsule still takes part in detection
    /// but nobody hears about it.
    pub fn register_receive(
        &mut self,
        geometry: impl ReceiveGeometry + 'static,
        listener: Option<SharedListener<P>>,
        layer_mask: LayerMask,
    ) -> Result<ReceiveId, DetectionError> {
        self.check_alive()?;
        let id = self
            .registry
            .add_receive(Box::new(geometry), listener, layer_mask);
        log::debug!("Registered receive shape {:?}", id);
        Ok(id)
    }

    /// Remove a hit shape. Unknown ids are ignored.
    ///
    /// Receives touching the shape get an exit event on the next update.
    pub fn unregister_hit(&mut self, id: HitId) -> Result<(), DetectionError> {
        self.check_alive()?;
        if self.registry.remove_hit(id) {
            log::debug!("Unregistered hit shape {:?}", id);
        } else {
            log::trace!("Tried to unregister unknown hit shape {:?}", id);
        }
        Ok(())
    }

    /// Remove a receive capsule. Unknown ids are ignored.
    ///
    /// The capsule's listener is dropped with it and won't get exit events
    /// for contacts that were ongoing.
    pub fn unregister_receive(&mut self, id: ReceiveId) -> Result<(), DetectionError> {
        self.check_alive()?;
        if self.registry.remove_receive(id) {
            log::debug!("Unregistered receive shape {:?}", id);
        } else {
            log::trace!("Tried to unregister unknown receive shape {:?}", id);
        }
        Ok(())
    }

    /// Detect contacts and notify listeners. Call once per simulation tick.
    ///
    /// Listeners are called on the calling thread before this returns.
    /// Returns how many of each event were produced,
    /// including events for receives without a listener.
    pub fn update(&mut self) -> Result<TransitionCounts, DetectionError> {
        self.check_alive()?;

        {
            let _span = tracy_span!("snapshot shapes", "update");
            self.registry.snapshot_into(&mut self.snapshots);
            self.debug.begin(&self.snapshots);
        }

        {
            let _span = tracy_span!("broad phase", "update");
            self.grid.clear();
            for (hit_idx, hit) in self.snapshots.hits.iter().enumerate() {
                self.grid.upsert(hit_idx, GroundRect::from_hit_shape(&hit.shape));
            }

            self.pairs.clear();
            for (receive_idx, receive) in self.snapshots.receives.iter().enumerate() {
                self.grid.query_capsule(&receive.capsule, &mut self.candidates);
                // registration order within each receive
                self.candidates.sort_unstable();
                for &hit_idx in &self.candidates {
                    self.pairs.push(CandidatePair {
                        hit_idx,
                        receive_idx,
                    });
                }
            }
        }

        self.pairs.evaluate(&self.snapshots, self.params.chunk_size);

        let counts = {
            let _span = tracy_span!("dispatch events", "update");
            let hit_entries = self.registry.hits();
            let receive_entries = self.registry.receives();
            for (pair, result) in self.pairs.iter() {
                let contact = match result {
                    Some(contact) => contact,
                    None => continue,
                };
                let (hit, receive) = match (
                    hit_entries.get(pair.hit_idx),
                    receive_entries.get(pair.receive_idx),
                ) {
                    (Some(hit), Some(receive)) => (hit, receive),
                    _ => continue,
                };

                self.tracker.record(
                    PairKey {
                        hit_id: hit.id,
                        receive_id: receive.id,
                        payload: hit.payload.clone(),
                    },
                    &contact,
                    receive.listener.as_ref(),
                );
                self.debug.add_contact(hit.id, receive.id, &contact);
            }
            self.tracker.finish_tick(&self.registry)
        };

        self.debug.commit();

        log::trace!(
            "Hit detection tick: {} hits, {} receives, {} candidates, {} enter, {} stay, {} exit",
            self.snapshots.hits.len(),
            self.snapshots.receives.len(),
            self.pairs.len(),
            counts.enters,
            counts.stays,
            counts.exits,
        );

        Ok(counts)
    }

    /// Free all memory and drop every shape and listener.
    ///
    /// No events are sent for contacts that were ongoing.
    /// Afterwards every operation fails with [`DetectionError::Released`].
    /// Releasing again does nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.registry.clear();
        self.grid = UniformGrid::new(self.params.cell_size);
        self.snapshots = Snapshots::default();
        self.pairs = PairBuffers::default();
        self.tracker.clear();
        self.debug.clear();
        self.candidates = Vec::new();
        self.released = true;
        log::debug!("Released hit detection");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn hit_count(&self) -> usize {
        self.registry.hits().len()
    }

    pub fn receive_count(&self) -> usize {
        self.registry.receives().len()
    }

    /// Whether the pair was touching as of the last update.
    pub fn is_touching(&self, hit_id: HitId, receive_id: ReceiveId) -> bool {
        self.tracker.is_touching(hit_id, receive_id)
    }

    /// Turn recording of [`DebugFrame`][self::DebugFrame]s on or off. Off by default.
    pub fn set_debug_enabled(&mut self, enabled: bool) {
        self.debug.set_enabled(enabled);
    }

    /// The shapes and contacts of the last update, if debug recording is on
    /// and an update has happened since turning it on.
    pub fn debug_frame(&self) -> Option<&DebugFrame> {
        self.debug.frame()
    }
}
