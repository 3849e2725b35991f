//! The broad phase is responsible for detecting pairs of possibly
//! intersecting shapes for further, more accurate narrow phase inspection.
//!
//! Shapes are projected onto the X/Z ground plane and bucketed into a uniform grid.
//! The grid is cleared and refilled every tick, so it holds nothing across ticks
//! except the memory it has already allocated.
//!
//! Rectangles spanning more than [`MAX_CELLS_PER_RECT`] cells aren't walked cell by cell.
//! Such items are kept in a separate list that every query yields,
//! and such queries yield every item in the grid.

use crate::collider::{Capsule, HitShape};
use std::collections::HashMap;

type CellKey = (i32, i32);

/// Largest number of cells a single insert or query visits.
pub const MAX_CELLS_PER_RECT: i64 = 4096;

/// Inclusive cell index bounds of a rectangle.
#[derive(Clone, Copy, Debug)]
struct CellRange {
    min_cx: i32,
    max_cx: i32,
    min_cz: i32,
    max_cz: i32,
}

impl CellRange {
    /// Computed in `i64` since the bounds can be anywhere in the `i32` range.
    fn cell_count(&self) -> i64 {
        let w = (self.max_cx as i64 - self.min_cx as i64 + 1).max(0);
        let h = (self.max_cz as i64 - self.min_cz as i64 + 1).max(0);
        w * h
    }

    fn is_oversized(&self) -> bool {
        self.cell_count() > MAX_CELLS_PER_RECT
    }
}

/// An axis-aligned rectangle on the X/Z plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundRect {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl GroundRect {
    pub fn from_circle(center: crate::math::Vec3, radius: f32) -> Self {
        GroundRect {
            min_x: center.x - radius,
            max_x: center.x + radius,
            min_z: center.z - radius,
            max_z: center.z + radius,
        }
    }

    /// Bounds of a capsule projected onto the ground.
    /// Negative radii are treated as zero.
    pub fn from_capsule(capsule: &Capsule) -> Self {
        let r = capsule.radius.max(0.0);
        let (a, b) = (capsule.start, capsule.end);
        GroundRect {
            min_x: a.x.min(b.x) - r,
            max_x: a.x.max(b.x) + r,
            min_z: a.z.min(b.z) - r,
            max_z: a.z.max(b.z) + r,
        }
    }

    pub fn from_hit_shape(shape: &HitShape) -> Self {
        match shape {
            HitShape::Sphere(s) => Self::from_circle(s.center, s.radius),
            HitShape::Box(b) => {
                let [half_x, half_z] = b.ground_half_extents();
                GroundRect {
                    min_x: b.center.x - half_x,
                    max_x: b.center.x + half_x,
                    min_z: b.center.z - half_z,
                    max_z: b.center.z + half_z,
                }
            }
            HitShape::Sweep(c) => Self::from_capsule(c),
        }
    }

    fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_z.is_finite()
            && self.max_z.is_finite()
    }
}

/// A uniform grid over the ground plane with a fixed cell size.
///
/// Items are identified by small dense indices (positions in the per-tick hit snapshot).
#[derive(Debug)]
pub struct UniformGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
    // reverse index from item to the cells it covers, for removal
    item_cells: HashMap<usize, Vec<CellKey>>,
    // items too large to insert cell by cell, matched by every query
    oversized: Vec<usize>,
    // emptied vectors kept around so refilling the grid doesn't allocate
    spare_items: Vec<Vec<usize>>,
    spare_keys: Vec<Vec<CellKey>>,
    // timestamping used to keep track of which items were already yielded by a query
    last_timestamp: u32,
    timestamps: Vec<u32>,
}

impl UniformGrid {
    /// Create an empty grid. `cell_size` must be positive,
    /// which the detection engine checks before getting here.
    pub fn new(cell_size: f32) -> Self {
        UniformGrid {
            cell_size,
            cells: HashMap::new(),
            item_cells: HashMap::new(),
            oversized: Vec::new(),
            spare_items: Vec::new(),
            spare_keys: Vec::new(),
            last_timestamp: 0,
            timestamps: Vec::new(),
        }
    }

    /// Remove everything, keeping allocated memory for the next fill.
    pub fn clear(&mut self) {
        for (_, mut items) in self.cells.drain() {
            items.clear();
            self.spare_items.push(items);
        }
        for (_, mut keys) in self.item_cells.drain() {
            keys.clear();
            self.spare_keys.push(keys);
        }
        self.oversized.clear();
        self.last_timestamp = 0;
        for ts in &mut self.timestamps {
            *ts = 0;
        }
    }

    /// Number of items currently in the grid.
    pub fn len(&self) -> usize {
        self.item_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_cells.is_empty()
    }

    /// Insert an item covering `rect`, replacing its previous placement if it had one.
    ///
    /// Rectangles with non-finite bounds are not inserted,
    /// so such items never become candidates.
    pub fn upsert(&mut self, id: usize, rect: GroundRect) {
        self.remove(id);
        if !rect.is_finite() {
            log::trace!("Skipping grid insert of item {} with non-finite bounds", id);
            return;
        }

        if id >= self.timestamps.len() {
            self.timestamps.resize(id + 1, 0);
        }

        let range = self.cell_range(rect);
        let mut keys = self.spare_keys.pop().unwrap_or_default();
        if range.is_oversized() {
            log::trace!(
                "Item {} covers {} cells, matching it against everything",
                id,
                range.cell_count()
            );
            self.oversized.push(id);
            self.item_cells.insert(id, keys);
            return;
        }

        for cz in range.min_cz..=range.max_cz {
            for cx in range.min_cx..=range.max_cx {
                let key = (cx, cz);
                let spare_items = &mut self.spare_items;
                self.cells
                    .entry(key)
                    .or_insert_with(|| spare_items.pop().unwrap_or_default())
                    .push(id);
                keys.push(key);
            }
        }
        self.item_cells.insert(id, keys);
    }

    /// Remove an item from every cell it covers. Unknown items are ignored.
    pub fn remove(&mut self, id: usize) {
        let mut keys = match self.item_cells.remove(&id) {
            Some(keys) => keys,
            None => return,
        };
        if keys.is_empty() {
            self.oversized.retain(|&item| item != id);
        }
        for key in &keys {
            if let Some(items) = self.cells.get_mut(key) {
                items.retain(|&item| item != id);
                if items.is_empty() {
                    if let Some(items) = self.cells.remove(key) {
                        self.spare_items.push(items);
                    }
                }
            }
        }
        keys.clear();
        self.spare_keys.push(keys);
    }

    /// Collect every item sharing at least one cell with `rect` into `out`,
    /// each item at most once. `out` is cleared first.
    pub fn query_rect(&mut self, rect: GroundRect, out: &mut Vec<usize>) {
        out.clear();
        if !rect.is_finite() || self.item_cells.is_empty() {
            return;
        }

        let range = self.cell_range(rect);
        if range.is_oversized() {
            out.extend(self.item_cells.keys().copied());
            return;
        }

        self.last_timestamp += 1;
        let curr_timestamp = self.last_timestamp;

        for &id in &self.oversized {
            self.timestamps[id] = curr_timestamp;
            out.push(id);
        }
        for cz in range.min_cz..=range.max_cz {
            for cx in range.min_cx..=range.max_cx {
                let items = match self.cells.get(&(cx, cz)) {
                    Some(items) => items,
                    None => continue,
                };
                for &id in items {
                    if self.timestamps[id] == curr_timestamp {
                        continue;
                    }
                    self.timestamps[id] = curr_timestamp;
                    out.push(id);
                }
            }
        }
    }

    /// Collect the candidates for a receive capsule.
    pub fn query_capsule(&mut self, capsule: &Capsule, out: &mut Vec<usize>) {
        self.query_rect(GroundRect::from_capsule(capsule), out);
    }

    #[inline]
    fn to_cell(&self, v: f32) -> i32 {
        // saturating cast
        (v / self.cell_size).floor() as i32
    }

    fn cell_range(&self, rect: GroundRect) -> CellRange {
        CellRange {
            min_cx: self.to_cell(rect.min_x),
            max_cx: self.to_cell(rect.max_x),
            min_cz: self.to_cell(rect.min_z),
            max_cz: self.to_cell(rect.max_z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::{OrientedBox, Sphere};
    use crate::math::{Rotor3, Vec3};

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn query_finds_overlapping_cells_only() {
        let mut grid = UniformGrid::new(1.0);
        grid.upsert(0, GroundRect::from_circle(Vec3::new(0.5, 10.0, 0.5), 0.25));
        grid.upsert(1, GroundRect::from_circle(Vec3::new(5.5, 0.0, 5.5), 0.25));
        grid.upsert(2, GroundRect::from_circle(Vec3::new(-3.5, 0.0, 0.5), 0.25));

        let mut out = Vec::new();
        // height doesn't matter, only the ground projection
        grid.query_capsule(
            &Capsule::new(Vec3::new(0.5, -50.0, 0.5), Vec3::new(0.5, 50.0, 0.5), 0.1),
            &mut out,
        );
        assert_eq!(out, vec![0]);

        grid.query_rect(
            GroundRect {
                min_x: -4.0,
                max_x: 6.0,
                min_z: 0.0,
                max_z: 6.0,
            },
            &mut out,
        );
        assert_eq!(sorted(out.clone()), vec![0, 1, 2]);
    }

    #[test]
    fn multi_cell_items_are_yielded_once() {
        let mut grid = UniformGrid::new(1.0);
        // covers a 5x5 block of cells
        grid.upsert(7, GroundRect::from_circle(Vec3::zero(), 2.0));
        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 3.0), &mut out);
        assert_eq!(out, vec![7]);
        // and again, now that the timestamp has moved on
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 3.0), &mut out);
        assert_eq!(out, vec![7]);
    }

    #[test]
    fn capsule_query_uses_both_endpoints() {
        let mut grid = UniformGrid::new(1.0);
        grid.upsert(0, GroundRect::from_circle(Vec3::new(8.5, 0.0, -6.5), 0.1));
        let mut out = Vec::new();
        grid.query_capsule(
            &Capsule::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(8.5, 0.0, -6.5), 0.0),
            &mut out,
        );
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn rotated_box_covers_its_projection() {
        let mut grid = UniformGrid::new(1.0);
        // a long thin box rotated 90 degrees around Y lies along Z instead of X
        let b = OrientedBox::new(
            Vec3::zero(),
            Rotor3::from_rotation_xz(std::f32::consts::FRAC_PI_2),
            Vec3::new(4.0, 0.5, 0.1),
        );
        grid.upsert(0, GroundRect::from_hit_shape(&HitShape::Box(b)));

        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::new(0.0, 0.0, 3.5), 0.1), &mut out);
        assert_eq!(out, vec![0]);
        grid.query_rect(GroundRect::from_circle(Vec3::new(3.5, 0.0, 0.0), 0.1), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let mut grid = UniformGrid::new(2.0);
        let sphere = HitShape::Sphere(Sphere::new(Vec3::zero(), 3.0));
        grid.upsert(0, GroundRect::from_hit_shape(&sphere));
        grid.upsert(1, GroundRect::from_hit_shape(&sphere));
        assert_eq!(grid.len(), 2);

        grid.remove(0);
        grid.remove(42);
        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 1.0), &mut out);
        assert_eq!(out, vec![1]);

        // moving an item replaces its old placement
        grid.upsert(1, GroundRect::from_circle(Vec3::new(100.0, 0.0, 100.0), 1.0));
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 1.0), &mut out);
        assert!(out.is_empty());

        grid.clear();
        assert!(grid.is_empty());
        grid.query_rect(GroundRect::from_circle(Vec3::new(100.0, 0.0, 100.0), 1.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn bad_bounds_never_match() {
        let mut grid = UniformGrid::new(1.0);
        grid.upsert(0, GroundRect::from_circle(Vec3::new(f32::NAN, 0.0, 0.0), 1.0));
        // negative radius flips the rectangle inside out, covering no cells
        grid.upsert(1, GroundRect::from_circle(Vec3::new(0.5, 0.0, 0.5), -1.0));
        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 5.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn huge_rects_skip_the_cell_walk() {
        let mut grid = UniformGrid::new(1.0);
        grid.upsert(0, GroundRect::from_circle(Vec3::zero(), 1.0e6));
        grid.upsert(1, GroundRect::from_circle(Vec3::new(50.5, 0.0, 50.5), 0.25));
        grid.upsert(2, GroundRect::from_circle(Vec3::new(-50.5, 0.0, 50.5), 0.25));
        assert_eq!(grid.len(), 3);

        // a small query still sees the huge item, once
        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::new(50.5, 0.0, 50.5), 0.1), &mut out);
        assert_eq!(sorted(out.clone()), vec![0, 1]);

        // a huge query sees everything
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), f32::MAX / 2.0), &mut out);
        assert_eq!(sorted(out.clone()), vec![0, 1, 2]);

        grid.remove(0);
        grid.query_rect(GroundRect::from_circle(Vec3::new(50.5, 0.0, 50.5), 0.1), &mut out);
        assert_eq!(out, vec![1]);

        grid.upsert(0, GroundRect::from_circle(Vec3::zero(), 1.0e6));
        grid.clear();
        grid.query_rect(GroundRect::from_circle(Vec3::zero(), 1.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn negative_box_extents_cover_the_same_cells() {
        let mut grid = UniformGrid::new(1.0);
        let b = OrientedBox::axis_aligned(Vec3::zero(), Vec3::new(-2.0, 1.0, -2.0));
        grid.upsert(0, GroundRect::from_hit_shape(&HitShape::Box(b)));
        let mut out = Vec::new();
        grid.query_rect(GroundRect::from_circle(Vec3::new(1.5, 0.0, -1.5), 0.1), &mut out);
        assert_eq!(out, vec![0]);
    }
}
