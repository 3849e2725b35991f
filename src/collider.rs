//! Shapes that can be registered for hit detection
//! and the traits used to read them every tick.

use crate::math::{Rotor3, Vec3};
use parking_lot::RwLock;
use std::sync::Arc;

/// A sphere hit shape.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Sphere { center, radius }
    }
}

/// An oriented box hit shape.
///
/// The box stores its side lengths halved because this makes
/// intersection tests easier.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct OrientedBox {
    pub center: Vec3,
    pub rotation: Rotor3,
    pub half_extents: Vec3,
}

impl OrientedBox {
    pub fn new(center: Vec3, rotation: Rotor3, half_extents: Vec3) -> Self {
        OrientedBox {
            center,
            rotation,
            half_extents,
        }
    }

    /// Create an unrotated box.
    pub fn axis_aligned(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center, Rotor3::identity(), half_extents)
    }

    /// Half-widths of the world-space X/Z rectangle that bounds this box.
    ///
    /// For each ground axis this sums the projections of the three
    /// rotated local axes scaled by their half extents.
    /// The sign of the half extents is ignored, as in the narrow phase.
    pub fn ground_half_extents(&self) -> [f32; 2] {
        let m = self.rotation.into_matrix();
        let e = self.abs_half_extents();
        let half_x = m.cols[0].x.abs() * e.x + m.cols[1].x.abs() * e.y + m.cols[2].x.abs() * e.z;
        let half_z = m.cols[0].z.abs() * e.x + m.cols[1].z.abs() * e.y + m.cols[2].z.abs() * e.z;
        [half_x, half_z]
    }

    /// Half extents with negative components flipped positive.
    pub fn abs_half_extents(&self) -> Vec3 {
        let e = self.half_extents;
        Vec3::new(e.x.abs(), e.y.abs(), e.z.abs())
    }
}

/// A capsule: a line segment swept by a radius.
///
/// Receive shapes are always capsules. Hit sweeps use the same shape.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Capsule {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
}

impl Capsule {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        Capsule { start, end, radius }
    }

    /// Create an upright capsule standing on `bottom`
    /// whose total height, caps included, is `height`.
    ///
    /// If the height is less than the diameter the axis collapses
    /// to a single point one radius above the bottom, which makes the capsule a sphere.
    /// The radius is kept as given, so a negative one never collides.
    /// Returns `None` if the height isn't positive.
    pub fn from_bottom(bottom: Vec3, radius: f32, height: f32) -> Option<Self> {
        if height.is_nan() || height <= 0.0 {
            return None;
        }
        let min_y = bottom.y + radius;
        let max_y = bottom.y + radius.max(height - radius);
        Some(Capsule {
            start: Vec3::new(bottom.x, min_y, bottom.z),
            end: Vec3::new(bottom.x, max_y, bottom.z),
            radius,
        })
    }
}

/// Geometry of a hit (attacking) volume.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum HitShape {
    Sphere(Sphere),
    Box(OrientedBox),
    /// A capsule traced by a moving weapon or projectile.
    Sweep(Capsule),
}

impl From<Sphere> for HitShape {
    fn from(s: Sphere) -> Self {
        HitShape::Sphere(s)
    }
}
impl From<OrientedBox> for HitShape {
    fn from(b: OrientedBox) -> Self {
        HitShape::Box(b)
    }
}

/// Bitmask gating which hit and receive shapes may interact.
/// A pair is eligible if the masks share at least one bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(!0);
    pub const NONE: LayerMask = LayerMask(0);

    /// Mask with only the given layer bit set.
    /// Layers past 31 don't exist and give an empty mask.
    pub const fn layer(idx: u32) -> Self {
        match 1u32.checked_shl(idx) {
            Some(bit) => LayerMask(bit),
            None => LayerMask::NONE,
        }
    }

    #[inline]
    pub fn interacts_with(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::ALL
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        LayerMask(self.0 | rhs.0)
    }
}

//
// geometry providers
//

/// Source of a hit shape, read once at the start of every tick.
///
/// Plain shapes implement this for geometry that never moves.
/// For geometry that changes between ticks, share it as an `Arc<RwLock<_>>`
/// and write to it from the owning side.
pub trait HitGeometry: Send + Sync {
    fn hit_shape(&self) -> HitShape;
}

/// Source of a receive capsule, read once at the start of every tick.
pub trait ReceiveGeometry: Send + Sync {
    fn capsule(&self) -> Capsule;
}

impl HitGeometry for HitShape {
    fn hit_shape(&self) -> HitShape {
        *self
    }
}
impl HitGeometry for Sphere {
    fn hit_shape(&self) -> HitShape {
        HitShape::Sphere(*self)
    }
}
impl HitGeometry for OrientedBox {
    fn hit_shape(&self) -> HitShape {
        HitShape::Box(*self)
    }
}

impl ReceiveGeometry for Capsule {
    fn capsule(&self) -> Capsule {
        *self
    }
}

impl<T: HitGeometry> HitGeometry for Arc<RwLock<T>> {
    fn hit_shape(&self) -> HitShape {
        self.read().hit_shape()
    }
}
impl<T: ReceiveGeometry> ReceiveGeometry for Arc<RwLock<T>> {
    fn capsule(&self) -> Capsule {
        self.read().capsule()
    }
}
