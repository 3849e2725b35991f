//! Types, aliases and helper operations for doing math with `ultraviolet`.
//!
//! All geometry is in world space with Y pointing up,
//! so the "ground plane" used by the broad phase is X/Z.
pub use ultraviolet as uv;

pub type Vec3 = uv::Vec3;
pub type Rotor3 = uv::Rotor3;

/// Squared lengths below this are treated as zero.
pub const LENGTH_SQ_EPSILON: f32 = 1e-8;
/// Squared segment lengths below this make the segment a point.
pub const SEGMENT_SQ_EPSILON: f32 = 1e-12;

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec3> {
    pub const fn new_unchecked(v: Vec3) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec3::unit_x())
    }

    pub fn unit_z() -> Self {
        Unit(Vec3::unit_z())
    }

    /// Unwrap into the plain vector.
    #[inline]
    pub fn into_inner(self) -> Vec3 {
        self.0
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// segment utils

/// Parameter in `[0, 1]` of the point on segment `a..b` closest to `p`.
/// Degenerate segments return 0.
#[inline]
pub fn closest_t_on_segment(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    let ab = b - a;
    let ab_len_sq = ab.mag_sq();
    if ab_len_sq <= SEGMENT_SQ_EPSILON {
        return 0.0;
    }
    ((p - a).dot(ab) / ab_len_sq).clamp(0.0, 1.0)
}

/// The point on segment `a..b` closest to `p`.
#[inline]
pub fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> Vec3 {
    a + (b - a) * closest_t_on_segment(a, b, p)
}

/// Closest points between segments `p1..q1` and `p2..q2`,
/// returned in that order.
///
/// Handles both segments degenerating into points, either one doing so,
/// and the general case including parallel segments.
pub fn closest_points_between_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> [Vec3; 2] {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.mag_sq();
    let e = d2.mag_sq();
    let f = d2.dot(r);

    if a <= SEGMENT_SQ_EPSILON && e <= SEGMENT_SQ_EPSILON {
        return [p1, p2];
    }

    let (s, t) = if a <= SEGMENT_SQ_EPSILON {
        // first segment is a point
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= SEGMENT_SQ_EPSILON {
            // second segment is a point
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            // parallel segments have denom 0, any s works so start from p1
            let s = if denom > 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };

    [p1 + d1 * s, p2 + d2 * t]
}

/// Normalize `v`, falling back to a direction derived from segment `seg_a..seg_b`
/// when `v` is too short to have a direction.
///
/// The fallback is perpendicular to the segment, picked by crossing the segment
/// direction with the Y axis (or X if the segment is nearly vertical).
/// If the segment itself is degenerate the fallback is the X axis.
pub fn safe_normalize_from_segment(v: Vec3, seg_a: Vec3, seg_b: Vec3) -> Unit<Vec3> {
    let len_sq = v.mag_sq();
    if len_sq > LENGTH_SQ_EPSILON {
        return Unit::new_unchecked(v / len_sq.sqrt());
    }

    let seg_dir = seg_b - seg_a;
    let seg_len_sq = seg_dir.mag_sq();
    if seg_len_sq <= LENGTH_SQ_EPSILON {
        return Unit::unit_x();
    }
    let seg_dir = seg_dir / seg_len_sq.sqrt();

    let basis = if seg_dir.y.abs() < 0.99 {
        Vec3::unit_y()
    } else {
        Vec3::unit_x()
    };
    let n = seg_dir.cross(basis);
    let n_len_sq = n.mag_sq();
    if n_len_sq <= LENGTH_SQ_EPSILON {
        return Unit::unit_x();
    }
    Unit::new_unchecked(n / n_len_sq.sqrt())
}

/// Clamp a point componentwise into the box `[-half_extents, half_extents]`.
///
/// Half extents are expected to be non-negative.
/// Unlike `f32::clamp` this doesn't panic if they aren't.
#[inline]
pub fn clamp_to_extents(p: Vec3, half_extents: Vec3) -> Vec3 {
    let e = half_extents;
    Vec3::new(
        p.x.max(-e.x).min(e.x),
        p.y.max(-e.y).min(e.y),
        p.z.max(-e.z).min(e.z),
    )
}
