//! Narrow phase: exact tests between a hit shape and a receive capsule.
//!
//! Every test reports the contact from the receive side:
//! the point lies on the capsule's surface and the normal
//! points out of the capsule towards the hit shape.
//! Negative radii never collide.

use crate::collider::{Capsule, HitShape, OrientedBox, Sphere};
use crate::math::{self as m, Unit, Vec3};

/// A contact between a hit shape and a receive capsule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Point on the surface of the receive capsule, in world space.
    pub point: Vec3,
    /// Outward normal of the receive capsule, facing the hit shape.
    pub normal: Unit<Vec3>,
}

/// Checks a hit shape against a receive capsule for intersection.
pub fn intersection_check(hit: &HitShape, receive: &Capsule) -> Option<Contact> {
    match hit {
        HitShape::Sphere(s) => sphere_capsule(s, receive),
        HitShape::Box(b) => box_capsule(b, receive),
        HitShape::Sweep(c) => capsule_capsule(c, receive),
    }
}

//
// SPHERE <-> CAPSULE
//

/// Touching counts as colliding: the distance test is inclusive.
pub fn sphere_capsule(sphere: &Sphere, cap: &Capsule) -> Option<Contact> {
    if cap.radius < 0.0 || sphere.radius < 0.0 {
        return None;
    }

    let axis_point = m::closest_point_on_segment(cap.start, cap.end, sphere.center);
    let to_center = sphere.center - axis_point;
    let r_sum = cap.radius + sphere.radius;
    if to_center.mag_sq() > r_sum * r_sum {
        return None;
    }

    // sphere center on the axis has no direction, one is made up from the segment
    let normal = m::safe_normalize_from_segment(to_center, cap.start, cap.end);
    Some(Contact {
        point: axis_point + *normal * cap.radius,
        normal,
    })
}

//
// BOX <-> CAPSULE
//

/// Closest pair found so far between a segment and a box, in box-local space.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SegmentBoxSample {
    pub dist_sq: f32,
    pub axis_point: Vec3,
    pub box_point: Vec3,
}

/// Approximate the closest points between segment `a..b` and the box
/// `[-half_extents, half_extents]` by sampling the segment.
///
/// The samples are the endpoints, the midpoint and every point where the segment
/// crosses one of the six face planes. Each sample is clamped into the box and the
/// closest sample/box pair is kept. This is not an exact segment-box distance:
/// for segments passing diagonally near an edge the true minimum can lie
/// between samples, making the test slightly conservative there.
pub(crate) fn sample_segment_box(a: Vec3, b: Vec3, half_extents: Vec3) -> SegmentBoxSample {
    let mut best = SegmentBoxSample {
        dist_sq: f32::INFINITY,
        axis_point: a,
        box_point: m::clamp_to_extents(a, half_extents),
    };
    let d = b - a;

    let mut evaluate = |t: f32| {
        let t = t.clamp(0.0, 1.0);
        let p = a + d * t;
        let c = m::clamp_to_extents(p, half_extents);
        let dist_sq = (p - c).mag_sq();
        if dist_sq < best.dist_sq {
            best = SegmentBoxSample {
                dist_sq,
                axis_point: p,
                box_point: c,
            };
        }
    };

    evaluate(0.0);
    evaluate(1.0);
    evaluate(0.5);

    // face plane crossings
    for (start, delta, extent) in [
        (a.x, d.x, half_extents.x),
        (a.y, d.y, half_extents.y),
        (a.z, d.z, half_extents.z),
    ] {
        if delta.abs() < 1e-8 {
            continue;
        }
        for plane in [extent, -extent] {
            let t = (plane - start) / delta;
            if (0.0..=1.0).contains(&t) {
                evaluate(t);
            }
        }
    }

    best
}

pub fn box_capsule(b: &OrientedBox, cap: &Capsule) -> Option<Contact> {
    if cap.radius < 0.0 {
        return None;
    }

    // move the capsule to box-local space where the box is axis-aligned at the origin
    let inv_rot = b.rotation.reversed();
    let a_local = inv_rot * (cap.start - b.center);
    let b_local = inv_rot * (cap.end - b.center);
    let half_extents = b.abs_half_extents();

    let sample = sample_segment_box(a_local, b_local, half_extents);
    // NaN distances fail this comparison and count as misses
    if !(sample.dist_sq <= cap.radius * cap.radius) {
        return None;
    }

    let axis_point = b.center + b.rotation * sample.axis_point;
    let box_point = b.center + b.rotation * sample.box_point;
    // axis inside the box has no direction, one is made up from the segment
    let normal = m::safe_normalize_from_segment(box_point - axis_point, cap.start, cap.end);
    Some(Contact {
        point: axis_point + *normal * cap.radius,
        normal,
    })
}

//
// CAPSULE <-> CAPSULE
//

/// Test a swept capsule (the hit) against a receive capsule.
pub fn capsule_capsule(sweep: &Capsule, cap: &Capsule) -> Option<Contact> {
    if sweep.radius < 0.0 || cap.radius < 0.0 {
        return None;
    }

    let [on_sweep, on_receive] =
        m::closest_points_between_segments(sweep.start, sweep.end, cap.start, cap.end);
    let between = on_sweep - on_receive;
    let r_sum = sweep.radius + cap.radius;
    if between.mag_sq() > r_sum * r_sum {
        return None;
    }

    let normal = m::safe_normalize_from_segment(between, cap.start, cap.end);
    Some(Contact {
        point: on_receive + *normal * cap.radius,
        normal,
    })
}
