/// Open a Tracy profiling span that closes when the returned value is dropped.
/// Does nothing unless the `tracy` feature is on and a Tracy client is running.
macro_rules! tracy_span {
    ($name:expr, $fn_name:expr) => {
        tracy_client::Client::running()
            .map(|c| c.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}

pub mod math;
pub use math::{uv, Rotor3, Unit, Vec3};

pub mod collider;
pub use collider::{Capsule, HitGeometry, HitShape, LayerMask, OrientedBox, ReceiveGeometry, Sphere};

pub mod event;
pub use event::{CollisionEvent, CollisionListener, Event, EventSink, SharedListener};

pub mod detection;
pub use detection::{
    Contact, DebugContact, DebugFrame, DetectionError, HitDetection, HitDetectionParams, HitId,
    ReceiveId, TransitionCounts,
};
