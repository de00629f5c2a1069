pub mod destination;
pub mod lifecycle;

pub use destination::Destination;
pub use lifecycle::{
    LifecycleEvent, LifecycleEventKind, LifecycleState, ProgressDetail, StopDetail, StreamDetail,
    MAX_CURRENCY_SCALE,
};

/// Errors raised while validating a payload delivered by the host.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("currency scale {0} exceeds the supported maximum of {max}", max = MAX_CURRENCY_SCALE)]
    ScaleOutOfRange(u32),
}
