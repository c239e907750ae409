//! Data models for LiftLog sync

mod body_metric;
mod entity;
mod registry;
mod sync_conflict;
mod sync_state;
mod workout;

pub use body_metric::BodyMetric;
pub use entity::{EntityId, SyncEntity, Syncable};
pub use registry::{EntityCodec, EntityRegistry};
pub use sync_conflict::SyncConflict;
pub use sync_state::SyncState;
pub use workout::{WorkoutSession, WorkoutSet};
