//! Offline-first sync engine.
//!
//! [`SyncOrchestrator`] pushes pending local writes, then pulls server
//! changes. The local side is any [`LocalStore`](crate::db::LocalStore), the
//! server side any [`RemoteSyncClient`]; [`HttpSyncClient`] is the production
//! transport.

mod cancel;
mod conflict;
mod http;
mod orchestrator;
mod protocol;
mod pull;
mod push;
mod remote;


pub use cancel::CancellationSignal;
pub use conflict::ConflictResolver;
pub use http::HttpSyncClient;
pub use orchestrator::{SyncOrchestrator, SyncPhase, SyncResult};
pub use protocol::{
    PullOutcome, PullRequest, PullResponse, PushConflict, PushEntity, PushOutcome, PushRequest,
    PushResponse, RemoteEntity, ResolutionDirective,
};
pub use pull::{PullCoordinator, PullSummary};
pub use push::{PushCoordinator, PushSummary};
pub use remote::RemoteSyncClient;
