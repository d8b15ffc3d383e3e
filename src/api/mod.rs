// =============================================================================
// Thin HTTP/WebSocket control surface (spec §6, out of scope per §1 except
// as an external interface the core publishes through)
// =============================================================================
//
// Kept deliberately thin: axum wiring only, no business logic. Grounded on
// the teacher's `api/rest.rs` router-construction shape (permissive
// development CORS, `/api/v1/*` prefix, state extractor) and `api/ws.rs`'s
// push-loop structure, with the teacher's bearer-token `AuthBearer`
// extractor dropped — there is no order/balance endpoint left to protect
// (spec §1 Non-goals), so carrying auth over here would guard nothing.
// =============================================================================

pub mod rest;
pub mod ws;

use std::sync::Arc;

use crate::config::FilteringConfig;
use crate::publish::PublishPort;
use crate::status::StatusTracker;

/// Shared state handed to every axum handler. Deliberately narrow: the API
/// surface only ever reads already-computed snapshots, never the store or
/// engine internals directly.
#[derive(Clone)]
pub struct ApiState {
    pub publish: Arc<PublishPort>,
    pub status: Arc<StatusTracker>,
    pub filtering: FilteringConfig,
}
