//! Route table.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::RpcState;

/// Build the admin router. `/metrics` is mounted only when `with_metrics`.
pub fn router(state: RpcState, with_metrics: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/participants", post(handlers::register_participant))
        .route(
            "/proposals",
            get(handlers::list_proposals).post(handlers::create_proposal),
        )
        .route("/proposals/:id", get(handlers::get_proposal))
        .route("/proposals/:id/actions", post(handlers::submit_action))
        .route("/proposals/:id/resolve", post(handlers::resolve))
        .route("/proposals/:id/tally", get(handlers::get_tally))
        .route("/proposals/:id/audit", get(handlers::get_audit))
        .route(
            "/proposals/:id/snapshots",
            get(handlers::list_snapshots).post(handlers::take_snapshot),
        );
    if with_metrics {
        router = router.route("/metrics", get(handlers::metrics));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}
