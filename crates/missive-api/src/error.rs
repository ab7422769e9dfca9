use axum::http::StatusCode;
use tracing::{error, warn};

use missive_db::StoreError;

/// Maps a store failure to the status returned to the client. Expected
/// outcomes pass through quietly; faults are logged here so handlers don't have to.
pub fn status_for(op: &str, err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Conflict => StatusCode::CONFLICT,
        StoreError::DeadlineExceeded => {
            warn!("{} timed out", op);
            StatusCode::GATEWAY_TIMEOUT
        }
        StoreError::Cancelled => {
            warn!("{} cancelled", op);
            StatusCode::SERVICE_UNAVAILABLE
        }
        other => {
            error!("{} failed: {}", op, other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
