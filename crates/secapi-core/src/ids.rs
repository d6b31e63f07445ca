//! Request id generation.

use uuid::Uuid;

/// Mints a fresh request id. Called by the pipeline driver only when the
/// descriptor did not carry a pre-assigned `optional_request_id`.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
