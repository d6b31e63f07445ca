//! The streaming filing record. Definition lives here so both the config's
//! event type and the streaming client (`secapi-stream`) can share it
//! without a circular crate dependency; decoding from the wire frame is
//! `secapi-stream`'s job.

/// One filing delivered over the streaming feed. Server keys are camelCase;
/// callers always see the normalized snake_case fields below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFiling {
    pub accession_no: String,
    pub form_type: String,
    /// Unix seconds.
    pub filed_at: i64,
    pub cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
}
