//! Decoding one server frame (a JSON array of filing objects) into
//! [`StreamFiling`] records. Per spec.md §4.6: coercion failure drops the
//! single element, never the whole frame.

use secapi_core::StreamFiling;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFiling {
    accession_no: String,
    form_type: String,
    filed_at: i64,
    cik: String,
    company_name: String,
    ticker: Option<String>,
}

impl From<WireFiling> for StreamFiling {
    fn from(wire: WireFiling) -> Self {
        StreamFiling {
            accession_no: wire.accession_no,
            form_type: wire.form_type,
            filed_at: wire.filed_at,
            cik: wire.cik,
            company_name: wire.company_name,
            ticker: wire.ticker,
        }
    }
}

/// One element that failed to coerce into a [`StreamFiling`]; carries just
/// enough to let the caller log a useful warning.
#[derive(Debug)]
pub struct DecodeError {
    pub detail: String,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to decode filing element: {}", self.detail)
    }
}

/// Parses one server frame. Returns one entry per array element: `Ok` for
/// a successfully coerced filing, `Err` for one that should be dropped
/// with a logged warning. A frame that isn't a JSON array is itself a
/// decode error and yields a single `Err`.
pub fn decode_frame(frame: &str) -> Vec<Result<StreamFiling, DecodeError>> {
    let elements: Vec<serde_json::Value> = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(err) => return vec![Err(DecodeError { detail: format!("frame is not a JSON array: {err}") })],
    };

    elements
        .into_iter()
        .map(|value| {
            serde_json::from_value::<WireFiling>(value)
                .map(StreamFiling::from)
                .map_err(|err| DecodeError { detail: err.to_string() })
        })
        .collect()
}
