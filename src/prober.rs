use std::time::{Duration, Instant};

use crate::models::{Observation, Target};
use crate::transport::{Transport, TransportError};

/// Bodies are clipped to this bound before classification.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Issues exactly one probe request: substitutes `payload` for
/// `parameter`'s value, sends, and times from just before send to just
/// after the full body is received. No retries here; that is scanner
/// policy.
pub async fn probe<T: Transport + ?Sized>(
    transport: &T,
    target: &Target,
    parameter: &str,
    payload: &str,
    timeout: Duration,
) -> Result<Observation, TransportError> {
    let url = target.probe_url(parameter, payload);

    let start = Instant::now();
    let resp = transport.fetch(url.as_str(), timeout).await?;
    let elapsed = start.elapsed();

    Ok(Observation {
        status: resp.status,
        body: truncate_body(resp.body),
        elapsed,
    })
}

/// Clips to MAX_BODY_BYTES on a char boundary.
fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_BODY_BYTES {
        let mut cut = MAX_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
