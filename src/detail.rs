//! Notice detail retrieval.
//!
//! Notices can be withdrawn between listing and detail fetch, so every
//! failure here is a [`Skip`] for that identifier, never an error for the run.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::Skip;
use crate::fetch::{HttpClient, fetch_bytes, parse_url};
use crate::record::NoticeId;

/// Substitutes the identifier into the template (`{}` or `{id}`).
pub fn detail_url(template: &str, id: &NoticeId) -> String {
    template.replace("{id}", id.as_str()).replace("{}", id.as_str())
}

/// Retrieves the raw detail document for one identifier.
pub async fn fetch_detail<C: HttpClient + ?Sized>(
    client: &C,
    settings: &Settings,
    id: &NoticeId,
) -> Result<Bytes, Skip> {
    let url = detail_url(&settings.detail_url_template, id);
    let parsed = parse_url(&url).map_err(|e| Skip::Transport(e.to_string()))?;

    let fetched = fetch_bytes(client, &parsed, settings.retry)
        .await
        .map_err(|e| {
            warn!(notam = %id, url = %url, error = %e, "Detail fetch failed");
            Skip::from_transport(&e)
        })?;

    if !fetched.is_success() {
        let status = fetched.status.as_u16();
        warn!(notam = %id, url = %url, status, "Detail document unavailable");
        return Err(Skip::DetailStatus { status });
    }

    debug!(notam = %id, bytes = fetched.body.len(), "Detail document received");
    Ok(fetched.body)
}
