//! Network fetches for URL inputs

use reqwest::header::CONTENT_DISPOSITION;

use super::naming::{name_from_content_disposition, name_from_url};
use super::{FetchRequest, ResolveContext};
use crate::abort;
use crate::error::{Error, Result};

pub(super) struct Fetched {
    pub response: reqwest::Response,
    pub name: Option<String>,
}

/// Send the request and check the status; the body is left unread.
pub(super) async fn fetch(request: &FetchRequest, ctx: &ResolveContext) -> Result<Fetched> {
    abort::check(ctx.signal.as_ref())?;

    let url = request.url.to_string();
    let mut builder = ctx.client()?.get(request.url.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    tracing::debug!(url = %url, "fetching input");
    let response = builder.send().await.map_err(|source| Error::Network {
        url: url.clone(),
        source,
    })?;
    abort::check(ctx.signal.as_ref())?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = status.as_u16(), "fetch failed");
        return Err(Error::Fetch {
            url,
            status,
            headers: response.headers().clone(),
        });
    }

    let name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(name_from_content_disposition)
        .or_else(|| name_from_url(response.url()));

    Ok(Fetched { response, name })
}
