//! Story source download.
//!
//! Split out of the registry so routing tests can exercise story mutations
//! without a network.

use thiserror::Error;

/// Failures fetching story source. These come from user-supplied URLs, so
/// they render as user-facing text.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("location given is not a valid URL")]
    InvalidUrl,

    #[error("only http and https URLs are accepted")]
    Scheme,

    #[error("could not fetch story source from the URL given")]
    Request(#[from] reqwest::Error),
}

/// Download story source from an http(s) URL.
pub async fn fetch_source(url: &str) -> Result<Vec<u8>, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::Scheme);
    }

    let response = reqwest::get(parsed).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
