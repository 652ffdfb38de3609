pub mod horizon;
pub mod ticker;

pub use horizon::HorizonLedgerProvider;
pub use ticker::TickerPriceProvider;

use crate::core::error::FetchError;
use reqwest::Url;

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, FetchError> {
    let url = Url::parse(base_url).map_err(|e| {
        FetchError::ConfigLoad(anyhow::anyhow!("Invalid provider URL '{base_url}': {e}"))
    })?;
    if url.cannot_be_a_base() {
        return Err(FetchError::ConfigLoad(anyhow::anyhow!(
            "Provider URL '{base_url}' cannot carry a path"
        )));
    }
    Ok(url)
}

/// Appends `segments` to the base path, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // Only fails for cannot-be-a-base URLs, which parse_base_url rejects.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
