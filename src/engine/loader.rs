//! Concurrent GeoJSON retrieval.
//!
//! Every configured region is fetched independently and all requests are joined once they have
//! settled. A failing region only produces an `Err` outcome for that region; the others are
//! unaffected. There is no retry, timeout or backoff.

use futures::future::join_all;
use geojson::{Feature, FeatureCollection, GeoJson};

use crate::error::ViewerError;
use crate::model::{RegionCatalog, RegionDescriptor, ViewerResult};

/// Source of raw GeoJSON text for a file location.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch_text(&self, location: &str) -> ViewerResult<String>;
}

/// Fetches over HTTP(S), resolving relative file names against `base_url`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpFetcher {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Uses the current page location as base, so `india.geojson` is served next to the page.
    pub fn for_current_page() -> ViewerResult<Self> {
        let href = web_sys::window()
            .ok_or_else(|| ViewerError::Wasm("No window".to_string()))?
            .location()
            .href()
            .map_err(|_| ViewerError::Wasm("Could not read page location".to_string()))?;
        Ok(HttpFetcher::new(href))
    }

    pub fn resolve(&self, location: &str) -> ViewerResult<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        reqwest::Url::parse(&self.base_url)
            .and_then(|base| base.join(location))
            .map(|url| url.to_string())
            .map_err(|e| ViewerError::Io(format!("Cannot resolve {}: {}", location, e)))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, location: &str) -> ViewerResult<String> {
        let url = self.resolve(location)?;
        tracing::debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ViewerError::Io(format!("Failed to fetch {}: {}", location, e)))?;
        if !resp.status().is_success() {
            return Err(ViewerError::Http {
                file: location.to_string(),
                status: resp.status().as_u16(),
            });
        }
        resp.text()
            .await
            .map_err(|e| ViewerError::Io(format!("Failed to read {}: {}", location, e)))
    }
}

/// Result of loading one region, kept in configuration order.
#[derive(Debug)]
pub struct LoadOutcome {
    pub index: usize,
    pub descriptor: RegionDescriptor,
    pub result: ViewerResult<FeatureCollection>,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Parses a GeoJSON document, promoting a lone Feature or Geometry to a one-feature collection.
pub fn parse_feature_collection(content: &str) -> ViewerResult<FeatureCollection> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| ViewerError::Serialization(format!("Invalid GeoJSON: {}", e)))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => return Ok(fc),
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature::from(g)],
    };
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

async fn load_region<F: Fetcher>(
    fetcher: &F,
    index: usize,
    descriptor: &RegionDescriptor,
) -> LoadOutcome {
    let result = match fetcher.fetch_text(&descriptor.file_name).await {
        Ok(content) => parse_feature_collection(&content),
        Err(e) => Err(e),
    };
    match &result {
        Ok(fc) => tracing::info!(
            "Loaded {} features for {} from {}",
            fc.features.len(),
            descriptor.key,
            descriptor.file_name
        ),
        Err(e) => tracing::warn!("Could not load {}: {}", descriptor.file_name, e),
    }
    LoadOutcome {
        index,
        descriptor: descriptor.clone(),
        result,
    }
}

/// Issues one request per region concurrently and waits for all of them to settle.
pub async fn load_regions<F: Fetcher>(fetcher: &F, catalog: &RegionCatalog) -> Vec<LoadOutcome> {
    tracing::info!("Loading {} GeoJSON files", catalog.len());
    let outcomes = join_all(
        catalog
            .descriptors()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| load_region(fetcher, index, descriptor)),
    )
    .await;
    let loaded = outcomes.iter().filter(|o| o.is_loaded()).count();
    tracing::info!("{} of {} regions available", loaded, outcomes.len());
    outcomes
}
