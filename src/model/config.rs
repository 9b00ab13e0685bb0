//! Viewer configuration.
//!
//! Everything the viewer needs at startup lives in [`ViewerConfig`]: the region list with its
//! descriptive text, the base map, styling and DOM element ids. A config is validated exactly once
//! into a [`RegionCatalog`], after which region records are immutable.

use super::{
    DEFAULT_PALETTE, GeoPoint, PolygonStyle, RegionDescriptor, RegionInfo, RegionKey,
    SourcePolicy, StyleOverride, ViewerResult, ViewerVariant,
};
use crate::error::ViewerError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BaseMap {
    Raster {
        url_template: String,
        #[serde(default = "default_subdomains")]
        subdomains: Vec<String>,
        #[serde(default)]
        attribution: String,
    },
    VectorStyle {
        url: String,
    },
}

fn default_subdomains() -> Vec<String> {
    vec!["a".to_string(), "b".to_string(), "c".to_string()]
}

impl BaseMap {
    pub fn openstreetmap() -> Self {
        BaseMap::Raster {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: default_subdomains(),
            attribution: "\u{a9} OpenStreetMap contributors".to_string(),
        }
    }

    pub fn maplibre_demo() -> Self {
        BaseMap::VectorStyle {
            url: "https://demotiles.maplibre.org/style.json".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub key: RegionKey,
    pub label: String,
    pub file: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_true")]
    pub fit_bounds: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_true() -> bool {
    true
}

impl RegionConfig {
    fn new(key: &str, label: &str, title: &str, body: &str) -> Self {
        RegionConfig {
            key: RegionKey::new(key),
            label: label.to_string(),
            file: format!("{key}.geojson"),
            color: None,
            fit_bounds: true,
            title: Some(title.to_string()),
            body: Some(body.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomIds {
    pub map: String,
    pub controls: String,
    pub modal: String,
    pub modal_title: String,
    pub modal_body: String,
    pub modal_close: String,
    pub radio_group: String,
}

impl Default for DomIds {
    fn default() -> Self {
        DomIds {
            map: "map".to_string(),
            controls: "controls".to_string(),
            modal: "modal".to_string(),
            modal_title: "modal-title".to_string(),
            modal_body: "modal-body".to_string(),
            modal_close: "modal-close".to_string(),
            radio_group: "state".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub variant: ViewerVariant,
    pub base_map: BaseMap,
    pub center: GeoPoint,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fit_padding: f64,
    pub highlight_duration_ms: u32,
    pub source_policy: SourcePolicy,
    pub palette: Vec<String>,
    pub style: PolygonStyle,
    pub highlight: StyleOverride,
    /// Region shown first in the isolate variant and kept visible in the overlay variant.
    pub national_key: Option<RegionKey>,
    pub regions: Vec<RegionConfig>,
    pub dom: DomIds,
    pub instructions: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig::india_raster()
    }
}

impl ViewerConfig {
    pub fn india_raster() -> Self {
        ViewerConfig {
            variant: ViewerVariant::Isolate,
            base_map: BaseMap::openstreetmap(),
            center: GeoPoint::new(22.0, 80.0),
            zoom: 5.0,
            min_zoom: 0.0,
            max_zoom: 19.0,
            fit_padding: 20.0,
            highlight_duration_ms: 800,
            source_policy: SourcePolicy::AddOnce,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            style: PolygonStyle::default(),
            highlight: StyleOverride::default(),
            national_key: Some(RegionKey::new("india")),
            regions: india_regions(),
            dom: DomIds::default(),
            instructions: "Choose a state or click one on the map".to_string(),
        }
    }

    pub fn india_vector() -> Self {
        let mut regions = india_regions();
        let colors = ["#444444", "#ff7f00", "#33a02c", "#e31a1c", "#6a3d9a"];
        for (region, color) in regions.iter_mut().zip(colors) {
            region.color = Some(color.to_string());
        }
        if let Some(national) = regions.first_mut() {
            national.label = "All States".to_string();
        }
        ViewerConfig {
            variant: ViewerVariant::NationalOverlay,
            base_map: BaseMap::maplibre_demo(),
            regions,
            ..ViewerConfig::india_raster()
        }
    }

    pub fn from_json_str(json: &str) -> ViewerResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ViewerError::Config(format!("Invalid viewer config: {}", e)))
    }

    /// Checks the config and freezes the region records.
    pub fn validate(&self) -> ViewerResult<RegionCatalog> {
        if self.regions.is_empty() {
            return Err(ViewerError::Config("no regions configured".to_string()));
        }
        if self.min_zoom > self.max_zoom || !(self.min_zoom..=self.max_zoom).contains(&self.zoom) {
            return Err(ViewerError::Config(format!(
                "zoom {} must lie within [{}, {}]",
                self.zoom, self.min_zoom, self.max_zoom
            )));
        }
        if !self.center.is_valid() {
            return Err(ViewerError::Config("Invalid center coordinates".to_string()));
        }
        if self.palette.is_empty() {
            return Err(ViewerError::Config("palette cannot be empty".to_string()));
        }
        self.style.is_valid()?;
        self.highlight.apply(&self.style).is_valid()?;

        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(self.regions.len());
        let mut info = HashMap::new();
        for (index, region) in self.regions.iter().enumerate() {
            if region.key.as_str().is_empty() {
                return Err(ViewerError::Config(format!(
                    "region #{} has an empty key",
                    index
                )));
            }
            if region.file.trim().is_empty() {
                return Err(ViewerError::Config(format!(
                    "region {} has no file",
                    region.key
                )));
            }
            if !seen.insert(region.key.clone()) {
                return Err(ViewerError::Config(format!(
                    "duplicate region key {}",
                    region.key
                )));
            }

            let color = region
                .color
                .clone()
                .unwrap_or_else(|| self.palette[index % self.palette.len()].clone());
            descriptors.push(RegionDescriptor {
                key: region.key.clone(),
                label: region.label.clone(),
                file_name: region.file.clone(),
                color,
                fit_bounds: region.fit_bounds,
            });

            if region.title.is_some() || region.body.is_some() {
                info.insert(
                    region.key.clone(),
                    RegionInfo::new(
                        region.title.clone().unwrap_or_else(|| region.label.clone()),
                        region
                            .body
                            .clone()
                            .unwrap_or_else(|| super::NO_DESCRIPTION.to_string()),
                    ),
                );
            }
        }

        if let Some(national) = &self.national_key {
            if !seen.contains(national) {
                return Err(ViewerError::Config(format!(
                    "national region {} is not configured",
                    national
                )));
            }
        } else if self.variant == ViewerVariant::NationalOverlay {
            return Err(ViewerError::Config(
                "the national-overlay variant needs a national_key".to_string(),
            ));
        }

        Ok(RegionCatalog {
            descriptors,
            info,
            national_key: self.national_key.clone(),
        })
    }
}

fn india_regions() -> Vec<RegionConfig> {
    vec![
        RegionConfig::new(
            "india",
            "All India",
            "India (All States)",
            "This view contains all state boundaries from the provided India GeoJSON. Use the radios to zoom to a specific state, or click a state polygon on the map.",
        ),
        RegionConfig::new(
            "madhya-pradesh",
            "Madhya Pradesh",
            "Madhya Pradesh",
            "Madhya Pradesh \u{2014} central Indian state. (Replace this text with whatever state-specific info you want shown.)",
        ),
        RegionConfig::new(
            "odisha",
            "Odisha",
            "Odisha",
            "Odisha \u{2014} eastern Indian state on the Bay of Bengal. (Replace with custom content.)",
        ),
        RegionConfig::new(
            "tripura",
            "Tripura",
            "Tripura",
            "Tripura \u{2014} a small northeastern state. (Replace with custom content.)",
        ),
        RegionConfig::new(
            "telangana",
            "Telangana",
            "Telangana",
            "Telangana \u{2014} state in southern India with capital Hyderabad. (Replace with custom content.)",
        ),
    ]
}

/// Validated, immutable region records in configuration order.
#[derive(Clone, Debug)]
pub struct RegionCatalog {
    descriptors: Vec<RegionDescriptor>,
    info: HashMap<RegionKey, RegionInfo>,
    national_key: Option<RegionKey>,
}

impl RegionCatalog {
    pub fn descriptors(&self) -> &[RegionDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, key: &RegionKey) -> Option<&RegionDescriptor> {
        self.descriptors.iter().find(|d| &d.key == key)
    }

    pub fn national_key(&self) -> Option<&RegionKey> {
        self.national_key.as_ref()
    }

    pub fn is_national(&self, key: &RegionKey) -> bool {
        self.national_key.as_ref() == Some(key)
    }

    /// Descriptive text for a region, falling back to its label and a placeholder body.
    pub fn info(&self, key: &RegionKey) -> RegionInfo {
        if let Some(info) = self.info.get(key) {
            return info.clone();
        }
        let label = self
            .descriptor(key)
            .map(|d| d.label.as_str())
            .unwrap_or_else(|| key.as_str());
        RegionInfo::placeholder(label)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
