use crate::engine::transforms::{project, tile_size, unproject};
use crate::error::ViewerError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;

pub use config::{BaseMap, DomIds, RegionCatalog, RegionConfig, ViewerConfig};

pub type ViewerResult<T> = Result<T, ViewerError>;

/// Geographic bounding box in degrees, `x` is longitude and `y` latitude.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl GeoBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        GeoBounds {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_point(lng: f64, lat: f64) -> Self {
        GeoBounds::new(lng, lat, lng, lat)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// A box is usable for fitting when every edge is finite and it is not inverted.
    /// Degenerate (single point) boxes are valid.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    pub fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        GeoBounds::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

// Geographic point (latitude, longitude)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPoint { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }
}

// Pixel size
#[derive(Clone, Debug, PartialEq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        PixelSize { width, height }
    }
}

/// Identifier of a configured region, e.g. `madhya-pradesh`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(String);

impl RegionKey {
    pub fn new(key: impl Into<String>) -> Self {
        RegionKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionKey {
    fn from(key: &str) -> Self {
        RegionKey::new(key)
    }
}

/// Static description of one region, fixed after validation.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDescriptor {
    pub key: RegionKey,
    pub label: String,
    pub file_name: String,
    pub color: String,
    pub fit_bounds: bool,
}

pub const NO_DESCRIPTION: &str = "No description available.";

#[derive(Clone, Debug, PartialEq)]
pub struct RegionInfo {
    pub title: String,
    pub body: String,
}

impl RegionInfo {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        RegionInfo {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn placeholder(label: &str) -> Self {
        RegionInfo::new(label, NO_DESCRIPTION)
    }
}

pub const DEFAULT_PALETTE: [&str; 5] = ["#1f78b4", "#33a02c", "#e31a1c", "#ff7f00", "#6a3d9a"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonStyle {
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        PolygonStyle {
            color: DEFAULT_PALETTE[0].to_string(),
            weight: 1.8,
            opacity: 0.95,
            fill_opacity: 0.4,
        }
    }
}

impl PolygonStyle {
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn is_valid(&self) -> ViewerResult<()> {
        if !(0.0..=1.0).contains(&self.opacity) || !(0.0..=1.0).contains(&self.fill_opacity) {
            return Err(ViewerError::Config(
                "style opacities must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ViewerError::Config(
                "style weight must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial style applied on top of a base style while a feature is highlighted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverride {
    pub color: Option<String>,
    pub weight: Option<f64>,
    pub opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
}

impl Default for StyleOverride {
    fn default() -> Self {
        StyleOverride {
            color: None,
            weight: Some(3.0),
            opacity: None,
            fill_opacity: Some(0.6),
        }
    }
}

impl StyleOverride {
    pub fn apply(&self, base: &PolygonStyle) -> PolygonStyle {
        PolygonStyle {
            color: self.color.clone().unwrap_or_else(|| base.color.clone()),
            weight: self.weight.unwrap_or(base.weight),
            opacity: self.opacity.unwrap_or(base.opacity),
            fill_opacity: self.fill_opacity.unwrap_or(base.fill_opacity),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerVariant {
    /// One region visible at a time over a raster base map.
    #[default]
    Isolate,
    /// National outline always visible, sub-regions toggled on top.
    NationalOverlay,
}

impl ViewerVariant {
    pub fn allows_escape_dismiss(&self) -> bool {
        matches!(self, ViewerVariant::Isolate)
    }

    pub fn shows_feature_properties(&self) -> bool {
        matches!(self, ViewerVariant::NationalOverlay)
    }
}

/// What happens to overlays that stay visible across a selection change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePolicy {
    #[default]
    AddOnce,
    AlwaysRefresh,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    All,
    Region(RegionKey),
}

// Viewport for map view management
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub size: PixelSize,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: f64, size: PixelSize) -> ViewerResult<Self> {
        if !center.is_valid() {
            return Err(ViewerError::Config("Invalid center coordinates".to_string()));
        }
        if !(0.0..=22.0).contains(&zoom) {
            return Err(ViewerError::Config(
                "Zoom must be between 0.0 and 22.0".to_string(),
            ));
        }
        if size.width == 0 || size.height == 0 {
            return Err(ViewerError::Config(
                "Size dimensions must be greater than 0".to_string(),
            ));
        }
        Ok(Viewport {
            center,
            zoom,
            size,
            min_zoom: 0.0,
            max_zoom: 22.0,
        })
    }

    pub fn with_zoom_range(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
        self
    }

    pub fn zoom_to(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn resize(&mut self, size: PixelSize) -> ViewerResult<()> {
        if size.width == 0 || size.height == 0 {
            return Err(ViewerError::Config(
                "Size dimensions must be greater than 0".to_string(),
            ));
        }
        self.size = size;
        Ok(())
    }

    /// Moves the center by a screen-space offset in pixels.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = project(&self.center, self.zoom);
        let world = tile_size(self.zoom);
        let x = cx - dx;
        let y = (cy - dy).clamp(0.0, world);
        let mut center = unproject(x, y, self.zoom);
        center.lng = (center.lng + 540.0).rem_euclid(360.0) - 180.0;
        self.center = center;
    }

    /// Top-left corner of the view in world pixels at the current zoom.
    pub fn origin(&self) -> (f64, f64) {
        let (cx, cy) = project(&self.center, self.zoom);
        (
            cx - self.size.width as f64 / 2.0,
            cy - self.size.height as f64 / 2.0,
        )
    }

    pub fn world_to_screen(&self, point: &GeoPoint) -> (f64, f64) {
        let (x, y) = project(point, self.zoom);
        let (ox, oy) = self.origin();
        (x - ox, y - oy)
    }

    pub fn screen_to_world(&self, x: f64, y: f64) -> GeoPoint {
        let (ox, oy) = self.origin();
        unproject(ox + x, oy + y, self.zoom)
    }

    /// Keeps the geographic point under the cursor fixed while zooming.
    pub fn zoom_around(&mut self, zoom: f64, anchor: (f64, f64)) {
        let before = self.screen_to_world(anchor.0, anchor.1);
        self.zoom_to(zoom);
        let (ax, ay) = project(&before, self.zoom);
        let cx = ax - anchor.0 + self.size.width as f64 / 2.0;
        let cy = ay - anchor.1 + self.size.height as f64 / 2.0;
        self.center = unproject(cx, cy, self.zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_override_keeps_unset_fields() {
        let base = PolygonStyle::default().with_color("#e31a1c");
        let highlighted = StyleOverride::default().apply(&base);
        assert_eq!(highlighted.color, "#e31a1c");
        assert_eq!(highlighted.weight, 3.0);
        assert_eq!(highlighted.fill_opacity, 0.6);
        assert_eq!(highlighted.opacity, base.opacity);
    }

    #[test]
    fn style_validation_rejects_out_of_range_opacity() {
        let style = PolygonStyle {
            fill_opacity: 1.5,
            ..PolygonStyle::default()
        };
        assert!(style.is_valid().is_err());
        assert!(PolygonStyle::default().is_valid().is_ok());
    }

    #[test]
    fn bounds_validity_and_union() {
        let a = GeoBounds::new(74.0, 21.0, 82.8, 26.9);
        let b = GeoBounds::new(91.1, 22.9, 92.3, 24.5);
        assert!(a.is_valid());
        assert!(GeoBounds::from_point(80.0, 22.0).is_valid());
        assert!(!GeoBounds::new(f64::INFINITY, 0.0, f64::NEG_INFINITY, 0.0).is_valid());

        let u = a.union(&b);
        assert_eq!(u, GeoBounds::new(74.0, 21.0, 92.3, 26.9));
    }

    #[test]
    fn screen_round_trip_at_center() {
        let viewport = Viewport::new(GeoPoint::new(22.0, 80.0), 5.0, PixelSize::new(800, 600))
            .expect("valid viewport");
        let (x, y) = viewport.world_to_screen(&GeoPoint::new(22.0, 80.0));
        assert!((x - 400.0).abs() < 1e-6);
        assert!((y - 300.0).abs() < 1e-6);

        let back = viewport.screen_to_world(x, y);
        assert!((back.lat - 22.0).abs() < 1e-9);
        assert!((back.lng - 80.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut viewport = Viewport::new(GeoPoint::new(22.0, 80.0), 5.0, PixelSize::new(800, 600))
            .expect("valid viewport")
            .with_zoom_range(2.0, 19.0);
        viewport.zoom_to(25.0);
        assert_eq!(viewport.zoom, 19.0);
        viewport.zoom_to(-1.0);
        assert_eq!(viewport.zoom, 2.0);
    }

    #[test]
    fn viewport_rejects_zero_size() {
        assert!(Viewport::new(GeoPoint::new(0.0, 0.0), 1.0, PixelSize::new(0, 10)).is_err());
    }
}
