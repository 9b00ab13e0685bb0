use crate::model::{GeoBounds, GeoPoint, PolygonStyle, RegionKey, Viewport};

pub mod controller;
pub mod dialog;
pub mod geometry;
pub mod loader;
pub mod registry;
pub mod renderer;
pub mod transforms;

pub use controller::{ControlState, SelectionController};
pub use dialog::{DialogContent, DialogSurface, DismissTrigger, InfoDialog};
pub use loader::{load_regions, Fetcher, HttpFetcher, LoadOutcome};
pub use registry::{HighlightTicket, LayerRegistry, Overlay};

/// Rendering backend driven by the selection controller.
///
/// Implementations only draw; which overlays are visible and how features are styled is decided
/// by the controller. Calls naming a key the surface does not currently show are ignored.
pub trait MapSurface {
    fn show_overlay(&mut self, overlay: &Overlay);
    fn hide_overlay(&mut self, key: &RegionKey);
    fn restyle_feature(&mut self, key: &RegionKey, feature: usize, style: &PolygonStyle);
    /// Moves the view so `bounds` is fully visible with `padding` pixels to spare.
    fn fit_bounds(&mut self, bounds: &GeoBounds, padding: f64);
}

// Core rendering context for canvas drawing
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub viewport: Viewport,
    pub canvas_size: (f64, f64),
}

impl RenderContext {
    pub fn new(viewport: Viewport) -> Self {
        let canvas_size = (
            viewport.size.width as f64,
            viewport.size.height as f64,
        );
        RenderContext {
            viewport,
            canvas_size,
        }
    }

    pub fn world_to_screen(&self, lng: f64, lat: f64) -> (f64, f64) {
        self.viewport.world_to_screen(&GeoPoint::new(lat, lng))
    }

    /// Whether a lon/lat box overlaps the canvas at all.
    pub fn is_on_screen(&self, bounds: &GeoBounds) -> bool {
        let (x0, y0) = self.world_to_screen(bounds.min_x, bounds.max_y);
        let (x1, y1) = self.world_to_screen(bounds.max_x, bounds.min_y);
        x1 >= 0.0 && y1 >= 0.0 && x0 <= self.canvas_size.0 && y0 <= self.canvas_size.1
    }
}
