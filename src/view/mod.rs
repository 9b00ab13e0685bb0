use crate::engine::MapSurface;
use crate::model::{GeoPoint, RegionKey, ViewerResult};

pub mod canvas;
pub mod dom;
pub mod maplibre;
pub mod view;

/// A click reported by a rendering backend.
#[derive(Clone, Debug, PartialEq)]
pub enum MapClick {
    /// Only the map position is known; the controller hit-tests it.
    At(GeoPoint),
    /// The backend already resolved the clicked feature.
    Feature(RegionKey, usize),
}

pub type ClickHandler = Box<dyn FnMut(MapClick)>;
pub type HoverHandler = Box<dyn FnMut(GeoPoint) -> Option<String>>;

/// A [`MapSurface`] living in the page that can report pointer input.
pub trait InteractiveSurface: MapSurface {
    fn on_click(&mut self, handler: ClickHandler) -> ViewerResult<()>;

    fn on_hover(&mut self, _handler: HoverHandler) -> ViewerResult<()> {
        Ok(())
    }
}
