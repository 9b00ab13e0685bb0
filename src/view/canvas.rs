//! Canvas 2D backend: raster base tiles with the region overlays drawn on top.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlImageElement, MouseEvent,
    WheelEvent,
};

use crate::engine::registry::{Overlay, OverlayGeometry};
use crate::engine::renderer::{
    clear_canvas, draw_attribution, draw_background, draw_tile, render_overlay,
};
use crate::engine::transforms::{fit_bounds, tile_url, visible_tiles};
use crate::engine::{MapSurface, RenderContext};
use crate::error::ViewerError;
use crate::model::{
    BaseMap, GeoBounds, PixelSize, PolygonStyle, RegionKey, ViewerConfig, ViewerResult,
    Viewport,
};
use crate::view::dom::element_by_id;
use crate::view::{ClickHandler, HoverHandler, InteractiveSurface, MapClick};

const BACKGROUND: &str = "#dde3e8";
const MAX_CACHED_TILES: usize = 256;
const DRAG_THRESHOLD_PX: f64 = 4.0;

struct RasterSource {
    url_template: String,
    subdomains: Vec<String>,
    attribution: String,
}

struct SceneOverlay {
    key: RegionKey,
    geometry: Rc<OverlayGeometry>,
    styles: Vec<PolygonStyle>,
}

struct Drag {
    last: (f64, f64),
    travelled: f64,
}

struct Scene {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    viewport: Viewport,
    raster: Option<RasterSource>,
    overlays: Vec<SceneOverlay>,
    tiles: HashMap<(u8, u32, u32), HtmlImageElement>,
    drag: Option<Drag>,
    suppress_click: bool,
}

impl Scene {
    fn redraw(&mut self, scene: &Weak<RefCell<Scene>>) -> ViewerResult<()> {
        let size = (
            self.viewport.size.width as f64,
            self.viewport.size.height as f64,
        );
        clear_canvas(&self.context, size)?;
        draw_background(&self.context, size, BACKGROUND)?;
        self.draw_tiles(scene)?;

        let render_context = RenderContext::new(self.viewport.clone());
        for overlay in &self.overlays {
            render_overlay(&overlay.geometry, &overlay.styles, &render_context, &self.context)?;
        }
        if let Some(raster) = &self.raster {
            draw_attribution(&self.context, size, &raster.attribution);
        }
        Ok(())
    }

    fn draw_tiles(&mut self, scene: &Weak<RefCell<Scene>>) -> ViewerResult<()> {
        let Some(raster) = &self.raster else {
            return Ok(());
        };
        let placements = visible_tiles(&self.viewport);
        if self.tiles.len() > MAX_CACHED_TILES {
            self.tiles.retain(|id, _| {
                placements
                    .iter()
                    .any(|p| (p.z, p.x, p.y) == *id)
            });
        }

        for placement in &placements {
            let id = (placement.z, placement.x, placement.y);
            if let Some(image) = self.tiles.get(&id) {
                if image.complete() && image.natural_width() > 0 {
                    draw_tile(&self.context, image, placement)?;
                }
                continue;
            }

            let image = HtmlImageElement::new()
                .map_err(|_| ViewerError::Wasm("Could not create tile image".to_string()))?;
            image.set_cross_origin(Some("anonymous"));
            let weak = scene.clone();
            let onload = Closure::once_into_js(move || {
                if let Some(scene) = weak.upgrade() {
                    if let Ok(mut inner) = scene.try_borrow_mut() {
                        if let Err(e) = inner.redraw(&weak) {
                            tracing::warn!("Redraw after tile load failed: {}", e);
                        }
                    }
                }
            });
            image.set_onload(Some(onload.unchecked_ref()));
            image.set_src(&tile_url(
                &raster.url_template,
                &raster.subdomains,
                placement.z,
                placement.x,
                placement.y,
            ));
            self.tiles.insert(id, image);
        }
        Ok(())
    }

    fn event_point(&self, event: &MouseEvent) -> (f64, f64) {
        (event.offset_x() as f64, event.offset_y() as f64)
    }
}

/// Whole zoom levels to move for a wheel delta; scrolling up zooms in. Horizontal scrolling
/// carries no zoom direction.
fn wheel_zoom_step(delta_y: f64) -> Option<f64> {
    if delta_y == 0.0 {
        None
    } else if delta_y < 0.0 {
        Some(1.0)
    } else {
        Some(-1.0)
    }
}

/// Renders into a `<canvas>` created inside the map container.
pub struct CanvasSurface {
    scene: Rc<RefCell<Scene>>,
    click: Rc<RefCell<Option<ClickHandler>>>,
    hover: Rc<RefCell<Option<HoverHandler>>>,
}

impl CanvasSurface {
    pub fn mount(document: &Document, config: &ViewerConfig) -> ViewerResult<Self> {
        let container: Element = element_by_id(document, &config.dom.map)?;
        let canvas = document
            .create_element("canvas")
            .map_err(|_| ViewerError::Wasm("Could not create canvas".to_string()))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ViewerError::Wasm("Element is not a canvas".to_string()))?;

        let width = container.client_width().max(1) as u32;
        let height = container.client_height().max(1) as u32;
        let (width, height) = if width > 1 && height > 1 {
            (width, height)
        } else {
            (800, 600)
        };
        canvas.set_width(width);
        canvas.set_height(height);
        container
            .append_child(&canvas)
            .map_err(|_| ViewerError::Wasm("Could not attach canvas".to_string()))?;

        let context = canvas
            .get_context("2d")
            .map_err(|_| ViewerError::Wasm("Could not get 2d context".to_string()))?
            .ok_or_else(|| ViewerError::Wasm("No 2d context".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| ViewerError::Wasm("Context is not 2d".to_string()))?;

        let viewport = Viewport::new(
            config.center.clone(),
            config.zoom,
            PixelSize::new(width, height),
        )?
        .with_zoom_range(config.min_zoom, config.max_zoom);

        let raster = match &config.base_map {
            BaseMap::Raster {
                url_template,
                subdomains,
                attribution,
            } => Some(RasterSource {
                url_template: url_template.clone(),
                subdomains: subdomains.clone(),
                attribution: attribution.clone(),
            }),
            BaseMap::VectorStyle { url } => {
                tracing::warn!("Canvas surface cannot draw vector style {}, drawing overlays only", url);
                None
            }
        };

        let surface = CanvasSurface {
            scene: Rc::new(RefCell::new(Scene {
                canvas,
                context,
                viewport,
                raster,
                overlays: Vec::new(),
                tiles: HashMap::new(),
                drag: None,
                suppress_click: false,
            })),
            click: Rc::new(RefCell::new(None)),
            hover: Rc::new(RefCell::new(None)),
        };
        surface.bind_pointer()?;
        surface.bind_resize(container)?;
        surface.redraw();
        tracing::info!("Canvas map mounted at {}x{}", width, height);
        Ok(surface)
    }

    fn redraw(&self) {
        let weak = Rc::downgrade(&self.scene);
        if let Ok(mut scene) = self.scene.try_borrow_mut() {
            if let Err(e) = scene.redraw(&weak) {
                tracing::warn!("Redraw failed: {}", e);
            }
        }
    }

    fn listen<E: FromWasmAbi + 'static>(
        &self,
        event: &str,
        handler: impl FnMut(E) + 'static,
    ) -> ViewerResult<()> {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
        self.scene
            .borrow()
            .canvas
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|_| ViewerError::Wasm(format!("Could not listen for {}", event)))?;
        callback.forget();
        Ok(())
    }

    /// Follows the container's size when the window is resized.
    fn bind_resize(&self, container: Element) -> ViewerResult<()> {
        let window = web_sys::window().ok_or_else(|| ViewerError::Wasm("No window".to_string()))?;
        let scene = self.scene.clone();
        let callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
            let (width, height) = (container.client_width(), container.client_height());
            if width <= 1 || height <= 1 {
                return;
            }
            let weak = Rc::downgrade(&scene);
            let Ok(mut inner) = scene.try_borrow_mut() else {
                return;
            };
            if inner
                .viewport
                .resize(PixelSize::new(width as u32, height as u32))
                .is_err()
            {
                return;
            }
            inner.canvas.set_width(width as u32);
            inner.canvas.set_height(height as u32);
            if let Err(e) = inner.redraw(&weak) {
                tracing::warn!("Redraw after resize failed: {}", e);
            }
        }) as Box<dyn FnMut(web_sys::Event)>);
        window
            .add_event_listener_with_callback("resize", callback.as_ref().unchecked_ref())
            .map_err(|_| ViewerError::Wasm("Could not listen for resize".to_string()))?;
        callback.forget();
        Ok(())
    }

    fn bind_pointer(&self) -> ViewerResult<()> {
        let scene = self.scene.clone();
        self.listen("mousedown", move |event: MouseEvent| {
            let mut scene = scene.borrow_mut();
            let point = scene.event_point(&event);
            scene.drag = Some(Drag {
                last: point,
                travelled: 0.0,
            });
            scene.suppress_click = false;
        })?;

        let scene = self.scene.clone();
        let hover = self.hover.clone();
        self.listen("mousemove", move |event: MouseEvent| {
            let weak = Rc::downgrade(&scene);
            let (point, dragging) = {
                let Ok(mut inner) = scene.try_borrow_mut() else {
                    return;
                };
                let point = inner.event_point(&event);
                let mut dragging = false;
                if event.buttons() & 1 == 1 {
                    if let Some(drag) = inner.drag.as_mut() {
                        let (dx, dy) = (point.0 - drag.last.0, point.1 - drag.last.1);
                        drag.last = point;
                        drag.travelled += dx.hypot(dy);
                        let moved = drag.travelled > DRAG_THRESHOLD_PX;
                        inner.viewport.pan_by(dx, dy);
                        inner.suppress_click |= moved;
                        dragging = true;
                    }
                }
                if dragging {
                    if let Err(e) = inner.redraw(&weak) {
                        tracing::warn!("Redraw failed: {}", e);
                    }
                }
                (inner.viewport.screen_to_world(point.0, point.1), dragging)
            };
            if dragging {
                return;
            }
            let tooltip = hover.borrow_mut().as_mut().and_then(|h| h(point));
            let canvas = scene.borrow().canvas.clone();
            match tooltip {
                Some(text) => canvas.set_title(&text),
                None => canvas.set_title(""),
            }
        })?;

        let scene = self.scene.clone();
        self.listen("mouseup", move |_: MouseEvent| {
            scene.borrow_mut().drag = None;
        })?;

        let scene = self.scene.clone();
        let click = self.click.clone();
        self.listen("click", move |event: MouseEvent| {
            let point = {
                let mut inner = scene.borrow_mut();
                if inner.suppress_click {
                    inner.suppress_click = false;
                    return;
                }
                let (x, y) = inner.event_point(&event);
                inner.viewport.screen_to_world(x, y)
            };
            if let Some(handler) = click.borrow_mut().as_mut() {
                handler(MapClick::At(point));
            }
        })?;

        let scene = self.scene.clone();
        self.listen("wheel", move |event: WheelEvent| {
            let Some(step) = wheel_zoom_step(event.delta_y()) else {
                return;
            };
            event.prevent_default();
            let weak = Rc::downgrade(&scene);
            let mut inner = scene.borrow_mut();
            let zoom = (inner.viewport.zoom + step).round();
            let anchor = (event.offset_x() as f64, event.offset_y() as f64);
            inner.viewport.zoom_around(zoom, anchor);
            if let Err(e) = inner.redraw(&weak) {
                tracing::warn!("Redraw failed: {}", e);
            }
        })?;
        Ok(())
    }
}

impl MapSurface for CanvasSurface {
    fn show_overlay(&mut self, overlay: &Overlay) {
        {
            let mut scene = self.scene.borrow_mut();
            scene.overlays.retain(|o| o.key != overlay.key);
            scene.overlays.push(SceneOverlay {
                key: overlay.key.clone(),
                geometry: overlay.geometry.clone(),
                styles: overlay.styles().to_vec(),
            });
        }
        self.redraw();
    }

    fn hide_overlay(&mut self, key: &RegionKey) {
        self.scene.borrow_mut().overlays.retain(|o| &o.key != key);
        self.redraw();
    }

    fn restyle_feature(&mut self, key: &RegionKey, feature: usize, style: &PolygonStyle) {
        {
            let mut scene = self.scene.borrow_mut();
            let Some(slot) = scene
                .overlays
                .iter_mut()
                .find(|o| &o.key == key)
                .and_then(|o| o.styles.get_mut(feature))
            else {
                return;
            };
            *slot = style.clone();
        }
        self.redraw();
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds, padding: f64) {
        {
            let mut scene = self.scene.borrow_mut();
            let viewport = &mut scene.viewport;
            let (center, zoom) = fit_bounds(
                bounds,
                &viewport.size,
                padding,
                viewport.min_zoom,
                viewport.max_zoom,
            );
            viewport.center = center;
            viewport.zoom_to(zoom);
        }
        self.redraw();
    }
}

impl InteractiveSurface for CanvasSurface {
    fn on_click(&mut self, handler: ClickHandler) -> ViewerResult<()> {
        *self.click.borrow_mut() = Some(handler);
        Ok(())
    }

    fn on_hover(&mut self, handler: HoverHandler) -> ViewerResult<()> {
        *self.hover.borrow_mut() = Some(handler);
        Ok(())
    }
}
