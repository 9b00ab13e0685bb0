//! MapLibre GL backend.
//!
//! The page is expected to load `maplibre-gl.js`, which exposes the global `maplibregl`. Each
//! overlay becomes one GeoJSON source (`region-{key}`) with a fill layer and a line layer on top.
//! Per-feature restyling goes through feature-state; the layers' paint falls back to the
//! overlay's base style when no state is set.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise, Reflect};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

use crate::engine::{MapSurface, Overlay};
use crate::error::ViewerError;
use crate::model::{
    BaseMap, GeoBounds, GeoPoint, PolygonStyle, RegionKey, ViewerConfig, ViewerResult,
};
use crate::view::{ClickHandler, HoverHandler, InteractiveSurface, MapClick};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = maplibregl, js_name = Map)]
    pub type MapLibreMap;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Map", catch)]
    fn new(options: &JsValue) -> Result<MapLibreMap, JsValue>;

    #[wasm_bindgen(method, js_name = addSource, catch)]
    fn add_source(this: &MapLibreMap, id: &str, source: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = getSource)]
    fn get_source(this: &MapLibreMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = addLayer, catch)]
    fn add_layer(this: &MapLibreMap, layer: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = getLayer)]
    fn get_layer(this: &MapLibreMap, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = removeLayer, catch)]
    fn remove_layer(this: &MapLibreMap, id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn fit_bounds(this: &MapLibreMap, bounds: &JsValue, options: &JsValue);

    #[wasm_bindgen(method, js_name = setFeatureState, catch)]
    fn set_feature_state(
        this: &MapLibreMap,
        feature: &JsValue,
        state: &JsValue,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = queryRenderedFeatures, catch)]
    fn query_rendered_features(
        this: &MapLibreMap,
        point: &JsValue,
        options: &JsValue,
    ) -> Result<Array, JsValue>;

    #[wasm_bindgen(method, js_name = getCanvas)]
    fn get_canvas(this: &MapLibreMap) -> HtmlCanvasElement;

    #[wasm_bindgen(method)]
    fn on(this: &MapLibreMap, event: &str, listener: &Function);

    #[wasm_bindgen(method)]
    fn once(this: &MapLibreMap, event: &str, listener: &Function);

    pub type GeoJsonSource;

    #[wasm_bindgen(method, js_name = setData)]
    fn set_data(this: &GeoJsonSource, data: &JsValue);
}

fn source_id(key: &RegionKey) -> String {
    format!("region-{}", key)
}

fn fill_layer_id(key: &RegionKey) -> String {
    format!("region-{}-fill", key)
}

fn line_layer_id(key: &RegionKey) -> String {
    format!("region-{}-line", key)
}

fn to_js(value: &Value) -> ViewerResult<JsValue> {
    js_sys::JSON::parse(&value.to_string())
        .map_err(|_| ViewerError::Serialization("Could not convert value for MapLibre".to_string()))
}

fn js_error(context: &str, error: JsValue) -> ViewerError {
    ViewerError::Wasm(format!(
        "{}: {}",
        context,
        error.as_string().unwrap_or_else(|| format!("{:?}", error))
    ))
}

fn state_for(style: &PolygonStyle) -> Value {
    json!({
        "color": style.color,
        "weight": style.weight,
        "opacity": style.opacity,
        "fill_opacity": style.fill_opacity,
    })
}

/// `setFeatureState` arguments for every feature of an overlay. States outlive layer removal, so
/// each one is rewritten when the overlay is shown again.
fn feature_states(overlay: &Overlay) -> Vec<(Value, Value)> {
    overlay
        .styles()
        .iter()
        .enumerate()
        .map(|(feature, style)| {
            (
                json!({ "source": source_id(&overlay.key), "id": feature }),
                state_for(style),
            )
        })
        .collect()
}

fn coalesce(state: &str, fallback: Value) -> Value {
    json!(["coalesce", ["feature-state", state], fallback])
}

fn fill_layer(key: &RegionKey, style: &PolygonStyle) -> Value {
    json!({
        "id": fill_layer_id(key),
        "type": "fill",
        "source": source_id(key),
        "paint": {
            "fill-color": coalesce("color", json!(style.color)),
            "fill-opacity": coalesce("fill_opacity", json!(style.fill_opacity)),
        },
    })
}

fn line_layer(key: &RegionKey, style: &PolygonStyle) -> Value {
    json!({
        "id": line_layer_id(key),
        "type": "line",
        "source": source_id(key),
        "paint": {
            "line-color": coalesce("color", json!(style.color)),
            "line-width": coalesce("weight", json!(style.weight)),
            "line-opacity": coalesce("opacity", json!(style.opacity)),
        },
    })
}

/// MapLibre style for the configured base map. A raster template becomes an inline style with one
/// tile URL per subdomain.
fn base_style(base_map: &BaseMap) -> Value {
    match base_map {
        BaseMap::VectorStyle { url } => json!(url),
        BaseMap::Raster {
            url_template,
            subdomains,
            attribution,
        } => {
            let tiles: Vec<String> = if url_template.contains("{s}") && !subdomains.is_empty() {
                subdomains
                    .iter()
                    .map(|s| url_template.replace("{s}", s))
                    .collect()
            } else {
                vec![url_template.clone()]
            };
            json!({
                "version": 8,
                "sources": {
                    "base": {
                        "type": "raster",
                        "tiles": tiles,
                        "tileSize": 256,
                        "attribution": attribution,
                    }
                },
                "layers": [{ "id": "base", "type": "raster", "source": "base" }],
            })
        }
    }
}

fn map_options(config: &ViewerConfig) -> Value {
    json!({
        "container": config.dom.map,
        "style": base_style(&config.base_map),
        "center": [config.center.lng, config.center.lat],
        "zoom": config.zoom,
        "minZoom": config.min_zoom,
        "maxZoom": config.max_zoom,
    })
}

fn number_at(target: &JsValue, path: &[&str]) -> Option<f64> {
    path.iter()
        .try_fold(target.clone(), |value, key| {
            Reflect::get(&value, &JsValue::from_str(key)).ok()
        })?
        .as_f64()
}

fn string_at(target: &JsValue, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(target.clone(), |value, key| {
            Reflect::get(&value, &JsValue::from_str(key)).ok()
        })?
        .as_string()
}

/// Regions currently drawn, bottom to top.
type Shown = Rc<RefCell<Vec<RegionKey>>>;

/// Topmost overlay feature under a click, resolved by MapLibre itself.
fn feature_under(map: &MapLibreMap, shown: &Shown, event: &JsValue) -> Option<MapClick> {
    let layers: Vec<String> = shown.borrow().iter().map(fill_layer_id).collect();
    if layers.is_empty() {
        return None;
    }
    let point = Reflect::get(event, &JsValue::from_str("point")).ok()?;
    let options = to_js(&json!({ "layers": layers })).ok()?;
    let features = map.query_rendered_features(&point, &options).ok()?;
    let top = features.get(0);
    if top.is_undefined() {
        return None;
    }
    let layer = string_at(&top, &["layer", "id"])?;
    let feature = number_at(&top, &["id"])? as usize;
    let key = shown
        .borrow()
        .iter()
        .find(|key| fill_layer_id(key) == layer)
        .cloned()?;
    Some(MapClick::Feature(key, feature))
}

fn lng_lat(event: &JsValue) -> Option<GeoPoint> {
    Some(GeoPoint::new(
        number_at(event, &["lngLat", "lat"])?,
        number_at(event, &["lngLat", "lng"])?,
    ))
}

pub struct MapLibreSurface {
    map: Rc<MapLibreMap>,
    shown: Shown,
    click: Rc<RefCell<Option<ClickHandler>>>,
    hover: Rc<RefCell<Option<HoverHandler>>>,
    max_zoom: f64,
}

impl MapLibreSurface {
    /// Creates the map inside the configured container and waits for its style to load.
    pub async fn mount(config: &ViewerConfig) -> ViewerResult<Self> {
        let map = MapLibreMap::new(&to_js(&map_options(config))?)
            .map_err(|e| js_error("Could not create MapLibre map", e))?;

        let loaded = Promise::new(&mut |resolve, _reject| {
            map.once("load", &resolve);
        });
        JsFuture::from(loaded)
            .await
            .map_err(|e| js_error("MapLibre failed to load", e))?;
        tracing::info!("MapLibre map loaded in #{}", config.dom.map);

        let surface = MapLibreSurface {
            map: Rc::new(map),
            shown: Rc::new(RefCell::new(Vec::new())),
            click: Rc::new(RefCell::new(None)),
            hover: Rc::new(RefCell::new(None)),
            max_zoom: config.max_zoom,
        };
        surface.bind_pointer();
        Ok(surface)
    }

    fn bind_pointer(&self) {
        let map = self.map.clone();
        let shown = self.shown.clone();
        let click = self.click.clone();
        let on_click = Closure::wrap(Box::new(move |event: JsValue| {
            let resolved = feature_under(&map, &shown, &event)
                .or_else(|| lng_lat(&event).map(MapClick::At));
            let Some(resolved) = resolved else {
                return;
            };
            if let Some(handler) = click.borrow_mut().as_mut() {
                handler(resolved);
            }
        }) as Box<dyn FnMut(JsValue)>);
        self.map.on("click", on_click.as_ref().unchecked_ref());
        on_click.forget();

        let map = self.map.clone();
        let hover = self.hover.clone();
        let on_move = Closure::wrap(Box::new(move |event: JsValue| {
            let Some(point) = lng_lat(&event) else {
                return;
            };
            let tooltip = hover.borrow_mut().as_mut().and_then(|h| h(point));
            let canvas = map.get_canvas();
            canvas.set_title(tooltip.as_deref().unwrap_or(""));
            let cursor = if tooltip.is_some() { "pointer" } else { "" };
            if let Err(e) = canvas.style().set_property("cursor", cursor) {
                tracing::debug!("Could not set map cursor: {:?}", e);
            }
        }) as Box<dyn FnMut(JsValue)>);
        self.map.on("mousemove", on_move.as_ref().unchecked_ref());
        on_move.forget();
    }

    fn upsert_source(&self, overlay: &Overlay) -> ViewerResult<()> {
        let id = source_id(&overlay.key);
        let data = serde_json::to_value(&overlay.geometry.collection)
            .map_err(|e| ViewerError::Serialization(e.to_string()))?;
        let existing = self.map.get_source(&id);
        if existing.is_undefined() || existing.is_null() {
            let source = json!({ "type": "geojson", "data": data, "generateId": true });
            self.map
                .add_source(&id, &to_js(&source)?)
                .map_err(|e| js_error("Could not add source", e))?;
        } else {
            existing.unchecked_into::<GeoJsonSource>().set_data(&to_js(&data)?);
        }
        Ok(())
    }

    fn add_layers(&self, overlay: &Overlay) -> ViewerResult<()> {
        if self.has_layer(&fill_layer_id(&overlay.key)) {
            return Ok(());
        }
        self.map
            .add_layer(&to_js(&fill_layer(&overlay.key, &overlay.base_style))?)
            .map_err(|e| js_error("Could not add fill layer", e))?;
        self.map
            .add_layer(&to_js(&line_layer(&overlay.key, &overlay.base_style))?)
            .map_err(|e| js_error("Could not add line layer", e))?;
        Ok(())
    }

    fn has_source(&self, key: &RegionKey) -> bool {
        let source = self.map.get_source(&source_id(key));
        !(source.is_undefined() || source.is_null())
    }

    fn write_states(&self, overlay: &Overlay) -> ViewerResult<()> {
        for (target, state) in feature_states(overlay) {
            self.map
                .set_feature_state(&to_js(&target)?, &to_js(&state)?)
                .map_err(|e| js_error("Could not set feature state", e))?;
        }
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        let layer = self.map.get_layer(id);
        !(layer.is_undefined() || layer.is_null())
    }

    fn apply_state(&self, key: &RegionKey, feature: usize, style: &PolygonStyle) -> ViewerResult<()> {
        let target = json!({ "source": source_id(key), "id": feature });
        self.map
            .set_feature_state(&to_js(&target)?, &to_js(&state_for(style))?)
            .map_err(|e| js_error("Could not set feature state", e))
    }
}

impl MapSurface for MapLibreSurface {
    fn show_overlay(&mut self, overlay: &Overlay) {
        let result = self
            .upsert_source(overlay)
            .and_then(|_| self.add_layers(overlay))
            .and_then(|_| self.write_states(overlay));
        match result {
            Ok(()) => {
                let mut shown = self.shown.borrow_mut();
                shown.retain(|k| k != &overlay.key);
                shown.push(overlay.key.clone());
            }
            Err(e) => tracing::error!("Could not show {}: {}", overlay.key, e),
        }
    }

    fn hide_overlay(&mut self, key: &RegionKey) {
        for id in [line_layer_id(key), fill_layer_id(key)] {
            if self.has_layer(&id) {
                if let Err(e) = self.map.remove_layer(&id) {
                    tracing::warn!("{}", js_error("Could not remove layer", e));
                }
            }
        }
        self.shown.borrow_mut().retain(|k| k != key);
    }

    fn restyle_feature(&mut self, key: &RegionKey, feature: usize, style: &PolygonStyle) {
        // Hidden overlays keep their source, and its feature-state must follow the registry.
        if !self.has_source(key) {
            return;
        }
        if let Err(e) = self.apply_state(key, feature, style) {
            tracing::warn!("{}", e);
        }
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds, padding: f64) {
        let corners = json!([[bounds.min_x, bounds.min_y], [bounds.max_x, bounds.max_y]]);
        let options = json!({ "padding": padding, "maxZoom": self.max_zoom });
        match (to_js(&corners), to_js(&options)) {
            (Ok(corners), Ok(options)) => self.map.fit_bounds(&corners, &options),
            _ => tracing::warn!("Could not build fitBounds arguments"),
        }
    }
}

impl InteractiveSurface for MapLibreSurface {
    fn on_click(&mut self, handler: ClickHandler) -> ViewerResult<()> {
        *self.click.borrow_mut() = Some(handler);
        Ok(())
    }

    fn on_hover(&mut self, handler: HoverHandler) -> ViewerResult<()> {
        *self.hover.borrow_mut() = Some(handler);
        Ok(())
    }
}
